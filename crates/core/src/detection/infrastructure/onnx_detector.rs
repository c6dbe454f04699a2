//! YOLO-family object detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference, class scoring,
//! non-maximum suppression, and optional track-identity assignment.

use std::path::Path;

use crate::detection::domain::object_detector::{InferenceOptions, ObjectDetector};
use crate::shared::constants::TRACKER_MAX_LOST;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

use super::bytetrack_tracker::ByteTracker;
use super::math::non_max_suppression;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Object detector backed by an ONNX Runtime session.
///
/// Expects the YOLOv8-style output head: one row per candidate of
/// `[cx, cy, w, h, class_0 .. class_{n-1}]`, in either `[1, feats, dets]`
/// (transposed) or `[1, dets, feats]` layout.
pub struct OnnxDetector {
    session: ort::session::Session,
    tracker: ByteTracker,
    input_size: u32,
}

impl OnnxDetector {
    /// Loads a YOLO ONNX model and prepares for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting
    /// NCHW). Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // shape is [N, C, H, W] — use H (square input)
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            tracker: ByteTracker::new(TRACKER_MAX_LOST),
            input_size,
        })
    }

    /// Forgets accumulated track identities, e.g. after a seek.
    pub fn reset_tracking(&mut self) {
        self.tracker.reset();
    }
}

impl ObjectDetector for OnnxDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        options: &InferenceOptions,
    ) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let fw = frame.width() as f64;
        let fh = frame.height() as f64;

        // 1. Preprocess: letterbox + normalize → NCHW float32
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // Output is [1, feats, dets] (transposed) or [1, dets, feats].
        let (num_dets, num_feats, transposed) = if shape.len() == 3 {
            if shape[1] < shape[2] {
                (shape[2], shape[1], true)
            } else {
                (shape[1], shape[2], false)
            }
        } else {
            return Err(format!("unexpected model output shape: {shape:?}").into());
        };
        if num_feats < 5 {
            return Err(format!("model output rows too short: {num_feats} features").into());
        }
        let num_classes = num_feats - 4;

        let data = tensor.as_slice().ok_or("cannot get tensor slice")?;

        // 3. Parse candidates above the confidence threshold
        let mut detections = Vec::new();
        let mut row = vec![0f32; num_feats];
        for i in 0..num_dets {
            if transposed {
                for (f, slot) in row.iter_mut().enumerate() {
                    *slot = data[f * num_dets + i];
                }
            } else {
                row.copy_from_slice(&data[i * num_feats..(i + 1) * num_feats]);
            }

            let (class_id, confidence) = best_class(&row[4..4 + num_classes]);
            if confidence < options.confidence {
                continue;
            }

            let cx = row[0] as f64;
            let cy = row[1] as f64;
            let w = row[2] as f64;
            let h = row[3] as f64;

            // Letterbox coords back to frame coords, clamped to bounds
            let x1 = (((cx - w / 2.0) - pad_x as f64) / scale).clamp(0.0, fw);
            let y1 = (((cy - h / 2.0) - pad_y as f64) / scale).clamp(0.0, fh);
            let x2 = (((cx + w / 2.0) - pad_x as f64) / scale).clamp(0.0, fw);
            let y2 = (((cy + h / 2.0) - pad_y as f64) / scale).clamp(0.0, fh);

            detections.push(Detection {
                bbox: [x1, y1, x2, y2],
                class_id,
                confidence,
                track_id: None,
            });
        }

        // 4. NMS with the caller's overlap threshold
        let mut detections = non_max_suppression(detections, options.iou);

        // 5. Optional persistent identities
        if options.with_track_ids {
            self.tracker.assign(&mut detections);
        }

        Ok(detections)
    }
}

/// Index and value of the strongest class score.
fn best_class(scores: &[f32]) -> (usize, f64) {
    let mut best = 0;
    let mut best_score = f32::MIN;
    for (i, &s) in scores.iter().enumerate() {
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    (best, best_score as f64)
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padded canvas filled with 114/255 gray, the YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize + copy into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gray_frame(width: u32, height: u32) -> Frame {
        Frame::new(
            vec![114u8; (width * height * 3) as usize],
            width,
            height,
            0,
        )
    }

    #[test]
    fn test_letterbox_square_input_no_padding() {
        let frame = gray_frame(64, 64);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 64);
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert_relative_eq!(scale, 1.0);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 0);
    }

    #[test]
    fn test_letterbox_wide_input_pads_vertically() {
        let frame = gray_frame(128, 64);
        let (_, scale, pad_x, pad_y) = letterbox(&frame, 64);
        assert_relative_eq!(scale, 0.5);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 16); // (64 - 32) / 2
    }

    #[test]
    fn test_letterbox_padding_is_yolo_gray() {
        let frame = Frame::new(vec![0u8; 128 * 64 * 3], 128, 64, 0);
        let (tensor, _, _, pad_y) = letterbox(&frame, 64);
        // Inside the padding band
        let pad_pixel = tensor[[0, 0, (pad_y / 2) as usize, 32]];
        assert_relative_eq!(pad_pixel, 114.0 / 255.0, epsilon = 1e-6);
        // Inside the image region: source was black
        let img_pixel = tensor[[0, 0, 32, 32]];
        assert_relative_eq!(img_pixel, 0.0);
    }

    #[test]
    fn test_letterbox_normalizes_to_unit_range() {
        let frame = Frame::new(vec![255u8; 32 * 32 * 3], 32, 32, 0);
        let (tensor, _, _, _) = letterbox(&frame, 32);
        assert_relative_eq!(tensor[[0, 0, 16, 16]], 1.0);
    }

    #[test]
    fn test_best_class_picks_argmax() {
        let (class_id, confidence) = best_class(&[0.1, 0.7, 0.3]);
        assert_eq!(class_id, 1);
        assert_relative_eq!(confidence, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_best_class_single_entry() {
        let (class_id, confidence) = best_class(&[0.4]);
        assert_eq!(class_id, 0);
        assert_relative_eq!(confidence, 0.4, epsilon = 1e-6);
    }
}
