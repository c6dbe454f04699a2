use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detection::infrastructure::coco_labels::class_name;
use crate::overlay::bitmap_font::{self, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::overlay::display_mode::DisplayMode;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const BOX_THICKNESS: i32 = 2;
/// Vertical gap between a box and its label.
const LABEL_OFFSET: i32 = 10;

/// Draws boxes (and mode-dependent labels) for each detection.
///
/// Consumes the frame and returns the annotated copy with the same
/// sequence index. Censor mode is handled by [`RegionBlurrer`], not here.
///
/// [`RegionBlurrer`]: crate::overlay::region_blur::RegionBlurrer
pub fn draw_detections(frame: Frame, detections: &[Detection], mode: DisplayMode) -> Frame {
    let width = frame.width();
    let height = frame.height();
    let index = frame.index();

    let mut img = RgbImage::from_raw(width, height, frame.into_data())
        .expect("frame buffer matches its dimensions");

    for det in detections {
        let x1 = det.bbox[0].round() as i32;
        let y1 = det.bbox[1].round() as i32;
        let w = det.width().round() as u32;
        let h = det.height().round() as u32;
        if w == 0 || h == 0 {
            continue;
        }

        draw_box(&mut img, x1, y1, w, h);

        if let Some(text) = label_text(det, mode) {
            let label_y = (y1 - LABEL_OFFSET).max(1);
            draw_label(&mut img, &text, x1.max(0), label_y);
        }
    }

    Frame::new(img.into_raw(), width, height, index)
}

fn label_text(det: &Detection, mode: DisplayMode) -> Option<String> {
    match mode {
        DisplayMode::BoxesOnly | DisplayMode::Censored => None,
        DisplayMode::Confidence => Some(format!("{:.2}", det.confidence)),
        DisplayMode::Full => {
            let name = class_name(det.class_id);
            match det.track_id {
                Some(id) => Some(format!("#{id} {name} {:.2}", det.confidence)),
                None => Some(format!("{name} {:.2}", det.confidence)),
            }
        }
    }
}

/// Hollow rectangle with a thick border, drawn as stacked outlines.
/// Out-of-bounds portions are clipped by the drawing routine.
fn draw_box(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32) {
    for offset in 0..BOX_THICKNESS {
        let rect = Rect::at(x - offset, y - offset).of_size(
            width + (offset * 2) as u32,
            height + (offset * 2) as u32,
        );
        draw_hollow_rect_mut(img, rect, BOX_COLOR);
    }
}

/// Renders label text from the 5x7 bitmap font over a solid background.
fn draw_label(img: &mut RgbImage, text: &str, x: i32, y: i32) {
    let bg_w = bitmap_font::text_width(text) as i32 + 2;
    let bg_h = GLYPH_HEIGHT as i32 + 2;
    for dy in 0..bg_h {
        for dx in 0..bg_w {
            put_pixel_checked(img, x + dx, y + dy, LABEL_BACKGROUND);
        }
    }

    for (i, ch) in text.chars().enumerate() {
        let Some(rows) = bitmap_font::glyph(ch) else {
            continue;
        };
        let glyph_x = x + 1 + (i * (GLYPH_WIDTH + 1)) as i32;
        let glyph_y = y + 1;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                    put_pixel_checked(img, glyph_x + col as i32, glyph_y + row as i32, BOX_COLOR);
                }
            }
        }
    }
}

fn put_pixel_checked(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}
