use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Censor-mode blur: a separable Gaussian applied to each detected box.
///
/// Large kernels use a downscale-blur-upscale shortcut; scratch buffers
/// are reused across regions and frames, so per-frame allocation stays
/// proportional to the largest region seen.
pub struct RegionBlurrer {
    kernel: Vec<f32>,
    small_kernel: Vec<f32>,
    scale: usize,
    roi: Vec<u8>,
    temp: Vec<f32>,
}

impl RegionBlurrer {
    /// `kernel_size` must be odd; even sizes are bumped up by one.
    pub fn new(kernel_size: usize) -> Self {
        let kernel_size = kernel_size | 1;
        let scale = (kernel_size / 50).max(1);
        let small_size = (kernel_size / scale) | 1;
        Self {
            kernel: gaussian_kernel_1d(kernel_size),
            small_kernel: gaussian_kernel_1d(small_size),
            scale,
            roi: Vec::new(),
            temp: Vec::new(),
        }
    }

    /// Blurs each detection's box in place. Boxes are clamped to the frame;
    /// empty intersections are skipped.
    pub fn blur_regions(&mut self, frame: &mut Frame, detections: &[Detection]) {
        let fw = frame.width() as usize;
        let fh = frame.height() as usize;
        let channels = Frame::CHANNELS;
        let data = frame.data_mut();

        for det in detections {
            let rx = (det.bbox[0].max(0.0) as usize).min(fw);
            let ry = (det.bbox[1].max(0.0) as usize).min(fh);
            let rx2 = (det.bbox[2].max(0.0) as usize).min(fw);
            let ry2 = (det.bbox[3].max(0.0) as usize).min(fh);
            let rw = rx2.saturating_sub(rx);
            let rh = ry2.saturating_sub(ry);

            if rw == 0 || rh == 0 {
                continue;
            }

            // Extract ROI into the reusable buffer
            self.roi.resize(rw * rh * channels, 0);
            for row in 0..rh {
                let src = ((ry + row) * fw + rx) * channels;
                let dst = row * rw * channels;
                self.roi[dst..dst + rw * channels]
                    .copy_from_slice(&data[src..src + rw * channels]);
            }

            // Blur, with the downscale shortcut when the region allows it
            if self.scale <= 1 || rh < self.scale * 2 || rw < self.scale * 2 {
                separable_gaussian_blur(
                    &mut self.roi,
                    rw,
                    rh,
                    channels,
                    &self.kernel,
                    &mut self.temp,
                );
            } else {
                let (mut small, sw, sh) = downscale(&self.roi, rw, rh, channels, self.scale);
                separable_gaussian_blur(
                    &mut small,
                    sw,
                    sh,
                    channels,
                    &self.small_kernel,
                    &mut self.temp,
                );
                let upscaled = upscale(&small, sw, sh, channels, rw, rh);
                self.roi[..rw * rh * channels].copy_from_slice(&upscaled);
            }

            // Write back
            for row in 0..rh {
                let dst = ((ry + row) * fw + rx) * channels;
                let src = row * rw * channels;
                data[dst..dst + rw * channels]
                    .copy_from_slice(&self.roi[src..src + rw * channels]);
            }
        }
    }
}

/// Precomputes a normalized 1D Gaussian kernel of odd size.
///
/// Sigma is derived as `kernel_size / 6.0`, matching the usual
/// sigma-from-size convention.
fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let mut kernel: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel.iter().map(|&v| v as f32).collect()
}

/// Two-pass separable Gaussian blur over an interleaved buffer, reusing
/// `temp` between calls. Edge pixels clamp.
fn separable_gaussian_blur(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
    temp: &mut Vec<f32>,
) {
    let kernel_size = kernel.len();
    if kernel_size <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = kernel_size / 2;

    temp.resize(width * height * channels, 0.0);

    // Horizontal pass: data → temp
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - half as isize)
                        .clamp(0, (width - 1) as isize) as usize;
                    sum += data[(y * width + sx) * channels + c] as f32 * w;
                }
                temp[(y * width + x) * channels + c] = sum;
            }
        }
    }

    // Vertical pass: temp → data
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy = (y as isize + k as isize - half as isize)
                        .clamp(0, (height - 1) as isize) as usize;
                    sum += temp[(sy * width + x) * channels + c] * w;
                }
                data[(y * width + x) * channels + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Integer-factor downscale using area averaging.
fn downscale(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    scale: usize,
) -> (Vec<u8>, usize, usize) {
    let new_w = width / scale;
    let new_h = height / scale;
    let mut out = vec![0u8; new_w * new_h * channels];

    for y in 0..new_h {
        for x in 0..new_w {
            for c in 0..channels {
                let mut sum = 0u32;
                let mut count = 0u32;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let sy = y * scale + dy;
                        let sx = x * scale + dx;
                        if sy < height && sx < width {
                            sum += data[(sy * width + sx) * channels + c] as u32;
                            count += 1;
                        }
                    }
                }
                out[(y * new_w + x) * channels + c] = (sum / count) as u8;
            }
        }
    }

    (out, new_w, new_h)
}

/// Bilinear upscale back to the original region size.
fn upscale(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    target_w: usize,
    target_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; target_w * target_h * channels];

    for y in 0..target_h {
        for x in 0..target_w {
            let src_x = x as f32 * (width as f32 - 1.0) / (target_w as f32 - 1.0).max(1.0);
            let src_y = y as f32 * (height as f32 - 1.0) / (target_h as f32 - 1.0).max(1.0);

            let x0 = (src_x.floor() as usize).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let y0 = (src_y.floor() as usize).min(height - 1);
            let y1 = (y0 + 1).min(height - 1);

            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            for c in 0..channels {
                let v00 = data[(y0 * width + x0) * channels + c] as f32;
                let v10 = data[(y0 * width + x1) * channels + c] as f32;
                let v01 = data[(y1 * width + x0) * channels + c] as f32;
                let v11 = data[(y1 * width + x1) * channels + c] as f32;

                let val = v00 * (1.0 - fx) * (1.0 - fy)
                    + v10 * fx * (1.0 - fy)
                    + v01 * (1.0 - fx) * fy
                    + v11 * fx * fy;
                out[(y * target_w + x) * channels + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}
