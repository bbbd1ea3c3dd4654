//! Letterbox preprocessing.
//!
//! Aspect-ratio-preserving resize, center padding with the conventional
//! gray fill, channel reorder to CHW, normalization to [0, 1], and a batch
//! dimension. Pure and deterministic; the recorded transform inverts the
//! resize and padding exactly (to the nearest pixel).

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use ndarray::Array;

use crate::frame::Frame;

/// Model input tensor, shape `(1, 3, target, target)`, values in [0, 1].
pub type ModelInput = ndarray::Array4<f32>;

/// Gray fill for the padded border (YOLO letterbox convention).
const LETTERBOX_FILL: f32 = 114.0 / 255.0;

/// The invertible resize-and-pad transform recorded during preprocessing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LetterboxTransform {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    frame_w: u32,
    frame_h: u32,
}

impl LetterboxTransform {
    /// Map a box from original-frame coordinates into resized-input
    /// coordinates.
    pub fn to_input(&self, bbox: [f32; 4]) -> [f32; 4] {
        [
            bbox[0] * self.scale + self.pad_x,
            bbox[1] * self.scale + self.pad_y,
            bbox[2] * self.scale + self.pad_x,
            bbox[3] * self.scale + self.pad_y,
        ]
    }

    /// Map a box from resized-input coordinates back to original-frame
    /// pixels, rounding to the nearest pixel and clamping to the frame
    /// bounds.
    pub fn to_frame(&self, bbox: [f32; 4]) -> [u32; 4] {
        let unmap = |v: f32, pad: f32, limit: u32| -> u32 {
            let coord = ((v - pad) / self.scale).round();
            coord.clamp(0.0, limit as f32) as u32
        };
        let x1 = unmap(bbox[0], self.pad_x, self.frame_w);
        let y1 = unmap(bbox[1], self.pad_y, self.frame_h);
        let x2 = unmap(bbox[2], self.pad_x, self.frame_w).max(x1);
        let y2 = unmap(bbox[3], self.pad_y, self.frame_h).max(y1);
        [x1, y1, x2, y2]
    }
}

/// Letterbox a frame into the model input tensor.
///
/// Returns the tensor and the transform needed to map detections back into
/// frame coordinates.
pub fn prepare(frame: &Frame, target: u32) -> Result<(ModelInput, LetterboxTransform)> {
    if target == 0 {
        return Err(anyhow!("letterbox target size must be greater than zero"));
    }
    let (frame_w, frame_h) = (frame.width(), frame.height());
    if frame_w == 0 || frame_h == 0 {
        return Err(anyhow!("frame has zero dimension {}x{}", frame_w, frame_h));
    }

    let scale_w = target as f32 / frame_w as f32;
    let scale_h = target as f32 / frame_h as f32;
    let scale = scale_w.min(scale_h);

    let new_w = ((frame_w as f32) * scale).round().clamp(1.0, target as f32) as u32;
    let new_h = ((frame_h as f32) * scale).round().clamp(1.0, target as f32) as u32;
    let resized = image::imageops::resize(frame.image(), new_w, new_h, FilterType::Triangle);

    let pad_x = (target - new_w) as f32 / 2.0;
    let pad_y = (target - new_h) as f32 / 2.0;
    let offset_x = pad_x.floor() as usize;
    let offset_y = pad_y.floor() as usize;

    let size = target as usize;
    let mut tensor = Array::from_elem((1, 3, size, size), LETTERBOX_FILL);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize + offset_x, y as usize + offset_y);
        tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }

    Ok((
        tensor,
        LetterboxTransform {
            scale,
            pad_x,
            pad_y,
            frame_w,
            frame_h,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameOrigin;
    use image::{Rgb, RgbImage};

    fn frame(w: u32, h: u32) -> Frame {
        Frame::new(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])), FrameOrigin::File)
    }

    #[test]
    fn landscape_frame_is_padded_vertically() {
        let (input, _) = prepare(&frame(640, 480), 640).expect("prepare");
        assert_eq!(input.shape(), &[1, 3, 640, 640]);
        // Top rows are padding (fill), center rows are image content.
        assert!((input[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 1e-6);
        assert!((input[[0, 0, 320, 320]] - 10.0 / 255.0).abs() < 1e-6);
        // 480 * (640/640) = 480 -> 80 px padding top and bottom.
        assert!((input[[0, 0, 79, 320]] - 114.0 / 255.0).abs() < 1e-6);
        assert!((input[[0, 0, 80, 320]] - 10.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn channels_hold_normalized_rgb() {
        let (input, _) = prepare(&frame(100, 100), 100).expect("prepare");
        assert!((input[[0, 0, 50, 50]] - 10.0 / 255.0).abs() < 1e-6);
        assert!((input[[0, 1, 50, 50]] - 20.0 / 255.0).abs() < 1e-6);
        assert!((input[[0, 2, 50, 50]] - 30.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn prepare_is_deterministic() {
        let f = frame(317, 211);
        let (a, ta) = prepare(&f, 640).expect("prepare");
        let (b, tb) = prepare(&f, 640).expect("prepare");
        assert_eq!(a, b);
        assert_eq!(ta, tb);
    }

    #[test]
    fn round_trip_is_within_one_pixel() {
        let cases: &[(u32, u32, [f32; 4])] = &[
            (640, 480, [10.0, 10.0, 50.0, 50.0]),
            (640, 480, [0.0, 0.0, 639.0, 479.0]),
            (1000, 700, [10.0, 10.0, 50.0, 50.0]),
            (1000, 700, [123.0, 45.0, 678.0, 543.0]),
            (333, 777, [17.0, 200.0, 300.0, 750.0]),
        ];
        for &(w, h, bbox) in cases {
            let (_, transform) = prepare(&frame(w, h), 640).expect("prepare");
            let round_tripped = transform.to_frame(transform.to_input(bbox));
            for (orig, got) in bbox.iter().zip(round_tripped.iter()) {
                let delta = (orig - *got as f32).abs();
                assert!(
                    delta <= 1.0,
                    "{}x{} {:?} -> {:?} (delta {})",
                    w,
                    h,
                    bbox,
                    round_tripped,
                    delta
                );
            }
        }
    }

    #[test]
    fn to_frame_clamps_to_frame_bounds() {
        let (_, transform) = prepare(&frame(640, 480), 640).expect("prepare");
        // A box reaching into the padding clamps to the frame edge.
        let mapped = transform.to_frame([-50.0, 0.0, 700.0, 640.0]);
        assert_eq!(mapped[0], 0);
        assert!(mapped[2] <= 640);
        assert!(mapped[3] <= 480);
    }

    #[test]
    fn zero_target_is_rejected() {
        assert!(prepare(&frame(10, 10), 0).is_err());
    }
}
