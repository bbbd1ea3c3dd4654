//! Overlay drawing for annotated alert photos.
//!
//! Draws a hollow box per detection plus a class/confidence label. Label
//! text needs a TTF font on disk; when none is configured (or it fails to
//! load) boxes are drawn without text, which keeps headless deployments
//! working.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::result::DetectionCandidate;

const BOX_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_SCALE: f32 = 16.0;

/// Draws labeled detection boxes onto annotated frames.
pub struct OverlayPainter {
    font: Option<FontVec>,
    class_names: Vec<String>,
}

impl OverlayPainter {
    pub fn new(class_names: Vec<String>) -> Self {
        Self {
            font: None,
            class_names,
        }
    }

    /// Attach a label font loaded from `path`. A missing or invalid font is
    /// logged and labels fall back to boxes without text.
    pub fn with_font_path(mut self, path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => self.font = Some(font),
                Err(err) => {
                    log::warn!("label font {} invalid: {}; drawing boxes only", path.display(), err)
                }
            },
            Err(err) => {
                log::warn!("label font {} unreadable: {}; drawing boxes only", path.display(), err)
            }
        }
        self
    }

    fn class_name(&self, class_id: u32) -> &str {
        self.class_names
            .get(class_id as usize)
            .map(String::as_str)
            .unwrap_or("object")
    }

    /// Draw one labeled box per candidate onto `image`.
    pub fn draw(&self, image: &mut RgbImage, candidates: &[DetectionCandidate]) {
        for candidate in candidates {
            let [x1, y1, x2, y2] = candidate.bbox;
            let width = (x2.saturating_sub(x1)).max(1);
            let height = (y2.saturating_sub(y1)).max(1);

            // 2 px border: two nested hollow rects. imageproc clips
            // out-of-bounds pixels.
            let outer = Rect::at(x1 as i32, y1 as i32).of_size(width, height);
            draw_hollow_rect_mut(image, outer, BOX_COLOR);
            let inner = Rect::at(x1 as i32 + 1, y1 as i32 + 1)
                .of_size((width.saturating_sub(2)).max(1), (height.saturating_sub(2)).max(1));
            draw_hollow_rect_mut(image, inner, BOX_COLOR);

            if let Some(font) = &self.font {
                let label = format!(
                    "{} {:.2}",
                    self.class_name(candidate.class_id),
                    candidate.confidence
                );
                let scale = PxScale::from(LABEL_SCALE);
                let (text_w, text_h) = text_size(scale, font, &label);
                let (text_w, text_h) = (text_w as u32 + 6, text_h as u32 + 4);

                // Strip above the box when it fits, inside otherwise.
                let strip_y = if y1 >= text_h { y1 - text_h } else { y1 };
                let strip = Rect::at(x1 as i32, strip_y as i32).of_size(text_w, text_h);
                draw_filled_rect_mut(image, strip, BOX_COLOR);
                draw_text_mut(
                    image,
                    TEXT_COLOR,
                    x1 as i32 + 3,
                    strip_y as i32 + 2,
                    scale,
                    font,
                    &label,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(bbox: [u32; 4]) -> DetectionCandidate {
        DetectionCandidate {
            bbox,
            confidence: 0.9,
            class_id: 0,
        }
    }

    #[test]
    fn draws_box_edges() {
        let mut image = RgbImage::new(100, 100);
        let painter = OverlayPainter::new(vec!["person".to_string()]);
        painter.draw(&mut image, &[candidate([10, 10, 50, 50])]);

        assert_eq!(*image.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*image.get_pixel(30, 10), BOX_COLOR);
        assert_eq!(*image.get_pixel(10, 30), BOX_COLOR);
        // Interior stays untouched.
        assert_eq!(*image.get_pixel(30, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn out_of_frame_box_is_clipped_not_panicking() {
        let mut image = RgbImage::new(40, 40);
        let painter = OverlayPainter::new(vec!["person".to_string()]);
        painter.draw(&mut image, &[candidate([30, 30, 40, 40])]);
    }

    #[test]
    fn unknown_class_falls_back_to_generic_name() {
        let painter = OverlayPainter::new(vec!["person".to_string()]);
        assert_eq!(painter.class_name(0), "person");
        assert_eq!(painter.class_name(9), "object");
    }

    #[test]
    fn missing_font_path_degrades_to_boxes_only() {
        let painter = OverlayPainter::new(vec!["person".to_string()])
            .with_font_path(Path::new("does/not/exist.ttf"));
        assert!(painter.font.is_none());

        let mut image = RgbImage::new(64, 64);
        painter.draw(&mut image, &[candidate([5, 5, 20, 20])]);
        assert_eq!(*image.get_pixel(5, 5), BOX_COLOR);
    }
}
