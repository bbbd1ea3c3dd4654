//! Image data path: preprocessing, postprocessing, overlay drawing.
//!
//! `preprocess` letterboxes a frame into the model input tensor and records
//! the transform needed to map detections back. `postprocess` filters and
//! suppresses raw detections, inverts the transform, and draws overlays via
//! `overlay`. The letterbox round-trip is the numerically sensitive step and
//! is tested as a pair.

pub mod overlay;
pub mod postprocess;
pub mod preprocess;

pub use overlay::OverlayPainter;
pub use postprocess::filter_and_draw;
pub use preprocess::{prepare, LetterboxTransform, ModelInput};
