use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::vision::ModelInput;

/// Detector backend trait.
///
/// Implementations wrap a detection model as an opaque capability: a
/// preprocessed input tensor goes in, raw detection rows in resized-input
/// coordinates come out. Thresholding, class filtering, suppression, and
/// coordinate mapping are the caller's concern.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on a prepared input tensor.
    fn infer(&mut self, input: &ModelInput) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
