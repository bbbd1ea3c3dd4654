use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::vision::ModelInput;

/// Stub backend for tests and model-less deployments.
///
/// Returns a fixed set of scripted detections on every call, ignoring the
/// input tensor.
pub struct StubBackend {
    detections: Vec<RawDetection>,
}

impl StubBackend {
    /// A backend that never detects anything.
    pub fn empty() -> Self {
        Self {
            detections: Vec::new(),
        }
    }

    /// A backend that reports the given detections on every inference.
    pub fn with_detections(detections: Vec<RawDetection>) -> Self {
        Self { detections }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, _input: &ModelInput) -> Result<Vec<RawDetection>> {
        Ok(self.detections.clone())
    }
}
