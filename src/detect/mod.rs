//! Detector backend contract and implementations.
//!
//! The detection model is an external capability: the core consumes raw
//! detection rows in resized-input coordinates and never looks inside the
//! model. Suppression and coordinate mapping live in `vision::postprocess`.

pub mod backend;
pub mod backends;
pub mod result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{DetectionCandidate, RawDetection};

use anyhow::{anyhow, Result};

use crate::config::ModelSettings;

/// Build the detector backend selected by configuration.
pub fn build_backend(model: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    match model.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::empty())),
        "tract" => {
            #[cfg(feature = "backend-tract")]
            {
                Ok(Box::new(backends::TractBackend::new(
                    &model.path,
                    model.input_size,
                )?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow!(
                    "model backend 'tract' requires the backend-tract feature"
                ))
            }
        }
        other => Err(anyhow!("unknown model backend '{}'", other)),
    }
}
