//! Frame acquisition sources.
//!
//! This module provides the two ways a cycle obtains its frame:
//! - `FileSource`: read and decode a fixed image path (bench deployments)
//! - `DeviceSource`: invoke an external still-capture process, then read
//!   the file it produced (edge deployments)
//!
//! The variant is chosen once at construction from configuration, never per
//! call. Both produce an immutable [`Frame`](crate::Frame) tagged with its
//! origin.
//!
//! Acquisition failures are reported as [`AcquisitionError`]; they are fatal
//! to the current cycle only, and the service loop converts them into a
//! text alert.

pub mod device;
pub mod file;

pub use device::{DeviceConfig, DeviceSource};
pub use file::{FileConfig, FileSource};

use std::path::{Path, PathBuf};

use crate::config::{CaptureMode, CaptureSettings};
use crate::frame::{Frame, FrameOrigin};

/// Why acquisition of a frame failed.
#[derive(Debug)]
pub enum AcquisitionError {
    /// The source path could not be read.
    Unreadable { path: PathBuf, reason: String },
    /// The source file was read but could not be decoded as an image.
    Undecodable { path: PathBuf, reason: String },
    /// The external capture process failed to run or exited non-zero.
    CaptureProcess { command: String, reason: String },
}

impl std::fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionError::Unreadable { path, reason } => {
                write!(f, "source image {} unreadable: {}", path.display(), reason)
            }
            AcquisitionError::Undecodable { path, reason } => {
                write!(f, "source image {} undecodable: {}", path.display(), reason)
            }
            AcquisitionError::CaptureProcess { command, reason } => {
                write!(f, "capture command '{}' failed: {}", command, reason)
            }
        }
    }
}

impl std::error::Error for AcquisitionError {}

/// Acquisition source with a constructor-time backend choice.
pub struct ImageSource {
    backend: SourceBackend,
}

enum SourceBackend {
    File(FileSource),
    Device(DeviceSource),
}

impl ImageSource {
    pub fn file(config: FileConfig) -> Self {
        Self {
            backend: SourceBackend::File(FileSource::new(config)),
        }
    }

    pub fn device(config: DeviceConfig) -> Self {
        Self {
            backend: SourceBackend::Device(DeviceSource::new(config)),
        }
    }

    /// Build the source selected by configuration.
    pub fn from_config(settings: &CaptureSettings) -> Self {
        match settings.mode {
            CaptureMode::File => Self::file(FileConfig {
                path: settings.image_path.clone(),
            }),
            CaptureMode::Device => Self::device(DeviceConfig {
                command: settings.capture_command.clone(),
                args: settings.capture_args.clone(),
                capture_path: settings.capture_path.clone(),
            }),
        }
    }

    /// Acquire one frame.
    pub fn capture(&self) -> Result<Frame, AcquisitionError> {
        match &self.backend {
            SourceBackend::File(source) => source.capture(),
            SourceBackend::Device(source) => source.capture(),
        }
    }

    /// Human-readable description for startup logging.
    pub fn describe(&self) -> String {
        match &self.backend {
            SourceBackend::File(source) => source.describe(),
            SourceBackend::Device(source) => source.describe(),
        }
    }
}

/// Read and decode an image file into a frame, distinguishing I/O failures
/// from decode failures.
pub(crate) fn decode_image(path: &Path, origin: FrameOrigin) -> Result<Frame, AcquisitionError> {
    let bytes = std::fs::read(path).map_err(|e| AcquisitionError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let image = image::load_from_memory(&bytes).map_err(|e| AcquisitionError::Undecodable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Frame::new(image.into_rgb8(), origin))
}
