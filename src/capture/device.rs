//! External still-capture source.
//!
//! Invokes a capture command (`libcamera-still` by default) that writes a
//! still image to a known path, then reads that path back. The capture path's
//! parent directory is created before the command runs. stderr from a failed
//! capture is folded into the error so it reaches the failure alert.

use std::path::PathBuf;
use std::process::Command;

use crate::frame::{Frame, FrameOrigin};

use super::{decode_image, AcquisitionError};

/// Configuration for a device source.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Capture program, e.g. "libcamera-still".
    pub command: String,
    /// Extra arguments placed before the output flag.
    pub args: Vec<String>,
    /// Where the capture program writes its still image (`-o <path>`).
    pub capture_path: PathBuf,
}

/// Runs the external capture process, then decodes its output file.
pub struct DeviceSource {
    config: DeviceConfig,
}

impl DeviceSource {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    pub fn capture(&self) -> Result<Frame, AcquisitionError> {
        if let Some(parent) = self.config.capture_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| AcquisitionError::Unreadable {
                    path: parent.to_path_buf(),
                    reason: format!("cannot create capture directory: {}", e),
                })?;
            }
        }

        let output = Command::new(&self.config.command)
            .args(&self.config.args)
            .arg("-o")
            .arg(&self.config.capture_path)
            .output()
            .map_err(|e| AcquisitionError::CaptureProcess {
                command: self.config.command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AcquisitionError::CaptureProcess {
                command: self.config.command.clone(),
                reason: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        log::debug!(
            "capture command '{}' wrote {}",
            self.config.command,
            self.config.capture_path.display()
        );
        decode_image(&self.config.capture_path, FrameOrigin::Device)
    }

    pub fn describe(&self) -> String {
        format!(
            "device source ('{}' -> {})",
            self.config.command,
            self.config.capture_path.display()
        )
    }
}
