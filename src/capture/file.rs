//! Fixed-path file source.

use std::path::PathBuf;

use crate::frame::{Frame, FrameOrigin};

use super::{decode_image, AcquisitionError};

/// Configuration for a file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Image path read on every capture.
    pub path: PathBuf,
}

/// Reads and decodes a fixed image path on each capture.
pub struct FileSource {
    config: FileConfig,
}

impl FileSource {
    pub fn new(config: FileConfig) -> Self {
        Self { config }
    }

    pub fn capture(&self) -> Result<Frame, AcquisitionError> {
        decode_image(&self.config.path, FrameOrigin::File)
    }

    pub fn describe(&self) -> String {
        format!("file source ({})", self.config.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_unreadable() {
        let source = FileSource::new(FileConfig {
            path: PathBuf::from("does/not/exist.jpg"),
        });
        match source.capture() {
            Err(AcquisitionError::Unreadable { path, .. }) => {
                assert_eq!(path, PathBuf::from("does/not/exist.jpg"));
            }
            other => panic!("expected Unreadable, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn garbage_file_is_undecodable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("not_an_image.jpg");
        std::fs::write(&path, b"definitely not jpeg bytes").expect("write");

        let source = FileSource::new(FileConfig { path: path.clone() });
        match source.capture() {
            Err(AcquisitionError::Undecodable { path: got, .. }) => assert_eq!(got, path),
            other => panic!("expected Undecodable, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn decodes_real_image_with_file_origin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("frame.png");
        image::RgbImage::new(32, 24).save(&path).expect("save png");

        let source = FileSource::new(FileConfig { path });
        let frame = source.capture().expect("capture");
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.height(), 24);
        assert_eq!(frame.origin(), FrameOrigin::File);
    }
}
