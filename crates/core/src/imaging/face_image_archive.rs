use std::path::{Path, PathBuf};

use crate::imaging::domain::image_writer::ImageWriter;
use crate::shared::constants::FACE_IMAGE_EXTENSION;
use crate::shared::error::{FaceIdError, Result};
use crate::shared::facial_area::FacialArea;
use crate::shared::frame::Frame;

/// Canonical face image per identity, stored as `<dir>/<identity>.jpg`.
pub struct FaceImageArchive {
    dir: PathBuf,
    writer: Box<dyn ImageWriter>,
}

impl FaceImageArchive {
    pub fn new(dir: impl Into<PathBuf>, writer: Box<dyn ImageWriter>) -> Self {
        Self {
            dir: dir.into(),
            writer,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Identities become file names, so anything that could escape the
    /// archive directory is rejected.
    pub fn path_for(&self, identity: &str) -> Result<PathBuf> {
        let unsafe_name = identity.is_empty()
            || identity == "."
            || identity == ".."
            || identity.contains(['/', '\\', '\0']);
        if unsafe_name {
            return Err(FaceIdError::configuration(format!(
                "identity {identity:?} cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{identity}.{FACE_IMAGE_EXTENSION}")))
    }

    /// Writes the padded face crop for `identity`, replacing any previous one.
    pub fn save(
        &self,
        identity: &str,
        frame: &Frame,
        area: &FacialArea,
        padding: f64,
    ) -> Result<PathBuf> {
        let path = self.path_for(identity)?;
        let face = crop_face(frame, area, padding);
        self.writer
            .write(&path, &face)
            .map_err(|e| FaceIdError::Persistence {
                path: path.clone(),
                source: std::io::Error::other(e.to_string()),
            })?;
        log::debug!("Saved face image for {identity} to {}", path.display());
        Ok(path)
    }

    /// Canonical image of `identity`, if one was saved.
    pub fn find(&self, identity: &str) -> Option<PathBuf> {
        self.path_for(identity).ok().filter(|p| p.is_file())
    }
}

/// Crops `area` grown by `padding` on every side. Falls back to the whole
/// frame when the box cannot be cropped.
pub fn crop_face(frame: &Frame, area: &FacialArea, padding: f64) -> Frame {
    let cropped = area
        .padded(padding, frame.width(), frame.height())
        .ok_or_else(|| FaceIdError::Image(format!("{area:?} lies outside the frame")))
        .and_then(|padded| frame.crop(&padded));
    match cropped {
        Ok(face) => face,
        Err(e) => {
            log::warn!("Face crop failed ({e}), storing the full frame");
            frame.clone()
        }
    }
}
