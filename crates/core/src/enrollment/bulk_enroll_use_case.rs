use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::enrollment::enrollment_logger::EnrollmentLogger;
use crate::enrollment::enrollment_protocol::EnrollmentProtocol;
use crate::imaging::domain::image_reader::ImageReader;
use crate::shared::constants::IMAGE_EXTENSIONS;

#[derive(Clone, Debug, Serialize)]
pub struct FailedImage {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BulkEnrollReport {
    pub identities: usize,
    pub registered: usize,
    pub failed: Vec<FailedImage>,
}

/// Registers a dataset laid out as `<root>/<identity>/<image>`.
///
/// Every subdirectory name becomes an identity and every image inside it one
/// representation. A bad image is recorded in the report and skipped.
pub struct BulkEnrollUseCase {
    reader: Box<dyn ImageReader>,
    protocol: Arc<EnrollmentProtocol>,
}

impl BulkEnrollUseCase {
    pub fn new(reader: Box<dyn ImageReader>, protocol: Arc<EnrollmentProtocol>) -> Self {
        Self { reader, protocol }
    }

    pub fn execute(
        &self,
        root: &Path,
        logger: &mut dyn EnrollmentLogger,
    ) -> Result<BulkEnrollReport, Box<dyn std::error::Error>> {
        let users = identity_dirs(root)?;
        let mut report = BulkEnrollReport {
            identities: users.len(),
            ..Default::default()
        };

        for (i, (identity, dir)) in users.iter().enumerate() {
            let images = image_files(dir)?;
            logger.info(&format!(
                "[{}/{}] Registering {identity} ({} images)",
                i + 1,
                users.len(),
                images.len()
            ));

            for path in images {
                let result = self
                    .reader
                    .read(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|frame| {
                        self.protocol
                            .enroll_as(identity, &frame, &mut *logger)
                            .map_err(|e| e.to_string())
                    });
                match result {
                    Ok(_) => report.registered += 1,
                    Err(error) => {
                        log::warn!("Skipping {}: {error}", path.display());
                        report.failed.push(FailedImage { path, error });
                    }
                }
            }
        }

        logger.info(&format!(
            "Registered {} images for {} identities ({} failed)",
            report.registered,
            report.identities,
            report.failed.len()
        ));
        Ok(report)
    }
}

fn identity_dirs(root: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut dirs: Vec<(String, PathBuf)> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some((name, path))
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn image_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::domain::match_settings::MatchSettings;
    use crate::enrollment::enrollment_logger::{LogEnrollmentLogger, NullEnrollmentLogger};
    use crate::enrollment::enrollment_protocol::tests::{
        face, image, one_hot, RecordingImageWriter, StubProvider,
    };
    use crate::imaging::face_image_archive::FaceImageArchive;
    use crate::shared::config_key::ConfigKey;
    use crate::shared::frame::Frame;
    use crate::storage::infrastructure::memory_store_backend::MemoryStoreBackend;
    use crate::storage::representation_store::RepresentationStore;
    use std::fs;
    use tempfile::TempDir;

    /// Decodes a file whose single byte is the frame marker.
    struct MarkerReader;

    impl ImageReader for MarkerReader {
        fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
            let bytes = fs::read(path)?;
            let marker = *bytes.first().ok_or("empty image")?;
            Ok(image(marker))
        }
    }

    fn dataset(layout: &[(&str, &str, u8)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (user, file, marker) in layout {
            let dir = tmp.path().join(user);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(file), [*marker]).unwrap();
        }
        tmp
    }

    fn use_case() -> (BulkEnrollUseCase, Arc<RepresentationStore>) {
        let provider = StubProvider::default()
            .with(1, vec![face(one_hot(0))])
            .with(2, vec![face(one_hot(1))]);
        let store = Arc::new(RepresentationStore::new(Box::new(MemoryStoreBackend::new())));
        let protocol = EnrollmentProtocol::new(
            Arc::clone(&store),
            Box::new(provider),
            FaceImageArchive::new("/faces", Box::new(RecordingImageWriter::default())),
            MatchSettings::default(),
        )
        .unwrap();
        (BulkEnrollUseCase::new(Box::new(MarkerReader), Arc::new(protocol)), store)
    }

    #[test]
    fn test_registers_every_image_under_folder_name() {
        let tmp = dataset(&[
            ("alice", "1.jpg", 1),
            ("alice", "2.png", 1),
            ("bob", "1.jpeg", 2),
        ]);
        let (uc, store) = use_case();

        let report = uc.execute(tmp.path(), &mut NullEnrollmentLogger).unwrap();

        assert_eq!(report.identities, 2);
        assert_eq!(report.registered, 3);
        assert!(report.failed.is_empty());
        assert_eq!(store.identities(&ConfigKey::default()).unwrap(), vec!["alice", "bob"]);
        assert_eq!(store.len(&ConfigKey::default()).unwrap(), 3);
    }

    #[test]
    fn test_failed_images_are_reported_and_skipped() {
        let tmp = dataset(&[("alice", "ok.jpg", 1), ("alice", "noface.jpg", 9)]);
        let (uc, store) = use_case();

        let report = uc.execute(tmp.path(), &mut NullEnrollmentLogger).unwrap();

        assert_eq!(report.registered, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("noface.jpg"));
        assert!(report.failed[0].error.contains("no face"));
        assert_eq!(store.len(&ConfigKey::default()).unwrap(), 1);
    }

    #[test]
    fn test_ignores_non_images_and_loose_files() {
        let tmp = dataset(&[("alice", "notes.txt", 1), ("alice", "a.jpg", 1)]);
        fs::write(tmp.path().join("loose.jpg"), [2]).unwrap();
        let (uc, _) = use_case();

        let mut logger = LogEnrollmentLogger::new();
        let report = uc.execute(tmp.path(), &mut logger).unwrap();

        assert_eq!(report.identities, 1);
        assert_eq!(report.registered, 1);
        assert_eq!(logger.outcome_count("enrolled_as"), 1);
    }

    #[test]
    fn test_missing_root_is_error() {
        let (uc, _) = use_case();
        assert!(uc
            .execute(Path::new("/nonexistent/dataset"), &mut NullEnrollmentLogger)
            .is_err());
    }

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(is_image(Path::new("a.JPG")));
        assert!(!is_image(Path::new("a.faces.json")));
        assert!(!is_image(Path::new("a")));
    }

    #[test]
    fn test_sidecar_detections_are_released_after_registration() {
        use crate::enrollment::infrastructure::precomputed_embedding_provider::{
            sidecar_path, PrecomputedEmbeddingProvider, SidecarImageReader,
        };

        let tmp = dataset(&[("alice", "1.jpg", 1), ("alice", "2.jpg", 1), ("bob", "1.jpg", 2)]);
        for (user, hot) in [("alice", 0), ("bob", 1)] {
            let dir = tmp.path().join(user);
            let embedding = serde_json::to_string(&one_hot(hot)).unwrap();
            let sidecar = format!(
                r#"[{{"embedding":{embedding},"facial_area":{{"x":0,"y":0,"w":50,"h":50}}}}]"#
            );
            for path in image_files(&dir).unwrap() {
                fs::write(sidecar_path(&path), &sidecar).unwrap();
            }
        }

        let provider = PrecomputedEmbeddingProvider::new();
        let store = Arc::new(RepresentationStore::new(Box::new(MemoryStoreBackend::new())));
        let protocol = EnrollmentProtocol::new(
            Arc::clone(&store),
            Box::new(provider.clone()),
            FaceImageArchive::new("/faces", Box::new(RecordingImageWriter::default())),
            MatchSettings::default(),
        )
        .unwrap();
        let reader = SidecarImageReader::new(Box::new(MarkerReader), provider.clone());
        let uc = BulkEnrollUseCase::new(Box::new(reader), Arc::new(protocol));

        let report = uc.execute(tmp.path(), &mut NullEnrollmentLogger).unwrap();

        assert_eq!(report.registered, 3);
        assert_eq!(store.len(&ConfigKey::default()).unwrap(), 3);
        assert_eq!(provider.pending(), 0);
    }
}
