pub const DEFAULT_DETECTOR: &str = "retinaface";
pub const DEFAULT_NORMALIZATION: &str = "base";

/// Directory name used under the platform data dir when no store dir is given.
pub const APP_DIR_NAME: &str = "faceid";

/// Fraction of the face box added on every side of the canonical crop.
pub const DEFAULT_CROP_PADDING: f64 = 0.2;

/// Current on-disk layout of a representation store file.
pub const STORE_FORMAT_VERSION: u32 = 1;

pub const STORE_FILE_EXTENSION: &str = "json";
pub const FACE_IMAGE_EXTENSION: &str = "jpg";

/// Suffix appended to an image path to locate its precomputed detections.
pub const DETECTIONS_SIDECAR_SUFFIX: &str = "faces.json";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
