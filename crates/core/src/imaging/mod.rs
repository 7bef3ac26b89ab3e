pub mod domain;
pub mod face_image_archive;
pub mod infrastructure;
