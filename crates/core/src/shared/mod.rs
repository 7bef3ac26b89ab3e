pub mod config_key;
pub mod constants;
pub mod error;
pub mod facial_area;
pub mod frame;
pub mod recognition_model;
