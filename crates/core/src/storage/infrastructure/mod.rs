pub mod json_store_backend;
pub mod memory_store_backend;
mod store_file;
