pub mod representation;
pub mod store_backend;
