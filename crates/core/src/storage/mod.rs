pub mod domain;
pub mod infrastructure;
pub mod representation_store;
