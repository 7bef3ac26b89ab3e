pub mod embedding_provider;
pub mod enrollment_decision;
pub mod enrollment_session;
pub mod identity_generator;
pub mod match_settings;
pub mod session_message;
