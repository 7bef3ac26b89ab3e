pub mod bulk_enroll_use_case;
pub mod domain;
pub mod enrollment_logger;
pub mod enrollment_protocol;
pub mod infrastructure;
pub mod session_worker;
