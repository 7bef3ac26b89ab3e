use std::collections::HashSet;

use crate::shared::error::{FaceIdError, Result};

const MAX_ATTEMPTS: usize = 64;

/// Source of new identity ids.
pub trait IdentityGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 ids.
pub struct UuidIdentityGenerator;

impl IdentityGenerator for UuidIdentityGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Draws ids until one is outside `taken` and differs from `hint`.
pub fn fresh_identity(
    generator: &dyn IdentityGenerator,
    taken: &HashSet<String>,
    hint: Option<&str>,
) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        let id = generator.generate();
        if !id.is_empty() && !taken.contains(&id) && hint != Some(id.as_str()) {
            return Ok(id);
        }
        log::debug!("Generated identity {id} is taken, retrying");
    }
    Err(FaceIdError::configuration(format!(
        "identity generator produced no unused id in {MAX_ATTEMPTS} attempts"
    )))
}
