//! Identifier generation for new posts.

use uuid::Uuid;

/// Produces opaque, globally unique string identifiers.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

/// UUID v4 identifiers in hyphenated lowercase form (`[0-9a-f-]`).
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
