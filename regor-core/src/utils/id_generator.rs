use base58::ToBase58;
use regor_common::prelude::*;
use uuid::Uuid;

/// Ids of workflows and tasks: a UUID v4 encoded in base58.
pub struct IdGenerator;

impl IdGenerator {
    pub fn generate() -> InlineStr {
        Uuid::new_v4().as_bytes().to_base58().into()
    }
}
