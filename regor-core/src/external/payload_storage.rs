use dashmap::DashMap;
use regor_common::prelude::*;
use strum_macros::{AsRefStr, EnumString};

use crate::utils::IdGenerator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadType {
    WorkflowInput,
    WorkflowOutput,
    TaskInput,
    TaskOutput,
}

#[derive(Clone, Debug, Default)]
pub struct ExternalStorageLocation {
    pub uri: InlineStr,
    pub path: InlineStr,
}

/// Storage for payloads too large to be kept in the execution records.
pub trait ExternalPayloadStorage: Send + Sync {
    /// Where to read or write a payload. For a write, `path` is usually empty and the storage
    /// picks one.
    fn get_location(
        &self,
        operation: Operation,
        payload_type: PayloadType,
        path: &str,
    ) -> RegorResult<ExternalStorageLocation>;

    fn upload(&self, path: &str, payload: &[u8]) -> RegorResult<()>;

    fn download(&self, path: &str) -> RegorResult<Vec<u8>>;
}

#[derive(Default)]
pub struct InMemoryPayloadStorage {
    payloads: DashMap<String, Vec<u8>>,
}

impl InMemoryPayloadStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl ExternalPayloadStorage for InMemoryPayloadStorage {
    fn get_location(
        &self,
        _operation: Operation,
        payload_type: PayloadType,
        path: &str,
    ) -> RegorResult<ExternalStorageLocation> {
        let path: InlineStr = if path.is_empty() {
            format!(
                "{}/{}.json",
                payload_type.as_ref().to_ascii_lowercase(),
                IdGenerator::generate()
            )
            .into()
        } else {
            path.into()
        };
        Ok(ExternalStorageLocation {
            uri: format!("memory://{}", path).into(),
            path,
        })
    }

    fn upload(&self, path: &str, payload: &[u8]) -> RegorResult<()> {
        self.payloads.insert(path.to_string(), payload.to_vec());
        Ok(())
    }

    fn download(&self, path: &str) -> RegorResult<Vec<u8>> {
        self.payloads
            .get(path)
            .map(|x| x.value().clone())
            .ok_or_else(|| ErrorCode::NotFound(format!("No payload found at path: {}", path)))
    }
}
