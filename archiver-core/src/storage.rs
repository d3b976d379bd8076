use crate::BlobName;
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

pub mod azure;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Error uploading blob {blob}: {source}")]
    Upload {
        blob: String,
        #[source]
        source: BoxError,
    },
}

/// Destination for archived documents.
///
/// Writing an existing name replaces it.
#[async_trait]
pub trait BlobSink: Send + Sync + Debug {
    async fn upload(&self, name: &BlobName, body: Vec<u8>) -> Result<(), StorageError>;
}
