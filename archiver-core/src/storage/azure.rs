//! Azure Blob Storage sink.
//!
//! The target container must already exist; this module never creates one.
//! Connection strings follow the Azure format, e.g.
//! `DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=...;EndpointSuffix=core.windows.net`,
//! an explicit `BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1` for Azurite,
//! `BlobEndpoint=...;SharedAccessSignature=...` for SAS access,
//! or the `UseDevelopmentStorage=true` shorthand.

use async_trait::async_trait;
use azure_storage::{CloudLocation, ConnectionString};
use azure_storage_blobs::prelude::*;
use std::{fmt, sync::Arc};
use tracing::debug;

use super::{BlobSink, StorageError};
use crate::BlobName;

const PUBLIC_SUFFIX: &str = "core.windows.net";
const EMULATOR_ACCOUNT: &str = "devstoreaccount1";

fn invalid(e: impl fmt::Display) -> StorageError {
    StorageError::InvalidConnectionString(e.to_string())
}

/// Resolve a connection string into the account name and a client builder for it.
fn client_builder(raw: &str) -> Result<(String, ClientBuilder), StorageError> {
    let cs = ConnectionString::new(raw).map_err(invalid)?;

    if cs.use_development_storage == Some(true) {
        return Ok((EMULATOR_ACCOUNT.to_string(), ClientBuilder::emulator()));
    }

    let credentials = cs.storage_credentials().map_err(invalid)?;

    if let Some(uri) = cs.blob_endpoint {
        let account = cs
            .account_name
            .map(str::to_string)
            .unwrap_or_else(|| account_from_endpoint(uri));
        let location = CloudLocation::Custom {
            account: account.clone(),
            uri: uri.trim_end_matches('/').to_string(),
        };
        return Ok((account, ClientBuilder::with_location(location, credentials)));
    }

    let account = cs
        .account_name
        .ok_or_else(|| invalid("missing AccountName or BlobEndpoint"))?
        .to_string();

    let builder = match cs.endpoint_suffix {
        Some(suffix) if suffix != PUBLIC_SUFFIX => ClientBuilder::with_location(
            CloudLocation::Custom {
                account: account.clone(),
                uri: format!("https://{account}.blob.{suffix}"),
            },
            credentials,
        ),
        _ => ClientBuilder::new(account.clone(), credentials),
    };

    Ok((account, builder))
}

/// First host label of `https://acct.blob.core.windows.net/`, i.e. `acct`.
fn account_from_endpoint(uri: &str) -> String {
    let host = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    host.split(['.', '/', ':'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Writes block blobs into one existing container.
#[derive(Clone)]
pub struct AzureBlobSink {
    account_name: String,
    container_name: String,
    client: Arc<ContainerClient>,
}

impl fmt::Debug for AzureBlobSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobSink")
            .field("account_name", &self.account_name)
            .field("container_name", &self.container_name)
            .finish()
    }
}

impl AzureBlobSink {
    pub fn from_connection_string(
        connection_string: &str,
        container_name: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let container_name = container_name.into();
        if container_name.trim().is_empty() {
            return Err(invalid("container name cannot be empty"));
        }

        let (account_name, builder) = client_builder(connection_string)?;
        let client = builder.container_client(container_name.clone());

        debug!(
            account = %account_name,
            container = %container_name,
            "Azure container client ready"
        );

        Ok(Self {
            account_name,
            container_name,
            client: Arc::new(client),
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }
}

#[async_trait]
impl BlobSink for AzureBlobSink {
    async fn upload(&self, name: &BlobName, body: Vec<u8>) -> Result<(), StorageError> {
        debug!(
            "Uploading {} bytes to {} in container {}",
            body.len(),
            name,
            self.container_name
        );

        self.client
            .blob_client(name.as_str())
            .put_block_blob(body)
            .await
            .map_err(|e| StorageError::Upload {
                blob: name.to_string(),
                source: Box::new(e),
            })?;

        Ok(())
    }
}
