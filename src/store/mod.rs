pub mod keys;

use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::SdkError,
    primitives::ByteStream,
};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::StoreConfig;

/// Errors surfaced by the object-store wrapper. Handlers map `NotFound`
/// to 404 and everything else to 500.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("object store request failed for {key}: {message}")]
    Backend { key: String, message: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    fn backend<E: std::fmt::Display>(key: &str, err: E) -> Self {
        StoreError::Backend {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thin wrapper around the S3 client, bound to the single bucket the
/// application uses as its document+blob database.
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    /// Builds a client for an S3-compatible endpoint (MinIO in every
    /// deployment so far). Path-style addressing is required because
    /// MinIO does not serve virtual-host buckets by default.
    pub fn new(config: &StoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "wedding-wall-env",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    /// Creates the bucket if it does not exist yet. Called once at
    /// startup.
    pub async fn ensure_bucket(&self) -> StoreResult<()> {
        let exists = self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok();

        if !exists {
            self.client
                .create_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .map_err(|err| StoreError::backend(&self.bucket, DisplayErr(&err)))?;
            info!(bucket = %self.bucket, "created object-store bucket");
        }

        Ok(())
    }

    /// Liveness check used by the health endpoint.
    pub async fn health_check(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        let bytes = self.get_raw(key).await?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            key: key.to_string(),
            source,
        })
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.put_raw(key, Bytes::from(body), "application/json")
            .await
    }

    pub async fn get_blob(&self, key: &str) -> StoreResult<(Bytes, Option<String>)> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match &err {
                SdkError::ServiceError(service) if service.err().is_no_such_key() => {
                    StoreError::NotFound(key.to_string())
                }
                _ => StoreError::backend(key, DisplayErr(&err)),
            })?;

        let content_type = resp.content_type().map(str::to_string);
        let data = resp
            .body
            .collect()
            .await
            .map_err(|err| StoreError::backend(key, err))?
            .into_bytes();

        Ok((data, content_type))
    }

    pub async fn put_blob(&self, key: &str, data: Bytes, content_type: &str) -> StoreResult<()> {
        self.put_raw(key, data, content_type).await
    }

    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StoreError::backend(key, DisplayErr(&err)))?;
        Ok(())
    }

    /// Lists every key under the prefix, following continuation tokens
    /// until the listing is exhausted.
    pub async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let resp = request
                .send()
                .await
                .map_err(|err| StoreError::backend(prefix, DisplayErr(&err)))?;

            for object in resp.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    /// Fetches and decodes every JSON document under a prefix, skipping
    /// entries that fail to fetch or parse. Aggregation endpoints keep
    /// serving the rest of the wall when one document is corrupt.
    pub async fn collect_json<T: DeserializeOwned>(
        &self,
        prefix: &str,
        key_filter: impl Fn(&str) -> bool,
    ) -> StoreResult<Vec<T>> {
        let keys = self.list_keys(prefix).await?;
        let mut items = Vec::with_capacity(keys.len());

        for key in keys.iter().filter(|key| key_filter(key.as_str())) {
            match self.get_json::<T>(key).await {
                Ok(item) => items.push(item),
                Err(err) => {
                    warn!(%key, %err, "skipping unreadable document");
                }
            }
        }

        Ok(items)
    }

    async fn get_raw(&self, key: &str) -> StoreResult<Bytes> {
        let (data, _) = self.get_blob(key).await?;
        Ok(data)
    }

    async fn put_raw(&self, key: &str, data: Bytes, content_type: &str) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| StoreError::backend(key, DisplayErr(&err)))?;
        Ok(())
    }
}

/// `SdkError` renders as an unhelpful one-liner via `Display`; include
/// the source chain when flattening it into a `StoreError` message.
struct DisplayErr<'a, E>(&'a E);

impl<E: std::error::Error> std::fmt::Display for DisplayErr<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
