//! Object storage for item images
//!
//! Files are written under `{user}/{stack}/{random}.{ext}` in one bucket and
//! referenced from rows by their public URL.

use crate::config::ObjectStorageConfig;
use crate::error::{Result, StackShareError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Request timeout duration
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Object storage trait defining required operations
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, returning the public URL
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String>;

    /// Remove objects by path; missing objects are not an error
    async fn remove(&self, paths: &[String]) -> Result<()>;

    /// Object path behind a public URL this store produced
    fn path_from_url(&self, url: &str) -> Option<String>;
}

/// HTTP client for a storage service exposing the
/// `/storage/v1/object/{bucket}/{path}` API
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

#[derive(Debug, Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

impl HttpObjectStore {
    pub fn new(base_url: &str, api_key: &str, bucket: &str) -> Result<Self> {
        if bucket.is_empty() {
            return Err(StackShareError::Validation(
                "Object storage bucket cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    /// Build a store from configuration; `None` when no URL is configured
    pub fn from_config(config: &ObjectStorageConfig) -> Result<Option<Self>> {
        match &config.url {
            Some(url) => Ok(Some(Self::new(
                url,
                config.api_key.as_deref().unwrap_or_default(),
                &config.bucket,
            )?)),
            None => Ok(None),
        }
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, self.bucket)
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        format!("status {}: {}", status, text)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String> {
        debug!("Uploading {} bytes to {}/{}", bytes.len(), self.bucket, path);

        let response = self
            .client
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, self.bucket, path
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("apikey", &self.api_key)
            .header(
                "Content-Type",
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(bytes)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(format!("{}{}", self.public_prefix(), path)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StackShareError::ObjectStorage(
                "Invalid or missing object storage API key".to_string(),
            )),
            _ => Err(StackShareError::ObjectStorage(format!(
                "Upload failed ({})",
                Self::error_body(response).await
            ))),
        }
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        debug!("Removing {} objects from {}", paths.len(), self.bucket);

        let response = self
            .client
            .delete(format!("{}/storage/v1/object/{}", self.base_url, self.bucket))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("apikey", &self.api_key)
            .json(&RemoveRequest { prefixes: paths })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::NOT_FOUND => Ok(()),
            _ => {
                let body = Self::error_body(response).await;
                warn!("Object removal failed: {}", body);
                Err(StackShareError::ObjectStorage(format!("Remove failed ({})", body)))
            }
        }
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_prefix())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }
}

/// Process-local store (tests and deployments without object storage)
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    const URL_PREFIX: &'static str = "memory://objects/";

    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.lock().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: Option<&str>) -> Result<String> {
        self.objects.lock().await.insert(path.to_string(), bytes);
        Ok(format!("{}{}", Self::URL_PREFIX, path))
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.lock().await;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(Self::URL_PREFIX)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }
}
