//! Binary object store for item images.
//!
//! Images are uploaded to a storage bucket speaking the Firebase Storage
//! REST protocol. The object store only returns a retrieval URL,
//! which is then persisted with the item through the catalog API.

use std::fmt::Debug;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use enum_dispatch::enum_dispatch;
use regex::Regex;
use reqwest::header;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ObjectStoreConfig;
use crate::error::{read_error_response, StorageError};

const STOREFRONT_VERSION: &str = env!("CARGO_PKG_VERSION");

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// An image selected for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Guess the content type from the file extension.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let content_type = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        };
        Self {
            file_name,
            content_type: content_type.to_string(),
            bytes,
        }
    }
}

/// Object path of an uploaded image: `items/<millis>-<file name>`,
/// with runs of whitespace in the file name replaced by `-`.
pub fn object_path(file_name: &str, timestamp_millis: i64) -> String {
    let file_name = WHITESPACE.replace_all(file_name.trim(), "-");
    format!("items/{timestamp_millis}-{file_name}")
}

/// Either an HTTP object store, a recording mock, or no store at all.
#[derive(Debug)]
#[enum_dispatch(ObjectStore)]
pub enum Storage {
    Http(HttpObjectStore),
    Mock(MockObjectStore),
    Disabled(NoObjectStore),
}

#[enum_dispatch]
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Upload an image and return the URL it can be retrieved from.
    async fn upload_image(&self, image: &ImageUpload) -> Result<Url, StorageError>;
}

// ---------------------------------------------------------------------------
// HTTP object store
// ---------------------------------------------------------------------------

/// Metadata returned by the storage bucket after an upload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

pub struct HttpObjectStore {
    http: reqwest::Client,
    storage_url: Url,
}

impl Debug for HttpObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("storage_url", &self.storage_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpObjectStore {
    pub fn new(config: ObjectStoreConfig) -> Result<Self, StorageError> {
        let storage_url = Url::parse(config.storage_url.trim_end_matches('/'))
            .map_err(|e| StorageError::InvalidUrl(config.storage_url.clone(), e))?;

        let user_agent = config
            .user_agent
            .unwrap_or_else(|| format!("storefront/{STOREFRONT_VERSION}"));
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .user_agent(user_agent)
            .build()
            .map_err(StorageError::Network)?;

        Ok(Self { http, storage_url })
    }

    fn objects_url(&self) -> Result<Url, StorageError> {
        let url = format!("{}/o", self.storage_url.as_str().trim_end_matches('/'));
        Url::parse(&url).map_err(|e| StorageError::InvalidUrl(url, e))
    }

    /// Retrieval URL of a stored object.
    fn download_url(&self, name: &str, token: Option<&str>) -> Result<Url, StorageError> {
        let url = format!(
            "{}/{}",
            self.objects_url()?,
            url_escape::encode_component(name)
        );
        let mut url = Url::parse(&url).map_err(|e| StorageError::InvalidUrl(url, e))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }
}

impl ObjectStore for HttpObjectStore {
    #[instrument(skip_all, fields(file_name = %image.file_name, size = image.bytes.len()))]
    async fn upload_image(&self, image: &ImageUpload) -> Result<Url, StorageError> {
        let path = object_path(&image.file_name, chrono::Utc::now().timestamp_millis());

        let mut upload_url = self.objects_url()?;
        upload_url.query_pairs_mut().append_pair("name", &path);

        debug!(%upload_url, "uploading image");
        let response = self
            .http
            .post(upload_url)
            .header(header::CONTENT_TYPE, &image.content_type)
            .body(image.bytes.clone())
            .send()
            .await
            .map_err(StorageError::Network)?;

        if !response.status().is_success() {
            let (status, message) = read_error_response(response).await;
            return Err(StorageError::Request { status, message });
        }

        let body = response.bytes().await.map_err(StorageError::Network)?;
        let metadata: ObjectMetadata =
            serde_json::from_slice(&body).map_err(StorageError::InvalidResponse)?;

        // the bucket may return several comma separated tokens, any of them grants access
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next());

        let url = self.download_url(&metadata.name, token)?;
        debug!(%url, "uploaded image");
        Ok(url)
    }
}

// ---------------------------------------------------------------------------
// Mock and disabled stores
// ---------------------------------------------------------------------------

/// An object store that records uploads and hands out fake URLs.
#[derive(Debug, Default, Clone)]
pub struct MockObjectStore {
    uploads: Arc<Mutex<Vec<ImageUpload>>>,
    fail: bool,
}

impl MockObjectStore {
    /// A store that rejects every upload.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<ImageUpload> {
        self.uploads
            .lock()
            .expect("couldn't acquire mock lock")
            .clone()
    }
}

impl ObjectStore for MockObjectStore {
    async fn upload_image(&self, image: &ImageUpload) -> Result<Url, StorageError> {
        if self.fail {
            return Err(StorageError::Request {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                message: "mock upload failure".to_string(),
            });
        }

        let mut uploads = self.uploads.lock().expect("couldn't acquire mock lock");
        uploads.push(image.clone());
        let path = object_path(&image.file_name, uploads.len() as i64);
        let url = format!("https://storage.invalid/{path}");
        Url::parse(&url).map_err(|e| StorageError::InvalidUrl(url, e))
    }
}

/// Used when no storage bucket is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObjectStore;

impl ObjectStore for NoObjectStore {
    async fn upload_image(&self, _image: &ImageUpload) -> Result<Url, StorageError> {
        Err(StorageError::NotConfigured)
    }
}
