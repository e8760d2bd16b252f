use crate::{
    config::{Settings, StorageProvider},
    utils::{AppError, AppResult},
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const UPLOADS_PREFIX: &str = "/uploads/";

const ALLOWED_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// Where product and client images live.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the object and returns its public URL.
    async fn put(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> AppResult<String>;

    /// Deletes the object behind a URL previously returned by `put`.
    async fn delete(&self, url: &str) -> AppResult<()>;

    fn provider(&self) -> &'static str;
}

pub type SharedImageStore = Arc<dyn ImageStore>;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UploadImageRequest {
    /// Original file name, informational only
    pub filename: Option<String>,
    pub content_type: String,
    /// Base64 payload; a `data:<type>;base64,` prefix is accepted
    pub data: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct DeleteImageRequest {
    pub url: String,
}

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let content_type = content_type.trim().to_ascii_lowercase();
    let content_type = if content_type == "image/jpg" { "image/jpeg".to_string() } else { content_type };
    ALLOWED_TYPES
        .iter()
        .find(|(ct, _)| *ct == content_type)
        .map(|(_, ext)| *ext)
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

pub fn object_name(ext: &str) -> String {
    format!("{}.{}", uuid::Uuid::new_v4().simple(), ext)
}

/// Plain file names only: no separators, no dot-files, no `..`.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && !name.contains("..")
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

/// Decodes and checks an upload, returning the bytes and the file extension.
pub fn decode_upload(request: &UploadImageRequest) -> AppResult<(Vec<u8>, &'static str)> {
    let ext = extension_for(&request.content_type).ok_or_else(|| {
        AppError::bad_request(format!(
            "Unsupported image type: {} (allowed: jpeg, png, webp, gif)",
            request.content_type
        ))
    })?;

    let payload = match request.data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => request.data.as_str(),
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    // Rough pre-check so oversized bodies are rejected before decoding
    if payload.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(AppError::bad_request("Image exceeds the 5 MB limit"));
    }

    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| AppError::bad_request("Image data is not valid base64"))?;

    if bytes.is_empty() {
        return Err(AppError::bad_request("Image data is empty"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::bad_request("Image exceeds the 5 MB limit"));
    }

    Ok((bytes, ext))
}

pub async fn upload_image(store: &dyn ImageStore, request: &UploadImageRequest) -> AppResult<UploadResponse> {
    let (bytes, ext) = decode_upload(request)?;
    let name = object_name(ext);
    let size = bytes.len();
    let url = store.put(&name, extension_content_type(ext), bytes).await?;

    log::info!(
        "🖼️  Image stored via {}: {} ({} bytes, from {})",
        store.provider(),
        name,
        size,
        request.filename.as_deref().unwrap_or("upload")
    );

    Ok(UploadResponse {
        success: true,
        url,
        name,
        size,
    })
}

fn extension_content_type(ext: &str) -> &'static str {
    ALLOWED_TYPES
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(ct, _)| *ct)
        .unwrap_or("application/octet-stream")
}

// ==================== LOCAL DISK ====================

pub struct LocalImageStore {
    dir: PathBuf,
}

impl LocalImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Reads a stored upload for serving under `/uploads/{name}`.
pub async fn read_local(dir: &Path, name: &str) -> AppResult<(Vec<u8>, &'static str)> {
    if !is_safe_name(name) {
        return Err(AppError::bad_request("Invalid file name"));
    }
    match tokio::fs::read(dir.join(name)).await {
        Ok(bytes) => Ok((bytes, content_type_for(name))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::not_found("File not found")),
        Err(e) => Err(AppError::Storage(format!("Failed to read {}: {}", name, e))),
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn put(&self, name: &str, _content_type: &str, bytes: Vec<u8>) -> AppResult<String> {
        if !is_safe_name(name) {
            return Err(AppError::bad_request("Invalid file name"));
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", self.dir.display(), e)))?;
        tokio::fs::write(self.dir.join(name), bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", name, e)))?;

        Ok(format!("{}{}", UPLOADS_PREFIX, name))
    }

    async fn delete(&self, url: &str) -> AppResult<()> {
        let name = url
            .strip_prefix(UPLOADS_PREFIX)
            .filter(|n| is_safe_name(n))
            .ok_or_else(|| AppError::bad_request("Not a local upload URL"))?;

        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete {}: {}", name, e))),
        }
    }

    fn provider(&self) -> &'static str {
        "local"
    }
}

// ==================== AZURE BLOB STORAGE ====================

pub struct AzureBlobStore {
    account: String,
    container: String,
    sas_token: String,
    http: reqwest::Client,
}

impl AzureBlobStore {
    pub fn new(account: &str, container: &str, sas_token: &str) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Storage(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            account: account.to_string(),
            container: container.to_string(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
            http,
        })
    }

    pub fn container_url(&self) -> String {
        format!("https://{}.blob.core.windows.net/{}", self.account, self.container)
    }

    pub fn blob_url(&self, name: &str) -> String {
        format!("{}/{}", self.container_url(), name)
    }

    fn signed_url(&self, name: &str) -> String {
        format!("{}?{}", self.blob_url(name), self.sas_token)
    }

    /// Blob name from a public URL of this container.
    pub fn name_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        let prefix = self.container_url();
        url.strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| rest.split('?').next().unwrap_or(rest))
            .filter(|n| is_safe_name(n))
    }
}

#[async_trait]
impl ImageStore for AzureBlobStore {
    async fn put(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> AppResult<String> {
        let response = self
            .http
            .put(self.signed_url(name))
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Azure upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Storage(format!("Azure upload error: {}", response.status())));
        }

        Ok(self.blob_url(name))
    }

    async fn delete(&self, url: &str) -> AppResult<()> {
        let name = self
            .name_from_url(url)
            .ok_or_else(|| AppError::bad_request("Not a blob URL of this container"))?;

        let response = self
            .http
            .delete(self.signed_url(name))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Azure delete failed: {}", e)))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(AppError::Storage(format!("Azure delete error: {}", status)))
        }
    }

    fn provider(&self) -> &'static str {
        "azure"
    }
}

/// Builds the configured image store.
pub fn build_image_store(settings: &Settings) -> AppResult<SharedImageStore> {
    match settings.storage_provider {
        StorageProvider::Local => {
            log::info!("🖼️  Image storage: local directory {}", settings.upload_dir);
            Ok(Arc::new(LocalImageStore::new(&settings.upload_dir)))
        }
        StorageProvider::Azure => {
            let account = settings
                .azure_storage_account
                .as_deref()
                .ok_or_else(|| AppError::Storage("AZURE_STORAGE_ACCOUNT is not set".into()))?;
            let sas = settings
                .azure_storage_sas_token
                .as_deref()
                .ok_or_else(|| AppError::Storage("AZURE_STORAGE_SAS_TOKEN is not set".into()))?;

            log::info!(
                "🖼️  Image storage: Azure Blob {}/{}",
                account,
                settings.azure_storage_container
            );
            Ok(Arc::new(AzureBlobStore::new(account, &settings.azure_storage_container, sas)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content_type: &str, data: &str) -> UploadImageRequest {
        UploadImageRequest {
            filename: Some("photo".into()),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    #[test]
    fn test_extension_for_allowed_types() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("IMAGE/PNG"), Some("png"));
        assert_eq!(extension_for("image/jpg"), Some("jpg"));
        assert_eq!(extension_for("image/svg+xml"), None);
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn test_safe_names() {
        assert!(is_safe_name("3f2a9c.jpg"));
        assert!(!is_safe_name("../etc/passwd"));
        assert!(!is_safe_name("a/b.png"));
        assert!(!is_safe_name(".env"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("a..png"));
    }

    #[test]
    fn test_object_name_has_extension() {
        let name = object_name("webp");
        assert!(name.ends_with(".webp"));
        assert_eq!(name.len(), 32 + 5);
        assert!(is_safe_name(&name));
    }

    #[test]
    fn test_decode_upload_accepts_data_url() {
        let encoded = STANDARD.encode(b"\x89PNG fake");
        let (bytes, ext) = decode_upload(&request("image/png", &format!("data:image/png;base64,{}", encoded))).unwrap();
        assert_eq!(bytes, b"\x89PNG fake");
        assert_eq!(ext, "png");
    }

    #[test]
    fn test_decode_upload_rejects_bad_input() {
        assert!(matches!(decode_upload(&request("text/html", "aGk=")), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_upload(&request("image/png", "%%%")), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_upload(&request("image/png", "")), Err(AppError::BadRequest(_))));

        let too_big = STANDARD.encode(vec![0u8; MAX_IMAGE_BYTES + 1]);
        assert!(matches!(decode_upload(&request("image/gif", &too_big)), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_azure_urls() {
        let store = AzureBlobStore::new("shopimg", "product-images", "?sv=2022&sig=abc").unwrap();
        assert_eq!(
            store.blob_url("a.jpg"),
            "https://shopimg.blob.core.windows.net/product-images/a.jpg"
        );
        assert_eq!(
            store.signed_url("a.jpg"),
            "https://shopimg.blob.core.windows.net/product-images/a.jpg?sv=2022&sig=abc"
        );
        assert_eq!(
            store.name_from_url("https://shopimg.blob.core.windows.net/product-images/a.jpg"),
            Some("a.jpg")
        );
        assert_eq!(store.name_from_url("https://evil.example/product-images/a.jpg"), None);
    }

    #[tokio::test]
    async fn test_local_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("storefront-test-{}", uuid::Uuid::new_v4().simple()));
        let store = LocalImageStore::new(&dir);

        let url = store.put("x1.png", "image/png", b"img".to_vec()).await.unwrap();
        assert_eq!(url, "/uploads/x1.png");

        let (bytes, content_type) = read_local(store.dir(), "x1.png").await.unwrap();
        assert_eq!(bytes, b"img");
        assert_eq!(content_type, "image/png");

        store.delete(&url).await.unwrap();
        assert!(matches!(read_local(store.dir(), "x1.png").await, Err(AppError::NotFound(_))));
        assert!(matches!(read_local(store.dir(), "../x1.png").await, Err(AppError::BadRequest(_))));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
