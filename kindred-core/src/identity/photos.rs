use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use kindred_shared::clients::minio::MinioClient;
use kindred_shared::{AppError, AppResult, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    /// Identifies the format from its leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageKind::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageKind::Png),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageKind::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }
}

fn object_key(user_id: i64, kind: ImageKind) -> String {
    format!("profiles/{}/{}.{}", user_id, Uuid::now_v7(), kind.extension())
}

/// Photo byte store; returns the public URL of the stored object.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn put(&self, user_id: i64, bytes: Vec<u8>, kind: ImageKind) -> AppResult<String>;
    /// Removes the object behind `url`. Unknown URLs are ignored.
    async fn delete(&self, url: &str) -> AppResult<()>;
}

#[async_trait]
impl PhotoStore for MinioClient {
    async fn put(&self, user_id: i64, bytes: Vec<u8>, kind: ImageKind) -> AppResult<String> {
        self.upload(&object_key(user_id, kind), bytes, kind.content_type())
            .await
            .map_err(|e| AppError::new(ErrorCode::PhotoUploadFailed, e))
    }

    async fn delete(&self, url: &str) -> AppResult<()> {
        let Some(key) = self.key_for(url) else {
            return Ok(());
        };
        MinioClient::delete(self, &key).await.map_err(AppError::internal)
    }
}

/// Keeps uploads in process memory.
#[derive(Default)]
pub struct MemoryPhotoStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn put(&self, user_id: i64, bytes: Vec<u8>, kind: ImageKind) -> AppResult<String> {
        let key = object_key(user_id, kind);
        let url = format!("memory://{key}");
        self.objects.lock().insert(key, bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> AppResult<()> {
        if let Some(key) = url.strip_prefix("memory://") {
            self.objects.lock().remove(key);
        }
        Ok(())
    }
}
