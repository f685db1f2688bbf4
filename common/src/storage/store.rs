use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{
    path::Path as ObjPath, Attribute, Attributes, ObjectStore, PutMode, PutOptions, PutPayload,
};

use crate::error::AppError;
use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Artifact storage shared by every pipeline stage.
///
/// Writes made through [`StorageManager::put_new`] are create-only: a second write to the
/// same location fails instead of replacing the earlier artifact.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    /// `LocalFileSystem` rejects puts that carry attributes.
    keeps_attributes: bool,
}

impl StorageManager {
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        match cfg.storage {
            StorageKind::Memory => Ok(Self::in_memory()),
            StorageKind::Local => {
                let base = resolve_base_dir(cfg);
                tokio::fs::create_dir_all(&base)
                    .await
                    .map_err(|e| object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    })?;
                let store = LocalFileSystem::new_with_prefix(&base)?;
                Ok(Self {
                    store: Arc::new(store),
                    keeps_attributes: false,
                })
            }
        }
    }

    fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            keeps_attributes: true,
        }
    }

    /// Store bytes at a location that must not exist yet, tagged with `content_type`.
    ///
    /// Returns [`AppError::ArtifactExists`] when something is already stored there. Backends
    /// without attribute support keep only the bytes.
    pub async fn put_new(
        &self,
        location: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), AppError> {
        let path = ObjPath::from(location);
        let payload = PutPayload::from_bytes(data);
        let mut opts = PutOptions::from(PutMode::Create);
        if self.keeps_attributes {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            opts.attributes = attributes;
        }
        match self.store.put_opts(&path, payload, opts).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::AlreadyExists { .. }) => {
                Err(AppError::ArtifactExists(location.to_string()))
            }
            Err(err) => Err(AppError::from(err)),
        }
    }

    /// Serialize `value` as pretty JSON and store it create-only at `location`.
    pub async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        location: &str,
        value: &T,
    ) -> Result<(), AppError> {
        let body = serde_json::to_vec_pretty(value)?;
        self.put_new(location, Bytes::from(body), JSON_CONTENT_TYPE)
            .await
    }

    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl StorageManager {
    pub fn memory() -> Self {
        Self::in_memory()
    }

    /// Content type recorded with the object at `location`, if any.
    pub async fn content_type(&self, location: &str) -> object_store::Result<Option<String>> {
        let result = self.store.get(&ObjPath::from(location)).await?;
        Ok(result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| AsRef::<str>::as_ref(value).to_string()))
    }
}

/// `data_dir` as an absolute path; relative values are taken from the working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    let dir = PathBuf::from(&cfg.data_dir);
    if dir.is_absolute() {
        return dir;
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MP4: &str = "video/mp4";

    fn test_config(root: &str) -> AppConfig {
        AppConfig {
            data_dir: root.into(),
            storage: StorageKind::Local,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_put_new_and_get_memory() {
        let storage = StorageManager::memory();

        let location = "renders/acme/monthly/2025-06/job-1/clips/scene-1.mp4";
        storage
            .put_new(location, Bytes::from_static(b"clip"), MP4)
            .await
            .expect("put");

        let retrieved = storage.get(location).await.expect("get");
        assert_eq!(retrieved.as_ref(), b"clip");
        assert!(storage.exists(location).await.expect("exists check"));
        assert_eq!(
            storage.content_type(location).await.expect("attributes"),
            Some(MP4.to_string())
        );
    }

    #[tokio::test]
    async fn test_put_new_refuses_to_overwrite() {
        let storage = StorageManager::memory();
        let location = "renders/acme/monthly/2025-06/job-1/parse.json";

        storage
            .put_new(location, Bytes::from_static(b"first"), JSON_CONTENT_TYPE)
            .await
            .expect("first write");
        let second = storage
            .put_new(location, Bytes::from_static(b"second"), JSON_CONTENT_TYPE)
            .await;
        assert!(matches!(second, Err(AppError::ArtifactExists(path)) if path == location));

        let retrieved = storage.get(location).await.expect("get");
        assert_eq!(retrieved.as_ref(), b"first");
    }

    #[tokio::test]
    async fn test_put_json_writes_pretty_json() {
        let storage = StorageManager::memory();
        storage
            .put_json("a/b.json", &serde_json::json!({ "text": "hello" }))
            .await
            .expect("put json");
        let raw = storage.get("a/b.json").await.expect("get");
        let value: serde_json::Value = serde_json::from_slice(&raw).expect("json");
        assert_eq!(value["text"], "hello");
        assert_eq!(
            storage.content_type("a/b.json").await.expect("attributes"),
            Some("application/json".to_string())
        );
    }

    #[tokio::test]
    async fn test_local_backend_create_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_string_lossy().to_string();
        let storage = StorageManager::new(&test_config(&root))
            .await
            .expect("create storage manager");

        let location = "renders/job/clips/scene-1.mp4";
        storage
            .put_new(location, Bytes::from_static(b"\x00\x00\x00\x18ftypmp42"), MP4)
            .await
            .expect("put");
        assert!(tokio::fs::metadata(dir.path().join(location)).await.is_ok());

        let again = storage
            .put_new(location, Bytes::from_static(b"other"), MP4)
            .await;
        assert!(matches!(again, Err(AppError::ArtifactExists(_))));
    }

    #[tokio::test]
    async fn test_missing_object_errors() {
        let storage = StorageManager::memory();
        assert!(storage.get("nonexistent.txt").await.is_err());
        assert!(!storage.exists("nonexistent.txt").await.expect("exists"));
    }
}
