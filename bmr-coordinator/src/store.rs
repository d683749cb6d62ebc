//! Content stores holding the chunks cut from a job's input.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use common::minio::{self, path_to_bucket_key};

/// Somewhere to keep chunk files, addressed by key.
pub trait ChunkStore: Send + Sync + 'static {
    fn put_chunk(&self, key: &str, data: Bytes) -> impl Future<Output = Result<()>> + Send;

    fn get_chunk(&self, key: &str) -> impl Future<Output = Result<Bytes>> + Send;

    /// Delete the given chunks. Keys that do not exist are ignored.
    fn delete_chunks(&self, keys: &[String]) -> impl Future<Output = Result<()>> + Send;
}

/// Chunks as files in a directory on the local file system.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create chunk directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(anyhow!("invalid chunk key `{key}`"));
        }
        Ok(self.root.join(key))
    }
}

impl ChunkStore for LocalStore {
    async fn put_chunk(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.path_of(key)?;
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("failed to write chunk {}", path.display()))
    }

    async fn get_chunk(&self, key: &str) -> Result<Bytes> {
        let path = self.path_of(key)?;
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read chunk {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    async fn delete_chunks(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.path_of(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("removed chunk {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to remove chunk {}", path.display()))
                }
            }
        }
        Ok(())
    }
}

/// Chunks as objects under a prefix in an S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: minio::Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// `location` has the form `s3://bucket/prefix`.
    pub fn new(client: minio::Client, location: &str) -> Result<Self> {
        let target = path_to_bucket_key(location)?;
        Ok(Self {
            client,
            bucket: target.bucket,
            prefix: target.key,
        })
    }

    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }
}

impl ChunkStore for S3Store {
    async fn put_chunk(&self, key: &str, data: Bytes) -> Result<()> {
        self.client
            .put_object(&self.bucket, &self.object_key(key), data)
            .await
    }

    async fn get_chunk(&self, key: &str) -> Result<Bytes> {
        self.client
            .get_object(&self.bucket, &self.object_key(key))
            .await
    }

    async fn delete_chunks(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.client
                .delete_object(&self.bucket, &self.object_key(key))
                .await?;
        }
        Ok(())
    }
}

/// Chunks kept in process memory. Used when the coordinator is embedded
/// and the input already lives in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    chunks: DashMap<String, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.chunks.contains_key(key)
    }
}

impl ChunkStore for MemoryStore {
    async fn put_chunk(&self, key: &str, data: Bytes) -> Result<()> {
        self.chunks.insert(key.to_string(), data);
        Ok(())
    }

    async fn get_chunk(&self, key: &str) -> Result<Bytes> {
        self.chunks
            .get(key)
            .map(|chunk| chunk.value().clone())
            .ok_or_else(|| anyhow!("no chunk named `{key}`"))
    }

    async fn delete_chunks(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.chunks.remove(key);
        }
        Ok(())
    }
}
