//! Helper functions and structures for dealing with minio, or any other
//! S3-compatible object store.

use anyhow::{anyhow, Error};
use aws_sdk_s3 as s3;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketKey {
    pub bucket: String,
    pub key: String,
}

/// Retrieves a bucket and key prefix for a path of the form
/// `s3://bucket/some/prefix`. Trailing `/` and `*` segments are dropped.
pub fn path_to_bucket_key(path: &str) -> Result<BucketKey, Error> {
    let s3_url = Url::parse(path).map_err(|e| anyhow!("Could not parse path `{path}`: {e}"))?;

    if s3_url.scheme() != "s3" {
        return Err(anyhow!("protocol of path `{path}` is not s3"));
    }

    let bucket = s3_url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| anyhow!("path `{path}` does not name a bucket"))?;

    let mut segments: Vec<&str> = s3_url.path().split('/').filter(|s| !s.is_empty()).collect();
    while segments.last().is_some_and(|segment| segment.contains('*')) {
        segments.pop();
    }

    Ok(BucketKey {
        bucket: bucket.to_string(),
        key: segments.join("/"),
    })
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// id
    pub access_key_id: String,

    /// password
    pub secret_access_key: String,

    /// object store region
    pub region: String,

    /// minio url
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Client {
    pub client: s3::Client,
}

impl Client {
    pub fn from_conf(cfg: ClientConfig) -> Self {
        let cred = s3::config::Credentials::new(
            cfg.access_key_id,
            cfg.secret_access_key,
            None,
            None,
            "bmr",
        );
        let region = s3::config::Region::new(cfg.region);
        let conf = s3::config::Builder::new()
            .credentials_provider(cred)
            .region(region)
            .endpoint_url(cfg.url)
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        Self {
            client: s3::Client::from_conf(conf),
        }
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, Error> {
        let data = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?
            .body
            .collect()
            .await?
            .into_bytes();
        Ok(data)
    }

    pub async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), Error> {
        debug!("put s3://{bucket}/{key} ({} bytes)", data.len());
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }
}
