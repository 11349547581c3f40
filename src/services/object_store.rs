//! Object store client over an S3-compatible API.
//!
//! The broker is the only holder of store credentials; they arrive via
//! server-side configuration and are never handed to callers. Reads are
//! served through short-lived pre-signed URLs, writes are proxied.

use super::{FileError, FileResult};
use crate::models::remote_object::RemoteObject;
use async_trait::async_trait;
use aws_sdk_s3::{Client as S3Client, Config as S3Config};
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Acknowledgement returned by a successful put.
#[derive(Clone, Debug)]
pub struct PutOutcome {
    pub key: String,
    pub etag: Option<String>,
}

/// Key-addressed blob operations.
///
/// Kept behind a trait so the file service can be exercised against an
/// in-memory fake; the production implementation is [`S3Store`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write a blob under `key`. Fails with `Credential`, `Permission`, or
    /// `Network` depending on what the backing API rejected.
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        tags: HashMap<String, String>,
    ) -> FileResult<PutOutcome>;

    /// List blobs under a prefix, newest-first by last-modified, bounded by
    /// `max_keys`. No continuation token; restart with a new prefix/limit.
    async fn list_with_prefix(
        &self,
        prefix: Option<&str>,
        max_keys: usize,
    ) -> FileResult<Vec<RemoteObject>>;

    /// Delete a blob. A missing key is a no-op success.
    async fn delete(&self, key: &str) -> FileResult<()>;

    /// Check whether a blob exists under `key`.
    async fn exists(&self, key: &str) -> FileResult<bool>;

    /// Lightweight connectivity probe against the backing store, used at
    /// startup and by the readiness endpoint.
    async fn check_bucket(&self) -> FileResult<()>;

    /// Derive the public URL for a key. Pure, no network call.
    fn public_url(&self, key: &str) -> String;

    /// Issue a short-lived pre-signed GET URL for a key.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> FileResult<String>;
}

/// S3-compatible implementation backed by `aws-sdk-s3`.
///
/// Path-style addressing is forced so MinIO-style deployments resolve
/// `{endpoint}/{bucket}/{key}` without DNS tricks.
#[derive(Clone)]
pub struct S3Store {
    client: S3Client,
    endpoint: String,
    bucket: String,
}

impl S3Store {
    /// Build a client from static credentials and an explicit endpoint.
    ///
    /// Fails with `Credential` when either half of the key pair is missing;
    /// the broker refuses to start without signed access.
    pub fn new(
        endpoint: &str,
        region: &str,
        bucket: &str,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
    ) -> FileResult<Self> {
        let (access_key_id, secret_access_key) = match (access_key_id, secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => {
                return Err(FileError::Credential(
                    "access key id and secret must be configured".into(),
                ));
            }
        };

        let credentials =
            Credentials::new(access_key_id, secret_access_key, None, None, "file-broker");
        let config = S3Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: S3Client::from_conf(config),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }

}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        tags: HashMap<String, String>,
    ) -> FileResult<PutOutcome> {
        let size = bytes.len();
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .set_metadata(Some(tags))
            .send()
            .await
            .map_err(|err| classify_sdk_error("PutObject", err))?;

        debug!(key = %key, size_bytes = size, "object written");

        Ok(PutOutcome {
            key: key.to_string(),
            etag: output.e_tag().map(|t| t.trim_matches('"').to_string()),
        })
    }

    async fn list_with_prefix(
        &self,
        prefix: Option<&str>,
        max_keys: usize,
    ) -> FileResult<Vec<RemoteObject>> {
        let max_keys = max_keys.clamp(1, 1000);
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(str::to_string))
            .max_keys(max_keys as i32)
            .send()
            .await
            .map_err(|err| classify_sdk_error("ListObjectsV2", err))?;

        let mut objects: Vec<RemoteObject> = output
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                let url = self.public_url(&key);
                Some(RemoteObject {
                    url,
                    size: obj.size().unwrap_or(0),
                    etag: obj.e_tag().map(|t| t.trim_matches('"').to_string()),
                    last_modified: obj.last_modified().and_then(to_chrono),
                    key,
                })
            })
            .collect();

        objects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> FileResult<()> {
        // S3 DeleteObject acks missing keys; a NotFound here would only come
        // from a stricter compatible backend, and is treated as success.
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => match classify_sdk_error("DeleteObject", err) {
                FileError::NotFound(_) => {
                    debug!(key = %key, "object already absent on delete");
                    Ok(())
                }
                other => Err(other),
            },
        }
    }

    async fn exists(&self, key: &str) -> FileResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    Ok(false)
                } else {
                    Err(classify_sdk_error("HeadObject", err))
                }
            }
        }
    }

    async fn check_bucket(&self) -> FileResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| classify_sdk_error("HeadBucket", err))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> FileResult<String> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|err| FileError::Store(err.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| classify_sdk_error("GetObject", err))?;
        Ok(request.uri().to_string())
    }
}

/// Map an SDK failure onto the broker's error kinds.
///
/// Transport problems become `Network`; service rejections are split by the
/// S3 error code into `Permission`, `Credential`, `NotFound`, or `Store`.
fn classify_sdk_error<E>(operation: &str, err: SdkError<E>) -> FileError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            FileError::Network(format!("{}: {}", operation, err))
        }
        SdkError::ServiceError(_) => {
            let message = err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            match err.code() {
                Some("AccessDenied") | Some("AllAccessDisabled") => {
                    FileError::Permission(format!("{}: {}", operation, message))
                }
                Some("InvalidAccessKeyId")
                | Some("SignatureDoesNotMatch")
                | Some("ExpiredToken")
                | Some("TokenRefreshRequired") => {
                    FileError::Credential(format!("{}: {}", operation, message))
                }
                Some("NoSuchKey") | Some("NoSuchBucket") | Some("NotFound") => {
                    FileError::NotFound(format!("object for {}", operation))
                }
                _ => FileError::Store(format!("{}: {}", operation, message)),
            }
        }
        _ => FileError::Store(format!("{}: {}", operation, err)),
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())
}
