use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use time::OffsetDateTime;

use crate::config::StorageConfig;

/// An object found in the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: Option<OffsetDateTime>,
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Presigned PUT URL for a direct client upload of `content_type`.
    async fn presign_upload(&self, key: &str, content_type: &str, ttl: Duration) -> anyhow::Result<String>;
    /// URL the object is served from once uploaded.
    fn public_url(&self, key: &str) -> String;
    async fn list_objects(&self) -> anyhow::Result<Vec<StoredObject>>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let (Some(access), Some(secret)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access.as_str(),
                secret.as_str(),
                None,
                None,
                "static",
            ));
        }
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn presign_upload(&self, key: &str, content_type: &str, ttl: Duration) -> anyhow::Result<String> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(PresigningConfig::expires_in(ttl)?)
            .await
            .context("s3 presign put_object")?;
        Ok(presigned.uri().to_string())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    async fn list_objects(&self) -> anyhow::Result<Vec<StoredObject>> {
        let mut out = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.context("s3 list_objects_v2")?;
            for obj in page.contents() {
                let Some(key) = obj.key() else { continue };
                let last_modified = obj.last_modified().and_then(to_offset);
                out.push(StoredObject {
                    key: key.to_string(),
                    last_modified,
                });
            }
        }
        Ok(out)
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {key}"))?;
        Ok(())
    }
}

fn to_offset(t: &aws_smithy_types::DateTime) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(t.secs()).ok()
}

/// In-memory bucket used by tests.
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeStorage {
        pub objects: Mutex<Vec<StoredObject>>,
        pub deleted: Mutex<Vec<String>>,
    }

    impl FakeStorage {
        pub fn with_objects(objects: Vec<StoredObject>) -> Self {
            Self {
                objects: Mutex::new(objects),
                deleted: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl StorageClient for FakeStorage {
        async fn presign_upload(&self, key: &str, content_type: &str, ttl: Duration) -> anyhow::Result<String> {
            Ok(format!(
                "https://fake.local/upload/{key}?content-type={content_type}&ttl={}",
                ttl.as_secs()
            ))
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://fake.local/{key}")
        }

        async fn list_objects(&self) -> anyhow::Result<Vec<StoredObject>> {
            Ok(self.objects.lock().unwrap().clone())
        }

        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.objects.lock().unwrap().retain(|o| o.key != key);
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }
}
