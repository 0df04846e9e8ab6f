use crate::config::PresignConfig;
use crate::error::StoreError;
use crate::model::MediaLink;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::time::Duration;
use tracing::{debug, info};

/// Split an `s3://bucket/key` URI into bucket and key
pub fn parse_s3_uri(link: &str) -> Option<(&str, &str)> {
    let rest = link.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;

    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    Some((bucket, key))
}

/// Rewrites `s3://` media links into time-limited HTTPS URLs
///
/// A disabled signer returns links untouched.
#[derive(Clone)]
pub struct LinkSigner {
    client: Option<S3Client>,
    expiry: Duration,
}

impl LinkSigner {
    /// Build a signer from configuration, loading AWS credentials when enabled
    pub async fn from_config(config: &PresignConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        info!(
            region = %config.region,
            expiry_secs = config.expiry_secs,
            "Media link presigning enabled"
        );

        Self::with_client(S3Client::from_conf(s3_config_builder.build()), config.expiry())
    }

    pub fn with_client(client: S3Client, expiry: Duration) -> Self {
        Self {
            client: Some(client),
            expiry,
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: None,
            expiry: Duration::ZERO,
        }
    }

    /// Expiry of links signed now, if signing is enabled
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.client.as_ref()?;
        let expiry = chrono::Duration::from_std(self.expiry).ok()?;
        Some(Utc::now() + expiry)
    }

    /// Presign every `s3://` link; other links pass through unchanged
    pub async fn sign(&self, links: Vec<MediaLink>) -> Result<Vec<MediaLink>, StoreError> {
        let Some(client) = &self.client else {
            return Ok(links);
        };

        let signed = try_join_all(links.into_iter().map(|mut link| async move {
            if let Some((bucket, key)) = parse_s3_uri(&link.link) {
                link.link = self.presign(client, bucket, key).await?;
            }
            Ok::<_, StoreError>(link)
        }))
        .await?;

        debug!(links = signed.len(), "Presigned media links");

        Ok(signed)
    }

    async fn presign(
        &self,
        client: &S3Client,
        bucket: &str,
        key: &str,
    ) -> Result<String, StoreError> {
        let presign_error = |message: String| StoreError::Presign {
            link: format!("s3://{bucket}/{key}"),
            message,
        };

        let presigning_config =
            PresigningConfig::expires_in(self.expiry).map_err(|e| presign_error(e.to_string()))?;

        let presigned = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| presign_error(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}
