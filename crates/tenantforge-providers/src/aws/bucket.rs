use async_trait::async_trait;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, ObjectOwnership,
    OwnershipControls, OwnershipControlsRule, PublicAccessBlockConfiguration,
};
use tenantforge_core::naming::validate_bucket_name;
use tenantforge_core::{ConfigField, ResourceHandle, ResourceKind};
use tracing::{info, warn};

use super::BucketSettings;
use super::classify::{ErrorClass, classify, sdk_optional, sdk_result};
use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::types::{CreateRequest, Created, Deleted, ResourceState};

/// Region in which S3 rejects an explicit location constraint.
const DEFAULT_S3_REGION: &str = "us-east-1";

/// Object-storage bucket.
#[derive(Debug, Clone)]
pub struct BucketProvider {
    client: aws_sdk_s3::Client,
    settings: BucketSettings,
}

impl BucketProvider {
    pub fn new(client: aws_sdk_s3::Client, settings: BucketSettings) -> Self {
        Self { client, settings }
    }

    async fn apply_access_settings(&self, bucket: &str) -> Result<(), ProviderError> {
        if self.settings.allow_public_access {
            let config = PublicAccessBlockConfiguration::builder()
                .block_public_acls(false)
                .ignore_public_acls(false)
                .block_public_policy(false)
                .restrict_public_buckets(false)
                .build();
            sdk_result(
                self.client
                    .put_public_access_block()
                    .bucket(bucket)
                    .public_access_block_configuration(config)
                    .send()
                    .await,
                "PutPublicAccessBlock",
            )?;
        }

        if self.settings.enable_acl || self.settings.allow_object_read {
            let rule = OwnershipControlsRule::builder()
                .object_ownership(ObjectOwnership::ObjectWriter)
                .build()
                .map_err(|e| ProviderError::rejected(format!("ownership rule: {e}")))?;
            let controls = OwnershipControls::builder()
                .rules(rule)
                .build()
                .map_err(|e| ProviderError::rejected(format!("ownership controls: {e}")))?;
            sdk_result(
                self.client
                    .put_bucket_ownership_controls()
                    .bucket(bucket)
                    .ownership_controls(controls)
                    .send()
                    .await,
                "PutBucketOwnershipControls",
            )?;
        }

        if self.settings.allow_object_read {
            sdk_result(
                self.client
                    .put_bucket_acl()
                    .bucket(bucket)
                    .acl(BucketCannedAcl::PublicRead)
                    .send()
                    .await,
                "PutBucketAcl",
            )?;
        }

        if self.settings.public_read_policy {
            sdk_result(
                self.client
                    .put_bucket_policy()
                    .bucket(bucket)
                    .policy(public_read_policy(bucket))
                    .send()
                    .await,
                "PutBucketPolicy",
            )?;
        }

        Ok(())
    }

    /// Deletes every object in the bucket, page by page.
    async fn empty(&self, bucket: &str) -> Result<usize, ProviderError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();
        let mut removed = 0;
        while let Some(page) = pages.next().await {
            let page = sdk_result(page, "ListObjectsV2")?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                sdk_optional(
                    self.client
                        .delete_object()
                        .bucket(bucket)
                        .key(key)
                        .send()
                        .await,
                    "DeleteObject",
                )?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "AddPublicReadACLToAllObjects",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{bucket}/*"),
        }]
    })
    .to_string()
}

#[async_trait]
impl ResourceProvider for BucketProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Bucket
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError> {
        let bucket = request.input(ConfigField::BucketName)?;
        let region = request.input(ConfigField::Region)?;
        validate_bucket_name(bucket)
            .map_err(|e| ProviderError::rejected(format!("invalid bucket name '{bucket}': {e}")))?;

        let mut call = self.client.create_bucket().bucket(bucket);
        if region != DEFAULT_S3_REGION {
            call = call.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        let reused = match call.send().await {
            Ok(_) => {
                info!(bucket, region, "Bucket created");
                false
            }
            Err(err) => {
                let classified = classify(&err);
                if classified.class != ErrorClass::AlreadyOwned {
                    return Err(classified.into_provider_error("CreateBucket"));
                }
                info!(bucket, "Bucket already exists and is owned by this account");
                true
            }
        };

        if let Err(err) = self.apply_access_settings(bucket).await {
            if !reused {
                warn!(bucket, error = %err, "Access settings failed, removing new bucket");
                if let Err(cleanup) = sdk_optional(
                    self.client.delete_bucket().bucket(bucket).send().await,
                    "DeleteBucket",
                ) {
                    warn!(bucket, error = %cleanup, "Failed to remove partially configured bucket");
                }
            }
            return Err(err);
        }

        Ok(if reused {
            Created::reused(bucket)
        } else {
            Created::new(bucket)
        })
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError> {
        let bucket = handle.as_str();
        if self.describe(handle).await? == ResourceState::NotFound {
            return Ok(Deleted::AlreadyAbsent);
        }

        let removed = self.empty(bucket).await?;
        let deleted = sdk_optional(
            self.client.delete_bucket().bucket(bucket).send().await,
            "DeleteBucket",
        )?;
        info!(bucket, objects = removed, "Bucket deleted");
        Ok(match deleted {
            Some(_) => Deleted::Removed,
            None => Deleted::AlreadyAbsent,
        })
    }

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError> {
        let found = sdk_optional(
            self.client.head_bucket().bucket(handle.as_str()).send().await,
            "HeadBucket",
        )?;
        Ok(match found {
            Some(_) => ResourceState::Ready,
            None => ResourceState::NotFound,
        })
    }
}
