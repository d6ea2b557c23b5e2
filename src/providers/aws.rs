//! AWS infrastructure evidence provider: EC2/EBS, RDS, ECR, and CloudTrail,
//! behind the SDKs already pulled in for the object store
//! ([`crate::providers::object_store`]). Grounded in
//! `agent/providers/aws_provider.py`'s per-service collector methods, which
//! this module mirrors one-for-one rather than generalizing into a single
//! "describe everything" call — each service's evidence is optional and
//! independently best-effort.

use crate::error::ProviderError;
use aws_sdk_cloudtrail::Client as CloudTrailClient;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ecr::Client as EcrClient;
use aws_sdk_rds::Client as RdsClient;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

pub struct AwsProvider {
    ec2: Ec2Client,
    rds: RdsClient,
    ecr: EcrClient,
    cloudtrail: CloudTrailClient,
}

impl AwsProvider {
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let config = loader.load().await;
        Self {
            ec2: Ec2Client::new(&config),
            rds: RdsClient::new(&config),
            ecr: EcrClient::new(&config),
            cloudtrail: CloudTrailClient::new(&config),
        }
    }

    /// Describe a single EC2 instance, keyed by id in the returned map to
    /// match `AwsEvidence.ec2_instances`' shape.
    pub async fn describe_instance(&self, instance_id: &str) -> Result<HashMap<String, Value>, ProviderError> {
        let resp = self
            .ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?;

        let mut out = HashMap::new();
        if let Some(reservation) = resp.reservations().first() {
            if let Some(instance) = reservation.instances().first() {
                out.insert("instance_id".to_string(), Value::String(instance_id.to_string()));
                if let Some(state) = instance.state().and_then(|s| s.name()) {
                    out.insert("state".to_string(), Value::String(state.as_str().to_string()));
                }
                if let Some(t) = instance.instance_type() {
                    out.insert("instance_type".to_string(), Value::String(t.as_str().to_string()));
                }
                if let Some(az) = instance.placement().and_then(|p| p.availability_zone()) {
                    out.insert("availability_zone".to_string(), Value::String(az.to_string()));
                }
            }
        }
        Ok(out)
    }

    /// Describe an RDS instance by identifier.
    pub async fn describe_rds_instance(&self, db_instance_id: &str) -> Result<HashMap<String, Value>, ProviderError> {
        let resp = self
            .rds
            .describe_db_instances()
            .db_instance_identifier(db_instance_id)
            .send()
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?;

        let mut out = HashMap::new();
        if let Some(db) = resp.db_instances().first() {
            if let Some(status) = db.db_instance_status() {
                out.insert("status".to_string(), Value::String(status.to_string()));
            }
            if let Some(engine) = db.engine() {
                out.insert("engine".to_string(), Value::String(engine.to_string()));
            }
        }
        Ok(out)
    }

    /// Describe the most recent image pushed to an ECR repository, used by
    /// `image_pull` evidence enrichment when a pod is stuck on
    /// `ImagePullBackOff`/`ErrImagePull`.
    pub async fn describe_ecr_latest_image(&self, repository_name: &str) -> Result<HashMap<String, Value>, ProviderError> {
        let resp = self
            .ecr
            .describe_images()
            .repository_name(repository_name)
            .send()
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?;

        let mut out = HashMap::new();
        if let Some(image) = resp.image_details().iter().max_by_key(|i| i.image_pushed_at().map(|t| t.secs())) {
            out.insert("digest".to_string(), Value::String(image.image_digest().unwrap_or_default().to_string()));
            if let Some(tags) = image.image_tags() {
                out.insert(
                    "tags".to_string(),
                    Value::Array(tags.iter().map(|t| Value::String(t.to_string())).collect()),
                );
            }
        }
        Ok(out)
    }

    /// Fetch CloudTrail events referencing `resource_name` in `[start, end]`,
    /// chronological. The pipeline groups these by event category for
    /// display (see `agent/pipeline/changes.py`'s CloudTrail branch).
    pub async fn lookup_events(
        &self,
        resource_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HashMap<String, Value>>, ProviderError> {
        let resp = self
            .cloudtrail
            .lookup_events()
            .lookup_attributes(
                aws_sdk_cloudtrail::types::LookupAttribute::builder()
                    .attribute_key(aws_sdk_cloudtrail::types::LookupAttributeKey::ResourceName)
                    .attribute_value(resource_name)
                    .build()
                    .map_err(|e| ProviderError::Parse(e.to_string()))?,
            )
            .start_time(aws_smithy_types::DateTime::from_secs(start.timestamp()))
            .end_time(aws_smithy_types::DateTime::from_secs(end.timestamp()))
            .send()
            .await
            .map_err(|e| ProviderError::Upstream { status: 0, message: e.to_string() })?;

        let mut out = Vec::new();
        for event in resp.events() {
            let mut entry = HashMap::new();
            if let Some(name) = event.event_name() {
                entry.insert("event_name".to_string(), Value::String(name.to_string()));
            }
            if let Some(username) = event.username() {
                entry.insert("username".to_string(), Value::String(username.to_string()));
            }
            if let Some(time) = event.event_time() {
                entry.insert("event_time".to_string(), Value::Number(time.secs().into()));
            }
            out.push(entry);
        }
        out.sort_by_key(|e| e.get("event_time").and_then(Value::as_i64).unwrap_or(0));
        Ok(out)
    }
}
