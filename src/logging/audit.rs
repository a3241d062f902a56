//! Audit trail for privileged actions
//!
//! Every event is emitted on the `bailiff::audit` tracing target. When a file
//! path is configured, events are also appended there as JSONL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::auth::{Operation, Principal, ResourceClass};

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Admin passed an ownership check on a resource they do not own
    OwnershipOverride,
    /// Admin passed the entitlement gate without a current subscription
    EntitlementBypass,
    /// Admin created a resource without a quota check
    QuotaBypass,
    /// Admin reached a plan feature their own subscription does not grant
    FeatureBypass,
    /// Admin activated or deactivated an account
    AccountStatusChanged,
    /// Password login, successful or not
    LoginAttempt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    /// Who acted (absent for failed logins)
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_class: Option<ResourceClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Owner of the resource acted on, if it exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            actor_id: None,
            resource_class: None,
            resource_id: None,
            owner_id: None,
            operation: None,
            metadata: None,
        }
    }

    pub fn with_actor(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }

    pub fn with_resource(mut self, class: ResourceClass, id: &str) -> Self {
        self.resource_class = Some(class);
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_owner(mut self, owner_id: Option<String>) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Writes audit events to tracing and, optionally, a JSONL file
#[derive(Clone, Default)]
pub struct AuditLogger {
    inner: Arc<Mutex<AuditLoggerInner>>,
}

#[derive(Default)]
struct AuditLoggerInner {
    writer: Option<BufWriter<File>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append events to `path`
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        self.inner.lock().await.writer = Some(BufWriter::new(file));
        info!("Audit logging initialized to {}", path.display());
        Ok(())
    }

    pub async fn log(&self, event: AuditEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        info!(
            target: "bailiff::audit",
            kind = ?event.kind,
            actor_id = ?event.actor_id,
            "{}",
            jsonl
        );

        let mut inner = self.inner.lock().await;
        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write audit event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }

    /// Record an admin acting on a resource outside their own ownership boundary
    pub async fn log_ownership_override(
        &self,
        admin: &Principal,
        class: ResourceClass,
        resource_id: &str,
        owner_id: Option<String>,
        operation: Operation,
    ) {
        let event = AuditEvent::new(AuditKind::OwnershipOverride)
            .with_actor(&admin.id)
            .with_resource(class, resource_id)
            .with_owner(owner_id)
            .with_operation(operation);
        self.log(event).await;
    }

    /// Record an admin passing a subscription, feature or quota gate on role alone
    pub async fn log_gate_bypass(
        &self,
        admin: &Principal,
        kind: AuditKind,
        class: Option<ResourceClass>,
        operation: Operation,
    ) {
        let mut event = AuditEvent::new(kind)
            .with_actor(&admin.id)
            .with_operation(operation);
        event.resource_class = class;
        self.log(event).await;
    }

    pub async fn log_status_change(&self, admin: &Principal, target_id: &str, active: bool) {
        let event = AuditEvent::new(AuditKind::AccountStatusChanged)
            .with_actor(&admin.id)
            .with_metadata(serde_json::json!({
                "targetId": target_id,
                "active": active,
            }));
        self.log(event).await;
    }

    pub async fn log_login_attempt(&self, success: bool, principal_id: Option<&str>) {
        let mut event = AuditEvent::new(AuditKind::LoginAttempt)
            .with_metadata(serde_json::json!({ "success": success }));
        if let Some(id) = principal_id {
            event = event.with_actor(id);
        }
        self.log(event).await;
    }
}
