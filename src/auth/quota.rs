//! Quota gate: plan limits on how many records of a class a principal may create

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::auth::{
    AuthError, Operation, Principal, ResourceClass, ResourceRegistry, SubscriptionSnapshot,
};
use crate::types::{BailiffError, Result};

/// Per-plan, per-class creation limits.
///
/// A missing entry means a limit of zero: unknown plans get no creation rights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaTable {
    limits: HashMap<(String, ResourceClass), u64>,
}

/// On-disk form: `{"Básico": {"client": 10, ...}, ...}`
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct QuotaFile(HashMap<String, HashMap<ResourceClass, u64>>);

impl QuotaTable {
    pub fn empty() -> Self {
        Self {
            limits: HashMap::new(),
        }
    }

    pub fn with_limit(mut self, plan: &str, class: ResourceClass, limit: u64) -> Self {
        self.limits.insert((plan.to_string(), class), limit);
        self
    }

    pub fn limit_for(&self, plan: &str, class: ResourceClass) -> u64 {
        self.limits
            .get(&(plan.to_string(), class))
            .copied()
            .unwrap_or(0)
    }

    /// Parse a JSON quota table.
    pub fn from_json(raw: &str) -> Result<Self> {
        let QuotaFile(plans) = serde_json::from_str(raw)
            .map_err(|e| BailiffError::Config(format!("Invalid quota table: {e}")))?;

        let limits = plans
            .into_iter()
            .flat_map(|(plan, classes)| {
                classes
                    .into_iter()
                    .map(move |(class, limit)| ((plan.clone(), class), limit))
            })
            .collect();
        Ok(Self { limits })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BailiffError::Config(format!("Cannot read quota table {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

impl Default for QuotaTable {
    fn default() -> Self {
        use ResourceClass::*;
        Self::empty()
            .with_limit("Básico", Client, 10)
            .with_limit("Básico", Process, 20)
            .with_limit("Básico", Document, 50)
            .with_limit("Profissional", Client, 50)
            .with_limit("Profissional", Process, 100)
            .with_limit("Profissional", Document, 200)
            .with_limit("Premium", Client, 100)
            .with_limit("Premium", Process, 500)
            .with_limit("Premium", Document, 1000)
    }
}

/// Reject a creation that would push the principal past their plan limit.
///
/// Only `Create` is counted; every other operation passes untouched. Admins are
/// never limited. The count comes from the class's registered store at the
/// moment of the check.
pub async fn require_within_quota(
    registry: &ResourceRegistry,
    table: &QuotaTable,
    class: ResourceClass,
    principal: &Principal,
    subscription: Option<&SubscriptionSnapshot>,
    operation: Operation,
) -> std::result::Result<(), AuthError> {
    if operation != Operation::Create || principal.is_admin() {
        return Ok(());
    }

    let subscription = subscription.ok_or(AuthError::SubscriptionRequired)?;
    let store = registry.lookup(class)?;

    let limit = table.limit_for(&subscription.plan_name, class);
    let current_count = store.count_owned_by(&principal.id).await?;

    if current_count >= limit {
        debug!(
            principal_id = %principal.id,
            plan = %subscription.plan_name,
            resource_class = %class,
            current_count,
            limit,
            "Quota exhausted"
        );
        return Err(AuthError::QuotaExceeded {
            class,
            current_count,
            limit,
        });
    }

    Ok(())
}
