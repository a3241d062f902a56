//! Entitlement gate: access to subscriber features needs a current subscription

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::auth::{AuthError, Principal};
use crate::store::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};

/// Subscription as seen by the rest of the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub features: BTreeSet<String>,
}

impl From<&SubscriptionRecord> for SubscriptionSnapshot {
    fn from(record: &SubscriptionRecord) -> Self {
        Self {
            id: record.id.clone(),
            plan_id: record.plan.id.clone(),
            plan_name: record.plan.name.clone(),
            status: record.status,
            end_date: record.end_date,
            features: record.plan.features.clone(),
        }
    }
}

/// Pick the subscription that currently applies.
///
/// Among current subscriptions the most recently created wins; equal creation
/// times fall back to the larger id so the choice never depends on store order.
pub fn select_current(
    subscriptions: &[SubscriptionRecord],
    now: DateTime<Utc>,
) -> Option<&SubscriptionRecord> {
    subscriptions
        .iter()
        .filter(|s| s.is_current(now))
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Require a current subscription unless the principal is an admin.
///
/// Admins always pass; they still get a snapshot if they happen to hold one.
pub async fn require_active_subscription(
    store: &dyn SubscriptionStore,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Option<SubscriptionSnapshot>, AuthError> {
    let subscriptions = store.subscriptions_for(&principal.id).await?;
    let current = select_current(&subscriptions, now).map(SubscriptionSnapshot::from);

    if current.is_none() && !principal.is_admin() {
        debug!(
            principal_id = %principal.id,
            held = subscriptions.len(),
            "No current subscription"
        );
        return Err(AuthError::SubscriptionRequired);
    }

    Ok(current)
}

/// Require the attached subscription's plan to grant `feature`.
///
/// Runs after [`require_active_subscription`]. Admins pass whatever they hold.
pub fn require_feature(
    principal: &Principal,
    subscription: Option<&SubscriptionSnapshot>,
    feature: &str,
) -> Result<(), AuthError> {
    if principal.is_admin() {
        return Ok(());
    }

    let subscription = subscription.ok_or(AuthError::SubscriptionRequired)?;
    if !subscription.features.contains(feature) {
        debug!(
            principal_id = %principal.id,
            plan = %subscription.plan_name,
            feature,
            "Feature not in plan"
        );
        return Err(AuthError::FeatureNotIncluded(feature.to_string()));
    }
    Ok(())
}
