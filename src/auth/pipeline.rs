//! The authorization pipeline
//!
//! A route declares a [`Policy`]: an ordered list of [`Guard`]s. The
//! [`Authorizer`] decodes the bearer token, resolves the principal, then runs
//! the guards in order. The first failure ends the request; later guards are
//! never consulted.
//!
//! ```text
//! Unauthenticated -> TokenDecoded -> PrincipalResolved -> guards... -> Authorized
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

use crate::auth::{
    require_active_subscription, require_feature, require_ownership, require_role,
    require_within_quota, resolve_principal, Access, AuthContext, AuthError, Operation, QuotaTable, RequestParts,
    ResourceClass, ResourceRegistry, Role, TokenCodec,
};
use crate::logging::{AuditKind, AuditLogger};
use crate::store::{PrincipalStore, SubscriptionStore};

/// One check a route can require after the principal is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Role(Role),
    Ownership(ResourceClass),
    ActiveSubscription,
    /// Plan capability string, e.g. "AI_CHAT"
    Feature(&'static str),
    Quota(ResourceClass),
}

/// Ordered guard list for a route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    guards: Vec<Guard>,
}

impl Policy {
    /// Token and live account only
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn require_role(self, role: Role) -> Self {
        self.then(Guard::Role(role))
    }

    pub fn owner_of(self, class: ResourceClass) -> Self {
        self.then(Guard::Ownership(class))
    }

    pub fn subscribed(self) -> Self {
        self.then(Guard::ActiveSubscription)
    }

    /// Feature and quota guards read the subscription snapshot, so the
    /// entitlement guard is added first when the policy does not have it yet.
    fn with_snapshot(self) -> Self {
        if self.guards.contains(&Guard::ActiveSubscription) {
            self
        } else {
            self.subscribed()
        }
    }

    pub fn with_feature(self, feature: &'static str) -> Self {
        self.with_snapshot().then(Guard::Feature(feature))
    }

    pub fn within_quota(self, class: ResourceClass) -> Self {
        self.with_snapshot().then(Guard::Quota(class))
    }

    pub fn then(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }
}

/// Runs policies against incoming requests
#[derive(Clone)]
pub struct Authorizer {
    codec: TokenCodec,
    principals: Arc<dyn PrincipalStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    resources: ResourceRegistry,
    quotas: QuotaTable,
    audit: AuditLogger,
    clock: fn() -> DateTime<Utc>,
}

impl Authorizer {
    pub fn new(
        codec: TokenCodec,
        principals: Arc<dyn PrincipalStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        resources: ResourceRegistry,
        quotas: QuotaTable,
        audit: AuditLogger,
    ) -> Self {
        Self {
            codec,
            principals,
            subscriptions,
            resources,
            quotas,
            audit,
            clock: Utc::now,
        }
    }

    /// Replace the time source (tests pin it)
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Run `policy` against a request, logging the rejection if there is one.
    pub async fn authorize(
        &self,
        request: &RequestParts<'_>,
        policy: &Policy,
    ) -> Result<AuthContext, AuthError> {
        let result = self.run(request, policy).await;

        if let Err(ref e) = result {
            if e.is_server_fault() {
                error!(
                    error = %e,
                    operation = ?request.operation,
                    "Authorization failed on a server fault"
                );
            } else {
                debug!(error = %e, operation = ?request.operation, "Request rejected");
            }
        }

        result
    }

    async fn run(
        &self,
        request: &RequestParts<'_>,
        policy: &Policy,
    ) -> Result<AuthContext, AuthError> {
        let now = (self.clock)();

        let claims = self.codec.decode_at(request.auth_header, now.timestamp())?;
        let principal = resolve_principal(self.principals.as_ref(), &claims).await?;
        let mut context = AuthContext::new(principal);

        for guard in policy.guards() {
            context = self.check(*guard, context, request, now).await?;
        }

        Ok(context)
    }

    async fn check(
        &self,
        guard: Guard,
        context: AuthContext,
        request: &RequestParts<'_>,
        now: DateTime<Utc>,
    ) -> Result<AuthContext, AuthError> {
        match guard {
            Guard::Role(role) => {
                require_role(context.principal(), role)?;
                Ok(context)
            }
            Guard::Ownership(class) => {
                let access = require_ownership(
                    &self.resources,
                    class,
                    request.resource_id,
                    context.principal(),
                )
                .await?;

                if let Access::AdminOverride { owner_id } = access {
                    self.audit
                        .log_ownership_override(
                            context.principal(),
                            class,
                            request.resource_id.unwrap_or_default(),
                            owner_id,
                            request.operation,
                        )
                        .await;
                }
                Ok(context)
            }
            Guard::ActiveSubscription => {
                let snapshot = require_active_subscription(
                    self.subscriptions.as_ref(),
                    context.principal(),
                    now,
                )
                .await?;

                if snapshot.is_none() {
                    // only admins get here without a snapshot
                    self.audit
                        .log_gate_bypass(
                            context.principal(),
                            AuditKind::EntitlementBypass,
                            None,
                            request.operation,
                        )
                        .await;
                }
                Ok(context.with_subscription(snapshot))
            }
            Guard::Feature(feature) => {
                require_feature(context.principal(), context.subscription(), feature)?;

                let granted = context
                    .subscription()
                    .is_some_and(|s| s.features.contains(feature));
                if context.principal().is_admin() && !granted {
                    self.audit
                        .log_gate_bypass(
                            context.principal(),
                            AuditKind::FeatureBypass,
                            None,
                            request.operation,
                        )
                        .await;
                }
                Ok(context)
            }
            Guard::Quota(class) => {
                require_within_quota(
                    &self.resources,
                    &self.quotas,
                    class,
                    context.principal(),
                    context.subscription(),
                    request.operation,
                )
                .await?;

                if context.principal().is_admin() && request.operation == Operation::Create {
                    self.audit
                        .log_gate_bypass(
                            context.principal(),
                            AuditKind::QuotaBypass,
                            Some(class),
                            request.operation,
                        )
                        .await;
                }
                Ok(context)
            }
        }
    }
}
