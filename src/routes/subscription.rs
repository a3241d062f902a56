//! Plan catalogue and the caller's subscription
//!
//! - GET /api/payments/plans         - every plan, cheapest first
//! - GET /api/payments/plans/{id}    - one plan
//! - GET /api/payments/subscription  - the caller's latest subscription, in any status
//!
//! None of these are entitlement-gated.

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::auth::{AuthContext, Operation, Policy, RequestParts};
use crate::routes::{error_response, failure_response, json_response, rejection_response, BoxBody};
use crate::server::AppState;
use crate::store::{Plan, SubscriptionRecord, SubscriptionStatus};
use crate::types::BailiffError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub id: String,
    pub status: SubscriptionStatus,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub plan: Plan,
}

impl From<SubscriptionRecord> for SubscriptionView {
    fn from(record: SubscriptionRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            end_date: record.end_date,
            created_at: record.created_at,
            plan: record.plan,
        }
    }
}

#[derive(Debug, Serialize)]
struct SubscriptionResponse {
    error: bool,
    subscription: SubscriptionView,
}

#[derive(Debug, Serialize)]
struct PlansResponse {
    error: bool,
    plans: Vec<Plan>,
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    error: bool,
    plan: Plan,
}

async fn signed_in(
    state: &AppState,
    auth_header: Option<&str>,
) -> Result<AuthContext, Response<BoxBody>> {
    let request = RequestParts::new(auth_header, Operation::Read);
    state
        .authorizer
        .authorize(&request, &Policy::authenticated())
        .await
        .map_err(|e| rejection_response(&e))
}

/// GET /api/payments/plans
pub async fn handle_list_plans(state: &AppState, auth_header: Option<&str>) -> Response<BoxBody> {
    if let Err(resp) = signed_in(state, auth_header).await {
        return resp;
    }

    match state.plans.plans().await {
        Ok(plans) => json_response(StatusCode::OK, &PlansResponse { error: false, plans }),
        Err(e) => failure_response(&e),
    }
}

/// GET /api/payments/plans/{id}
pub async fn handle_get_plan(
    state: &AppState,
    auth_header: Option<&str>,
    plan_id: &str,
) -> Response<BoxBody> {
    if let Err(resp) = signed_in(state, auth_header).await {
        return resp;
    }

    let result = match state.plans.plan_by_id(plan_id).await {
        Ok(Some(plan)) => Ok(plan),
        Ok(None) => Err(BailiffError::NotFound("Plan not found".into())),
        Err(e) => Err(e),
    };
    match result {
        Ok(plan) => json_response(StatusCode::OK, &PlanResponse { error: false, plan }),
        Err(e) => failure_response(&e),
    }
}

/// A lapsed subscriber must still be able to see why.
pub async fn handle_current_subscription(
    state: &AppState,
    auth_header: Option<&str>,
) -> Response<BoxBody> {
    let ctx = match signed_in(state, auth_header).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let subscriptions = match state.subscriptions.subscriptions_for(&ctx.principal().id).await {
        Ok(s) => s,
        Err(e) => return failure_response(&e),
    };

    let latest = subscriptions
        .into_iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    match latest {
        Some(record) => json_response(
            StatusCode::OK,
            &SubscriptionResponse {
                error: false,
                subscription: record.into(),
            },
        ),
        None => error_response(StatusCode::NOT_FOUND, "No subscription found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::routes::testing::{bearer, body_json, test_state};

    #[tokio::test]
    async fn test_subscriber_sees_plan() {
        let (state, codec) = test_state().await;
        let header = bearer(&codec, "u1", Role::Standard);

        let response = handle_current_subscription(&state, Some(&header)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["subscription"]["status"], "ACTIVE");
        assert_eq!(body["subscription"]["plan"]["name"], "Básico");
    }

    #[tokio::test]
    async fn test_no_subscription_is_404() {
        let (state, codec) = test_state().await;
        let header = bearer(&codec, "u2", Role::Standard);
        let response = handle_current_subscription(&state, Some(&header)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plans_listed_cheapest_first() {
        let (state, codec) = test_state().await;
        // lapsed accounts can still shop for a plan
        let header = bearer(&codec, "u2", Role::Standard);

        let response = handle_list_plans(&state, Some(&header)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let names: Vec<&str> = body["plans"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Teste Gratuito", "Básico"]);

        assert_eq!(
            handle_list_plans(&state, None).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_single_plan() {
        let (state, codec) = test_state().await;
        let header = bearer(&codec, "u1", Role::Standard);

        let response = handle_get_plan(&state, Some(&header), "p1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["plan"]["name"], "Básico");
        assert_eq!(body["plan"]["priceCents"], 9_900);

        let response = handle_get_plan(&state, Some(&header), "p9").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Plan not found");
    }
}
