//! Response helpers shared by every route

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::auth::{AuthError, Rejection};
use crate::types::BailiffError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest JSON body a route will read
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn with_cors(mut response: Response<BoxBody>) -> Response<BoxBody> {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    with_cors(response)
}

/// `{error: true, message}` with the given status
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response<BoxBody> {
    json_response(status, &Rejection::new(message))
}

/// Map a gate rejection to its status and body
pub fn rejection_response(err: &AuthError) -> Response<BoxBody> {
    json_response(err.status_code(), &err.to_rejection())
}

/// Map an infrastructure failure; detail stays in the log
pub fn failure_response(err: &BailiffError) -> Response<BoxBody> {
    if err.status_code().is_server_error() {
        error!(error = %err, "Request failed");
    }
    error_response(err.status_code(), err.public_message())
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    error_response(StatusCode::NOT_FOUND, format!("No route for {path}"))
}

pub fn cors_preflight() -> Response<BoxBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    with_cors(response)
}

/// Decode a JSON request body
pub fn parse_json<T: for<'de> serde::Deserialize<'de>>(body: &[u8]) -> Result<T, BailiffError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(BailiffError::BadRequest("Request body too large".into()));
    }
    serde_json::from_slice(body).map_err(|e| BailiffError::BadRequest(format!("Invalid JSON: {e}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::auth::{
        hash_password, Authorizer, QuotaTable, ResourceClass, ResourceRegistry, Role, TokenCodec,
    };
    use crate::logging::AuditLogger;
    use crate::server::AppState;
    use crate::store::{
        MemoryResourceStore, MemoryStore, Plan, PrincipalRecord, SubscriptionRecord,
        SubscriptionStatus,
    };
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    /// Read a response back as JSON
    pub async fn body_json(response: Response<BoxBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// In-memory app with four accounts, all with password `senha-123`:
    /// `u1` (Básico subscriber), `u2` (no subscription), `a1` (admin),
    /// `inactive` (deactivated). The catalogue holds Básico and the free trial.
    pub async fn test_state() -> (AppState, TokenCodec) {
        let accounts = MemoryStore::new();
        let password_hash = hash_password("senha-123").unwrap();

        for (id, role, active) in [
            ("u1", Role::Standard, true),
            ("u2", Role::Standard, true),
            ("a1", Role::Admin, true),
            ("inactive", Role::Standard, false),
        ] {
            accounts
                .insert_principal(PrincipalRecord {
                    id: id.into(),
                    email: format!("{id}@example.com"),
                    name: id.to_uppercase(),
                    password_hash: password_hash.clone(),
                    role,
                    active,
                })
                .await;
        }

        let basic = Plan {
            id: "p1".into(),
            name: "Básico".into(),
            price_cents: 9_900,
            features: BTreeSet::from(["AI_CHAT".to_string()]),
        };
        accounts.insert_plan(basic.clone()).await;
        accounts
            .insert_plan(Plan {
                id: "trial".into(),
                name: "Teste Gratuito".into(),
                price_cents: 0,
                features: BTreeSet::new(),
            })
            .await;

        accounts
            .insert_subscription(SubscriptionRecord {
                id: "s1".into(),
                principal_id: "u1".into(),
                plan: basic,
                status: SubscriptionStatus::Active,
                end_date: Some(Utc::now() + Duration::days(10)),
                created_at: Utc::now() - Duration::days(20),
            })
            .await;

        let mut registry = ResourceRegistry::new();
        for class in ResourceClass::ALL {
            registry = registry.register(class, Arc::new(MemoryResourceStore::new()));
        }

        let codec = TokenCodec::new_dev();
        let shared = Arc::new(accounts);
        let audit = AuditLogger::new();
        let authorizer = Authorizer::new(
            codec.clone(),
            shared.clone(),
            shared.clone(),
            registry,
            QuotaTable::default(),
            audit.clone(),
        );

        (
            AppState::new(
                authorizer,
                shared.clone(),
                shared.clone(),
                shared.clone(),
                shared,
                audit,
                "memory",
            ),
            codec,
        )
    }

    pub fn bearer(codec: &TokenCodec, id: &str, role: Role) -> String {
        format!("Bearer {}", codec.issue_access(id, role).unwrap().token)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::body_json;
    use super::*;
    use crate::auth::ResourceClass;

    #[tokio::test]
    async fn test_quota_rejection_body() {
        let err = AuthError::QuotaExceeded {
            class: ResourceClass::Client,
            current_count: 10,
            limit: 10,
        };
        let response = rejection_response(&err);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["requiresUpgrade"], true);
        assert_eq!(body["currentCount"], 10);
        assert_eq!(body["limit"], 10);
        assert!(body.get("requiresSubscription").is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_is_generic() {
        let response = failure_response(&BailiffError::Database("socket closed".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        let err = parse_json::<serde_json::Value>(b"{not json").unwrap_err();
        assert!(matches!(err, BailiffError::BadRequest(_)));
    }
}
