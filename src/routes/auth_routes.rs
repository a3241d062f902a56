//! HTTP routes for sessions and the caller's own account
//!
//! - POST /api/auth/register         - create a STANDARD account, with a trial if one is on offer
//! - POST /api/auth/login            - password login, returns access and refresh tokens
//! - POST /api/auth/refresh-token    - trade a refresh token for a new access token
//! - GET  /api/auth/profile          - the caller's account and current subscription
//! - PUT  /api/auth/profile          - change name or email
//! - POST /api/auth/change-password  - change password, current one required

use chrono::{Duration, Utc};
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{
    hash_password, select_current, verify_password, AuthContext, AuthError, Operation, Policy,
    RequestParts, Role, SubscriptionSnapshot,
};
use crate::routes::{
    error_response, failure_response, json_response, parse_json, rejection_response, BoxBody,
};
use crate::server::AppState;
use crate::store::{PrincipalRecord, ProfileUpdate, SubscriptionRecord, SubscriptionStatus};

/// Plan granted to every new account when it exists in the catalogue
pub const TRIAL_PLAN_NAME: &str = "Teste Gratuito";
const TRIAL_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Account as returned to its owner (never includes the password hash)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
}

impl From<&PrincipalRecord> for UserView {
    fn from(record: &PrincipalRecord) -> Self {
        Self {
            id: record.id.clone(),
            email: record.email.clone(),
            name: record.name.clone(),
            role: record.role,
            is_active: record.active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub error: bool,
    pub message: &'static str,
    pub user: UserView,
    pub token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub error: bool,
    pub message: &'static str,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub error: bool,
    pub message: &'static str,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub error: bool,
    pub user: UserView,
    pub subscription: Option<SubscriptionSnapshot>,
}

const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn authenticated(
    state: &AppState,
    auth_header: Option<&str>,
    operation: Operation,
) -> Result<AuthContext, Response<BoxBody>> {
    state
        .authorizer
        .authorize(&RequestParts::new(auth_header, operation), &Policy::authenticated())
        .await
        .map_err(|e| rejection_response(&e))
}

/// POST /api/auth/register
///
/// New accounts are always STANDARD. When the catalogue holds the trial plan
/// the account starts with a week of it.
pub async fn handle_register(state: &AppState, body: &[u8]) -> Response<BoxBody> {
    let request: RegisterRequest = match parse_json(body) {
        Ok(r) => r,
        Err(e) => return failure_response(&e),
    };

    let name = request.name.trim();
    let email = request.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || request.password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Name, email and password are required",
        );
    }

    let password_hash = match hash_password(&request.password) {
        Ok(h) => h,
        Err(e) => return failure_response(&e),
    };

    let record = PrincipalRecord {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        name: name.to_string(),
        password_hash,
        role: Role::Standard,
        active: true,
    };
    if let Err(e) = state.accounts.create_principal(record.clone()).await {
        return failure_response(&e);
    }
    info!(principal_id = %record.id, "Account registered");

    match state.plans.plan_by_name(TRIAL_PLAN_NAME).await {
        Ok(Some(plan)) => {
            let now = Utc::now();
            let trial = SubscriptionRecord {
                id: uuid::Uuid::new_v4().to_string(),
                principal_id: record.id.clone(),
                plan,
                status: SubscriptionStatus::Active,
                end_date: Some(now + Duration::days(TRIAL_DAYS)),
                created_at: now,
            };
            if let Err(e) = state.plans.create_subscription(trial).await {
                warn!(principal_id = %record.id, error = %e, "Trial subscription not created");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Trial plan lookup failed"),
    }

    json_response(
        StatusCode::CREATED,
        &AccountResponse {
            error: false,
            message: "Account registered",
            user: UserView::from(&record),
        },
    )
}

/// POST /api/auth/login
pub async fn handle_login(state: &AppState, body: &[u8]) -> Response<BoxBody> {
    let request: LoginRequest = match parse_json(body) {
        Ok(r) => r,
        Err(e) => return failure_response(&e),
    };

    if request.email.trim().is_empty() || request.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Email and password are required");
    }

    let record = match state.principals.principal_by_email(request.email.trim()).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            state.audit.log_login_attempt(false, None).await;
            return error_response(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS);
        }
        Err(e) => return failure_response(&e),
    };

    if !record.active {
        state.audit.log_login_attempt(false, Some(&record.id)).await;
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Account inactive. Contact support.",
        );
    }

    match verify_password(&request.password, &record.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            state.audit.log_login_attempt(false, Some(&record.id)).await;
            return error_response(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS);
        }
        Err(e) => return failure_response(&e),
    }

    let codec = state.authorizer.codec();
    let access = match codec.issue_access(&record.id, record.role) {
        Ok(t) => t,
        Err(e) => return failure_response(&e),
    };
    let refresh = match codec.issue_refresh(&record.id) {
        Ok(t) => t,
        Err(e) => return failure_response(&e),
    };

    state.audit.log_login_attempt(true, Some(&record.id)).await;
    info!(principal_id = %record.id, "Login succeeded");

    json_response(
        StatusCode::OK,
        &LoginResponse {
            error: false,
            message: "Login successful",
            user: UserView::from(&record),
            token: access.token,
            refresh_token: refresh.token,
            expires_at: access.expires_at,
        },
    )
}

/// POST /api/auth/refresh-token
///
/// The account is re-checked: a deactivated account cannot refresh.
pub async fn handle_refresh_token(state: &AppState, body: &[u8]) -> Response<BoxBody> {
    let request: RefreshRequest = match parse_json(body) {
        Ok(r) => r,
        Err(e) => return failure_response(&e),
    };

    if request.refresh_token.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Refresh token not provided");
    }

    let codec = state.authorizer.codec();
    let claims = match codec.decode_refresh(&request.refresh_token) {
        Ok(c) => c,
        Err(e) => return rejection_response(&e),
    };

    let record = match state.principals.principal_by_id(&claims.sub).await {
        Ok(Some(r)) if r.active => r,
        Ok(Some(_)) => return rejection_response(&AuthError::PrincipalInactive),
        Ok(None) => return rejection_response(&AuthError::PrincipalNotFound),
        Err(e) => return failure_response(&e),
    };

    match codec.issue_access(&record.id, record.role) {
        Ok(access) => json_response(
            StatusCode::OK,
            &RefreshResponse {
                error: false,
                message: "Token refreshed",
                token: access.token,
                expires_at: access.expires_at,
            },
        ),
        Err(e) => failure_response(&e),
    }
}

/// GET /api/auth/profile
pub async fn handle_profile(state: &AppState, auth_header: Option<&str>) -> Response<BoxBody> {
    let ctx = match authenticated(state, auth_header, Operation::Read).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let record = match state.principals.principal_by_id(&ctx.principal().id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            warn!(principal_id = %ctx.principal().id, "Account vanished after authorization");
            return error_response(StatusCode::NOT_FOUND, "User not found");
        }
        Err(e) => return failure_response(&e),
    };

    let subscriptions = match state.subscriptions.subscriptions_for(&record.id).await {
        Ok(s) => s,
        Err(e) => return failure_response(&e),
    };

    json_response(
        StatusCode::OK,
        &ProfileResponse {
            error: false,
            user: UserView::from(&record),
            subscription: select_current(&subscriptions, Utc::now())
                .map(SubscriptionSnapshot::from),
        },
    )
}

/// PUT /api/auth/profile
pub async fn handle_update_profile(
    state: &AppState,
    auth_header: Option<&str>,
    body: &[u8],
) -> Response<BoxBody> {
    let ctx = match authenticated(state, auth_header, Operation::Update).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let request: UpdateProfileRequest = match parse_json(body) {
        Ok(r) => r,
        Err(e) => return failure_response(&e),
    };
    let update = ProfileUpdate {
        name: non_blank(request.name),
        email: non_blank(request.email).map(|e| e.to_lowercase()),
    };

    match state.accounts.update_profile(&ctx.principal().id, update).await {
        Ok(Some(record)) => json_response(
            StatusCode::OK,
            &AccountResponse {
                error: false,
                message: "Profile updated",
                user: UserView::from(&record),
            },
        ),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => failure_response(&e),
    }
}

/// POST /api/auth/change-password
pub async fn handle_change_password(
    state: &AppState,
    auth_header: Option<&str>,
    body: &[u8],
) -> Response<BoxBody> {
    let ctx = match authenticated(state, auth_header, Operation::Update).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let request: ChangePasswordRequest = match parse_json(body) {
        Ok(r) => r,
        Err(e) => return failure_response(&e),
    };
    if request.current_password.is_empty() || request.new_password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Current and new password are required",
        );
    }

    let record = match state.principals.principal_by_id(&ctx.principal().id).await {
        Ok(Some(r)) => r,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => return failure_response(&e),
    };

    match verify_password(&request.current_password, &record.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            return error_response(StatusCode::UNAUTHORIZED, "Current password is incorrect")
        }
        Err(e) => return failure_response(&e),
    }

    let new_hash = match hash_password(&request.new_password) {
        Ok(h) => h,
        Err(e) => return failure_response(&e),
    };
    match state.accounts.set_password_hash(&record.id, &new_hash).await {
        Ok(true) => {}
        Ok(false) => return error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => return failure_response(&e),
    }

    info!(principal_id = %record.id, "Password changed");
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "error": false, "message": "Password changed" }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{bearer, body_json, test_state};

    async fn login(state: &AppState, email: &str, password: &str) -> Response<BoxBody> {
        let body = serde_json::json!({ "email": email, "password": password }).to_string();
        handle_login(state, body.as_bytes()).await
    }

    #[tokio::test]
    async fn test_login_success_returns_both_tokens() {
        let (state, _) = test_state().await;
        let response = login(&state, "u1@example.com", "senha-123").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["error"], false);
        assert_eq!(body["user"]["id"], "u1");
        assert!(body["user"].get("passwordHash").is_none());
        assert!(body["token"].is_string());
        assert!(body["refreshToken"].is_string());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (state, _) = test_state().await;
        assert_eq!(
            login(&state, "u1@example.com", "wrong").await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            login(&state, "nobody@example.com", "senha-123").await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            login(&state, "inactive@example.com", "senha-123").await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(login(&state, "", "").await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_issues_access_token() {
        let (state, codec) = test_state().await;
        let refresh = codec.issue_refresh("u1").unwrap().token;
        let body = serde_json::json!({ "refreshToken": refresh }).to_string();

        let response = handle_refresh_token(&state, body.as_bytes()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let token = body_json(response).await["token"].as_str().unwrap().to_string();
        let header = format!("Bearer {token}");
        assert_eq!(
            handle_profile(&state, Some(&header)).await.status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let (state, codec) = test_state().await;
        let access = codec.issue_access("u1", Role::Standard).unwrap().token;
        let body = serde_json::json!({ "refreshToken": access }).to_string();

        let response = handle_refresh_token(&state, body.as_bytes()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_refresh() {
        let (state, codec) = test_state().await;
        let refresh = codec.issue_refresh("inactive").unwrap().token;
        let body = serde_json::json!({ "refreshToken": refresh }).to_string();

        let response = handle_refresh_token(&state, body.as_bytes()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_profile_includes_current_subscription() {
        let (state, codec) = test_state().await;
        let header = format!("Bearer {}", codec.issue_access("u1", Role::Standard).unwrap().token);

        let body = body_json(handle_profile(&state, Some(&header)).await).await;
        assert_eq!(body["user"]["email"], "u1@example.com");
        assert_eq!(body["subscription"]["planName"], "Básico");
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (state, _) = test_state().await;
        let body =
            br#"{"name":"Dra. Carla","email":"Carla@Escritorio.com.br","password":"segredo-1"}"#;

        let response = handle_register(&state, body).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "carla@escritorio.com.br");
        assert_eq!(body["user"]["role"], "STANDARD");
        assert!(body["user"].get("passwordHash").is_none());

        let response = login(&state, "carla@escritorio.com.br", "segredo-1").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_grants_trial_subscription() {
        let (state, _) = test_state().await;
        let response = handle_register(
            &state,
            br#"{"name":"Novo","email":"novo@example.com","password":"segredo-1"}"#,
        )
        .await;
        let id = body_json(response).await["user"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let subscriptions = state.subscriptions.subscriptions_for(&id).await.unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].plan.name, TRIAL_PLAN_NAME);
        assert!(subscriptions[0].is_current(Utc::now()));
        assert!(!subscriptions[0].is_current(Utc::now() + Duration::days(TRIAL_DAYS)));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_blanks() {
        let (state, _) = test_state().await;
        let response = handle_register(
            &state,
            br#"{"name":"Outro","email":"U1@example.com","password":"segredo-1"}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response =
            handle_register(&state, br#"{"name":" ","email":"x@example.com","password":"p"}"#)
                .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (state, codec) = test_state().await;
        let header = bearer(&codec, "u1", Role::Standard);

        let response =
            handle_update_profile(&state, Some(&header), br#"{"name":"Ana Souza"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["name"], "Ana Souza");
        assert_eq!(body["user"]["email"], "u1@example.com");

        let response =
            handle_update_profile(&state, Some(&header), br#"{"email":"u2@example.com"}"#).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = handle_update_profile(&state, None, br#"{"name":"X"}"#).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (state, codec) = test_state().await;
        let header = bearer(&codec, "u1", Role::Standard);

        let response = handle_change_password(
            &state,
            Some(&header),
            br#"{"currentPassword":"wrong","newPassword":"nova-senha"}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = handle_change_password(
            &state,
            Some(&header),
            br#"{"currentPassword":"senha-123","newPassword":"nova-senha"}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            login(&state, "u1@example.com", "senha-123").await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            login(&state, "u1@example.com", "nova-senha").await.status(),
            StatusCode::OK
        );

        let response =
            handle_change_password(&state, Some(&header), br#"{"currentPassword":"x"}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
