//! Account administration (ADMIN role only)
//!
//! - GET /api/admin/users              - paged account list, `?page=&limit=&search=`
//! - GET /api/admin/users/{id}         - account detail with subscriptions and resource counts
//! - PUT /api/admin/users/{id}/status  - activate or deactivate an account

use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::auth::{AuthContext, Operation, Policy, RequestParts, ResourceClass, Role};
use crate::routes::auth_routes::UserView;
use crate::routes::subscription::SubscriptionView;
use crate::routes::{
    error_response, failure_response, json_response, parse_json, rejection_response, BoxBody,
};
use crate::server::AppState;
use crate::store::PrincipalQuery;
use crate::types::BailiffError;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

impl ListUsersQuery {
    fn parse(raw: &str) -> Result<Self, BailiffError> {
        serde_urlencoded::from_str(raw)
            .map_err(|e| BailiffError::BadRequest(format!("Invalid query: {e}")))
    }

    fn into_principal_query(self) -> PrincipalQuery {
        PrincipalQuery {
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            page: self.page.unwrap_or(1).max(1),
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Serialize)]
struct Pagination {
    total: u64,
    page: u64,
    limit: u64,
    pages: u64,
}

#[derive(Debug, Serialize)]
struct UserListResponse {
    error: bool,
    users: Vec<UserView>,
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDetailResponse {
    error: bool,
    user: UserView,
    subscriptions: Vec<SubscriptionView>,
    resource_counts: BTreeMap<ResourceClass, u64>,
}

#[derive(Debug, Serialize)]
struct UpdateStatusResponse {
    error: bool,
    message: String,
    user: UserView,
}

async fn require_admin(
    state: &AppState,
    auth_header: Option<&str>,
    operation: Operation,
) -> Result<AuthContext, Response<BoxBody>> {
    let request = RequestParts::new(auth_header, operation);
    state
        .authorizer
        .authorize(&request, &Policy::authenticated().require_role(Role::Admin))
        .await
        .map_err(|e| rejection_response(&e))
}

/// GET /api/admin/users
pub async fn handle_list_users(
    state: &AppState,
    auth_header: Option<&str>,
    query: &str,
) -> Response<BoxBody> {
    if let Err(resp) = require_admin(state, auth_header, Operation::Read).await {
        return resp;
    }

    let query = match ListUsersQuery::parse(query) {
        Ok(q) => q.into_principal_query(),
        Err(e) => return failure_response(&e),
    };

    let page = match state.accounts.list_principals(&query).await {
        Ok(p) => p,
        Err(e) => return failure_response(&e),
    };

    json_response(
        StatusCode::OK,
        &UserListResponse {
            error: false,
            users: page.principals.iter().map(UserView::from).collect(),
            pagination: Pagination {
                total: page.total,
                page: query.page,
                limit: query.limit,
                pages: page.total.div_ceil(query.limit),
            },
        },
    )
}

/// GET /api/admin/users/{id}
pub async fn handle_get_user(
    state: &AppState,
    auth_header: Option<&str>,
    user_id: &str,
) -> Response<BoxBody> {
    if let Err(resp) = require_admin(state, auth_header, Operation::Read).await {
        return resp;
    }

    let record = match state.principals.principal_by_id(user_id).await {
        Ok(Some(r)) => r,
        Ok(None) => return failure_response(&BailiffError::NotFound("User not found".into())),
        Err(e) => return failure_response(&e),
    };

    let subscriptions = match state.subscriptions.subscriptions_for(user_id).await {
        Ok(s) => s,
        Err(e) => return failure_response(&e),
    };

    let mut resource_counts = BTreeMap::new();
    let registry = state.authorizer.resources();
    for class in ResourceClass::ALL {
        let Ok(store) = registry.lookup(class) else {
            continue;
        };
        match store.count_owned_by(user_id).await {
            Ok(count) => {
                resource_counts.insert(class, count);
            }
            Err(e) => return failure_response(&e),
        }
    }

    json_response(
        StatusCode::OK,
        &UserDetailResponse {
            error: false,
            user: UserView::from(&record),
            subscriptions: subscriptions.into_iter().map(SubscriptionView::from).collect(),
            resource_counts,
        },
    )
}

/// PUT /api/admin/users/{id}/status
///
/// An admin may not deactivate their own account.
pub async fn handle_update_user_status(
    state: &AppState,
    auth_header: Option<&str>,
    user_id: &str,
    body: &[u8],
) -> Response<BoxBody> {
    let ctx = match require_admin(state, auth_header, Operation::Update).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let request: UpdateStatusRequest = match parse_json(body) {
        Ok(r) => r,
        Err(e) => return failure_response(&e),
    };
    let Some(is_active) = request.is_active else {
        return error_response(StatusCode::BAD_REQUEST, "Status (isActive) is required");
    };

    let mut record = match state.principals.principal_by_id(user_id).await {
        Ok(Some(r)) => r,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => return failure_response(&e),
    };

    if record.id == ctx.principal().id && !is_active {
        return error_response(StatusCode::BAD_REQUEST, "You cannot deactivate your own account");
    }

    match state.principals.set_active(user_id, is_active).await {
        Ok(true) => {}
        Ok(false) => return error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => return failure_response(&e),
    }
    record.active = is_active;

    state
        .audit
        .log_status_change(ctx.principal(), user_id, is_active)
        .await;
    info!(
        admin_id = %ctx.principal().id,
        target_id = %user_id,
        is_active,
        "Account status changed"
    );

    json_response(
        StatusCode::OK,
        &UpdateStatusResponse {
            error: false,
            message: format!(
                "User {} successfully",
                if is_active { "activated" } else { "deactivated" }
            ),
            user: UserView::from(&record),
        },
    )
}
