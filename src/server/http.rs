//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is a plain match
//! on method and path segments.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{Authorizer, ResourceClass};
use crate::logging::AuditLogger;
use crate::routes::{self, error_response, not_found_response, BoxBody, MAX_BODY_BYTES};
use crate::store::{AccountStore, PlanStore, PrincipalStore, SubscriptionStore};
use crate::types::BailiffError;

/// Shared application state
pub struct AppState {
    pub authorizer: Authorizer,
    pub principals: Arc<dyn PrincipalStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub plans: Arc<dyn PlanStore>,
    pub audit: AuditLogger,
    /// "mongodb" or "memory", reported by /health
    pub storage: &'static str,
    pub dev_mode: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        authorizer: Authorizer,
        principals: Arc<dyn PrincipalStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        accounts: Arc<dyn AccountStore>,
        plans: Arc<dyn PlanStore>,
        audit: AuditLogger,
        storage: &'static str,
    ) -> Self {
        Self {
            authorizer,
            principals,
            subscriptions,
            accounts,
            plans,
            audit,
            storage,
            dev_mode: false,
            started_at: Instant::now(),
        }
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>, listen: SocketAddr) -> Result<(), BailiffError> {
    let listener = TcpListener::bind(listen).await?;

    info!("Bailiff listening on {} (storage: {})", listen, state.storage);
    if state.dev_mode {
        warn!("Development mode enabled - tokens are signed with a public secret");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Read the parts the router needs off a live request
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

    let auth_header = parts
        .headers
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let body = if matches!(parts.method, Method::POST | Method::PUT) {
        match read_body(body).await {
            Ok(bytes) => bytes,
            Err(response) => return Ok(response),
        }
    } else {
        Bytes::new()
    };

    let response = dispatch(&state, &parts.method, &target, auth_header, body).await;

    info!(
        "[{}] {} {} -> {} ({} ms)",
        addr,
        parts.method,
        parts.uri.path(),
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    Ok(response)
}

/// Collect a request body, refusing to buffer more than `MAX_BODY_BYTES`
async fn read_body<B>(body: B) -> Result<Bytes, Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => Err(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large",
        )),
        Err(err) => {
            warn!("Failed to read request body: {}", err);
            Err(error_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ))
        }
    }
}

/// Route a request to its handler. `target` is the path with an optional query.
pub async fn dispatch(
    state: &AppState,
    method: &Method,
    target: &str,
    auth_header: Option<&str>,
    body: Bytes,
) -> Response<BoxBody> {
    if *method == Method::OPTIONS {
        return routes::cors_preflight();
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (method.clone(), segments.as_slice()) {
        (Method::GET, ["health"]) | (Method::GET, ["api", "health"]) => {
            routes::health_check(state)
        }
        (Method::GET, ["version"]) => routes::version_info(),

        // Sessions and own account
        (Method::POST, ["api", "auth", "register"]) => routes::handle_register(state, &body).await,
        (Method::POST, ["api", "auth", "login"]) => routes::handle_login(state, &body).await,
        (Method::POST, ["api", "auth", "refresh-token"]) => {
            routes::handle_refresh_token(state, &body).await
        }
        (Method::GET, ["api", "auth", "profile"]) => {
            routes::handle_profile(state, auth_header).await
        }
        (Method::PUT, ["api", "auth", "profile"]) => {
            routes::handle_update_profile(state, auth_header, &body).await
        }
        (Method::POST, ["api", "auth", "change-password"]) => {
            routes::handle_change_password(state, auth_header, &body).await
        }

        // Plans and subscription
        (Method::GET, ["api", "payments", "plans"]) => {
            routes::handle_list_plans(state, auth_header).await
        }
        (Method::GET, ["api", "payments", "plans", id]) => {
            routes::handle_get_plan(state, auth_header, id).await
        }
        (Method::GET, ["api", "payments", "subscription"]) => {
            routes::handle_current_subscription(state, auth_header).await
        }

        // Account administration
        (Method::GET, ["api", "admin", "users"]) => {
            routes::handle_list_users(state, auth_header, query).await
        }
        (Method::GET, ["api", "admin", "users", id]) => {
            routes::handle_get_user(state, auth_header, id).await
        }
        (Method::PUT, ["api", "admin", "users", id, "status"]) => {
            routes::handle_update_user_status(state, auth_header, id, &body).await
        }

        // Owned resources
        (method, ["api", collection, rest @ ..]) => {
            match ResourceClass::from_plural(collection) {
                Some(class) => {
                    routes::handle_resource_request(state, &method, class, rest, auth_header, &body)
                        .await
                        .unwrap_or_else(|| not_found_response(path))
                }
                None => not_found_response(path),
            }
        }

        _ => not_found_response(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::routes::testing::{bearer, body_json, test_state};

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (state, _) = test_state().await;
        let response = dispatch(&state, &Method::GET, "/api/invoices", None, Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = dispatch(&state, &Method::PATCH, "/api/clients", None, Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resource_route_requires_token() {
        let (state, _) = test_state().await;
        let response = dispatch(&state, &Method::GET, "/api/clients", None, Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn test_login_then_create_and_read_client() {
        let (state, _) = test_state().await;

        let login = dispatch(
            &state,
            &Method::POST,
            "/api/auth/login",
            None,
            Bytes::from(r#"{"email":"u1@example.com","password":"senha-123"}"#),
        )
        .await;
        assert_eq!(login.status(), StatusCode::OK);
        let token = body_json(login).await["token"].as_str().unwrap().to_string();
        let header = format!("Bearer {token}");

        let created = dispatch(
            &state,
            &Method::POST,
            "/api/clients",
            Some(&header),
            Bytes::from(r#"{"name":"Cliente Um"}"#),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let id = body_json(created).await["client"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let fetched = dispatch(
            &state,
            &Method::GET,
            &format!("/api/clients/{id}"),
            Some(&header),
            Bytes::new(),
        )
        .await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_json(fetched).await["client"]["attributes"]["name"], "Cliente Um");
    }

    #[tokio::test]
    async fn test_query_string_reaches_user_list() {
        let (state, codec) = test_state().await;
        let admin = bearer(&codec, "a1", Role::Admin);

        let response = dispatch(
            &state,
            &Method::GET,
            "/api/admin/users?search=inactive&limit=5",
            Some(&admin),
            Bytes::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["pagination"]["limit"], 5);
        assert_eq!(body["users"][0]["id"], "inactive");
    }

    #[tokio::test]
    async fn test_register_and_browse_plans() {
        let (state, _) = test_state().await;

        let registered = dispatch(
            &state,
            &Method::POST,
            "/api/auth/register",
            None,
            Bytes::from(r#"{"name":"Bruno","email":"bruno@example.com","password":"segredo-1"}"#),
        )
        .await;
        assert_eq!(registered.status(), StatusCode::CREATED);

        let login = dispatch(
            &state,
            &Method::POST,
            "/api/auth/login",
            None,
            Bytes::from(r#"{"email":"bruno@example.com","password":"segredo-1"}"#),
        )
        .await;
        let token = body_json(login).await["token"].as_str().unwrap().to_string();
        let header = format!("Bearer {token}");

        let plan = dispatch(
            &state,
            &Method::GET,
            "/api/payments/plans/trial",
            Some(&header),
            Bytes::new(),
        )
        .await;
        assert_eq!(plan.status(), StatusCode::OK);
        assert_eq!(body_json(plan).await["plan"]["name"], "Teste Gratuito");
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let oversized = http_body_util::Full::new(Bytes::from(vec![b'a'; MAX_BODY_BYTES + 1]));
        let response = read_body(oversized).await.unwrap_err();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let at_limit = http_body_util::Full::new(Bytes::from(vec![b'a'; MAX_BODY_BYTES]));
        assert_eq!(read_body(at_limit).await.unwrap().len(), MAX_BODY_BYTES);
    }

    #[tokio::test]
    async fn test_health_and_preflight() {
        let (state, _) = test_state().await;
        let response = dispatch(&state, &Method::GET, "/health", None, Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["storage"], "memory");

        let response = dispatch(&state, &Method::OPTIONS, "/api/clients", None, Bytes::new()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
