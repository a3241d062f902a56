//! CRUD for owned resources: /api/{clients,processes,documents,appointments}
//!
//! Every route needs a current subscription. Item routes add the ownership
//! gate, and creating a client, process or document adds the quota gate.
//! Appointments have no plan limit.

use hyper::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::auth::{AuthContext, Operation, Policy, RequestParts, ResourceClass};
use crate::routes::{
    error_response, failure_response, json_response, parse_json, rejection_response, BoxBody,
};
use crate::server::AppState;
use crate::store::{ResourceRecord, ResourceStore};
use crate::types::BailiffError;

/// Classes whose creation counts against the plan
const QUOTA_GATED: [ResourceClass; 3] = [
    ResourceClass::Client,
    ResourceClass::Process,
    ResourceClass::Document,
];

fn policy_for(class: ResourceClass, operation: Operation, has_id: bool) -> Policy {
    let policy = Policy::authenticated().subscribed();
    if has_id {
        policy.owner_of(class)
    } else if operation == Operation::Create && QUOTA_GATED.contains(&class) {
        policy.within_quota(class)
    } else {
        policy
    }
}

/// Route a resource request. Returns None when no route matches.
pub async fn handle_resource_request(
    state: &AppState,
    method: &Method,
    class: ResourceClass,
    rest: &[&str],
    auth_header: Option<&str>,
    body: &[u8],
) -> Option<Response<BoxBody>> {
    let resource_id = match rest {
        [] => None,
        [id] => Some(*id),
        _ => return None,
    };

    let operation = Operation::from_method(method);
    match (operation, resource_id) {
        (Operation::Read, None) | (Operation::Create, None) => {}
        (Operation::Read | Operation::Update | Operation::Delete, Some(_)) => {}
        _ => return None,
    }

    let mut request = RequestParts::new(auth_header, operation);
    if let Some(id) = resource_id {
        request = request.with_resource_id(id);
    }

    let ctx = match state
        .authorizer
        .authorize(&request, &policy_for(class, operation, resource_id.is_some()))
        .await
    {
        Ok(c) => c,
        Err(e) => return Some(rejection_response(&e)),
    };

    // the registry lookup already succeeded inside the pipeline
    let store = match state.authorizer.resources().lookup(class) {
        Ok(s) => s.as_ref(),
        Err(e) => return Some(rejection_response(&e)),
    };

    let result = match (operation, resource_id) {
        (Operation::Read, None) => list(store, class, &ctx).await,
        (Operation::Create, None) => create(store, class, &ctx, body).await,
        (Operation::Read, Some(id)) => read(store, class, id).await,
        (Operation::Update, Some(id)) => update(store, class, id, body).await,
        (Operation::Delete, Some(id)) => delete(store, class, id).await,
        _ => return None,
    };

    Some(result.unwrap_or_else(|e| failure_response(&e)))
}

/// Single-entry JSON body: `{error: false, [message], <key>: value}`
fn envelope<T: Serialize>(key: &str, value: T, message: Option<&str>) -> Value {
    let mut body = serde_json::json!({ "error": false });
    if let Some(message) = message {
        body["message"] = Value::from(message);
    }
    body[key] = serde_json::to_value(value).unwrap_or(Value::Null);
    body
}

fn not_found(class: ResourceClass) -> Response<BoxBody> {
    error_response(StatusCode::NOT_FOUND, format!("{class} not found"))
}

fn attributes_from(body: &[u8]) -> Result<Value, BailiffError> {
    let attributes: Value = parse_json(body)?;
    if !attributes.is_object() {
        return Err(BailiffError::BadRequest("Body must be a JSON object".into()));
    }
    Ok(attributes)
}

async fn list(
    store: &dyn ResourceStore,
    class: ResourceClass,
    ctx: &AuthContext,
) -> Result<Response<BoxBody>, BailiffError> {
    let records = store.list_owned_by(&ctx.principal().id).await?;
    Ok(json_response(
        StatusCode::OK,
        &envelope(class.plural(), records, None),
    ))
}

async fn create(
    store: &dyn ResourceStore,
    class: ResourceClass,
    ctx: &AuthContext,
    body: &[u8],
) -> Result<Response<BoxBody>, BailiffError> {
    let attributes = attributes_from(body)?;
    let now = chrono::Utc::now();
    let record = ResourceRecord {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: ctx.principal().id.clone(),
        attributes,
        created_at: now,
        updated_at: now,
    };
    store.insert(record.clone()).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &envelope(class.as_str(), record, Some("Created")),
    ))
}

async fn read(
    store: &dyn ResourceStore,
    class: ResourceClass,
    id: &str,
) -> Result<Response<BoxBody>, BailiffError> {
    Ok(match store.get(id).await? {
        Some(record) => json_response(StatusCode::OK, &envelope(class.as_str(), record, None)),
        None => not_found(class),
    })
}

async fn update(
    store: &dyn ResourceStore,
    class: ResourceClass,
    id: &str,
    body: &[u8],
) -> Result<Response<BoxBody>, BailiffError> {
    let attributes = attributes_from(body)?;
    Ok(match store.update(id, attributes).await? {
        Some(record) => json_response(
            StatusCode::OK,
            &envelope(class.as_str(), record, Some("Updated")),
        ),
        None => not_found(class),
    })
}

async fn delete(
    store: &dyn ResourceStore,
    class: ResourceClass,
    id: &str,
) -> Result<Response<BoxBody>, BailiffError> {
    Ok(if store.delete(id).await? {
        json_response(
            StatusCode::OK,
            &serde_json::json!({ "error": false, "message": "Deleted" }),
        )
    } else {
        not_found(class)
    })
}
