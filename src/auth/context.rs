//! Per-request authorization context

use hyper::Method;
use serde::{Deserialize, Serialize};

use crate::auth::{Principal, SubscriptionSnapshot};

/// What the request is trying to do to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Other,
}

impl Operation {
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::POST => Operation::Create,
            Method::GET | Method::HEAD => Operation::Read,
            Method::PUT | Method::PATCH => Operation::Update,
            Method::DELETE => Operation::Delete,
            _ => Operation::Other,
        }
    }
}

/// The slice of an incoming request the gates look at
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    pub auth_header: Option<&'a str>,
    pub operation: Operation,
    pub resource_id: Option<&'a str>,
}

impl<'a> RequestParts<'a> {
    pub fn new(auth_header: Option<&'a str>, operation: Operation) -> Self {
        Self {
            auth_header,
            operation,
            resource_id: None,
        }
    }

    pub fn with_resource_id(mut self, resource_id: &'a str) -> Self {
        self.resource_id = Some(resource_id);
        self
    }
}

/// Result of a passed pipeline, handed to the route handler.
///
/// Gates never mutate a context; each one that contributes data returns a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    principal: Principal,
    subscription: Option<SubscriptionSnapshot>,
}

impl AuthContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            subscription: None,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn subscription(&self) -> Option<&SubscriptionSnapshot> {
        self.subscription.as_ref()
    }

    pub fn with_subscription(self, subscription: Option<SubscriptionSnapshot>) -> Self {
        Self {
            subscription,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_from_method() {
        assert_eq!(Operation::from_method(&Method::POST), Operation::Create);
        assert_eq!(Operation::from_method(&Method::GET), Operation::Read);
        assert_eq!(Operation::from_method(&Method::PUT), Operation::Update);
        assert_eq!(Operation::from_method(&Method::DELETE), Operation::Delete);
        assert_eq!(Operation::from_method(&Method::OPTIONS), Operation::Other);
    }
}
