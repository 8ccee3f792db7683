//! The ambient context shared by every stage of one invocation.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Bound arguments for the target operation.
pub type Arguments = HashMap<String, serde_json::Value>;

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The identity's name.
    pub name: String,
    /// How the identity was authenticated (e.g. "bearer").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_type: Option<String>,
    /// Roles granted to the identity.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    /// Creates a principal with no roles.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authentication_type: None,
            roles: Vec::new(),
        }
    }

    /// Sets the authentication type.
    #[must_use]
    pub fn with_authentication_type(mut self, kind: impl Into<String>) -> Self {
        self.authentication_type = Some(kind.into());
        self
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Returns true if the principal holds the role.
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Request-scoped state visible to filters, the operation and outcomes.
///
/// Shared as `Arc<InvocationContext>`; mutable parts sit behind locks so
/// outcomes can write to the response through a shared reference.
#[derive(Debug)]
pub struct InvocationContext {
    request_id: Uuid,
    started_at: DateTime<Utc>,
    parameters: Arguments,
    principal: RwLock<Option<Principal>>,
    items: RwLock<HashMap<String, serde_json::Value>>,
    response: RwLock<Vec<serde_json::Value>>,
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            parameters: HashMap::new(),
            principal: RwLock::new(None),
            items: RwLock::new(HashMap::new()),
            response: RwLock::new(Vec::new()),
        }
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Adds a request parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Sets the initial principal.
    #[must_use]
    pub fn with_principal(self, principal: Principal) -> Self {
        *self.principal.write() = Some(principal);
        self
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Returns when the request started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the raw request parameters.
    pub fn parameters(&self) -> &Arguments {
        &self.parameters
    }

    /// Returns the current principal.
    pub fn principal(&self) -> Option<Principal> {
        self.principal.read().clone()
    }

    /// Replaces the current principal.
    pub fn set_principal(&self, principal: Option<Principal>) {
        *self.principal.write() = principal;
    }

    /// Reads a request-scoped item.
    pub fn item(&self, key: &str) -> Option<serde_json::Value> {
        self.items.read().get(key).cloned()
    }

    /// Stores a request-scoped item.
    pub fn set_item(&self, key: impl Into<String>, value: serde_json::Value) {
        self.items.write().insert(key.into(), value);
    }

    /// Appends a value to the response body.
    pub fn write_response(&self, value: serde_json::Value) {
        self.response.write().push(value);
    }

    /// Returns everything written to the response so far.
    pub fn response(&self) -> Vec<serde_json::Value> {
        self.response.read().clone()
    }
}
