//! Plan, import and metadata values exchanged with the host.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the plugin protocol announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

/// Placeholder the host sends for configuration values not yet known.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// Whether a configuration value is the unknown placeholder.
pub fn is_unknown(value: &Value) -> bool {
    value.as_str() == Some(UNKNOWN_VALUE)
}

/// The line printed on stdout once the server listens on `addr`.
///
/// ```
/// use devlake_provider::types::handshake_line;
///
/// assert_eq!(handshake_line("127.0.0.1:50051"), "HEMMER_PROVIDER|1|127.0.0.1:50051");
/// ```
pub fn handshake_line(addr: impl Display) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}

/// One attribute whose planned value differs from state.
///
/// `before` is `None` on create and `after` is `None` when the value goes
/// away or becomes unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name, or a dotted path for nested values.
    pub path: String,
    /// Value in the prior state.
    pub before: Option<Value>,
    /// Planned value.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// A change at `path` from `before` to `after`.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        let encode = |side: Option<Value>| {
            side.and_then(|v| serde_json::to_vec(&v).ok())
                .unwrap_or_default()
        };
        Self {
            path: change.path,
            before: encode(change.before),
            after: encode(change.after),
        }
    }
}

/// Outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// `null` when the resource is being destroyed.
    pub planned_state: Value,
    /// Attributes whose planned value differs from the prior state.
    pub changes: Vec<AttributeChange>,
    /// The object must be destroyed and created again.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan from its parts.
    pub fn new(planned_state: Value, changes: Vec<AttributeChange>, requires_replace: bool) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Keep `state` as is.
    pub fn unchanged(state: Value) -> Self {
        Self::new(state, Vec::new(), false)
    }

    /// Remove every non-null attribute of `prior`.
    pub fn destroy(prior: Option<&Value>) -> Self {
        let changes = prior
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(name, v)| AttributeChange::new(name.clone(), Some(v.clone()), None))
                    .collect()
            })
            .unwrap_or_default();
        Self::new(Value::Null, changes, false)
    }

    /// Whether applying the plan would do anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Paths of the changed attributes, in plan order.
    pub fn changed_paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }
}

/// A resource produced by `ImportResourceState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Type of the imported resource.
    pub resource_type: String,
    /// State to store, as read from DevLake.
    pub state: Value,
}

impl ImportedResource {
    /// Wrap `state` for `resource_type`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// What `GetMetadata` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Optional protocol features.
    pub capabilities: ServerCapabilities,
}

/// Optional protocol features the provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The host may call Plan with a null config to preview a destroy.
    pub plan_destroy: bool,
}
