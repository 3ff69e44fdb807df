//! Schema model for the provider block, resources and data sources.
//!
//! A [`Schema`] is the single description of a type: validation checks
//! configuration against it, planning reads its defaults and replacement
//! rules, and `GetSchema` sends it to the host.
//!
//! ```
//! use devlake_provider::schema::{Attribute, Schema, Usage};
//!
//! let schema = Schema::new()
//!     .with_attribute("id", Attribute::string(Usage::Computed).use_state_for_unknown())
//!     .with_attribute("name", Attribute::string(Usage::Required).requires_replace());
//!
//! assert!(schema.block.attributes["name"].force_new);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A UTF-8 string.
    String,
    /// A 64-bit integer. JSON numbers with a fraction are rejected.
    Int64,
    /// `true` or `false`.
    Bool,
    /// A list whose elements share one type.
    List(Box<AttributeType>),
}

/// Who sets an attribute: configuration, the provider, or either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    /// Must be configured.
    Required,
    /// May be configured; absent stays null.
    Optional,
    /// Set by the provider only.
    Computed,
    /// May be configured; otherwise the provider fills it in.
    OptionalComputed,
}

/// Usage flags as sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be configured.
    pub required: bool,
    /// May be configured.
    pub optional: bool,
    /// The provider may set it.
    pub computed: bool,
    /// Hidden from plan output and logs.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// The attribute cannot appear in configuration.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

impl From<Usage> for AttributeFlags {
    fn from(usage: Usage) -> Self {
        let (required, optional, computed) = match usage {
            Usage::Required => (true, false, false),
            Usage::Optional => (false, true, false),
            Usage::Computed => (false, false, true),
            Usage::OptionalComputed => (false, true, true),
        };
        Self {
            required,
            optional,
            computed,
            sensitive: false,
        }
    }
}

/// A single attribute and the planning rules attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Who sets the attribute.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change to this attribute destroys and recreates the object.
    #[serde(default)]
    pub force_new: bool,
    /// Planned when configuration leaves the attribute unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Plan the prior state value instead of unknown.
    #[serde(default)]
    pub use_state_for_unknown: bool,
}

impl Attribute {
    fn of(attr_type: AttributeType, usage: Usage) -> Self {
        Self {
            attr_type,
            flags: usage.into(),
            description: None,
            force_new: false,
            default: None,
            use_state_for_unknown: false,
        }
    }

    /// A string attribute.
    pub fn string(usage: Usage) -> Self {
        Self::of(AttributeType::String, usage)
    }

    /// An int64 attribute.
    pub fn int64(usage: Usage) -> Self {
        Self::of(AttributeType::Int64, usage)
    }

    /// A bool attribute.
    pub fn bool(usage: Usage) -> Self {
        Self::of(AttributeType::Bool, usage)
    }

    /// A list of strings, such as scope config `entities`.
    pub fn string_list(usage: Usage) -> Self {
        Self::of(AttributeType::List(Box::new(AttributeType::String)), usage)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the remote object when this attribute changes.
    pub fn requires_replace(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Plan `default` when configuration leaves the attribute unset.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Keep the prior state value when nothing else sets the attribute.
    pub fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }

    /// Mark the value as secret.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// How a nested block repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one object, e.g. a scope config's `ref_diff`.
    #[default]
    Single,
    /// An ordered list of objects, e.g. the `apikeys` of the data source.
    List,
}

/// Attributes and nested blocks at one level of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, replacing one of the same name.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The object built from every attribute's default.
    ///
    /// `None` when the block is empty or any attribute lacks a default.
    pub fn defaults(&self) -> Option<Value> {
        if self.attributes.is_empty() {
            return None;
        }
        self.attributes
            .iter()
            .map(|(name, attr)| attr.default.clone().map(|v| (name.clone(), v)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(Value::Object)
    }
}

/// A block nested under an attribute name.
///
/// When configuration omits a single block whose attributes all have
/// defaults, planning fills in that default object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Attributes and blocks of each element.
    #[serde(flatten)]
    pub block: Block,
    /// Single object or list.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest elements a list accepts.
    #[serde(default)]
    pub min_items: u32,
    /// Zero means unbounded.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    /// At most one object, optional.
    pub fn single(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Single,
            min_items: 0,
            max_items: 1,
        }
    }

    /// An unbounded, optional list.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
        }
    }
}

/// Schema of a resource, data source or the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Bumped when the stored state layout changes.
    #[serde(default)]
    pub version: u64,
    /// Top-level attributes and blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// An empty schema at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a top-level nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }
}

/// Everything `GetSchema` reports, keyed by type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The provider configuration block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Data source schemas by type name.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation failed.
    Error,
    /// Reported, but the operation went ahead.
    Warning,
}

/// A message reported back to the host instead of failing the RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// Short description of the problem.
    pub summary: String,
    /// Longer explanation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Attribute path the message is about, e.g. `ref_diff.tags_limit`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// A warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Point the diagnostic at an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Whether any of `diagnostics` is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_flags() {
        let required = AttributeFlags::from(Usage::Required);
        assert!(required.required && !required.optional && !required.computed);

        assert!(AttributeFlags::from(Usage::Computed).is_computed_only());
        assert!(!AttributeFlags::from(Usage::OptionalComputed).is_computed_only());
        assert!(!AttributeFlags::from(Usage::Optional).is_computed_only());
    }

    #[test]
    fn test_attribute_modifiers() {
        let connection_id = Attribute::string(Usage::Required)
            .with_description("Connection the scope config belongs to.")
            .requires_replace();
        assert_eq!(connection_id.attr_type, AttributeType::String);
        assert!(connection_id.flags.required);
        assert!(connection_id.force_new);
        assert!(!connection_id.use_state_for_unknown);

        let token = Attribute::string(Usage::OptionalComputed)
            .with_default(json!(""))
            .sensitive();
        assert!(token.flags.sensitive);
        assert_eq!(token.default, Some(json!("")));
    }

    #[test]
    fn test_block_defaults_need_every_attribute() {
        let ref_diff = Block::new()
            .with_attribute("tags_limit", Attribute::int64(Usage::OptionalComputed).with_default(json!(10)))
            .with_attribute(
                "tags_pattern",
                Attribute::string(Usage::OptionalComputed).with_default(json!("v.*")),
            );
        assert_eq!(ref_diff.defaults(), Some(json!({"tags_limit": 10, "tags_pattern": "v.*"})));

        let partial = Block::new()
            .with_attribute("pr_type", Attribute::string(Usage::Optional).with_default(json!("feat")))
            .with_attribute("pr_component", Attribute::string(Usage::Optional));
        assert_eq!(partial.defaults(), None);
        assert_eq!(Block::new().defaults(), None);
    }

    #[test]
    fn test_schema_serializes_in_name_order() {
        let schema = Schema::new()
            .with_attribute("name", Attribute::string(Usage::Required))
            .with_attribute("entities", Attribute::string_list(Usage::OptionalComputed))
            .with_block("ref_diff", NestedBlock::single(Block::new()));

        let names: Vec<_> = schema.block.attributes.keys().cloned().collect();
        assert_eq!(names, vec!["entities", "name"]);

        let encoded = serde_json::to_value(&schema).unwrap();
        assert_eq!(encoded["version"], 0);
        assert_eq!(encoded["attributes"]["entities"]["type"], json!({"list": "string"}));
        assert_eq!(encoded["blocks"]["ref_diff"]["max_items"], 1);
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Missing devlake api host")
            .with_detail("Set the host value in the configuration")
            .with_attribute("host");

        assert!(err.is_error());
        assert_eq!(err.attribute.as_deref(), Some("host"));
        assert!(has_errors(&[Diagnostic::warning("w"), err]));
        assert!(!has_errors(&[Diagnostic::warning("w")]));
    }

    #[test]
    fn test_nested_block_modes() {
        let single = NestedBlock::single(Block::new());
        assert_eq!(single.nesting_mode, BlockNestingMode::Single);
        assert_eq!(single.max_items, 1);

        let list = NestedBlock::list(Block::new());
        assert_eq!(list.nesting_mode, BlockNestingMode::List);
        assert_eq!(list.max_items, 0);
    }
}
