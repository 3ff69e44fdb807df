//! Configuration checks against a [`Schema`], reported as diagnostics.
//!
//! ```
//! use devlake_provider::schema::{Attribute, Schema, Usage};
//! use devlake_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .with_attribute("name", Attribute::string(Usage::Required))
//!     .with_attribute("installation_id", Attribute::int64(Usage::Required));
//!
//! let diagnostics = validate(&schema, &json!({"name": "gh", "installation_id": 42}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "gh", "installation_id": "42"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("installation_id".to_string()));
//! ```

use serde_json::Value;

use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};
use crate::types::is_unknown;

/// Check `value` against `schema`. An empty result means it is valid.
///
/// Required attributes must be present, computed-only attributes must be
/// absent, and every value must match its declared type. Values the host
/// does not know yet are accepted as any type.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut checker = Checker::default();
    checker.block(&schema.block, value, "");
    checker.diagnostics
}

#[derive(Default)]
struct Checker {
    diagnostics: Vec<Diagnostic>,
}

impl Checker {
    fn report(&mut self, path: &str, summary: String, detail: Option<String>) {
        let mut diagnostic = Diagnostic::error(summary);
        if let Some(detail) = detail {
            diagnostic = diagnostic.with_detail(detail);
        }
        if !path.is_empty() {
            diagnostic = diagnostic.with_attribute(path);
        }
        self.diagnostics.push(diagnostic);
    }

    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        let fields = match value {
            Value::Null => return,
            Value::Object(fields) => fields,
            other => {
                self.report(path, "Expected object".to_string(), Some(format!("Got {}", kind(other))));
                return;
            },
        };

        for (name, attr) in &block.attributes {
            self.attribute(attr, fields.get(name), &child(path, name));
        }
        for (name, nested) in &block.blocks {
            self.nested(nested, fields.get(name), &child(path, name));
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        match value.filter(|v| !v.is_null()) {
            None if attr.flags.required => self.report(
                path,
                format!("Missing required attribute '{}'", path),
                Some("This attribute is required and must be provided".to_string()),
            ),
            None => {},
            Some(_) if attr.flags.is_computed_only() => self.report(
                path,
                format!("Invalid configuration for read-only attribute '{}'", path),
                Some("This attribute is set by the provider and cannot be configured".to_string()),
            ),
            Some(v) => self.value(&attr.attr_type, v, path),
        }
    }

    fn value(&mut self, attr_type: &AttributeType, value: &Value, path: &str) {
        if is_unknown(value) {
            return;
        }
        let matches = match attr_type {
            AttributeType::String => value.is_string(),
            AttributeType::Int64 => value.is_i64(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::List(element) => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.value(element, item, &format!("{}.{}", path, i));
                    }
                    true
                },
                None => false,
            },
        };
        if !matches {
            self.report(
                path,
                format!("Invalid type for attribute '{}'", path),
                Some(format!("Expected {}, got {}", expected(attr_type), kind(value))),
            );
        }
    }

    fn nested(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            if nested.min_items > 0 {
                self.report(
                    path,
                    format!("Block '{}' requires at least {} item(s)", path, nested.min_items),
                    None,
                );
            }
            return;
        };

        if nested.nesting_mode == BlockNestingMode::Single {
            self.block(&nested.block, value, path);
            return;
        }

        let Some(items) = value.as_array() else {
            self.report(
                path,
                format!("Expected list for block '{}'", path),
                Some(format!("Got {}", kind(value))),
            );
            return;
        };
        let count = items.len() as u32;
        if count < nested.min_items {
            self.report(
                path,
                format!("Block '{}' requires at least {} item(s), got {}", path, nested.min_items, count),
                None,
            );
        }
        if nested.max_items > 0 && count > nested.max_items {
            self.report(
                path,
                format!("Block '{}' allows at most {} item(s), got {}", path, nested.max_items, count),
                None,
            );
        }
        for (i, item) in items.iter().enumerate() {
            self.block(&nested.block, item, &format!("{}.{}", path, i));
        }
    }
}

fn child(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn expected(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Usage;
    use crate::types::UNKNOWN_VALUE;
    use serde_json::json;

    fn scope_config_schema() -> Schema {
        Schema::new()
            .with_attribute("id", Attribute::string(Usage::Computed))
            .with_attribute("connection_id", Attribute::string(Usage::Required))
            .with_attribute("entities", Attribute::string_list(Usage::OptionalComputed))
            .with_block(
                "ref_diff",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("tags_limit", Attribute::int64(Usage::OptionalComputed))
                        .with_attribute("tags_pattern", Attribute::string(Usage::OptionalComputed)),
                ),
            )
    }

    #[test]
    fn test_validate_required_attribute() {
        let diagnostics = validate(&scope_config_schema(), &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("connection_id"));

        let diagnostics = validate(&scope_config_schema(), &json!({"connection_id": null}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_computed_only_rejected() {
        let diagnostics = validate(
            &scope_config_schema(),
            &json!({"connection_id": "1", "id": "3"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("id"));
    }

    #[test]
    fn test_validate_list_elements() {
        let diagnostics = validate(
            &scope_config_schema(),
            &json!({"connection_id": "1", "entities": ["CODE", 7]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("entities.1"));

        let diagnostics = validate(
            &scope_config_schema(),
            &json!({"connection_id": "1", "entities": "CODE"}),
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_nested_block() {
        let valid = json!({"connection_id": "1", "ref_diff": {"tags_limit": 10}});
        assert!(validate(&scope_config_schema(), &valid).is_empty());

        let invalid = json!({"connection_id": "1", "ref_diff": {"tags_limit": "ten"}});
        let diagnostics = validate(&scope_config_schema(), &invalid);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("ref_diff.tags_limit"));

        let wrong_shape = json!({"connection_id": "1", "ref_diff": [1]});
        assert_eq!(validate(&scope_config_schema(), &wrong_shape).len(), 1);
    }

    #[test]
    fn test_validate_int64_rejects_fractions() {
        let schema = Schema::new().with_attribute("app_id", Attribute::int64(Usage::Required));
        assert!(validate(&schema, &json!({"app_id": 12})).is_empty());
        assert_eq!(validate(&schema, &json!({"app_id": 1.5})).len(), 1);
    }

    #[test]
    fn test_validate_unknown_values_pass() {
        let schema = Schema::new().with_attribute("app_id", Attribute::int64(Usage::Required));
        assert!(validate(&schema, &json!({"app_id": UNKNOWN_VALUE})).is_empty());
    }

    #[test]
    fn test_validate_list_block_limits() {
        let schema = Schema::new().with_block(
            "items",
            NestedBlock {
                max_items: 1,
                ..NestedBlock::list(Block::new().with_attribute("name", Attribute::string(Usage::Required)))
            },
        );
        let diagnostics = validate(&schema, &json!({"items": [{"name": "a"}, {}]}));
        assert_eq!(diagnostics.len(), 2);
    }
}
