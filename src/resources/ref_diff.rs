//! The `ref_diff` block shared by scope configs.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::models::RefDiff;
use crate::schema::{Attribute, Block, NestedBlock, Usage};

/// Tags compared when `tags_limit` is unset.
pub const DEFAULT_TAGS_LIMIT: i64 = 10;
pub const DEFAULT_TAGS_PATTERN: &str = r"/v\d+\.\d+(\.\d+(-rc)*\d*)*$/";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefDiffState {
    pub tags_limit: Option<i64>,
    pub tags_pattern: Option<String>,
}

impl RefDiffState {
    /// Request body for the block, filling unset fields with the defaults.
    pub fn to_wire(state: Option<&Self>) -> RefDiff {
        RefDiff {
            tags_limit: state.and_then(|s| s.tags_limit).unwrap_or(DEFAULT_TAGS_LIMIT),
            tags_pattern: state
                .and_then(|s| s.tags_pattern.clone())
                .unwrap_or_else(|| DEFAULT_TAGS_PATTERN.to_string()),
        }
    }

    pub fn from_wire(ref_diff: Option<RefDiff>) -> Option<Self> {
        ref_diff.map(|r| Self {
            tags_limit: Some(r.tags_limit),
            tags_pattern: Some(r.tags_pattern),
        })
    }
}

pub fn block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_description("Settings for comparing tags when calculating ref diffs.")
            .with_attribute(
                "tags_limit",
                Attribute::int64(Usage::OptionalComputed)
                    .with_default(json!(DEFAULT_TAGS_LIMIT))
                    .with_description("How many tags to compare."),
            )
            .with_attribute(
                "tags_pattern",
                Attribute::string(Usage::OptionalComputed)
                    .with_default(json!(DEFAULT_TAGS_PATTERN))
                    .with_description("Regular expression selecting the tags to compare."),
            ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_defaults() {
        assert_eq!(
            block().block.defaults(),
            Some(json!({"tags_limit": 10, "tags_pattern": DEFAULT_TAGS_PATTERN}))
        );
    }

    #[test]
    fn test_wire_fills_missing_fields() {
        let partial = RefDiffState {
            tags_limit: Some(3),
            tags_pattern: None,
        };
        let wire = RefDiffState::to_wire(Some(&partial));
        assert_eq!(wire.tags_limit, 3);
        assert_eq!(wire.tags_pattern, DEFAULT_TAGS_PATTERN);

        assert_eq!(RefDiffState::from_wire(None), None);
    }
}
