//! Schema-driven planning.
//!
//! Turns a resource configuration and its prior state into a planned state:
//!
//! - configured values win
//! - unset attributes with a default take the default
//! - unset optional+computed attributes keep their prior value on update
//! - computed-only attributes keep their prior value when marked
//!   `use_state_for_unknown`, otherwise they are unknown (`null`) until apply
//! - single nested blocks whose attributes all have defaults are filled in
//!
//! When no configurable attribute differs from the prior state the plan is a
//! no-op that returns the prior state unchanged.

use serde_json::{Map, Value};

use crate::schema::{Attribute, Block, BlockNestingMode, NestedBlock, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a resource against its schema.
///
/// `prior` is `None` when the resource is being created. A `null` config
/// plans the resource for destruction.
pub fn plan(schema: &Schema, prior: Option<&Value>, config: &Value) -> PlanResult {
    let prior = prior.filter(|v| !v.is_null());

    if config.is_null() {
        return PlanResult::destroy(prior);
    }

    let planned = plan_block(&schema.block, prior, config);

    if let Some(prior) = prior {
        if !config_driven_changes(&schema.block, prior, &planned) {
            return PlanResult::unchanged(prior.clone());
        }
    }

    let changes = diff(&schema.block, prior, &planned);
    let requires_replace = prior.is_some()
        && changes.iter().any(|change| {
            schema
                .block
                .attributes
                .get(&change.path)
                .map(|attr| attr.force_new && !(attr.flags.computed && change.after.is_none()))
                .unwrap_or(false)
        });

    PlanResult::new(planned, changes, requires_replace)
}

fn plan_block(block: &Block, prior: Option<&Value>, config: &Value) -> Value {
    let mut planned = Map::new();

    for (name, attr) in &block.attributes {
        let configured = config.get(name).filter(|v| !v.is_null());
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());
        let value = plan_attribute(attr, configured, prior_value);
        planned.insert(name.clone(), value);
    }

    for (name, nested) in &block.blocks {
        let configured = config.get(name).filter(|v| !v.is_null());
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());
        let value = plan_nested_block(nested, configured, prior_value);
        planned.insert(name.clone(), value);
    }

    Value::Object(planned)
}

fn plan_attribute(attr: &Attribute, configured: Option<&Value>, prior: Option<&Value>) -> Value {
    if !attr.flags.is_computed_only() {
        if let Some(value) = configured {
            return value.clone();
        }
    }
    if let Some(default) = &attr.default {
        return default.clone();
    }
    if attr.flags.computed && (attr.use_state_for_unknown || attr.flags.optional) {
        if let Some(value) = prior {
            return value.clone();
        }
    }
    Value::Null
}

fn plan_nested_block(nested: &NestedBlock, configured: Option<&Value>, prior: Option<&Value>) -> Value {
    match nested.nesting_mode {
        BlockNestingMode::Single => match configured {
            Some(config) => plan_block(&nested.block, prior, config),
            None => match nested.block.defaults() {
                Some(defaults) => defaults,
                None => prior.cloned().unwrap_or(Value::Null),
            },
        },
        BlockNestingMode::List => match configured.and_then(Value::as_array) {
            Some(items) => Value::Array(
                items
                    .iter()
                    .map(|item| plan_block(&nested.block, None, item))
                    .collect(),
            ),
            None => prior.cloned().unwrap_or(Value::Null),
        },
    }
}

/// Whether anything the practitioner controls differs from the prior state.
fn config_driven_changes(block: &Block, prior: &Value, planned: &Value) -> bool {
    let differs = |name: &str| {
        let before = prior.get(name).filter(|v| !v.is_null());
        let after = planned.get(name).filter(|v| !v.is_null());
        before != after
    };

    block
        .attributes
        .iter()
        .filter(|(_, attr)| !attr.flags.is_computed_only())
        .any(|(name, _)| differs(name))
        || block.blocks.keys().any(|name| differs(name))
}

fn diff(block: &Block, prior: Option<&Value>, planned: &Value) -> Vec<AttributeChange> {
    let mut names: Vec<&String> = block.attributes.keys().chain(block.blocks.keys()).collect();
    names.sort();

    names
        .into_iter()
        .filter_map(|name| {
            let before = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());
            let after = planned.get(name).filter(|v| !v.is_null());
            if before == after {
                None
            } else {
                Some(AttributeChange::new(
                    name.clone(),
                    before.cloned(),
                    after.cloned(),
                ))
            }
        })
        .collect()
}
