//! Variable schema validation
//!
//! Templates may declare the variables they render as a small JSON-schema
//! like tree. The tree is walked depth-first with an explicit stack into an
//! arena, then assembled bottom-up into a [`VariableNode`].

use forgeport_core::types::{VariableDefault, VariableNode, VariableType};
use forgeport_core::{Error, Result};
use serde_yaml_ng::Value;

/// Deepest nesting accepted; the root node is depth 1
pub const MAX_DEPTH: usize = 5;

const TRUE_TOKENS: [&str; 5] = ["true", "yes", "y", "on", "1"];
const FALSE_TOKENS: [&str; 6] = ["false", "no", "n", "off", "0", ""];

/// Where an arena node hangs off its parent
enum Slot {
    Property(String),
    Items,
}

struct ArenaNode {
    node: VariableNode,
    parent: Option<(usize, Slot)>,
}

/// Validate a raw `variables` declaration into a normalized tree
pub fn validate(raw: &Value) -> Result<VariableNode> {
    let mut arena: Vec<ArenaNode> = Vec::new();
    // (value, depth, path, title, parent link)
    let mut stack: Vec<(&Value, usize, String, Option<String>, Option<(usize, Slot)>)> =
        vec![(raw, 1, "variables".to_string(), None, None)];

    while let Some((value, depth, path, title, parent)) = stack.pop() {
        if depth > MAX_DEPTH {
            return Err(Error::schema_validation(format!(
                "{} exceeds the maximum nesting depth of {}",
                path, MAX_DEPTH
            )));
        }

        let mapping = value
            .as_mapping()
            .ok_or_else(|| Error::schema_validation(format!("{} must be a mapping", path)))?;

        let kind = parse_type(mapping.get("type"), &path)?;
        let mut node = VariableNode::new(kind);
        node.title = title.or_else(|| mapping.get("title").and_then(scalar_to_string));
        node.required = match mapping.get("required") {
            Some(v) => coerce_bool(v, &format!("{}.required", path))?,
            None => false,
        };

        let default = mapping.get("default").filter(|v| !v.is_null());
        if let Some(default) = default {
            if kind.is_container() {
                return Err(Error::schema_validation(format!(
                    "{} is a {} and cannot carry a default",
                    path,
                    type_name(kind)
                )));
            }
            node.default = Some(coerce_default(kind, default, &path)?);
        }

        let index = arena.len();
        arena.push(ArenaNode { node, parent });

        match kind {
            VariableType::Object => {
                if let Some(properties) = mapping.get("properties").filter(|v| !v.is_null()) {
                    let properties = properties.as_mapping().ok_or_else(|| {
                        Error::schema_validation(format!("{}.properties must be a mapping", path))
                    })?;
                    for (key, child) in properties {
                        let key = scalar_to_string(key).ok_or_else(|| {
                            Error::schema_validation(format!(
                                "{}.properties has a non-scalar key",
                                path
                            ))
                        })?;
                        stack.push((
                            child,
                            depth + 1,
                            format!("{}.{}", path, key),
                            Some(key.clone()),
                            Some((index, Slot::Property(key))),
                        ));
                    }
                }
            }
            VariableType::Array => {
                let items = mapping
                    .get("items")
                    .filter(|v| v.as_mapping().is_some_and(|m| !m.is_empty()))
                    .ok_or_else(|| {
                        Error::schema_validation(format!(
                            "{} is an array and needs a non-empty items schema",
                            path
                        ))
                    })?;
                stack.push((
                    items,
                    depth + 1,
                    format!("{}[]", path),
                    None,
                    Some((index, Slot::Items)),
                ));
            }
            _ => {}
        }
    }

    assemble(arena)
}

/// Fold children into their parents; children always sit after their parent
fn assemble(arena: Vec<ArenaNode>) -> Result<VariableNode> {
    let mut slots: Vec<Option<VariableNode>> = Vec::with_capacity(arena.len());
    let mut links = Vec::with_capacity(arena.len());
    for entry in arena {
        slots.push(Some(entry.node));
        links.push(entry.parent);
    }

    for index in (1..slots.len()).rev() {
        let child = slots[index].take();
        let (Some(child), Some((parent, slot))) = (child, links[index].take()) else {
            continue;
        };
        if let Some(parent_node) = slots[parent].as_mut() {
            match slot {
                Slot::Property(key) => {
                    parent_node.properties.insert(key, child);
                }
                Slot::Items => parent_node.items = Some(Box::new(child)),
            }
        }
    }

    slots
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| Error::schema_validation("variables schema is empty"))
}

fn parse_type(raw: Option<&Value>, path: &str) -> Result<VariableType> {
    let token = raw
        .and_then(Value::as_str)
        .ok_or_else(|| Error::schema_validation(format!("{} is missing a type", path)))?;
    match token {
        "object" => Ok(VariableType::Object),
        "array" => Ok(VariableType::Array),
        "number" => Ok(VariableType::Number),
        "string" => Ok(VariableType::String),
        "boolean" => Ok(VariableType::Boolean),
        other => Err(Error::schema_validation(format!(
            "{} has unknown type '{}'",
            path, other
        ))),
    }
}

fn type_name(kind: VariableType) -> &'static str {
    match kind {
        VariableType::Object => "object",
        VariableType::Array => "array",
        VariableType::Number => "number",
        VariableType::String => "string",
        VariableType::Boolean => "boolean",
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Interpret a boolean-ish scalar
pub fn coerce_bool(value: &Value, path: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            if TRUE_TOKENS.contains(&lowered.as_str()) {
                Ok(true)
            } else if FALSE_TOKENS.contains(&lowered.as_str()) {
                Ok(false)
            } else {
                Ok(!s.is_empty())
            }
        }
        Value::Null => Ok(false),
        _ => Err(Error::schema_validation(format!(
            "{} must be a boolean",
            path
        ))),
    }
}

fn coerce_default(kind: VariableType, value: &Value, path: &str) -> Result<VariableDefault> {
    let path = format!("{}.default", path);
    match kind {
        VariableType::Boolean => Ok(VariableDefault::Boolean(coerce_bool(value, &path)?)),
        VariableType::Number => match value {
            Value::Number(n) => n
                .as_f64()
                .map(VariableDefault::Number)
                .ok_or_else(|| Error::schema_validation(format!("{} is not a number", path))),
            Value::String(s) => s.trim().parse::<f64>().map(VariableDefault::Number).map_err(|_| {
                Error::schema_validation(format!("{} '{}' is not a number", path, s))
            }),
            _ => Err(Error::schema_validation(format!(
                "{} is not a number",
                path
            ))),
        },
        VariableType::String => scalar_to_string(value)
            .map(VariableDefault::String)
            .ok_or_else(|| Error::schema_validation(format!("{} must be a scalar", path))),
        VariableType::Object | VariableType::Array => Err(Error::schema_validation(format!(
            "{} is not allowed on containers",
            path
        ))),
    }
}
