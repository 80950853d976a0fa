//! Recursive reference resolution.
//!
//! One pass walks a document tree, splicing `reference` nodes with the
//! resolved content of the documents they point at (override arguments
//! merged in first) and binding `object` descriptors against the registry.
//! Resolving one reference can pull in a document that itself contains
//! further references, so the driver loops passes until [`needs_more_passes`]
//! reports a fixed point.

use serde_json::{Map, Value};
use tracing::debug;

use crate::dirs::Directories;
use crate::error::ConflateError;
use crate::loader::load_document;
use crate::registry::{bind, Registry};
use crate::{COMMENT_PREFIX, KEY_ARGS, KEY_BINDING, KEY_OBJECT, KEY_OVERRIDE, KEY_REFERENCE, KEY_SOURCE};

/// Ceiling on resolution passes in [`resolve_fully`].
pub const MAX_PASSES: usize = 64;

/// Ceiling on reference-splice depth within a single pass. Reference
/// chains deeper than this are assumed to be cyclic. Plain nesting does
/// not count against it.
pub const MAX_DEPTH: usize = 64;

/// One resolution pass. Pure: the input is never mutated.
pub fn resolve(
    doc: &Map<String, Value>,
    dirs: &Directories,
    registry: &Registry,
) -> Result<Map<String, Value>, ConflateError> {
    resolve_at(doc, dirs, registry, 0)
}

fn resolve_at(
    doc: &Map<String, Value>,
    dirs: &Directories,
    registry: &Registry,
    depth: usize,
) -> Result<Map<String, Value>, ConflateError> {
    if depth > MAX_DEPTH {
        return Err(ConflateError::CyclicReference(depth));
    }

    let mut out = Map::new();
    for (key, value) in doc {
        if key.starts_with(COMMENT_PREFIX) {
            continue;
        }

        if key == KEY_REFERENCE {
            let locator = value
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("reference locator must be a string"))?;
            let target = splice_target(locator, doc, dirs, registry, depth)?;
            for (target_key, target_value) in target {
                out.insert(target_key, target_value);
            }
            out.insert(KEY_SOURCE.to_string(), Value::String(locator.to_string()));
            continue;
        }

        if key == KEY_OVERRIDE && doc.contains_key(KEY_REFERENCE) {
            // consumed by the splice above
            continue;
        }

        let resolved = match value {
            Value::Object(m) if key == KEY_OBJECT => {
                // Bind before recursing: overrides were merged when the
                // reference was spliced, so binding sees the final
                // argument set.
                let bound = bind(m, registry)?;
                Value::Object(resolve_at(&bound, dirs, registry, depth)?)
            }
            Value::Object(m) => Value::Object(resolve_at(m, dirs, registry, depth)?),
            Value::Array(items) => Value::Array(resolve_seq(items, dirs, registry, depth)?),
            other => other.clone(),
        };
        out.insert(key.clone(), resolved);
    }
    Ok(out)
}

/// Load a referenced document, merge the current node's overrides onto its
/// `object.args`, and resolve it.
fn splice_target(
    locator: &str,
    node: &Map<String, Value>,
    dirs: &Directories,
    registry: &Registry,
    depth: usize,
) -> Result<Map<String, Value>, ConflateError> {
    let overrides = node
        .get(KEY_OVERRIDE)
        .and_then(Value::as_object)
        .ok_or_else(|| ConflateError::MissingOverride(locator.to_string()))?;

    let Value::Object(mut target) = load_document(locator, dirs)? else {
        // load_document guarantees a mapping
        return Err(ConflateError::Malformed {
            locator: locator.to_string(),
            message: "top level must be a mapping".into(),
        });
    };

    if !overrides.is_empty() {
        let args = target
            .get_mut(KEY_OBJECT)
            .and_then(Value::as_object_mut)
            .and_then(|object| object.get_mut(KEY_ARGS))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| ConflateError::InvalidOverrideTarget(locator.to_string()))?;
        // last-write-wins, no merging of nested structures
        for (name, replacement) in overrides {
            args.insert(name.clone(), replacement.clone());
        }
    }

    resolve_at(&target, dirs, registry, depth + 1)
}

fn resolve_seq(
    items: &[Value],
    dirs: &Directories,
    registry: &Registry,
    depth: usize,
) -> Result<Vec<Value>, ConflateError> {
    items
        .iter()
        .map(|item| match item {
            Value::Object(m) => Ok(Value::Object(resolve_at(m, dirs, registry, depth)?)),
            Value::Array(inner) => Ok(Value::Array(resolve_seq(inner, dirs, registry, depth)?)),
            other => Ok(other.clone()),
        })
        .collect()
}

/// Whether another resolution pass is required: true if any node still has
/// a `reference` key, or any object descriptor lacks its binding.
/// Short-circuits on the first finding.
pub fn needs_more_passes(doc: &Map<String, Value>) -> bool {
    for (key, value) in doc {
        if key == KEY_REFERENCE {
            return true;
        }
        match value {
            Value::Object(m) => {
                if key == KEY_OBJECT && !m.contains_key(KEY_BINDING) {
                    return true;
                }
                if needs_more_passes(m) {
                    return true;
                }
            }
            Value::Array(items) => {
                if seq_needs_more_passes(items) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn seq_needs_more_passes(items: &[Value]) -> bool {
    items.iter().any(|item| match item {
        Value::Object(m) => needs_more_passes(m),
        Value::Array(inner) => seq_needs_more_passes(inner),
        _ => false,
    })
}

/// Resolve until fixed point, guarding against reference cycles with a
/// pass ceiling.
pub fn resolve_fully(
    doc: &Map<String, Value>,
    dirs: &Directories,
    registry: &Registry,
) -> Result<Map<String, Value>, ConflateError> {
    let mut parsed = resolve(doc, dirs, registry)?;
    let mut passes = 1;
    while needs_more_passes(&parsed) {
        if passes >= MAX_PASSES {
            return Err(ConflateError::CyclicReference(passes));
        }
        debug!("resolution pass {} left unresolved nodes, going again", passes);
        parsed = resolve(&parsed, dirs, registry)?;
        passes += 1;
    }
    Ok(parsed)
}
