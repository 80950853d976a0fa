//! Configuration resolution: reference splicing, factory binding, and
//! object instantiation.
//!
//! A root document (JSON or YAML) describes a tree of settings in which
//! any node may reference another document to be spliced in, and any node
//! may describe an object to construct. [`fetch`] runs the whole pipeline:
//!
//! 1. load the root document ([`loader`]);
//! 2. resolve references until a fixed point, binding object descriptors
//!    against the factory [`registry`] along the way ([`resolver`]);
//! 3. walk the resolved tree bottom-up and construct live instances
//!    ([`instantiate`]).
//!
//! # Document conventions
//!
//! - keys starting with `__` are comments and never survive resolution;
//! - `{ "reference": "<locator>", "override": { .. } }` splices in another
//!   document, with the override entries written onto the target's
//!   `object.args` first;
//! - `{ "object": { "module": "..", "class": "..", "args": { .. } } }`
//!   names a factory to construct, with `args` passed as named arguments;
//! - locators may embed a `$NAME$` placeholder resolved against a
//!   [`Directories`] registry.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use conflate::{fetch, Directories, Registry};
//!
//! let mut dirs = Directories::with_base("/srv/ml");
//! let mut registry = Registry::new();
//! registry.handle("preprocessing", "Standardize", Arc::new(StandardizeFactory))?;
//!
//! let config = fetch("$configs$/experiment.json", &dirs, &registry)?;
//! let scaler = config.instantiated.get("scaler").unwrap().object_instance();
//! ```

pub mod dirs;
pub mod error;
pub mod instantiate;
pub mod loader;
pub mod registry;
pub mod resolver;
pub mod strings;


use serde_json::Value;

pub use dirs::Directories;
pub use error::ConflateError;
pub use instantiate::Node;
pub use loader::load_document;
pub use registry::{bind, ArgValue, Args, Construct, Instance, Registry};
pub use resolver::{needs_more_passes, resolve, resolve_fully};

/// Keys with this prefix are documentation only and are skipped by every
/// traversal.
pub const COMMENT_PREFIX: &str = "__";

/// Locator of another document to splice in place of the current node.
pub const KEY_REFERENCE: &str = "reference";

/// Argument overrides applied onto a referenced document's `object.args`.
pub const KEY_OVERRIDE: &str = "override";

/// An object-descriptor mapping (`module`, `class`, `args`).
pub const KEY_OBJECT: &str = "object";

pub const KEY_MODULE: &str = "module";
pub const KEY_CLASS: &str = "class";
pub const KEY_ARGS: &str = "args";

/// Provenance: the locator a spliced reference came from.
pub const KEY_SOURCE: &str = "source";

/// Binding outcome attached to a descriptor: `"module/class"` on success,
/// null when the class is not registered.
pub const KEY_BINDING: &str = "binding";

/// Reserved entry of the instantiated tree holding the live instance.
pub const KEY_INSTANCE: &str = "instance";

/// The three snapshots produced by one [`fetch`] run. Each is an immutable
/// copy; `raw` and `parsed` stay plain JSON so they can be persisted for
/// reproducibility.
#[derive(Debug)]
pub struct Config {
    /// The root document exactly as loaded.
    pub raw: Value,
    /// Fully resolved and bound, reference-free, serializable.
    pub parsed: Value,
    /// The parsed tree with live instances attached.
    pub instantiated: Node,
}

/// Load the document behind `locator`, resolve it to a fixed point, and
/// instantiate every bound object descriptor.
pub fn fetch(
    locator: &str,
    dirs: &Directories,
    registry: &Registry,
) -> Result<Config, ConflateError> {
    let raw = loader::load_document(locator, dirs)?;
    let Some(raw_map) = raw.as_object() else {
        return Err(ConflateError::Malformed {
            locator: locator.to_string(),
            message: "top level must be a mapping".into(),
        });
    };

    let parsed = resolver::resolve_fully(raw_map, dirs, registry)?;
    let instantiated = instantiate::instantiate(&parsed, registry)?;

    Ok(Config {
        raw,
        parsed: Value::Object(parsed),
        instantiated,
    })
}
