//! Bottom-up object instantiation over a fully resolved document.
//!
//! The parsed document stays plain JSON; instantiation produces a parallel
//! [`Node`] tree where each bound object descriptor gains a live instance
//! under the reserved `instance` entry. Children are constructed before
//! parents, so a descriptor nested inside another's `args` is passed to
//! the outer constructor as a live instance rather than as a mapping.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::ConflateError;
use crate::registry::{ArgValue, Args, Instance, Registry};
use crate::{COMMENT_PREFIX, KEY_ARGS, KEY_BINDING, KEY_CLASS, KEY_INSTANCE, KEY_MODULE, KEY_OBJECT};

/// A node of the instantiated tree.
#[derive(Clone)]
pub enum Node {
    /// Plain data carried over from the parsed document.
    Data(Value),
    /// A sequence, instantiated element-wise.
    Seq(Vec<Node>),
    /// A mapping, instantiated entry-wise.
    Map(BTreeMap<String, Node>),
    /// A live constructed object.
    Instance(Instance),
}

impl Node {
    /// Child lookup on mapping nodes.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Element lookup on sequence nodes.
    pub fn index(&self, i: usize) -> Option<&Node> {
        match self {
            Node::Seq(items) => items.get(i),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Node::Data(v) => Some(v),
            _ => None,
        }
    }

    pub fn instance(&self) -> Option<&Instance> {
        match self {
            Node::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// The instance constructed for the object descriptor under this
    /// node's `object` key, if any.
    pub fn object_instance(&self) -> Option<&Instance> {
        self.get(KEY_OBJECT)?.get(KEY_INSTANCE)?.instance()
    }

    /// Downcast an instance node to a concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance().and_then(|i| Arc::clone(i).downcast::<T>().ok())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Data(v) => write!(f, "Data({v})"),
            Node::Seq(items) => f.debug_list().entries(items).finish(),
            Node::Map(m) => f.debug_map().entries(m).finish(),
            Node::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// Walk a fully resolved, fully bound document and construct live
/// instances bottom-up. Pure over its input; constructor errors propagate
/// unmodified and abort the walk.
pub fn instantiate(doc: &Map<String, Value>, registry: &Registry) -> Result<Node, ConflateError> {
    Ok(Node::Map(instantiate_map(doc, registry)?))
}

fn instantiate_map(
    doc: &Map<String, Value>,
    registry: &Registry,
) -> Result<BTreeMap<String, Node>, ConflateError> {
    let mut out = BTreeMap::new();
    for (key, value) in doc {
        if key.starts_with(COMMENT_PREFIX) {
            continue;
        }
        let node = match value {
            Value::Object(m) if key == KEY_OBJECT => instantiate_descriptor(m, registry)?,
            Value::Object(m) => Node::Map(instantiate_map(m, registry)?),
            Value::Array(items) => Node::Seq(instantiate_seq(items, registry)?),
            other => Node::Data(other.clone()),
        };
        out.insert(key.clone(), node);
    }
    Ok(out)
}

fn instantiate_seq(items: &[Value], registry: &Registry) -> Result<Vec<Node>, ConflateError> {
    items
        .iter()
        .map(|item| match item {
            Value::Object(m) => Ok(Node::Map(instantiate_map(m, registry)?)),
            Value::Array(inner) => Ok(Node::Seq(instantiate_seq(inner, registry)?)),
            other => Ok(Node::Data(other.clone())),
        })
        .collect()
}

/// Instantiate one object descriptor. The subtree is always visited so
/// sibling and nested objects still construct; an instance attaches only
/// when the descriptor carries a non-null binding.
fn instantiate_descriptor(
    descriptor: &Map<String, Value>,
    registry: &Registry,
) -> Result<Node, ConflateError> {
    // children first: nested descriptors inside args become live instances
    let mut map = instantiate_map(descriptor, registry)?;

    let bound = matches!(descriptor.get(KEY_BINDING), Some(Value::String(_)));
    if !bound {
        return Ok(Node::Map(map));
    }

    let module = descriptor
        .get(KEY_MODULE)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("bound descriptor missing module"))?;
    let class = descriptor
        .get(KEY_CLASS)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("bound descriptor missing class"))?;
    let factory = registry
        .get(module, class)
        .ok_or_else(|| ConflateError::ModuleResolution(module.to_string()))?;

    let args = collect_args(
        descriptor.get(KEY_ARGS).and_then(Value::as_object),
        map.get(KEY_ARGS),
    );

    let instance = factory
        .construct(args)
        .map_err(|error| ConflateError::Construction {
            module: module.to_string(),
            class: class.to_string(),
            error,
        })?;
    map.insert(KEY_INSTANCE.to_string(), Node::Instance(instance));
    Ok(Node::Map(map))
}

/// Assemble constructor arguments. An argument whose instantiated value
/// holds a constructed object collapses to that live instance; everything
/// else is passed as the plain parsed data.
fn collect_args(parsed_args: Option<&Map<String, Value>>, inst_args: Option<&Node>) -> Args {
    let mut args = Args::new();
    let Some(parsed_args) = parsed_args else {
        return args;
    };
    for (name, parsed_value) in parsed_args {
        if name.starts_with(COMMENT_PREFIX) {
            continue;
        }
        let value = match inst_args.and_then(|n| n.get(name)).and_then(nested_instance) {
            Some(instance) => ArgValue::Instance(instance),
            None => ArgValue::Data(parsed_value.clone()),
        };
        args.insert(name.clone(), value);
    }
    args
}

/// The instance constructed inside an argument value, if any: either the
/// node is a descriptor map carrying `instance`, or it wraps one under the
/// `object` key.
fn nested_instance(node: &Node) -> Option<Instance> {
    match node {
        Node::Instance(i) => Some(Arc::clone(i)),
        Node::Map(m) => {
            if let Some(Node::Instance(i)) = m.get(KEY_INSTANCE) {
                return Some(Arc::clone(i));
            }
            m.get(KEY_OBJECT).and_then(nested_instance)
        }
        _ => None,
    }
}
