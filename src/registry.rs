//! Factory registry and object binding.
//!
//! An object descriptor names a `module`/`class` pair; the registry maps
//! those string pairs to factories registered explicitly at startup. This
//! keeps the construction surface closed and auditable: nothing outside
//! the registration table can ever be constructed.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ConflateError;
use crate::{COMMENT_PREFIX, KEY_ARGS, KEY_BINDING, KEY_CLASS, KEY_MODULE};

/// A live constructed object, type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A constructor argument after full resolution: plain data straight from
/// the document, or a live instance constructed from a nested descriptor.
#[derive(Clone)]
pub enum ArgValue {
    Data(Value),
    Instance(Instance),
}

impl ArgValue {
    pub fn data(&self) -> Option<&Value> {
        match self {
            ArgValue::Data(v) => Some(v),
            ArgValue::Instance(_) => None,
        }
    }

    pub fn instance(&self) -> Option<&Instance> {
        match self {
            ArgValue::Instance(i) => Some(i),
            ArgValue::Data(_) => None,
        }
    }

    /// Downcast an instance argument to a concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            ArgValue::Instance(i) => Arc::clone(i).downcast::<T>().ok(),
            ArgValue::Data(_) => None,
        }
    }
}

/// Constructor arguments keyed by parameter name.
pub type Args = HashMap<String, ArgValue>;

/// A constructible entry in the registry.
///
/// `params` declares the parameter names the constructor accepts; a
/// descriptor's argument names are validated against it at bind time so a
/// mismatch fails before any object is built.
pub trait Construct: Send + Sync {
    fn params(&self) -> &[&str];
    fn construct(&self, args: Args) -> anyhow::Result<Instance>;
}

/// Factory registry mapping `module`/`class` identifier pairs to factories.
#[derive(Default, Clone)]
pub struct Registry {
    modules: HashMap<String, HashMap<String, Arc<dyn Construct>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `module`/`class`. Duplicate registration
    /// is an error.
    pub fn handle(
        &mut self,
        module: impl Into<String>,
        class: impl Into<String>,
        factory: Arc<dyn Construct>,
    ) -> Result<(), ConflateError> {
        let module = module.into();
        let class = class.into();
        let classes = self.modules.entry(module.clone()).or_default();
        if classes.contains_key(&class) {
            return Err(ConflateError::Other(anyhow::anyhow!(
                "factory already registered for {}/{}",
                module,
                class,
            )));
        }
        classes.insert(class, factory);
        Ok(())
    }

    /// Look up the class table for a module.
    pub fn module(&self, name: &str) -> Option<&HashMap<String, Arc<dyn Construct>>> {
        self.modules.get(name)
    }

    /// Look up a factory by module and class.
    pub fn get(&self, module: &str, class: &str) -> Option<Arc<dyn Construct>> {
        self.modules.get(module).and_then(|m| m.get(class)).cloned()
    }
}

/// Bind an object descriptor: resolve its `module`/`class` pair against the
/// registry and record the outcome under the reserved binding key, without
/// invoking the constructor.
///
/// Module-not-found is fatal. Class-not-found is recorded as a null binding
/// and logged; that node, and only that node, is skipped at instantiation.
pub fn bind(
    descriptor: &Map<String, Value>,
    registry: &Registry,
) -> Result<Map<String, Value>, ConflateError> {
    let module = descriptor
        .get(KEY_MODULE)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("object descriptor missing module"))?;
    let class = descriptor
        .get(KEY_CLASS)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("object descriptor missing class"))?;

    let classes = registry
        .module(module)
        .ok_or_else(|| ConflateError::ModuleResolution(module.to_string()))?;

    let mut out = descriptor.clone();
    match classes.get(class) {
        None => {
            warn!("no factory for {}/{}; node will not be instantiated", module, class);
            out.insert(KEY_BINDING.to_string(), Value::Null);
        }
        Some(factory) => {
            validate_args(module, class, descriptor, factory.params())?;
            out.insert(
                KEY_BINDING.to_string(),
                Value::String(format!("{module}/{class}")),
            );
        }
    }
    Ok(out)
}

/// Check descriptor argument names against a factory's declared parameter
/// set. Argument names are final by bind time (overrides are merged before
/// binding), so both unknown and missing names can fail fast here.
fn validate_args(
    module: &str,
    class: &str,
    descriptor: &Map<String, Value>,
    params: &[&str],
) -> Result<(), ConflateError> {
    let invalid = |message: String| ConflateError::InvalidArguments {
        module: module.to_string(),
        class: class.to_string(),
        message,
    };

    let names: Vec<&str> = descriptor
        .get(KEY_ARGS)
        .and_then(Value::as_object)
        .map(|args| {
            args.keys()
                .map(String::as_str)
                .filter(|k| !k.starts_with(COMMENT_PREFIX))
                .collect()
        })
        .unwrap_or_default();

    for name in &names {
        if !params.contains(name) {
            return Err(invalid(format!("unknown argument {name:?}")));
        }
    }
    for param in params {
        if !names.contains(param) {
            return Err(invalid(format!("missing argument {param:?}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Leaf;

    impl Construct for Leaf {
        fn params(&self) -> &[&str] {
            &[]
        }

        fn construct(&self, _args: Args) -> anyhow::Result<Instance> {
            Ok(Arc::new("leaf".to_string()))
        }
    }

    struct Scaler;

    impl Construct for Scaler {
        fn params(&self) -> &[&str] {
            &["rate"]
        }

        fn construct(&self, args: Args) -> anyhow::Result<Instance> {
            let rate = args
                .get("rate")
                .and_then(ArgValue::data)
                .and_then(Value::as_f64)
                .ok_or_else(|| anyhow::anyhow!("rate must be a number"))?;
            Ok(Arc::new(rate))
        }
    }

    fn descriptor(module: &str, class: &str, args: Value) -> Map<String, Value> {
        json!({ "module": module, "class": class, "args": args })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn t5_1_register_and_get() {
        let mut registry = Registry::new();
        registry.handle("preprocessing", "Leaf", Arc::new(Leaf)).unwrap();
        assert!(registry.get("preprocessing", "Leaf").is_some());
        assert!(registry.get("preprocessing", "Other").is_none());
        assert!(registry.get("dataset", "Leaf").is_none());
    }

    #[test]
    fn t5_2_duplicate_registration() {
        let mut registry = Registry::new();
        registry.handle("m", "C", Arc::new(Leaf)).unwrap();
        assert!(registry.handle("m", "C", Arc::new(Leaf)).is_err());
    }

    #[test]
    fn t5_3_bind_attaches_binding() {
        let mut registry = Registry::new();
        registry.handle("m", "Scaler", Arc::new(Scaler)).unwrap();

        let bound = bind(&descriptor("m", "Scaler", json!({"rate": 0.5})), &registry).unwrap();
        assert_eq!(bound["binding"], "m/Scaler");
        // input fields pass through
        assert_eq!(bound["class"], "Scaler");
    }

    #[test]
    fn t5_4_class_not_found_is_null_binding() {
        let mut registry = Registry::new();
        registry.handle("m", "Scaler", Arc::new(Scaler)).unwrap();

        let bound = bind(&descriptor("m", "Absent", json!({})), &registry).unwrap();
        assert!(bound["binding"].is_null());
    }

    #[test]
    fn t5_5_module_not_found_is_fatal() {
        let registry = Registry::new();
        let err = bind(&descriptor("m", "Scaler", json!({})), &registry).unwrap_err();
        assert!(matches!(err, ConflateError::ModuleResolution(_)));
    }

    #[test]
    fn t5_6_unknown_argument_fails_at_bind() {
        let mut registry = Registry::new();
        registry.handle("m", "Scaler", Arc::new(Scaler)).unwrap();

        let err = bind(
            &descriptor("m", "Scaler", json!({"rate": 0.5, "momentum": 0.9})),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, ConflateError::InvalidArguments { .. }));
        assert!(err.to_string().contains("momentum"));
    }

    #[test]
    fn t5_7_missing_argument_fails_at_bind() {
        let mut registry = Registry::new();
        registry.handle("m", "Scaler", Arc::new(Scaler)).unwrap();

        let err = bind(&descriptor("m", "Scaler", json!({})), &registry).unwrap_err();
        assert!(matches!(err, ConflateError::InvalidArguments { .. }));
        assert!(err.to_string().contains("rate"));
    }

    #[test]
    fn t5_8_comment_args_ignored_by_validation() {
        let mut registry = Registry::new();
        registry.handle("m", "Scaler", Arc::new(Scaler)).unwrap();

        let bound = bind(
            &descriptor("m", "Scaler", json!({"rate": 0.5, "__note": "tuned by hand"})),
            &registry,
        )
        .unwrap();
        assert_eq!(bound["binding"], "m/Scaler");
    }

    #[test]
    fn t5_9_descriptor_missing_module() {
        let registry = Registry::new();
        let doc = json!({ "class": "C", "args": {} }).as_object().cloned().unwrap();
        assert!(bind(&doc, &registry).is_err());
    }
}
