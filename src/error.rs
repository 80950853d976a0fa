//! Error types for configuration resolution.

use thiserror::Error;

/// Error type for all resolution, binding, and instantiation operations.
///
/// Every variant is fatal to a `fetch` run except class-not-found during
/// binding, which is recorded as a null binding on the descriptor and never
/// surfaces as an error.
#[derive(Error, Debug)]
pub enum ConflateError {
    /// The document behind a locator does not exist or cannot be read.
    #[error("document not found: {locator}: {source}")]
    NotFound {
        locator: String,
        source: std::io::Error,
    },

    /// A `$NAME$` placeholder names an unregistered directory.
    #[error("unknown directory placeholder in {0:?}")]
    UnknownDirectory(String),

    /// The document exists but is not valid structured data.
    #[error("malformed document {locator}: {message}")]
    Malformed { locator: String, message: String },

    /// A `reference` key has no sibling `override` mapping.
    #[error("reference {0:?} has no override mapping")]
    MissingOverride(String),

    /// Override entries were supplied but the referenced document has no
    /// `object.args` path to apply them to.
    #[error("override entries for {0:?} but referenced document has no object.args")]
    InvalidOverrideTarget(String),

    /// An object descriptor names a module absent from the registry.
    #[error("module not registered: {0}")]
    ModuleResolution(String),

    /// Descriptor argument names do not match the factory's parameter set.
    #[error("invalid arguments for {module}/{class}: {message}")]
    InvalidArguments {
        module: String,
        class: String,
        message: String,
    },

    /// The resolver hit its pass or depth ceiling without reaching a fixed
    /// point, which means the documents almost certainly reference each
    /// other in a cycle.
    #[error("reference cycle suspected: no fixed point after {0} resolution steps")]
    CyclicReference(usize),

    /// A factory's constructor failed. Propagated unmodified from the
    /// factory; aborts the whole fetch.
    #[error("constructor {module}/{class} failed: {error}")]
    Construction {
        module: String,
        class: String,
        error: anyhow::Error,
    },

    /// Anything else: malformed descriptor shapes, duplicate factory
    /// registration, and similar configuration mistakes.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
