//! Error types for building and driving a model design.

/// Errors that can occur while building or driving a model backend.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// An I/O error occurred while reading a design file.
    #[error("failed to read design: {0}")]
    Io(#[from] std::io::Error),

    /// The design TOML could not be parsed.
    #[error("failed to parse design: {0}")]
    Parse(String),

    /// Two objects share a path.
    #[error("duplicate object '{0}'")]
    DuplicatePath(String),

    /// Two objects share a fixed native reference.
    #[error("duplicate raw reference {0:#x}")]
    DuplicateRaw(u64),

    /// An object's parent is not declared.
    #[error("parent of '{0}' is not declared")]
    MissingParent(String),

    /// An initial or driven value does not fit the object.
    #[error("invalid value for '{path}': {reason}")]
    InvalidValue {
        /// Path of the object.
        path: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// The precision string is not a recognised unit.
    #[error("invalid precision '{0}'")]
    InvalidPrecision(String),

    /// No object exists at the path.
    #[error("no object at '{0}'")]
    UnknownPath(String),
}
