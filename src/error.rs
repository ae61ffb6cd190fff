/// Reason why a transform failed
///
/// Returned as `Err(TransformError)` from `Transformer::new()` and
/// `Transformer::transform()`. A failed transform never yields partial output.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    // === Collaborator failures ===
    /// Source text was rejected by the parser
    #[error("failed to parse {file} at {line}:{column}: {message}")]
    Parse {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// Printer failed to regenerate source text
    #[error("failed to print instrumented code: {0}")]
    Print(#[source] std::io::Error),

    // === Instrumentation errors ===
    /// A loop sits in a statement context with no insertion strategy
    #[error("no handler for loop parent with type {parent} at {file}:{line}:{column}")]
    UnsupportedParent {
        /// ESTree name of the enclosing construct (e.g. "LabeledStatement")
        parent: &'static str,
        file: String,
        line: u32,
        column: u32,
    },

    // === Configuration errors ===
    /// Alias is not a dotted identifier path
    #[error("invalid guard alias: {0:?}")]
    InvalidAlias(String),

    /// Input source map could not be decoded, or output map could not be encoded
    #[error("source map error: {0}")]
    SourceMap(String),

    /// Reset options could not be encoded
    #[error("failed to encode reset options: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransformError {
    /// Returns true if the parser or printer rejected the unit
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Print(_))
    }

    /// Returns true if a loop was found in an unsupported context
    pub fn is_unsupported_parent(&self) -> bool {
        matches!(self, Self::UnsupportedParent { .. })
    }
}

/// Errors raised by the guard registry at runtime
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    /// `guard` was called for a key that was never reset
    ///
    /// Correctly instrumented code always resets before guarding, so this
    /// means the registry and the instrumented code are out of sync.
    #[error("guard called for unknown loop key {0:?}")]
    UnknownKey(String),
}
