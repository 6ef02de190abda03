use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Descriptor decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid option \"{key}\": {msg}")]
    InvalidOption {
        key: String,
        msg: String,
    },

    #[error("Conflicting options: {0}")]
    ConflictingOptions(String),

    #[error("The type \"{0}\" is defined twice")]
    DuplicateType(String),

    #[error("Unresolved type \"{name}\" referenced from {context}")]
    UnresolvedType {
        name:    String,
        context: String,
    },

    #[error("Unsupported type {kind} for field \"{field}\"")]
    UnsupportedFieldType {
        field: String,
        kind:  String,
    },

    #[error("The enum \"{0}\" declares no values")]
    EmptyEnum(String),

    #[error("Verifier error: {0}")]
    VerifierError(String),
}
