use thiserror::Error;

/// Failure raised by generated encoders and decoders.
///
/// Malformed input never panics; every reader path surfaces one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("unexpected end of buffer")]
    Truncated,

    #[error("malformed varint")]
    InvalidVarint,

    #[error("invalid wire type {0}")]
    InvalidWireType(u32),

    #[error("group for field {expected} closed by an end tag for field {found}")]
    GroupMismatch { expected: u32, found: u32 },

    #[error("nesting exceeds the recursion limit of {0}")]
    RecursionLimit(usize),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("length prefix {0} overflows the buffer")]
    LengthOverflow(usize),

    #[error("expected {expected}, found {found}")]
    UnexpectedJson {
        expected: &'static str,
        found:    String,
    },

    #[error("invalid value {value:?} for enum {enum_name}")]
    InvalidEnumValue {
        enum_name: &'static str,
        value:     String,
    },

    #[error("value {0} does not fit in the target integer type")]
    Overflow(String),

    #[error("invalid 64-bit integer {0:?}")]
    InvalidLong(String),

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}
