use serde_json::Value;

use crate::error::CodecError;
use crate::wire::{Reader, Writer};

/// Binary codec implemented by every generated message.
///
/// `Default` is the message's base instance: scalars at their zero value,
/// repeated and map fields empty, message fields absent.
pub trait Message: Default + Sized {
    /// Writes every present field in declaration order.
    fn encode(&self, writer: &mut Writer) -> Result<(), CodecError>;

    /// Reads fields until `length` bytes have been consumed, or until the end of
    /// the buffer when `length` is `None`.
    fn decode(reader: &mut Reader<'_>, length: Option<usize>) -> Result<Self, CodecError>;

    fn encode_to_vec(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::new();
        self.encode(&mut writer)?;
        Ok(writer.finish())
    }

    fn decode_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        Self::decode(&mut reader, None)
    }
}

/// JSON codec implemented by every generated message.
pub trait JsonMessage: Sized {
    fn from_json(object: &Value) -> Result<Self, CodecError>;

    fn to_json(&self) -> Value;

    fn from_json_str(text: &str) -> Result<Self, CodecError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CodecError::InvalidJson(e.to_string()))?;
        Self::from_json(&value)
    }

    fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

/// Builds a fully defaulted message from a deeply optional one.
pub trait FromPartial: Sized {
    type Partial: Default;

    fn from_partial(object: Self::Partial) -> Self;
}
