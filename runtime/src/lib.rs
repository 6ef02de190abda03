//! protoweave-runtime
//!
//! Runtime support linked by every file the protoweave compiler generates:
//!  1) `Reader` / `Writer` for the protobuf binary wire format,
//!  2) the `Message`, `JsonMessage` and `FromPartial` traits,
//!  3) lenient JSON scalar readers in [`json`],
//!  4) the `CodecError` type.

pub mod error;
pub mod json;
pub mod message;
pub mod wire;

pub use error::CodecError;
pub use message::{FromPartial, JsonMessage, Message};
pub use wire::{wire_type, Reader, Writer, RECURSION_LIMIT};
