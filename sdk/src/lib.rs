//! protoweave
//!
//! The crate every generated file depends on. It re-exports the wire runtime
//! and the third-party crates that generated code names, and adds the RPC side:
//!
//! - `rpc`: the plain request abstraction behind generated clients,
//! - `grpc`: a tonic-backed transport with method descriptors and metadata,
//! - `retry`: the reconnect policy for server-streaming calls,
//! - `loader` / `batch`: the coalescing loader behind batch accessors.

pub use protoweave_runtime::{
    json, wire_type, CodecError, FromPartial, JsonMessage, Message, Reader, Writer, RECURSION_LIMIT,
};

pub use base64;
pub use futures_util;
pub use num_bigint;
pub use serde_json;
pub use time;
pub use tonic;

pub mod batch;
pub mod grpc;
pub mod loader;
pub mod retry;
pub mod rpc;

pub use loader::{DataLoader, LoadError};
pub use retry::{RetryPolicy, StreamState};
