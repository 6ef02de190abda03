//! protoweave-compiler
//!
//! This crate implements:
//!  1) Descriptor parsing into a schema model (`parser`, `types`),
//!  2) Option parsing for the plugin parameter string (`options`),
//!  3) A type index and schema verifier (unresolved references, empty enums, etc.),
//!  4) Code generation for messages, enums and services (`gen_*`),
//!  5) The plugin entry points (`compile`, `compile_request`) and `CompileError`.

pub mod error;
pub mod types;
pub mod parser;
pub mod options;
pub mod case;
pub mod code;
pub mod index;
pub mod verifier;
pub mod visit;
pub mod helpers;
pub mod context;
pub mod type_map;
pub mod batch;
pub mod gen_types;
pub mod gen_binary;
pub mod gen_json;
pub mod gen_partial;
pub mod gen_service;
pub mod gen_rust;
pub mod compiler;

pub use compiler::{compile, compile_files, compile_request, inspect, GeneratedFile};
pub use error::CompileError;
pub use options::Config;
