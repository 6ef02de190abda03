//! The sample shop schema (`shop/widget.proto`), generated by `build.rs`
//! once per option set:
//!
//! - `defaults`: no options,
//! - `strings`: string 64-bit integers, `OffsetDateTime` timestamps and a gRPC client,
//! - `bigints`: `BigInt` 64-bit integers, string timestamps, string enums
//!   written as numbers, oneofs as unions and snake_case JSON keys,
//! - `minimal`: binary codecs only, no client.
//!
//! Each module mirrors the generated output tree, so the widget types live
//! at `<module>::shop::widget`.

include!(concat!(env!("OUT_DIR"), "/generated.rs"));
