use serde::Serialize;

use crate::options::LongOption;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Syntax {
    Proto2,
    Proto3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSchema {
    pub name:     String,
    pub package:  String,
    pub syntax:   Syntax,
    pub enums:    Vec<EnumSchema>,
    pub messages: Vec<MessageSchema>,
    pub services: Vec<ServiceSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSchema {
    pub name:      String,
    pub fields:    Vec<FieldSchema>,
    pub oneofs:    Vec<OneofSchema>,
    pub messages:  Vec<MessageSchema>,
    pub enums:     Vec<EnumSchema>,
    pub map_entry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

/// The eighteen field types of the descriptor format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Group,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl FieldKind {
    pub fn is_long(self) -> bool {
        matches!(
            self,
            FieldKind::Int64
                | FieldKind::Uint64
                | FieldKind::Sint64
                | FieldKind::Fixed64
                | FieldKind::Sfixed64
        )
    }

    /// Scalars that may be written as one packed run.
    pub fn is_packable(self) -> bool {
        !matches!(
            self,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message | FieldKind::Group
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, FieldKind::Uint64 | FieldKind::Fixed64)
    }

    pub fn wire_type(self) -> u32 {
        match self {
            FieldKind::Double | FieldKind::Fixed64 | FieldKind::Sfixed64 => 1,
            FieldKind::Float | FieldKind::Fixed32 | FieldKind::Sfixed32 => 5,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message => 2,
            FieldKind::Group => 3,
            _ => 0,
        }
    }

    /// Name of the `Reader`/`Writer` primitive for this kind.
    pub fn method(self) -> &'static str {
        match self {
            FieldKind::Double   => "double",
            FieldKind::Float    => "float",
            FieldKind::Int64    => "int64",
            FieldKind::Uint64   => "uint64",
            FieldKind::Int32    => "int32",
            FieldKind::Fixed64  => "fixed64",
            FieldKind::Fixed32  => "fixed32",
            FieldKind::Bool     => "bool",
            FieldKind::String   => "string",
            FieldKind::Group    => "group",
            FieldKind::Message  => "message",
            FieldKind::Bytes    => "bytes",
            FieldKind::Uint32   => "uint32",
            FieldKind::Enum     => "int32",
            FieldKind::Sfixed32 => "sfixed32",
            FieldKind::Sfixed64 => "sfixed64",
            FieldKind::Sint32   => "sint32",
            FieldKind::Sint64   => "sint64",
        }
    }

    /// Rust type of a non-long scalar, or of a long under `forceLong=number`.
    pub fn rust_scalar(self) -> &'static str {
        match self {
            FieldKind::Double => "f64",
            FieldKind::Float => "f32",
            FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => "i64",
            FieldKind::Uint64 | FieldKind::Fixed64 => "u64",
            FieldKind::Uint32 | FieldKind::Fixed32 => "u32",
            FieldKind::Bool => "bool",
            FieldKind::String => "String",
            FieldKind::Bytes => "Vec<u8>",
            _ => "i32",
        }
    }

    /// Rust type of a long under the given representation.
    pub fn rust_long(self, long: LongOption) -> &'static str {
        match long {
            LongOption::Number => self.rust_scalar(),
            LongOption::String => "String",
            LongOption::BigInt => "::protoweave::num_bigint::BigInt",
        }
    }

    /// Types that may key a map entry.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(
            self,
            FieldKind::Double
                | FieldKind::Float
                | FieldKind::Bytes
                | FieldKind::Message
                | FieldKind::Group
                | FieldKind::Enum
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name:            String,
    pub json_name:       String,
    pub number:          i32,
    pub kind:            FieldKind,
    pub label:           Label,
    /// Fully-qualified reference (`.pkg.Msg`) for message and enum fields.
    pub type_name:       Option<String>,
    pub oneof_index:     Option<usize>,
    pub proto3_optional: bool,
}

impl FieldSchema {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn tag(&self, wire_type: u32) -> u32 {
        ((self.number as u32) << 3) | wire_type
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneofSchema {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumSchema {
    pub name:   String,
    pub values: Vec<EnumValueSchema>,
}

impl EnumSchema {
    /// The value numbered 0, else the first declared one.
    pub fn default_value(&self) -> Option<&EnumValueSchema> {
        self.values
            .iter()
            .find(|value| value.number == 0)
            .or_else(|| self.values.first())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValueSchema {
    pub name:   String,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSchema {
    pub name:    String,
    pub methods: Vec<MethodSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSchema {
    pub name:             String,
    pub input_type:       String,
    pub output_type:      String,
    pub client_streaming: bool,
    pub server_streaming: bool,
}
