//! Per-field type decisions.
//!
//! Each schema field is mapped once to a [`BaseType`] (what a single value
//! is) and a [`Container`] (how values are held on the struct). The codec
//! builders dispatch on that pair and never look at the configuration for
//! representation questions again.

use crate::{
    case::{escape_rust_keyword, field_ident, to_pascal_case},
    context::Context,
    error::CompileError,
    options::{DateOption, LongOption, OneofOption},
    types::{FieldKind, FieldSchema, MessageSchema},
};

pub const TIMESTAMP: &str = ".google.protobuf.Timestamp";

/// The unboxed scalar behind a `google.protobuf.*Value` wrapper.
pub fn wrapper_kind(type_name: &str) -> Option<FieldKind> {
    match type_name {
        ".google.protobuf.DoubleValue" => Some(FieldKind::Double),
        ".google.protobuf.FloatValue"  => Some(FieldKind::Float),
        ".google.protobuf.Int64Value"  => Some(FieldKind::Int64),
        ".google.protobuf.UInt64Value" => Some(FieldKind::Uint64),
        ".google.protobuf.Int32Value"  => Some(FieldKind::Int32),
        ".google.protobuf.UInt32Value" => Some(FieldKind::Uint32),
        ".google.protobuf.BoolValue"   => Some(FieldKind::Bool),
        ".google.protobuf.StringValue" => Some(FieldKind::String),
        ".google.protobuf.BytesValue"  => Some(FieldKind::Bytes),
        _ => None,
    }
}

pub fn variant_name(value_name: &str) -> String {
    escape_rust_keyword(&to_pascal_case(value_name))
}

#[derive(Debug, Clone, PartialEq)]
pub enum BaseType {
    /// Every non-64-bit scalar.
    Scalar(FieldKind),
    Long(FieldKind, LongOption),
    Enum {
        path:            String,
        string:          bool,
        default_number:  i32,
        default_variant: String,
    },
    Message {
        path:    String,
        partial: String,
        boxed:   bool,
    },
    Wrapper {
        path:  String,
        inner: Box<BaseType>,
    },
    Timestamp {
        path:    String,
        partial: String,
        repr:    DateOption,
    },
}

impl BaseType {
    pub fn rust_type(&self) -> String {
        match self {
            BaseType::Scalar(kind) => kind.rust_scalar().to_string(),
            BaseType::Long(kind, long) => kind.rust_long(*long).to_string(),
            BaseType::Enum { string: false, .. } => "i32".to_string(),
            BaseType::Enum { path, .. } => path.clone(),
            BaseType::Message { path, boxed: true, .. } => format!("Box<{}>", path),
            BaseType::Message { path, .. } => path.clone(),
            BaseType::Wrapper { inner, .. } => inner.rust_type(),
            BaseType::Timestamp { path, repr, .. } => match repr {
                DateOption::Timestamp => path.clone(),
                DateOption::Date => "::protoweave::time::OffsetDateTime".to_string(),
                DateOption::String => "String".to_string(),
            },
        }
    }

    /// Type of the value inside a `Partial` struct.
    pub fn partial_type(&self) -> String {
        match self {
            BaseType::Message { partial, boxed: true, .. } => format!("Box<{}>", partial),
            BaseType::Message { partial, .. } => partial.clone(),
            BaseType::Timestamp {
                partial,
                repr: DateOption::Timestamp,
                ..
            } => partial.clone(),
            other => other.rust_type(),
        }
    }

    /// Whether the partial value must go through `from_partial`.
    pub fn converts_partial(&self) -> bool {
        matches!(
            self,
            BaseType::Message { .. }
                | BaseType::Timestamp {
                    repr: DateOption::Timestamp,
                    ..
                }
        )
    }

    /// Values that are read out of a reference with `*v`.
    pub fn is_copy(&self) -> bool {
        match self {
            BaseType::Scalar(kind) => !matches!(kind, FieldKind::String | FieldKind::Bytes),
            BaseType::Long(_, long) => *long == LongOption::Number,
            BaseType::Enum { .. } => true,
            BaseType::Wrapper { inner, .. } => inner.is_copy(),
            BaseType::Timestamp { repr, .. } => *repr == DateOption::Date,
            BaseType::Message { .. } => false,
        }
    }

    /// Written as a length-delimited child message.
    pub fn is_delimited(&self) -> bool {
        matches!(
            self,
            BaseType::Message { .. } | BaseType::Wrapper { .. } | BaseType::Timestamp { .. }
        )
    }

    pub fn is_packable(&self) -> bool {
        match self {
            BaseType::Scalar(kind) => kind.is_packable(),
            BaseType::Long(..) | BaseType::Enum { .. } => true,
            _ => false,
        }
    }

    pub fn unboxed(&self) -> BaseType {
        match self {
            BaseType::Message { path, partial, .. } => BaseType::Message {
                path:    path.clone(),
                partial: partial.clone(),
                boxed:   false,
            },
            other => other.clone(),
        }
    }
}

/// How a singular value is held: bare, or `Option` when presence is observable
/// (message-like fields, proto3 `optional`, oneof members as properties).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapShape {
    pub key:           BaseType,
    pub entry_path:    String,
    /// The entry's `value` field is an `Option`.
    pub value_wrapped: bool,
    /// The entry's `value` field holds a `Box`.
    pub value_boxed:   bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    Single(Presence),
    Repeated,
    Map(MapShape),
    Union { oneof: usize, variant: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedField<'a> {
    pub field:     &'a FieldSchema,
    pub ident:     String,
    pub json_key:  String,
    pub base:      BaseType,
    pub container: Container,
}

impl MappedField<'_> {
    pub fn rust_type(&self) -> String {
        let base = self.base.rust_type();
        match &self.container {
            Container::Single(Presence::Required) => base,
            Container::Single(Presence::Optional) => format!("Option<{}>", base),
            Container::Repeated => format!("Vec<{}>", base),
            Container::Map(shape) => {
                format!("::std::collections::BTreeMap<{}, {}>", shape.key.rust_type(), base)
            }
            Container::Union { .. } => base,
        }
    }

    pub fn partial_type(&self) -> String {
        let base = self.base.partial_type();
        match &self.container {
            Container::Repeated => format!("Option<Vec<{}>>", base),
            Container::Map(shape) => format!(
                "Option<::std::collections::BTreeMap<{}, {}>>",
                shape.key.rust_type(),
                base
            ),
            _ => format!("Option<{}>", base),
        }
    }
}

/// A oneof collapsed into one enum-typed property.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionShape {
    pub oneof:        usize,
    pub ident:        String,
    pub enum_symbol:  String,
    pub partial_enum: String,
    /// Indices into `MappedMessage::fields`.
    pub members:      Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedMessage<'a> {
    pub full_name: String,
    pub symbol:    String,
    pub schema:    &'a MessageSchema,
    pub fields:    Vec<MappedField<'a>>,
    pub unions:    Vec<UnionShape>,
}

/// One struct member in declaration order: a plain field, or a union placed
/// at its first member's position.
pub enum Member<'m, 'a> {
    Field(&'m MappedField<'a>),
    Union(&'m UnionShape),
}

impl<'a> MappedMessage<'a> {
    pub fn members(&self) -> Vec<Member<'_, 'a>> {
        let mut members = Vec::new();
        for (position, field) in self.fields.iter().enumerate() {
            match &field.container {
                Container::Union { oneof, .. } => {
                    if let Some(union) = self.unions.iter().find(|union| union.oneof == *oneof) {
                        if union.members.first() == Some(&position) {
                            members.push(Member::Union(union));
                        }
                    }
                }
                _ => members.push(Member::Field(field)),
            }
        }
        members
    }

    pub fn union(&self, oneof: usize) -> Option<&UnionShape> {
        self.unions.iter().find(|union| union.oneof == oneof)
    }

    /// Fields sharing a properties-mode oneof with `field`, excluding itself.
    pub fn siblings(&self, field: &MappedField<'_>) -> Vec<&MappedField<'a>> {
        match (field.field.oneof_index, &field.container) {
            (Some(oneof), Container::Single(_)) if !field.field.proto3_optional => self
                .fields
                .iter()
                .filter(|other| {
                    other.field.oneof_index == Some(oneof)
                        && other.field.number != field.field.number
                        && !other.field.proto3_optional
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn type_name<'f>(field: &'f FieldSchema, context: &str) -> Result<&'f str, CompileError> {
    field.type_name.as_deref().ok_or_else(|| CompileError::UnresolvedType {
        name:    "<missing>".to_string(),
        context: context.to_string(),
    })
}

pub fn map_message<'a>(
    ctx: &Context<'a>,
    full_name: &str,
    symbol: &str,
    message: &'a MessageSchema,
) -> Result<MappedMessage<'a>, CompileError> {
    let fields = message
        .fields
        .iter()
        .map(|field| map_field(ctx, full_name, field))
        .collect::<Result<Vec<_>, _>>()?;

    let mut unions: Vec<UnionShape> = Vec::new();
    for (position, field) in fields.iter().enumerate() {
        if let Container::Union { oneof, .. } = field.container {
            match unions.iter_mut().find(|union| union.oneof == oneof) {
                Some(union) => union.members.push(position),
                None => {
                    let name = &message.oneofs[oneof].name;
                    let enum_symbol = format!("{}_{}", symbol, to_pascal_case(name));
                    unions.push(UnionShape {
                        oneof,
                        ident: field_ident(name),
                        partial_enum: format!("{}Partial", enum_symbol),
                        enum_symbol,
                        members: vec![position],
                    });
                }
            }
        }
    }

    Ok(MappedMessage {
        full_name: full_name.to_string(),
        symbol: symbol.to_string(),
        schema: message,
        fields,
        unions,
    })
}

/// Maps one field of the message `owner` (fully-qualified name).
pub fn map_field<'a>(
    ctx: &Context<'_>,
    owner: &str,
    field: &'a FieldSchema,
) -> Result<MappedField<'a>, CompileError> {
    let context = format!("{}.{}", owner, field.name);
    let ident = field_ident(&field.name);
    let json_key = if ctx.config.snake_to_camel {
        field.json_name.clone()
    } else {
        field.name.clone()
    };

    if field.is_repeated() && field.kind == FieldKind::Message {
        let entry_name = type_name(field, &context)?;
        let entry = ctx.index.message(entry_name, &context)?;
        if entry.map_entry {
            let (key_field, value_field) = match entry.fields.as_slice() {
                [key, value] => (key, value),
                _ => {
                    return Err(CompileError::VerifierError(format!(
                        "map entry {} must have exactly two fields",
                        entry_name
                    )))
                }
            };
            let key = base_type(ctx, entry_name, key_field, &context)?;
            let value = map_field(ctx, entry_name, value_field)?;
            return Ok(MappedField {
                field,
                ident,
                json_key,
                base: value.base.unboxed(),
                container: Container::Map(MapShape {
                    key,
                    entry_path: ctx.path(entry_name, "")?,
                    value_wrapped: value.container == Container::Single(Presence::Optional),
                    value_boxed: matches!(value.base, BaseType::Message { boxed: true, .. }),
                }),
            });
        }
    }

    let base = base_type(ctx, owner, field, &context)?;
    let container = if field.is_repeated() {
        Container::Repeated
    } else {
        match field.oneof_index {
            Some(oneof) if ctx.config.oneof == OneofOption::Unions && !field.proto3_optional => {
                Container::Union {
                    oneof,
                    variant: to_pascal_case(&field.name),
                }
            }
            _ => Container::Single(presence(field, &base)),
        }
    };

    Ok(MappedField {
        field,
        ident,
        json_key,
        base,
        container,
    })
}

fn presence(field: &FieldSchema, base: &BaseType) -> Presence {
    if field.proto3_optional || field.oneof_index.is_some() {
        return Presence::Optional;
    }
    match base {
        BaseType::Message { .. } | BaseType::Wrapper { .. } | BaseType::Timestamp { .. } => {
            Presence::Optional
        }
        _ => Presence::Required,
    }
}

fn base_type(
    ctx: &Context<'_>,
    owner: &str,
    field: &FieldSchema,
    context: &str,
) -> Result<BaseType, CompileError> {
    match field.kind {
        FieldKind::Group => Err(CompileError::UnsupportedFieldType {
            field: context.to_string(),
            kind:  "group".to_string(),
        }),
        FieldKind::Message => {
            let target = type_name(field, context)?;
            if let Some(kind) = wrapper_kind(target) {
                let inner = if kind.is_long() {
                    BaseType::Long(kind, ctx.config.long)
                } else {
                    BaseType::Scalar(kind)
                };
                return Ok(BaseType::Wrapper {
                    path:  ctx.path(target, "")?,
                    inner: Box::new(inner),
                });
            }
            if target == TIMESTAMP {
                return Ok(BaseType::Timestamp {
                    path:    ctx.path(target, "")?,
                    partial: ctx.path(target, "Partial")?,
                    repr:    ctx.config.date,
                });
            }
            ctx.index.message(target, context)?;
            Ok(BaseType::Message {
                path:    ctx.path(target, "")?,
                partial: ctx.path(target, "Partial")?,
                boxed:   !field.is_repeated() && ctx.index.is_recursive(owner, target),
            })
        }
        FieldKind::Enum => {
            let target = type_name(field, context)?;
            let enumeration = ctx.index.enumeration(target, context)?;
            let default = enumeration
                .default_value()
                .ok_or_else(|| CompileError::EmptyEnum(target.to_string()))?;
            Ok(BaseType::Enum {
                path:            ctx.path(target, "")?,
                string:          ctx.config.string_enums,
                default_number:  default.number,
                default_variant: variant_name(&default.name),
            })
        }
        kind if kind.is_long() => Ok(BaseType::Long(kind, ctx.config.long)),
        kind => Ok(BaseType::Scalar(kind)),
    }
}
