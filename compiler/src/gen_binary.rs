//! Binary wire-format `encode` and `decode`.

use crate::{
    code::{CodeWriter, Value},
    context::Context,
    error::CompileError,
    helpers::Helper,
    options::{DateOption, LongOption},
    type_map::{BaseType, Container, MapShape, MappedField, MappedMessage, Presence},
    types::FieldKind,
};

const WIRE_DELIMITED: u32 = 2;

fn tag(field: &MappedField<'_>, wire_type: u32) -> u32 {
    ((field.field.number as u32) << 3) | wire_type
}

fn wire_type(base: &BaseType) -> u32 {
    match base {
        BaseType::Scalar(kind) | BaseType::Long(kind, _) => kind.wire_type(),
        BaseType::Enum { .. } => 0,
        _ => WIRE_DELIMITED,
    }
}

/// The `Writer` call for one packable value, without its tag.
fn primitive_call(ctx: &Context<'_>, base: &BaseType, value: Value<'_>) -> Result<String, CompileError> {
    Ok(match base {
        BaseType::Scalar(FieldKind::String) => format!("string({})", value.borrowed()),
        BaseType::Scalar(FieldKind::Bytes) => format!("bytes({})", value.borrowed()),
        BaseType::Scalar(kind) | BaseType::Long(kind, LongOption::Number) => {
            format!("{}({})", kind.method(), value.copied())
        }
        BaseType::Long(kind, LongOption::String) => format!(
            "{}({}({})?)",
            kind.method(),
            ctx.helper(Helper::LongFromString),
            value.borrowed()
        ),
        BaseType::Long(kind, LongOption::BigInt) => format!(
            "{}({}({})?)",
            kind.method(),
            ctx.helper(Helper::LongFromBigint),
            value.borrowed()
        ),
        BaseType::Enum { string: false, .. } => format!("int32({})", value.copied()),
        BaseType::Enum { .. } => format!("int32({}.to_number())", value.receiver()),
        other => {
            return Err(CompileError::UnsupportedFieldType {
                field: "<primitive>".to_string(),
                kind:  format!("{:?}", other),
            })
        }
    })
}

/// Expression producing the child message written for a delimited value.
fn child_message(ctx: &Context<'_>, base: &BaseType, value: Value<'_>) -> Result<String, CompileError> {
    Ok(match base {
        BaseType::Message { .. } => value.receiver(),
        BaseType::Wrapper { path, inner } => format!("{} {{ value: {} }}", path, value.cloned(inner.is_copy())),
        BaseType::Timestamp { repr, .. } => match repr {
            DateOption::Timestamp => value.receiver(),
            DateOption::Date => format!("{}({})", ctx.helper(Helper::TimestampFromDate), value.borrowed()),
            DateOption::String => format!("{}({})?", ctx.helper(Helper::TimestampFromIso), value.borrowed()),
        },
        other => {
            return Err(CompileError::UnsupportedFieldType {
                field: "<child>".to_string(),
                kind:  format!("{:?}", other),
            })
        }
    })
}

/// Writes one tagged value.
fn write_value(
    ctx: &Context<'_>,
    field: &MappedField<'_>,
    base: &BaseType,
    value: Value<'_>,
    w: &mut CodeWriter,
) -> Result<(), CompileError> {
    if base.is_delimited() {
        w.line(format!("writer.uint32({}).fork();", tag(field, WIRE_DELIMITED)));
        w.line(format!("{}.encode(writer)?;", child_message(ctx, base, value)?));
        w.line("writer.ldelim();");
    } else {
        w.line(format!(
            "writer.uint32({}).{};",
            tag(field, wire_type(base)),
            primitive_call(ctx, base, value)?
        ));
    }
    Ok(())
}

/// Condition under which a non-optional singular field differs from its zero value.
fn non_default(base: &BaseType, place: &str) -> String {
    match base {
        BaseType::Scalar(FieldKind::String | FieldKind::Bytes) => format!("!{}.is_empty()", place),
        BaseType::Scalar(FieldKind::Bool) => place.to_string(),
        BaseType::Scalar(FieldKind::Float | FieldKind::Double) => format!("{} != 0.0", place),
        BaseType::Long(_, LongOption::String) => format!("!{p}.is_empty() && {p} != \"0\"", p = place),
        BaseType::Long(_, LongOption::BigInt) => {
            format!("{}.sign() != ::protoweave::num_bigint::Sign::NoSign", place)
        }
        BaseType::Enum { string: false, default_number, .. } => format!("{} != {}", place, default_number),
        BaseType::Enum { path, default_variant, .. } => format!("{} != {}::{}", place, path, default_variant),
        BaseType::Wrapper { inner, .. } => non_default(inner, place),
        _ => format!("{} != 0", place),
    }
}

fn map_entry_value(shape: &MapShape, base: &BaseType) -> String {
    let mut value = Value::Ref("value").cloned(base.is_copy());
    if shape.value_boxed {
        value = format!("Box::new({})", value);
    }
    if shape.value_wrapped {
        value = format!("Some({})", value);
    }
    value
}

fn write_encode_field(ctx: &Context<'_>, field: &MappedField<'_>, w: &mut CodeWriter) -> Result<(), CompileError> {
    let place = format!("self.{}", field.ident);
    match &field.container {
        Container::Single(Presence::Required) => {
            if field.base.is_delimited() {
                write_value(ctx, field, &field.base, Value::Place(&place), w)?;
            } else {
                w.open(format!("if {}", non_default(&field.base, &place)));
                write_value(ctx, field, &field.base, Value::Place(&place), w)?;
                w.close();
            }
        }
        Container::Single(Presence::Optional) => {
            w.open(format!("if let Some(v) = &{}", place));
            write_value(ctx, field, &field.base, Value::Ref("v"), w)?;
            w.close();
        }
        Container::Repeated if field.base.is_packable() => {
            w.open(format!("if !{}.is_empty()", place));
            w.line(format!("writer.uint32({}).fork();", tag(field, WIRE_DELIMITED)));
            w.open(format!("for v in &{}", place));
            w.line(format!("writer.{};", primitive_call(ctx, &field.base, Value::Ref("v"))?));
            w.close();
            w.line("writer.ldelim();");
            w.close();
        }
        Container::Repeated => {
            w.open(format!("for v in &{}", place));
            write_value(ctx, field, &field.base, Value::Ref("v"), w)?;
            w.close();
        }
        Container::Map(shape) => {
            w.open(format!("for (key, value) in &{}", place));
            w.line(format!("writer.uint32({}).fork();", tag(field, WIRE_DELIMITED)));
            w.line(format!(
                "{} {{ key: {}, value: {} }}.encode(writer)?;",
                shape.entry_path,
                Value::Ref("key").cloned(shape.key.is_copy()),
                map_entry_value(shape, &field.base)
            ));
            w.line("writer.ldelim();");
            w.close();
        }
        Container::Union { .. } => {}
    }
    Ok(())
}

pub fn write_encode(ctx: &Context<'_>, message: &MappedMessage<'_>, w: &mut CodeWriter) -> Result<(), CompileError> {
    if message.fields.is_empty() {
        w.open("fn encode(&self, _writer: &mut ::protoweave::Writer) -> Result<(), CodecError>");
        w.line("Ok(())");
        w.close();
        return Ok(());
    }

    w.open("fn encode(&self, writer: &mut ::protoweave::Writer) -> Result<(), CodecError>");
    for member in message.members() {
        match member {
            crate::type_map::Member::Field(field) => write_encode_field(ctx, field, w)?,
            crate::type_map::Member::Union(union) => {
                w.open(format!("match &self.{}", union.ident));
                for &position in &union.members {
                    let field = &message.fields[position];
                    if let Container::Union { variant, .. } = &field.container {
                        w.open(format!("Some({}::{}(v)) =>", union.enum_symbol, variant));
                        write_value(ctx, field, &field.base, Value::Ref("v"), w)?;
                        w.close();
                    }
                }
                w.line("None => {}");
                w.close();
            }
        }
    }
    w.line("Ok(())");
    w.close();
    Ok(())
}

/// Expression reading one value of `base` from `reader`.
fn read_value(ctx: &Context<'_>, base: &BaseType) -> String {
    match base {
        BaseType::Scalar(kind) | BaseType::Long(kind, LongOption::Number) => {
            format!("reader.{}()?", kind.method())
        }
        BaseType::Long(kind, LongOption::String) => format!("reader.{}()?.to_string()", kind.method()),
        BaseType::Long(kind, LongOption::BigInt) => {
            format!("::protoweave::num_bigint::BigInt::from(reader.{}()?)", kind.method())
        }
        BaseType::Enum { string: false, .. } => "reader.int32()?".to_string(),
        BaseType::Enum { path, .. } => format!("{}::from_number(reader.int32()?)", path),
        BaseType::Message { path, boxed: true, .. } => format!("Box::new(reader.message::<{}>()?)", path),
        BaseType::Message { path, .. } => format!("reader.message::<{}>()?", path),
        BaseType::Wrapper { path, .. } => format!("reader.message::<{}>()?.value", path),
        BaseType::Timestamp { path, repr, .. } => match repr {
            DateOption::Timestamp => format!("reader.message::<{}>()?", path),
            DateOption::Date => format!(
                "{}(&reader.message::<{}>()?)?",
                ctx.helper(Helper::DateFromTimestamp),
                path
            ),
            DateOption::String => format!(
                "{}(&reader.message::<{}>()?)?",
                ctx.helper(Helper::IsoFromTimestamp),
                path
            ),
        },
    }
}

fn write_decode_field(
    ctx: &Context<'_>,
    message: &MappedMessage<'_>,
    field: &MappedField<'_>,
    w: &mut CodeWriter,
) -> Result<(), CompileError> {
    let place = format!("message.{}", field.ident);
    w.open(format!("{} =>", field.field.number));
    match &field.container {
        Container::Single(Presence::Required) => {
            w.line(format!("{} = {};", place, read_value(ctx, &field.base)));
        }
        Container::Single(Presence::Optional) => {
            w.line(format!("{} = Some({});", place, read_value(ctx, &field.base)));
            for sibling in message.siblings(field) {
                w.line(format!("message.{} = None;", sibling.ident));
            }
        }
        Container::Repeated if field.base.is_packable() => {
            w.open(format!("if (tag & 7) == {}", WIRE_DELIMITED));
            w.line("let run_end = reader.length()? + reader.index();");
            w.open("while reader.index() < run_end");
            w.line(format!("{}.push({});", place, read_value(ctx, &field.base)));
            w.close();
            w.close();
            w.open("else");
            w.line(format!("{}.push({});", place, read_value(ctx, &field.base)));
            w.close();
        }
        Container::Repeated => {
            w.line(format!("{}.push({});", place, read_value(ctx, &field.base)));
        }
        Container::Map(shape) => {
            w.line(format!("let entry = reader.message::<{}>()?;", shape.entry_path));
            match (shape.value_wrapped, shape.value_boxed) {
                (true, true) => {
                    w.open("if let Some(value) = entry.value");
                    w.line(format!("{}.insert(entry.key, *value);", place));
                    w.close();
                }
                (true, false) => {
                    w.open("if let Some(value) = entry.value");
                    w.line(format!("{}.insert(entry.key, value);", place));
                    w.close();
                }
                (false, _) => {
                    w.line(format!("{}.insert(entry.key, entry.value);", place));
                }
            }
        }
        Container::Union { oneof, variant } => {
            let union = message.union(*oneof).ok_or_else(|| {
                CompileError::VerifierError(format!("{} has no oneof #{}", message.full_name, oneof))
            })?;
            w.line(format!(
                "message.{} = Some({}::{}({}));",
                union.ident,
                union.enum_symbol,
                variant,
                read_value(ctx, &field.base)
            ));
        }
    }
    w.close();
    Ok(())
}

pub fn write_decode(ctx: &Context<'_>, message: &MappedMessage<'_>, w: &mut CodeWriter) -> Result<(), CompileError> {
    w.open("fn decode(reader: &mut ::protoweave::Reader<'_>, length: Option<usize>) -> Result<Self, CodecError>");
    w.line("let end = reader.end(length)?;");
    if message.fields.is_empty() {
        w.open("while reader.index() < end");
        w.line("let tag = reader.uint32()?;");
        w.line("reader.skip_field(tag)?;");
        w.close();
        w.line("Ok(Self::default())");
        w.close();
        return Ok(());
    }

    w.line("let mut message = Self::default();");
    w.open("while reader.index() < end");
    w.line("let tag = reader.uint32()?;");
    w.open("match tag >> 3");
    for field in &message.fields {
        write_decode_field(ctx, message, field, w)?;
    }
    w.line("_ => reader.skip_field(tag)?,");
    w.close();
    w.close();
    w.line("Ok(message)");
    w.close();
    Ok(())
}

pub fn write_message_impl(
    ctx: &Context<'_>,
    message: &MappedMessage<'_>,
    w: &mut CodeWriter,
) -> Result<(), CompileError> {
    w.open(format!("impl ::protoweave::Message for {}", message.symbol));
    write_encode(ctx, message, w)?;
    w.blank();
    write_decode(ctx, message, w)?;
    w.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{fixture, with_context};
    use crate::options::Config;
    use crate::type_map::map_message;

    fn generated(config: &Config, full_name: &str, symbol: &str) -> String {
        let files = fixture();
        with_context(&files, config, |ctx| {
            let schema = ctx.index.message(full_name, "test").unwrap();
            let message = map_message(ctx, full_name, symbol, schema).unwrap();
            let mut w = CodeWriter::new();
            write_message_impl(ctx, &message, &mut w).unwrap();
            w.finish()
        })
    }

    #[test]
    fn scalars_skip_zero_values() {
        let out = generated(&Config::default(), ".shop.Item", "Item");
        assert!(out.contains("if !self.name.is_empty() {\n            writer.uint32(10).string(&self.name);"));
        assert!(out.contains("if self.price != 0 {\n            writer.uint32(16).int64(self.price);"));
        assert!(out.contains("if self.status != 0 {"));
        assert!(out.contains("for v in &self.tags {\n            writer.uint32(26).string(v);"));
    }

    #[test]
    fn packed_fields_accept_both_encodings() {
        let files = fixture();
        let config = Config::default();
        let out = with_context(&files, &config, |ctx| {
            let schema = ctx.index.message(".shop.Item", "test").unwrap();
            let mut packed = schema.clone();
            packed.fields[1].label = crate::types::Label::Repeated;
            let message = map_message(ctx, ".shop.Item", "Item", &packed).unwrap();
            let mut w = CodeWriter::new();
            write_message_impl(ctx, &message, &mut w).unwrap();
            w.finish()
        });
        assert!(out.contains("writer.uint32(18).fork();"));
        assert!(out.contains("writer.int64(*v);"));
        assert!(out.contains("if (tag & 7) == 2 {"));
        assert!(out.contains("message.price.push(reader.int64()?);"));
    }

    #[test]
    fn maps_and_messages() {
        let out = generated(&Config::default(), ".shop.Cart", "Cart");
        assert!(out.contains("Cart_CountsEntry { key: key.clone(), value: *value }.encode(writer)?;"));
        assert!(out.contains("message.counts.insert(entry.key, entry.value);"));
        assert!(out.contains("if let Some(v) = &self.owner {"));
        assert!(out.contains("message.owner = Some(reader.message::<crate::common::user::User>()?);"));
        assert!(out.contains("crate::google::protobuf::wrappers::StringValue { value: v.clone() }.encode(writer)?;"));
        assert!(out.contains("reader.message::<crate::google::protobuf::wrappers::StringValue>()?.value"));
    }

    #[test]
    fn oneof_members_clear_siblings() {
        let out = generated(&Config::default(), ".shop.Cart", "Cart");
        assert!(out.contains("message.coupon = Some(reader.string()?);\n                    message.discount = None;"));

        let config = Config::parse("oneof=unions").unwrap();
        let out = generated(&config, ".shop.Cart", "Cart");
        assert!(out.contains("match &self.discount_kind {"));
        assert!(out.contains("Some(Cart_DiscountKind::Discount(v)) => {\n                writer.uint32(56).int32(*v);"));
        assert!(out.contains("message.discount_kind = Some(Cart_DiscountKind::Coupon(reader.string()?));"));
    }

    #[test]
    fn long_and_date_representations_use_helpers() {
        let files = fixture();
        let config = Config::parse("forceLong=string,useDate=date").unwrap();
        let (out, helpers) = with_context(&files, &config, |ctx| {
            let cart = ctx.index.message(".shop.Cart", "test").unwrap();
            let item = ctx.index.message(".shop.Item", "test").unwrap();
            let mut w = CodeWriter::new();
            for (name, symbol, schema) in [(".shop.Cart", "Cart", cart), (".shop.Item", "Item", item)] {
                let message = map_message(ctx, name, symbol, schema).unwrap();
                write_message_impl(ctx, &message, &mut w).unwrap();
            }
            (w.finish(), ctx.take_helpers())
        });
        assert!(out.contains("writer.uint32(16).int64(long_from_string(&self.price)?);"));
        assert!(out.contains("message.price = reader.int64()?.to_string();"));
        assert!(out.contains("timestamp_from_date(v).encode(writer)?;"));
        assert!(helpers.contains(Helper::LongFromString));
        assert!(helpers.contains(Helper::DateFromTimestamp));
        assert!(!helpers.contains(Helper::BytesFromBase64));
    }

    #[test]
    fn recursive_children_are_boxed_on_decode() {
        let out = generated(&Config::default(), ".shop.Category", "Category");
        assert!(out.contains("message.parent = Some(Box::new(reader.message::<Category>()?));"));
    }
}
