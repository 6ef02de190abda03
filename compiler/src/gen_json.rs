//! `from_json` / `to_json` following the protobuf JSON mapping.

use crate::{
    code::{CodeWriter, Value},
    context::Context,
    error::CompileError,
    helpers::Helper,
    options::{DateOption, LongOption},
    type_map::{BaseType, Container, MappedField, MappedMessage, Member, Presence},
    types::FieldKind,
};

fn long_reader(kind: FieldKind) -> &'static str {
    if kind.is_unsigned() {
        "uint64"
    } else {
        "int64"
    }
}

/// Expression decoding the `&JsonValue` named `value` into `base`.
fn read_value(ctx: &Context<'_>, base: &BaseType, value: &str) -> String {
    match base {
        BaseType::Scalar(kind) => match kind {
            FieldKind::Double => format!("json::double({})?", value),
            FieldKind::Float => format!("json::float({})?", value),
            FieldKind::Bool => format!("json::bool({})?", value),
            FieldKind::String => format!("json::string({})?", value),
            FieldKind::Bytes => format!("{}(json::str({})?)?", ctx.helper(Helper::BytesFromBase64), value),
            FieldKind::Uint32 | FieldKind::Fixed32 => format!("json::uint32({})?", value),
            _ => format!("json::int32({})?", value),
        },
        BaseType::Long(_, LongOption::Number) => format!("{}({})?", ctx.helper(Helper::LongFromJson), value),
        BaseType::Long(kind, LongOption::String) => format!("json::{}({})?.to_string()", long_reader(*kind), value),
        BaseType::Long(kind, LongOption::BigInt) => {
            format!("::protoweave::num_bigint::BigInt::from(json::{}({})?)", long_reader(*kind), value)
        }
        BaseType::Enum { path, .. } => format!("{}::from_json({})?", path, value),
        BaseType::Message { path, boxed: true, .. } => format!("Box::new({}::from_json({})?)", path, value),
        BaseType::Message { path, .. } => format!("{}::from_json({})?", path, value),
        BaseType::Wrapper { inner, .. } => read_value(ctx, inner, value),
        BaseType::Timestamp { repr, .. } => {
            let helper = match repr {
                DateOption::Timestamp => Helper::TimestampFromJson,
                DateOption::Date => Helper::DateFromJson,
                DateOption::String => Helper::IsoFromJson,
            };
            format!("{}({})?", ctx.helper(helper), value)
        }
    }
}

/// Expression rendering `value` as a `JsonValue`.
fn write_value(ctx: &Context<'_>, base: &BaseType, value: Value<'_>) -> String {
    match base {
        BaseType::Scalar(kind) => match kind {
            FieldKind::Double => format!("json::from_f64({})", value.copied()),
            FieldKind::Float => format!("json::from_f32({})", value.copied()),
            FieldKind::Bytes => format!(
                "JsonValue::from({}({}))",
                ctx.helper(Helper::Base64FromBytes),
                value.borrowed()
            ),
            FieldKind::String => format!("JsonValue::from({}.clone())", value.receiver()),
            _ => format!("JsonValue::from({})", value.copied()),
        },
        BaseType::Long(_, LongOption::Number) => format!("JsonValue::from({})", value.copied()),
        BaseType::Long(_, LongOption::String) => format!("JsonValue::from({}.clone())", value.receiver()),
        BaseType::Long(_, LongOption::BigInt) => format!("JsonValue::from({}.to_string())", value.receiver()),
        BaseType::Enum { path, string: false, .. } => format!("{}::to_json({})", path, value.copied()),
        BaseType::Enum { .. } => format!("{}.to_json()", value.receiver()),
        BaseType::Message { .. } => format!("{}.to_json()", value.receiver()),
        BaseType::Wrapper { inner, .. } => write_value(ctx, inner, value),
        BaseType::Timestamp { repr, .. } => match repr {
            DateOption::Timestamp => format!("{}({})", ctx.helper(Helper::TimestampToJson), value.borrowed()),
            DateOption::Date => format!("{}({})", ctx.helper(Helper::DateToJson), value.borrowed()),
            DateOption::String => format!("JsonValue::from({}.clone())", value.receiver()),
        },
    }
}

fn write_from_json_field(
    ctx: &Context<'_>,
    message: &MappedMessage<'_>,
    field: &MappedField<'_>,
    w: &mut CodeWriter,
) -> Result<(), CompileError> {
    let place = format!("message.{}", field.ident);
    w.open(format!("if let Some(value) = json::field(object, \"{}\")", field.json_key));
    match &field.container {
        Container::Single(Presence::Required) => {
            w.line(format!("{} = {};", place, read_value(ctx, &field.base, "value")));
        }
        Container::Single(Presence::Optional) => {
            w.line(format!("{} = Some({});", place, read_value(ctx, &field.base, "value")));
            for sibling in message.siblings(field) {
                w.line(format!("message.{} = None;", sibling.ident));
            }
        }
        Container::Repeated => {
            w.open("for item in json::array(value)?");
            w.line(format!("{}.push({});", place, read_value(ctx, &field.base, "item")));
            w.close();
        }
        Container::Map(_) => {
            w.open("for (key, item) in json::object(value)?");
            w.line(format!(
                "{}.insert(json::map_key(key)?, {});",
                place,
                read_value(ctx, &field.base, "item")
            ));
            w.close();
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
                read_value(ctx, &field.base, "value")
            ));
        }
    }
    w.close();
    Ok(())
}

fn insert(key: &str, value: &str) -> String {
    format!("object.insert(\"{}\".to_string(), {});", key, value)
}

fn write_to_json_field(ctx: &Context<'_>, field: &MappedField<'_>, w: &mut CodeWriter) {
    let place = format!("self.{}", field.ident);
    match &field.container {
        Container::Single(Presence::Required) => {
            w.line(insert(&field.json_key, &write_value(ctx, &field.base, Value::Place(&place))));
        }
        Container::Single(Presence::Optional) => {
            w.open(format!("if let Some(v) = &{}", place));
            w.line(insert(&field.json_key, &write_value(ctx, &field.base, Value::Ref("v"))));
            w.close();
        }
        Container::Repeated => {
            w.line(insert(
                &field.json_key,
                &format!(
                    "JsonValue::Array({}.iter().map(|v| {}).collect())",
                    place,
                    write_value(ctx, &field.base, Value::Ref("v"))
                ),
            ));
        }
        Container::Map(_) => {
            w.line(insert(
                &field.json_key,
                &format!(
                    "JsonValue::Object({}.iter().map(|(key, v)| (key.to_string(), {})).collect())",
                    place,
                    write_value(ctx, &field.base, Value::Ref("v"))
                ),
            ));
        }
        Container::Union { .. } => {}
    }
}

pub fn write_json_impl(ctx: &Context<'_>, message: &MappedMessage<'_>, w: &mut CodeWriter) -> Result<(), CompileError> {
    w.open(format!("impl ::protoweave::JsonMessage for {}", message.symbol));

    w.open("fn from_json(value: &JsonValue) -> Result<Self, CodecError>");
    if message.fields.is_empty() {
        w.line("json::object(value)?;");
        w.line("Ok(Self::default())");
    } else {
        w.line("let object = json::object(value)?;");
        w.line("let mut message = Self::default();");
        for field in &message.fields {
            write_from_json_field(ctx, message, field, w)?;
        }
        w.line("Ok(message)");
    }
    w.close();
    w.blank();

    w.open("fn to_json(&self) -> JsonValue");
    if message.fields.is_empty() {
        w.line("JsonValue::Object(JsonMap::new())");
    } else {
        w.line("let mut object = JsonMap::new();");
        for member in message.members() {
            match member {
                Member::Field(field) => write_to_json_field(ctx, field, w),
                Member::Union(union) => {
                    w.open(format!("match &self.{}", union.ident));
                    for &position in &union.members {
                        let field = &message.fields[position];
                        if let Container::Union { variant, .. } = &field.container {
                            w.open(format!("Some({}::{}(v)) =>", union.enum_symbol, variant));
                            w.line(insert(&field.json_key, &write_value(ctx, &field.base, Value::Ref("v"))));
                            w.close();
                        }
                    }
                    w.line("None => {}");
                    w.close();
                }
            }
        }
        w.line("JsonValue::Object(object)");
    }
    w.close();

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
            write_json_impl(ctx, &message, &mut w).unwrap();
            w.finish()
        })
    }

    #[test]
    fn keys_follow_snake_to_camel() {
        let files = fixture();
        let config = Config::default();
        let out = with_context(&files, &config, |ctx| {
            let schema = ctx.index.message(".shop.Item", "test").unwrap();
            let mut renamed = schema.clone();
            renamed.fields[0].name = "display_name".to_string();
            renamed.fields[0].json_name = "displayName".to_string();
            let message = map_message(ctx, ".shop.Item", "Item", &renamed).unwrap();
            let mut w = CodeWriter::new();
            write_json_impl(ctx, &message, &mut w).unwrap();
            w.finish()
        });
        assert!(out.contains("json::field(object, \"displayName\")"));
        assert!(out.contains("message.display_name = json::string(value)?;"));
        assert!(out.contains("object.insert(\"displayName\".to_string(), JsonValue::from(self.display_name.clone()));"));
    }

    #[test]
    fn enums_and_longs() {
        let out = generated(&Config::default(), ".shop.Item", "Item");
        assert!(out.contains("message.status = Item_Status::from_json(value)?;"));
        assert!(out.contains("Item_Status::to_json(self.status)"));
        assert!(out.contains("message.price = long_from_json(value)?;"));

        let config = Config::parse("forceLong=string,stringEnums=true").unwrap();
        let out = generated(&config, ".shop.Item", "Item");
        assert!(out.contains("message.price = json::int64(value)?.to_string();"));
        assert!(out.contains("self.status.to_json()"));

        let config = Config::parse("forceLong=bigint").unwrap();
        let out = generated(&config, ".shop.Item", "Item");
        assert!(out.contains("message.price = ::protoweave::num_bigint::BigInt::from(json::int64(value)?);"));
    }

    #[test]
    fn oneof_properties_clear_siblings() {
        let out = generated(&Config::default(), ".shop.Cart", "Cart");
        assert!(out.contains(
            "message.coupon = Some(json::string(value)?);\n            message.discount = None;"
        ));
        assert!(out.contains(
            "message.discount = Some(json::int32(value)?);\n            message.coupon = None;"
        ));
    }

    #[test]
    fn containers_and_well_known_types() {
        let out = generated(&Config::default(), ".shop.Cart", "Cart");
        assert!(out.contains("for item in json::array(value)? {\n                message.items.push(Item::from_json(item)?);"));
        assert!(out.contains("message.counts.insert(json::map_key(key)?, json::int32(item)?);"));
        assert!(out.contains("message.note = Some(json::string(value)?);"));
        assert!(out.contains("message.created = Some(timestamp_from_json(value)?);"));
        assert!(out.contains("timestamp_to_json(v)"));
        assert!(out.contains("JsonValue::Object(self.counts.iter().map(|(key, v)| (key.to_string(), JsonValue::from(*v))).collect())"));
    }

    #[test]
    fn unions_insert_the_member_key() {
        let config = Config::parse("oneof=unions").unwrap();
        let out = generated(&config, ".shop.Cart", "Cart");
        assert!(out.contains("message.discount_kind = Some(Cart_DiscountKind::Coupon(json::string(value)?));"));
        assert!(out.contains("object.insert(\"coupon\".to_string(), JsonValue::from(v.clone()));"));
    }
}
