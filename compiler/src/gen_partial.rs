//! `{Symbol}Partial` structs and `FromPartial`.

use crate::{
    code::CodeWriter,
    type_map::{BaseType, Container, MappedField, MappedMessage, Member, Presence},
};

fn convert(base: &BaseType, value: &str) -> String {
    match base {
        BaseType::Message { path, boxed: true, .. } => format!("Box::new({}::from_partial(*{}))", path, value),
        BaseType::Message { path, .. } => format!("{}::from_partial({})", path, value),
        BaseType::Timestamp { path, .. } if base.converts_partial() => format!("{}::from_partial({})", path, value),
        _ => value.to_string(),
    }
}

pub fn write_partial_struct(message: &MappedMessage<'_>, w: &mut CodeWriter) {
    let symbol = format!("{}Partial", message.symbol);
    w.line("#[derive(Debug, Clone, Default, PartialEq)]");
    if symbol.contains('_') {
        w.line("#[allow(non_camel_case_types)]");
    }

    let members = message.members();
    if members.is_empty() {
        w.line(format!("pub struct {} {{}}", symbol));
    } else {
        w.open(format!("pub struct {}", symbol));
        for member in &members {
            match member {
                Member::Field(field) => w.line(format!("pub {}: {},", field.ident, field.partial_type())),
                Member::Union(union) => w.line(format!("pub {}: Option<{}>,", union.ident, union.partial_enum)),
            };
        }
        w.close();
    }

    for union in &message.unions {
        w.blank();
        w.line("#[derive(Debug, Clone, PartialEq)]");
        w.line("#[allow(non_camel_case_types)]");
        w.open(format!("pub enum {}", union.partial_enum));
        for &position in &union.members {
            let field = &message.fields[position];
            if let Container::Union { variant, .. } = &field.container {
                w.line(format!("{}(Option<{}>),", variant, field.base.partial_type()));
            }
        }
        w.close();
    }
}

fn write_assign(field: &MappedField<'_>, w: &mut CodeWriter) {
    let place = format!("message.{}", field.ident);
    let value = match &field.container {
        Container::Single(Presence::Required) => convert(&field.base, "value"),
        Container::Single(Presence::Optional) => format!("Some({})", convert(&field.base, "value")),
        Container::Repeated if field.base.converts_partial() => format!(
            "value.into_iter().map(|v| {}).collect()",
            convert(&field.base, "v")
        ),
        Container::Map(_) if field.base.converts_partial() => format!(
            "value.into_iter().map(|(key, v)| (key, {})).collect()",
            convert(&field.base, "v")
        ),
        _ => "value".to_string(),
    };
    w.open(format!("if let Some(value) = object.{}", field.ident));
    w.line(format!("{} = {};", place, value));
    w.close();
}

pub fn write_from_partial(message: &MappedMessage<'_>, w: &mut CodeWriter) {
    let partial = format!("{}Partial", message.symbol);
    w.open(format!("impl ::protoweave::FromPartial for {}", message.symbol));
    w.line(format!("type Partial = {};", partial));
    w.blank();

    let members = message.members();
    if members.is_empty() {
        w.open(format!("fn from_partial(_object: {}) -> Self", partial));
        w.line("Self::default()");
        w.close();
        w.close();
        return;
    }

    w.open(format!("fn from_partial(object: {}) -> Self", partial));
    w.line("let mut message = Self::default();");
    for member in members {
        match member {
            Member::Field(field) => write_assign(field, w),
            Member::Union(union) => {
                w.open(format!("match object.{}", union.ident));
                for &position in &union.members {
                    let field = &message.fields[position];
                    if let Container::Union { variant, .. } = &field.container {
                        w.open(format!("Some({}::{}(Some(value))) =>", union.partial_enum, variant));
                        w.line(format!(
                            "message.{} = Some({}::{}({}));",
                            union.ident,
                            union.enum_symbol,
                            variant,
                            convert(&field.base, "value")
                        ));
                        w.close();
                    }
                }
                w.line("_ => {}");
                w.close();
            }
        }
    }
    w.line("message");
    w.close();
    w.close();
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
            write_partial_struct(&message, &mut w);
            write_from_partial(&message, &mut w);
            w.finish()
        })
    }

    #[test]
    fn nested_messages_convert_recursively() {
        let out = generated(&Config::default(), ".shop.Cart", "Cart");
        assert!(out.contains("pub items: Option<Vec<ItemPartial>>,"));
        assert!(out.contains("pub owner: Option<crate::common::user::UserPartial>,"));
        assert!(out.contains("message.items = value.into_iter().map(|v| Item::from_partial(v)).collect();"));
        assert!(out.contains("message.owner = Some(crate::common::user::User::from_partial(value));"));
        assert!(out.contains("message.counts = value;"));
        assert!(out.contains("pub created: Option<crate::google::protobuf::timestamp::TimestampPartial>,"));
    }

    #[test]
    fn union_members_need_a_value() {
        let config = Config::parse("oneof=unions").unwrap();
        let out = generated(&config, ".shop.Cart", "Cart");
        assert!(out.contains("pub enum Cart_DiscountKindPartial {"));
        assert!(out.contains("Coupon(Option<String>),"));
        assert!(out.contains("Some(Cart_DiscountKindPartial::Coupon(Some(value))) => {"));
        assert!(out.contains("_ => {}"));
    }

    #[test]
    fn boxed_fields_unbox_the_partial() {
        let out = generated(&Config::default(), ".shop.Category", "Category");
        assert!(out.contains("pub parent: Option<Box<CategoryPartial>>,"));
        assert!(out.contains("message.parent = Some(Box::new(Category::from_partial(*value)));"));
    }
}
