//! Struct, union and enum declarations, plus each message's base instance.

use std::collections::BTreeSet;

use crate::{
    code::CodeWriter,
    options::{EnumJson, LongOption},
    type_map::{variant_name, BaseType, Container, MappedField, MappedMessage, Member, Presence},
    types::{EnumSchema, FieldKind},
};

fn symbol_attrs(w: &mut CodeWriter, symbol: &str) {
    if symbol.contains('_') {
        w.line("#[allow(non_camel_case_types)]");
    }
}

pub fn write_struct(message: &MappedMessage<'_>, w: &mut CodeWriter) {
    w.line("#[derive(Debug, Clone, PartialEq)]");
    symbol_attrs(w, &message.symbol);

    let members = message.members();
    if members.is_empty() {
        w.line(format!("pub struct {} {{}}", message.symbol));
    } else {
        w.open(format!("pub struct {}", message.symbol));
        for member in &members {
            match member {
                Member::Field(field) => w.line(format!("pub {}: {},", field.ident, field.rust_type())),
                Member::Union(union) => w.line(format!("pub {}: Option<{}>,", union.ident, union.enum_symbol)),
            };
        }
        w.close();
    }

    for union in &message.unions {
        w.blank();
        w.line("#[derive(Debug, Clone, PartialEq)]");
        w.line("#[allow(non_camel_case_types)]");
        w.open(format!("pub enum {}", union.enum_symbol));
        for &position in &union.members {
            let field = &message.fields[position];
            if let Container::Union { variant, .. } = &field.container {
                w.line(format!("{}({}),", variant, field.base.rust_type()));
            }
        }
        w.close();
    }
}

/// Zero value of a bare (non-`Option`) base type.
pub fn zero_value(base: &BaseType) -> String {
    match base {
        BaseType::Scalar(kind) => match kind {
            FieldKind::Double | FieldKind::Float => "0.0".to_string(),
            FieldKind::Bool => "false".to_string(),
            FieldKind::String => "String::new()".to_string(),
            FieldKind::Bytes => "Vec::new()".to_string(),
            _ => "0".to_string(),
        },
        BaseType::Long(_, LongOption::Number) => "0".to_string(),
        BaseType::Long(_, LongOption::String) => "\"0\".to_string()".to_string(),
        BaseType::Long(_, LongOption::BigInt) => "::protoweave::num_bigint::BigInt::default()".to_string(),
        BaseType::Enum { string: false, default_number, .. } => default_number.to_string(),
        BaseType::Enum { path, default_variant, .. } => format!("{}::{}", path, default_variant),
        BaseType::Wrapper { inner, .. } => zero_value(inner),
        _ => "Default::default()".to_string(),
    }
}

fn default_value(field: &MappedField<'_>) -> String {
    match &field.container {
        Container::Single(Presence::Required) => zero_value(&field.base),
        Container::Single(Presence::Optional) | Container::Union { .. } => "None".to_string(),
        Container::Repeated => "Vec::new()".to_string(),
        Container::Map(_) => "::std::collections::BTreeMap::new()".to_string(),
    }
}

/// The base instance: zero scalars, empty containers, absent messages.
pub fn write_default(message: &MappedMessage<'_>, w: &mut CodeWriter) {
    w.open(format!("impl Default for {}", message.symbol));
    w.open("fn default() -> Self");
    let members = message.members();
    if members.is_empty() {
        w.line("Self {}");
    } else {
        w.open("Self");
        for member in &members {
            match member {
                Member::Field(field) => w.line(format!("{}: {},", field.ident, default_value(field))),
                Member::Union(union) => w.line(format!("{}: None,", union.ident)),
            };
        }
        w.close();
    }
    w.close();
    w.close();
}

struct Variant<'e> {
    name:    String,
    number:  i32,
    /// Every schema name mapping to this number, aliases included.
    aliases: Vec<&'e str>,
}

/// One variant per distinct number; later aliases fold into the first name.
fn variants(schema: &EnumSchema) -> Vec<Variant<'_>> {
    let mut out: Vec<Variant<'_>> = Vec::new();
    let mut names = BTreeSet::new();
    for value in &schema.values {
        if let Some(existing) = out.iter_mut().find(|v| v.number == value.number) {
            existing.aliases.push(&value.name);
            continue;
        }
        let mut name = variant_name(&value.name);
        while !names.insert(name.clone()) {
            name.push('_');
        }
        out.push(Variant {
            name,
            number: value.number,
            aliases: vec![&value.name],
        });
    }
    out
}

pub fn write_enum(symbol: &str, schema: &EnumSchema, string_enums: bool, json: EnumJson, w: &mut CodeWriter) {
    if string_enums {
        write_string_enum(symbol, schema, json, w);
    } else {
        write_numeric_enum(symbol, schema, json, w);
    }
}

fn write_as_str_name(symbol: &str, variants: &[Variant<'_>], extra: Option<(&str, &str)>, w: &mut CodeWriter) {
    w.open("pub fn as_str_name(&self) -> &'static str");
    w.open("match self");
    for variant in variants {
        w.line(format!("{}::{} => \"{}\",", symbol, variant.name, variant.aliases[0]));
    }
    if let Some((variant, name)) = extra {
        w.line(format!("{}::{} => \"{}\",", symbol, variant, name));
    }
    w.close();
    w.close();
}

fn write_numeric_enum(symbol: &str, schema: &EnumSchema, json: EnumJson, w: &mut CodeWriter) {
    let variants = variants(schema);

    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]");
    w.line("#[repr(i32)]");
    symbol_attrs(w, symbol);
    w.open(format!("pub enum {}", symbol));
    for variant in &variants {
        w.line(format!("{} = {},", variant.name, variant.number));
    }
    w.close();
    w.blank();

    w.open(format!("impl {}", symbol));
    write_as_str_name(symbol, &variants, None, w);
    w.blank();

    w.open(format!("pub fn from_i32(value: i32) -> Option<{}>", symbol));
    w.open("match value");
    for variant in &variants {
        w.line(format!("{} => Some({}::{}),", variant.number, symbol, variant.name));
    }
    w.line("_ => None,");
    w.close();
    w.close();
    w.blank();

    w.line("/// Accepts a value name or a number.");
    w.open("pub fn from_json(value: &JsonValue) -> Result<i32, CodecError>");
    w.open("match value");
    w.open("JsonValue::String(name) => match name.as_str()");
    for variant in &variants {
        for alias in &variant.aliases {
            w.line(format!("\"{}\" => Ok({}),", alias, variant.number));
        }
    }
    w.line(format!(
        "other => other.parse().map_err(|_| CodecError::InvalidEnumValue {{ enum_name: \"{}\", value: other.to_string() }}),",
        symbol
    ));
    w.close_with("},");
    w.line("other => json::int32(other),");
    w.close();
    w.close();
    w.blank();

    w.open("pub fn to_json(value: i32) -> JsonValue");
    match json {
        EnumJson::Name => {
            w.open(format!("match {}::from_i32(value)", symbol));
            w.line("Some(known) => JsonValue::from(known.as_str_name()),");
            w.line("None => JsonValue::from(value),");
            w.close();
        }
        EnumJson::Number => {
            w.line("JsonValue::from(value)");
        }
    }
    w.close();
    w.close();
}

fn write_string_enum(symbol: &str, schema: &EnumSchema, json: EnumJson, w: &mut CodeWriter) {
    let variants = variants(schema);
    let has_unrecognized = variants.iter().any(|v| v.name == "Unrecognized");
    let fallback = if has_unrecognized { None } else { Some(("Unrecognized", "UNRECOGNIZED")) };

    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]");
    symbol_attrs(w, symbol);
    w.open(format!("pub enum {}", symbol));
    for variant in &variants {
        w.line(format!("{},", variant.name));
    }
    if fallback.is_some() {
        w.line("Unrecognized,");
    }
    w.close();
    w.blank();

    w.open(format!("impl {}", symbol));
    w.open(format!("pub fn from_number(value: i32) -> {}", symbol));
    w.open("match value");
    for variant in &variants {
        w.line(format!("{} => {}::{},", variant.number, symbol, variant.name));
    }
    w.line(format!("_ => {}::Unrecognized,", symbol));
    w.close();
    w.close();
    w.blank();

    w.open("pub fn to_number(self) -> i32");
    w.open("match self");
    for variant in &variants {
        w.line(format!("{}::{} => {},", symbol, variant.name, variant.number));
    }
    if fallback.is_some() {
        w.line(format!("{}::Unrecognized => -1,", symbol));
    }
    w.close();
    w.close();
    w.blank();

    write_as_str_name(symbol, &variants, fallback, w);
    w.blank();

    w.line("/// Unknown names and numbers become `Unrecognized`.");
    w.open(format!("pub fn from_json(value: &JsonValue) -> Result<{}, CodecError>", symbol));
    w.open("match value");
    w.open("JsonValue::String(name) => Ok(match name.as_str()");
    for variant in &variants {
        for alias in &variant.aliases {
            w.line(format!("\"{}\" => {}::{},", alias, symbol, variant.name));
        }
    }
    w.line(format!(
        "other => other.parse().map({}::from_number).unwrap_or({}::Unrecognized),",
        symbol, symbol
    ));
    w.close_with("}),");
    w.line(format!("other => json::int32(other).map({}::from_number),", symbol));
    w.close();
    w.close();
    w.blank();

    w.open("pub fn to_json(self) -> JsonValue");
    match json {
        EnumJson::Name => w.line("JsonValue::from(self.as_str_name())"),
        EnumJson::Number => w.line("JsonValue::from(self.to_number())"),
    };
    w.close();
    w.close();
}
