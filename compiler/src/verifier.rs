use std::collections::BTreeSet;

use crate::{
    error::CompileError,
    index::TypeIndex,
    types::{EnumSchema, FieldKind, FileSchema, Label, MessageSchema},
};

pub const MAX_FIELD_NUMBER: i32 = 536_870_911;
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<i32> = 19_000..=19_999;

fn quote(text: &str) -> String {
    format!("\"{}\"", text)
}

/// Returns `Ok(())` if every file is consistent, or the first problem found.
/// Runs after the index is built so type references can be checked.
pub fn verify_schema(files: &[FileSchema], index: &TypeIndex) -> Result<(), CompileError> {
    for file in files {
        let prefix = if file.package.is_empty() {
            String::new()
        } else {
            format!(".{}", file.package)
        };

        for enumeration in &file.enums {
            verify_enum(&format!("{}.{}", prefix, enumeration.name), enumeration)?;
        }
        for message in &file.messages {
            verify_message(&format!("{}.{}", prefix, message.name), message, index)?;
        }

        for service in &file.services {
            for method in &service.methods {
                let context = format!("{}.{}", service.name, method.name);
                index.message(&method.input_type, &context)?;
                index.message(&method.output_type, &context)?;
            }
        }
    }
    Ok(())
}

fn verify_enum(full_name: &str, enumeration: &EnumSchema) -> Result<(), CompileError> {
    if enumeration.values.is_empty() {
        return Err(CompileError::EmptyEnum(full_name.to_string()));
    }
    Ok(())
}

fn verify_message(full_name: &str, message: &MessageSchema, index: &TypeIndex) -> Result<(), CompileError> {
    let mut numbers = BTreeSet::new();
    let mut names = BTreeSet::new();

    for field in &message.fields {
        let context = format!("{}.{}", full_name, field.name);

        if !names.insert(field.name.as_str()) {
            return Err(CompileError::VerifierError(format!(
                "The field name {} is used twice in {}",
                quote(&field.name),
                full_name
            )));
        }
        if !numbers.insert(field.number) {
            return Err(CompileError::VerifierError(format!(
                "The number for field {} is used twice",
                quote(&context)
            )));
        }
        if field.number < 1 || field.number > MAX_FIELD_NUMBER {
            return Err(CompileError::VerifierError(format!(
                "The number {} for field {} is out of range",
                field.number,
                quote(&context)
            )));
        }
        if RESERVED_FIELD_NUMBERS.contains(&field.number) {
            return Err(CompileError::VerifierError(format!(
                "The number {} for field {} is reserved",
                field.number,
                quote(&context)
            )));
        }
        if let Some(oneof) = field.oneof_index {
            if oneof >= message.oneofs.len() {
                return Err(CompileError::VerifierError(format!(
                    "Field {} points at missing oneof #{}",
                    quote(&context),
                    oneof
                )));
            }
        }

        match field.kind {
            FieldKind::Message | FieldKind::Enum | FieldKind::Group => {
                let type_name = field.type_name.as_deref().ok_or_else(|| {
                    CompileError::VerifierError(format!("Field {} has no type name", quote(&context)))
                })?;
                match field.kind {
                    FieldKind::Enum => {
                        index.enumeration(type_name, &context)?;
                    }
                    _ => {
                        index.message(type_name, &context)?;
                    }
                }
            }
            _ => {}
        }
    }

    if message.map_entry {
        verify_map_entry(full_name, message)?;
    }

    for enumeration in &message.enums {
        verify_enum(&format!("{}.{}", full_name, enumeration.name), enumeration)?;
    }
    for nested in &message.messages {
        verify_message(&format!("{}.{}", full_name, nested.name), nested, index)?;
    }
    Ok(())
}

fn verify_map_entry(full_name: &str, message: &MessageSchema) -> Result<(), CompileError> {
    let malformed = |why: &str| {
        CompileError::VerifierError(format!("Map entry {} is malformed: {}", quote(full_name), why))
    };

    match message.fields.as_slice() {
        [key, value] => {
            if key.number != 1 || value.number != 2 {
                return Err(malformed("key and value must be fields 1 and 2"));
            }
            if !key.kind.is_valid_map_key() {
                return Err(malformed("key must be an integral, bool or string type"));
            }
            if key.label == Label::Repeated || value.label == Label::Repeated {
                return Err(malformed("key and value cannot be repeated"));
            }
            Ok(())
        }
        _ => Err(malformed("expected exactly two fields")),
    }
}
