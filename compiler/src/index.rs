//! Lookup from fully-qualified type name to output module and symbol,
//! covering every file of the request.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    case::escape_rust_keyword,
    error::CompileError,
    types::{EnumSchema, FieldKind, FileSchema, MessageSchema},
    visit::{Declaration, Visitor},
};

#[derive(Debug, Clone, Serialize)]
pub struct TypeEntry<'a> {
    pub module:      String,
    pub file:        &'a str,
    pub symbol:      String,
    pub declaration: Declaration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct TypeIndex<'a> {
    entries: BTreeMap<String, TypeEntry<'a>>,
}

impl<'a> TypeIndex<'a> {
    pub fn build(files: &'a [FileSchema]) -> Result<Self, CompileError> {
        let entries = files
            .iter()
            .flat_map(|file| Visitor::new(file).map(move |visited| (file, visited)))
            .try_fold(BTreeMap::new(), |mut entries, (file, visited)| {
                if entries.contains_key(&visited.full_name) {
                    return Err(CompileError::DuplicateType(visited.full_name));
                }
                entries.insert(
                    visited.full_name,
                    TypeEntry {
                        module:      module_path(&file.name),
                        file:        file.name.as_str(),
                        symbol:      visited.symbol,
                        declaration: visited.declaration,
                    },
                );
                Ok(entries)
            })?;
        Ok(TypeIndex { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.entries.contains_key(full_name)
    }

    pub fn get(&self, full_name: &str, context: &str) -> Result<&TypeEntry<'a>, CompileError> {
        self.entries
            .get(full_name)
            .ok_or_else(|| CompileError::UnresolvedType {
                name:    full_name.to_string(),
                context: context.to_string(),
            })
    }

    pub fn message(&self, full_name: &str, context: &str) -> Result<&'a MessageSchema, CompileError> {
        match self.get(full_name, context)?.declaration {
            Declaration::Message(message) => Ok(message),
            Declaration::Enum(_) => Err(CompileError::VerifierError(format!(
                "{} refers to enum {} where a message is expected",
                context, full_name
            ))),
        }
    }

    pub fn enumeration(&self, full_name: &str, context: &str) -> Result<&'a EnumSchema, CompileError> {
        match self.get(full_name, context)?.declaration {
            Declaration::Enum(enumeration) => Ok(enumeration),
            Declaration::Message(_) => Err(CompileError::VerifierError(format!(
                "{} refers to message {} where an enum is expected",
                context, full_name
            ))),
        }
    }

    /// Path to `full_name` (plus `suffix`, e.g. `Partial`) as seen from code
    /// generated for `current_file`.
    pub fn rust_path(
        &self,
        full_name: &str,
        current_file: &str,
        root: &str,
        suffix: &str,
    ) -> Result<String, CompileError> {
        let entry = self.get(full_name, current_file)?;
        if entry.file == current_file {
            Ok(format!("{}{}", entry.symbol, suffix))
        } else {
            Ok(format!("{}::{}::{}{}", root, entry.module, entry.symbol, suffix))
        }
    }

    /// True when `target` leads back to `owner` through singular message
    /// fields, making an inline field of type `target` in `owner` infinitely sized.
    pub fn is_recursive(&self, owner: &str, target: &str) -> bool {
        let mut stack = vec![target.to_string()];
        let mut seen = BTreeSet::new();
        while let Some(name) = stack.pop() {
            if name == owner {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(TypeEntry {
                declaration: Declaration::Message(message),
                ..
            }) = self.entries.get(&name)
            {
                stack.extend(
                    message
                        .fields
                        .iter()
                        .filter(|field| field.kind == FieldKind::Message && !field.is_repeated())
                        .filter_map(|field| field.type_name.clone()),
                );
            }
        }
        false
    }
}

/// `dir/sub/name.proto` → `dir::sub::name`.
pub fn module_path(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".proto").unwrap_or(file_name);
    stem.split('/')
        .filter(|segment| !segment.is_empty())
        .map(module_ident)
        .collect::<Vec<_>>()
        .join("::")
}

/// The module identifier for one path segment of a file name.
pub fn module_ident(segment: &str) -> String {
    let mut ident: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    escape_rust_keyword(&ident)
}

/// `dir/name.proto` → `dir/name.rs`.
pub fn output_file_name(file_name: &str) -> String {
    match file_name.strip_suffix(".proto") {
        Some(stem) => format!("{}.rs", stem),
        None => format!("{}.rs", file_name),
    }
}
