//! Detection of bulk lookup methods that get a single-key accessor.
//!
//! A unary method named `Batch*` or `Bulk*` whose request holds exactly one
//! repeated field and whose response holds exactly one repeated or map field
//! qualifies. `BatchGetWidgets(ids) -> widgets` yields `get_widget(id)`.

use crate::{
    case::{field_ident, singular, to_snake_case},
    context::Context,
    error::CompileError,
    type_map::{map_field, BaseType, Container},
    types::{MethodSchema, ServiceSchema},
};

const PREFIXES: [&str; 2] = ["Batch", "Bulk"];

#[derive(Debug, Clone, PartialEq)]
pub struct BatchMethod<'a> {
    pub method:       &'a MethodSchema,
    /// Snake-case name of the bulk method.
    pub bulk:         String,
    pub accessor:     String,
    pub param:        String,
    pub request_path: String,
    pub input_field:  String,
    pub key_type:     String,
    pub output_field: String,
    pub value_type:   String,
    /// Results are looked up by key rather than by position.
    pub keyed:        bool,
}

impl BatchMethod<'_> {
    pub fn loader_field(&self) -> String {
        format!("{}_loader", self.accessor)
    }
}

/// `BatchGetWidgets` → `get_widget`.
pub fn accessor_name(method: &str) -> Option<String> {
    let stem = PREFIXES.iter().find_map(|prefix| method.strip_prefix(prefix))?;
    if !stem.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    let stem = if stem.starts_with("Get") {
        stem.to_string()
    } else {
        format!("Get{}", stem)
    };
    let stem = stem.strip_suffix('s').unwrap_or(&stem);
    Some(field_ident(&to_snake_case(stem)))
}

fn detect_one<'a>(ctx: &Context<'_>, method: &'a MethodSchema) -> Result<Option<BatchMethod<'a>>, CompileError> {
    if method.client_streaming || method.server_streaming {
        return Ok(None);
    }
    let Some(accessor) = accessor_name(&method.name) else {
        return Ok(None);
    };

    let input = ctx.index.message(&method.input_type, &method.name)?;
    let output = ctx.index.message(&method.output_type, &method.name)?;
    let ([input_field], [output_field]) = (input.fields.as_slice(), output.fields.as_slice()) else {
        return Ok(None);
    };
    if !input_field.is_repeated() || !output_field.is_repeated() {
        return Ok(None);
    }

    let input_mapped = map_field(ctx, &method.input_type, input_field)?;
    if !matches!(input_mapped.container, Container::Repeated) {
        return Ok(None);
    }
    let output_mapped = map_field(ctx, &method.output_type, output_field)?;
    let key_type = input_mapped.base.rust_type();
    let keyed = match &output_mapped.container {
        Container::Repeated => false,
        Container::Map(shape) if shape.key.rust_type() == key_type => true,
        _ => return Ok(None),
    };

    let value_type = match &output_mapped.base {
        BaseType::Message { .. } => output_mapped.base.unboxed().rust_type(),
        other => other.rust_type(),
    };

    let single = singular(&input_mapped.ident);
    let param = if single == input_mapped.ident {
        "key".to_string()
    } else {
        field_ident(&single)
    };

    Ok(Some(BatchMethod {
        method,
        bulk: field_ident(&method.name),
        accessor,
        param,
        request_path: ctx.path(&method.input_type, "")?,
        input_field: input_mapped.ident,
        key_type,
        output_field: output_mapped.ident,
        value_type,
        keyed,
    }))
}

/// Batch accessors for `service`, skipping any whose name is already a method.
pub fn detect<'a>(ctx: &Context<'_>, service: &'a ServiceSchema) -> Result<Vec<BatchMethod<'a>>, CompileError> {
    let taken: Vec<String> = service.methods.iter().map(|m| field_ident(&m.name)).collect();
    let mut found: Vec<BatchMethod<'a>> = Vec::new();

    for method in &service.methods {
        let Some(batch) = detect_one(ctx, method)? else {
            continue;
        };
        if taken.contains(&batch.accessor) || found.iter().any(|other| other.accessor == batch.accessor) {
            tracing::warn!(
                service = %service.name,
                method = %method.name,
                accessor = %batch.accessor,
                "batch accessor name collides with an existing method, skipping"
            );
            continue;
        }
        tracing::debug!(method = %method.name, accessor = %batch.accessor, keyed = batch.keyed, "batch method detected");
        found.push(batch);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{fixture, with_context};
    use crate::options::Config;

    #[test]
    fn accessor_names() {
        assert_eq!(accessor_name("BatchGetWidgets").as_deref(), Some("get_widget"));
        assert_eq!(accessor_name("BatchWidgets").as_deref(), Some("get_widget"));
        assert_eq!(accessor_name("BulkItemsById").as_deref(), Some("get_items_by_id"));
        assert_eq!(accessor_name("Batchelor"), None);
        assert_eq!(accessor_name("GetWidgets"), None);
    }

    #[test]
    fn detects_positional_and_keyed_methods() {
        let files = fixture();
        let found = with_context(&files, &Config::default(), |ctx| {
            let service = &ctx.file.services[0];
            detect(ctx, service)
                .unwrap()
                .into_iter()
                .map(|b| (b.accessor, b.param, b.key_type, b.value_type, b.keyed))
                .collect::<Vec<_>>()
        });
        assert_eq!(
            found,
            vec![
                ("get_item".to_string(), "id".to_string(), "String".to_string(), "Item".to_string(), false),
                (
                    "get_items_by_id".to_string(),
                    "id".to_string(),
                    "String".to_string(),
                    "Item".to_string(),
                    true
                ),
            ]
        );
    }

    #[test]
    fn collisions_are_skipped() {
        let mut files = fixture();
        let shop = files.last_mut().unwrap();
        let mut existing = shop.services[0].methods[2].clone();
        existing.name = "GetItem".to_string();
        shop.services[0].methods.push(existing);

        let accessors = with_context(&files, &Config::default(), |ctx| {
            detect(ctx, &ctx.file.services[0])
                .unwrap()
                .into_iter()
                .map(|b| b.accessor)
                .collect::<Vec<_>>()
        });
        assert_eq!(accessors, vec!["get_items_by_id".to_string()]);
    }
}
