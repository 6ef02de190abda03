//! Assembles one generated Rust file from a schema file, and the module
//! index that ties the generated files into one tree.

use std::collections::BTreeMap;

use crate::{
    code::CodeWriter,
    context::Context,
    error::CompileError,
    gen_binary::write_message_impl,
    gen_json::write_json_impl,
    gen_partial::{write_from_partial, write_partial_struct},
    gen_service::write_service,
    gen_types::{write_default, write_enum, write_struct},
    index::module_ident,
    type_map::{map_message, TIMESTAMP},
    visit::{Declaration, Visitor},
};

fn write_header(ctx: &Context<'_>, w: &mut CodeWriter) {
    w.line("// Code generated by protoc-gen-protoweave. DO NOT EDIT.");
    w.line(format!("// source: {}", ctx.file.name));
    w.blank();
    w.line("#![allow(clippy::all, dead_code)]");
    w.blank();
    w.line("#[allow(unused_imports)]");
    w.line("use ::protoweave::{json, CodecError, FromPartial as _, JsonMessage as _, Message as _};");
    w.line("#[allow(unused_imports)]");
    w.line("use ::protoweave::serde_json::{Map as JsonMap, Value as JsonValue};");
    w.blank();
    w.line(format!("pub const PROTOBUF_PACKAGE: &str = \"{}\";", ctx.file.package));
}

/// Renders the Rust source for `ctx.file`.
pub fn generate_file(ctx: &Context<'_>) -> Result<String, CompileError> {
    let config = ctx.config;
    let mut w = CodeWriter::new();
    write_header(ctx, &mut w);

    for visited in Visitor::new(ctx.file) {
        tracing::trace!(name = %visited.full_name, symbol = %visited.symbol, "emitting declaration");
        w.blank();
        match visited.declaration {
            Declaration::Enum(enumeration) => {
                write_enum(&visited.symbol, enumeration, config.string_enums, config.json_enums, &mut w);
            }
            Declaration::Message(schema) => {
                let message = map_message(ctx, &visited.full_name, &visited.symbol, schema)?;
                write_struct(&message, &mut w);
                w.blank();
                write_default(&message, &mut w);
                if config.output_encode {
                    w.blank();
                    write_message_impl(ctx, &message, &mut w)?;
                }
                if config.output_json {
                    w.blank();
                    write_json_impl(ctx, &message, &mut w)?;
                }
                if config.output_partial {
                    w.blank();
                    write_partial_struct(&message, &mut w);
                    w.blank();
                    write_from_partial(&message, &mut w);
                }
            }
        }
    }

    for service in &ctx.file.services {
        w.blank();
        write_service(ctx, service, &mut w)?;
    }

    let helpers = ctx.take_helpers();
    if !helpers.is_empty() {
        let timestamp = if helpers.needs_timestamp() {
            ctx.path(TIMESTAMP, "")?
        } else {
            String::new()
        };
        for helper in helpers.iter() {
            tracing::trace!(helper = helper.name(), file = %ctx.file.name, "materializing helper");
            w.blank();
            w.fragment(&ctx.registry.render(helper, &timestamp));
        }
    }

    Ok(w.finish())
}

/// File name of the module index, placed at the root of the output.
pub const MODULE_INDEX: &str = "mod.rs";

#[derive(Debug, Default)]
struct ModuleNode {
    file:     bool,
    children: BTreeMap<String, ModuleNode>,
}

fn write_modules(nodes: &BTreeMap<String, ModuleNode>, w: &mut CodeWriter) {
    for (segment, node) in nodes {
        let ident = module_ident(segment);
        if node.file {
            if ident != *segment {
                w.line(format!("#[path = \"{}.rs\"]", segment));
            }
            w.line(format!("pub mod {};", ident));
        } else {
            if ident != *segment {
                w.line(format!("#[path = \"{}\"]", segment));
            }
            w.open(format!("pub mod {}", ident));
            write_modules(&node.children, w);
            w.close();
        }
    }
}

/// Renders `mod.rs` declaring every generated file (`a/b/c.rs` becomes
/// `pub mod a { pub mod b { pub mod c; } }`), so the output directory can be
/// mounted as a single module. Returns `None` when a name is used both as a
/// file and as a directory, which no module tree can express.
pub fn generate_module_index<'a>(files: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut root: BTreeMap<String, ModuleNode> = BTreeMap::new();
    for name in files {
        let stem = name.strip_suffix(".rs").unwrap_or(name);
        let segments: Vec<&str> = stem.split('/').filter(|segment| !segment.is_empty()).collect();
        let Some((leaf, dirs)) = segments.split_last() else {
            continue;
        };
        let mut level = &mut root;
        for dir in dirs {
            let node = level.entry(dir.to_string()).or_default();
            if node.file {
                tracing::warn!(module = %dir, "module is both a file and a directory; skipping the module index");
                return None;
            }
            level = &mut node.children;
        }
        let node = level.entry(leaf.to_string()).or_default();
        if !node.children.is_empty() {
            tracing::warn!(module = %leaf, "module is both a file and a directory; skipping the module index");
            return None;
        }
        node.file = true;
    }

    let mut w = CodeWriter::new();
    w.line("// Code generated by protoc-gen-protoweave. DO NOT EDIT.");
    w.blank();
    write_modules(&root, &mut w);
    Some(w.finish())
}
