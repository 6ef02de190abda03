use std::collections::BTreeSet;

use prost_types::compiler::{
    code_generator_response::{Feature, File},
    CodeGeneratorRequest, CodeGeneratorResponse,
};
use prost_types::FileDescriptorProto;

use crate::{
    context::Context,
    error::CompileError,
    gen_rust::{generate_file, generate_module_index, MODULE_INDEX},
    helpers::HelperRegistry,
    index::{output_file_name, TypeIndex},
    options::Config,
    parser::parse_file,
    types::FileSchema,
    verifier::verify_schema,
};

const WELL_KNOWN_PREFIX: &str = "google/protobuf/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name:    String,
    pub content: String,
}

/// Requested files plus the well-known type files they depend on, directly or
/// transitively. Generated code refers to those types by module path, so they
/// must exist in the output.
fn files_to_emit(descriptors: &[FileDescriptorProto], requested: &[String]) -> BTreeSet<String> {
    let mut emit: BTreeSet<String> = requested.iter().cloned().collect();
    let mut stack: Vec<&str> = requested.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();

    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        let Some(file) = descriptors.iter().find(|file| file.name() == name) else {
            continue;
        };
        for dependency in &file.dependency {
            if dependency.starts_with(WELL_KNOWN_PREFIX) {
                emit.insert(dependency.clone());
            }
            stack.push(dependency);
        }
    }
    emit
}

/// Compiles `requested` (file names within `descriptors`) with the given
/// parameter string. Any error aborts the whole run. The output ends with a
/// `mod.rs` index declaring every generated file.
pub fn compile_files(
    descriptors: &[FileDescriptorProto],
    requested: &[String],
    parameter: &str,
) -> Result<Vec<GeneratedFile>, CompileError> {
    let config = Config::parse(parameter)?;
    tracing::debug!(?config, "parsed configuration");

    let files = descriptors
        .iter()
        .map(parse_file)
        .collect::<Result<Vec<FileSchema>, _>>()?;
    let index = TypeIndex::build(&files)?;
    tracing::debug!(types = index.len(), files = files.len(), "built type index");
    verify_schema(&files, &index)?;

    let registry = HelperRegistry::new(config.long);
    let emit = files_to_emit(descriptors, requested);

    let mut generated = Vec::new();
    for file in files.iter().filter(|file| emit.contains(&file.name)) {
        tracing::debug!(file = %file.name, "generating");
        let ctx = Context::new(&config, &index, &registry, file);
        generated.push(GeneratedFile {
            name:    output_file_name(&file.name),
            content: generate_file(&ctx)?,
        });
    }

    if let Some(index) = generate_module_index(generated.iter().map(|file| file.name.as_str())) {
        generated.push(GeneratedFile {
            name:    MODULE_INDEX.to_string(),
            content: index,
        });
    }
    Ok(generated)
}

pub fn compile(request: &CodeGeneratorRequest) -> Result<Vec<GeneratedFile>, CompileError> {
    compile_files(&request.proto_file, &request.file_to_generate, request.parameter())
}

/// Runs [`compile`] and packs the outcome into a plugin response; failures go
/// into the response's `error` field.
pub fn compile_request(request: &CodeGeneratorRequest) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse {
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    };
    match compile(request) {
        Ok(files) => {
            response.file = files
                .into_iter()
                .map(|file| File {
                    name: Some(file.name),
                    content: Some(file.content),
                    ..Default::default()
                })
                .collect();
        }
        Err(error) => {
            tracing::debug!(%error, "compilation failed");
            response.error = Some(error.to_string());
        }
    }
    response
}

/// The type index of `descriptors` as pretty-printed JSON.
pub fn inspect(descriptors: &[FileDescriptorProto]) -> Result<String, CompileError> {
    let files = descriptors
        .iter()
        .map(parse_file)
        .collect::<Result<Vec<FileSchema>, _>>()?;
    let index = TypeIndex::build(&files)?;
    Ok(serde_json::to_string_pretty(&index)?)
}
