use clap::{Parser, Subcommand};
use prost::Message;
use prost_types::compiler::CodeGeneratorRequest;
use prost_types::FileDescriptorSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use protoweave_compiler::{compile_files, compile_request, inspect, CompileError};

const LOG_ENV: &str = "PROTOWEAVE_LOG";

#[derive(Parser)]
#[command(name = "protoc-gen-protoweave")]
#[command(
    about = "Generate Rust messages and service clients from protobuf descriptors",
    long_about = "Run without a subcommand to act as a protoc plugin: a CodeGeneratorRequest is read \
                  from stdin and a CodeGeneratorResponse is written to stdout."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Rust code from a serialized `FileDescriptorSet`
    Generate {
        /// Descriptor set, e.g. from `protoc --include_imports --descriptor_set_out`
        #[arg(short, long)]
        descriptor_set: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Files to generate (defaults to every non-well-known file in the set)
        #[arg(short, long)]
        file: Vec<String>,

        /// Parameter string, as protoc would pass it (`forceLong=string,oneof=unions`)
        #[arg(short, long)]
        param: Option<String>,

        /// Additional options, repeatable (`--opt forceLong=string`)
        #[arg(long)]
        opt: Vec<String>,
    },

    /// Print the type index of a descriptor set as JSON
    Inspect {
        #[arg(short, long)]
        descriptor_set: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_descriptor_set(path: &PathBuf) -> Result<FileDescriptorSet, CompileError> {
    let data = fs::read(path)?;
    Ok(FileDescriptorSet::decode(data.as_slice())?)
}

fn run_plugin() -> Result<(), CompileError> {
    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input)?;
    let request = CodeGeneratorRequest::decode(input.as_slice())?;
    tracing::debug!(files = ?request.file_to_generate, "received plugin request");

    let response = compile_request(&request);
    if let Some(error) = &response.error {
        tracing::error!(%error, "generation failed");
    }
    io::stdout().write_all(&response.encode_to_vec())?;
    Ok(())
}

fn main() -> Result<(), CompileError> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        None => run_plugin(),

        Some(Commands::Generate { descriptor_set, out, file, param, opt }) => {
            let set = read_descriptor_set(&descriptor_set)?;
            let requested = if file.is_empty() {
                set.file
                    .iter()
                    .map(|f| f.name().to_string())
                    .filter(|name| !name.starts_with("google/protobuf/"))
                    .collect()
            } else {
                file
            };
            let parameter = param.into_iter().chain(opt).collect::<Vec<_>>().join(",");

            for generated in compile_files(&set.file, &requested, &parameter)? {
                let path = out.join(&generated.name);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, &generated.content)?;
                println!("Generated {}", path.display());
            }
            Ok(())
        }

        Some(Commands::Inspect { descriptor_set }) => {
            let set = read_descriptor_set(&descriptor_set)?;
            println!("{}", inspect(&set.file)?);
            Ok(())
        }
    }
}
