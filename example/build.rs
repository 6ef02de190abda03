//! Compiles the sample shop schema once per option set and mounts each
//! output tree as a module of this crate.

use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions, MethodDescriptorProto, OneofDescriptorProto,
    ServiceDescriptorProto,
};

/// Module name and plugin parameter of every generated tree.
const OPTION_SETS: [(&str, &str); 4] = [
    ("defaults", ""),
    ("strings", "forceLong=string,useDate=date,outputClientImpl=grpc"),
    (
        "bigints",
        "forceLong=bigint,useDate=string,stringEnums=true,jsonEnums=number,oneof=unions,snakeToCamel=false",
    ),
    ("minimal", "outputJsonMethods=false,outputPartialMethods=false,outputClientImpl=false"),
];

const WIDGET_FILE: &str = "shop/widget.proto";

fn field(name: &str, number: i32, kind: Type, label: Label, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(kind as i32),
        type_name: type_name.map(str::to_string),
        ..Default::default()
    }
}

fn scalar(name: &str, number: i32, kind: Type) -> FieldDescriptorProto {
    field(name, number, kind, Label::Optional, None)
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn oneof(name: &str) -> OneofDescriptorProto {
    OneofDescriptorProto {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn method(name: &str, input: &str, output: &str, client_streaming: bool, server_streaming: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(input.to_string()),
        output_type: Some(output.to_string()),
        client_streaming: Some(client_streaming),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

fn timestamp_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("google/protobuf/timestamp.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![message(
            "Timestamp",
            vec![scalar("seconds", 1, Type::Int64), scalar("nanos", 2, Type::Int32)],
        )],
        ..Default::default()
    }
}

fn wrappers_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("google/protobuf/wrappers.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            message("StringValue", vec![scalar("value", 1, Type::String)]),
            message("Int64Value", vec![scalar("value", 1, Type::Int64)]),
        ],
        ..Default::default()
    }
}

/// `shop.Widget` touches every field shape the generator knows: scalars,
/// 64-bit integers, packed repeats, a map, well-known types, a oneof, an
/// enum, a recursive child and a proto3 `optional`.
fn widget_file() -> FileDescriptorProto {
    let mut name = scalar("name", 7, Type::String);
    name.oneof_index = Some(0);
    let mut count = scalar("count", 8, Type::Int32);
    count.oneof_index = Some(0);
    let mut featured = scalar("featured", 11, Type::Bool);
    featured.oneof_index = Some(1);
    featured.proto3_optional = Some(true);

    let mut stock_entry = message(
        "StockEntry",
        vec![scalar("key", 1, Type::String), scalar("value", 2, Type::Int32)],
    );
    stock_entry.options = Some(MessageOptions {
        map_entry: Some(true),
        ..Default::default()
    });

    let part = message(
        "Part",
        vec![
            scalar("sku", 1, Type::String),
            field("child", 2, Type::Message, Label::Optional, Some(".shop.Widget.Part")),
        ],
    );

    let mut widget = message(
        "Widget",
        vec![
            scalar("id", 1, Type::String),
            scalar("weight", 2, Type::Int64),
            field("sizes", 3, Type::Int32, Label::Repeated, None),
            field("stock", 4, Type::Message, Label::Repeated, Some(".shop.Widget.StockEntry")),
            field("created", 5, Type::Message, Label::Optional, Some(".google.protobuf.Timestamp")),
            field("note", 6, Type::Message, Label::Optional, Some(".google.protobuf.StringValue")),
            name,
            count,
            field("color", 9, Type::Enum, Label::Optional, Some(".shop.Color")),
            field("parts", 10, Type::Message, Label::Repeated, Some(".shop.Widget.Part")),
            featured,
            scalar("blob", 12, Type::Bytes),
            scalar("serial", 13, Type::Uint64),
            scalar("ratio", 14, Type::Double),
            field("quota", 15, Type::Message, Label::Optional, Some(".google.protobuf.Int64Value")),
            scalar("display_name", 16, Type::String),
        ],
    );
    widget.oneof_decl = vec![oneof("label"), oneof("_featured")];
    widget.nested_type = vec![stock_entry, part];

    let color = EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: ["COLOR_UNSPECIFIED", "COLOR_RED", "COLOR_BLUE"]
            .iter()
            .zip(0..)
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let service = ServiceDescriptorProto {
        name: Some("Widgets".to_string()),
        method: vec![
            method(
                "BatchGetWidgets",
                ".shop.BatchGetWidgetsRequest",
                ".shop.BatchGetWidgetsResponse",
                false,
                false,
            ),
            method("WatchWidget", ".shop.Widget", ".shop.Widget", false, true),
            method("UploadWidgets", ".shop.Widget", ".shop.BatchGetWidgetsResponse", true, false),
        ],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some(WIDGET_FILE.to_string()),
        package: Some("shop".to_string()),
        syntax: Some("proto3".to_string()),
        dependency: vec![
            "google/protobuf/timestamp.proto".to_string(),
            "google/protobuf/wrappers.proto".to_string(),
        ],
        message_type: vec![
            widget,
            message(
                "BatchGetWidgetsRequest",
                vec![field("ids", 1, Type::String, Label::Repeated, None)],
            ),
            message(
                "BatchGetWidgetsResponse",
                vec![field("widgets", 1, Type::Message, Label::Repeated, Some(".shop.Widget"))],
            ),
        ],
        enum_type: vec![color],
        service: vec![service],
        ..Default::default()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo::rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptors = vec![timestamp_file(), wrappers_file(), widget_file()];
    let requested = vec![WIDGET_FILE.to_string()];

    let mut modules = String::new();
    for (module, options) in OPTION_SETS {
        let root = format!("moduleRoot=crate::{}", module);
        let parameter = if options.is_empty() {
            root
        } else {
            format!("{},{}", options, root)
        };

        let dir = out_dir.join(module);
        for file in protoweave_compiler::compile_files(&descriptors, &requested, &parameter)? {
            let path = dir.join(&file.name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, file.content)?;
        }

        let index = dir.join("mod.rs");
        modules.push_str(&format!("#[path = {:?}]\npub mod {};\n", index.display().to_string(), module));
    }

    fs::write(out_dir.join("generated.rs"), modules)?;
    Ok(())
}
