use prost_types::field_descriptor_proto::{Label as ProtoLabel, Type as ProtoType};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    ServiceDescriptorProto,
};

use crate::{
    case::to_lower_camel,
    error::CompileError,
    types::{
        EnumSchema, EnumValueSchema, FieldKind, FieldSchema, FileSchema, Label, MessageSchema,
        MethodSchema, OneofSchema, ServiceSchema, Syntax,
    },
};

/// Converts one descriptor from the request into the compiler's schema model.
pub fn parse_file(file: &FileDescriptorProto) -> Result<FileSchema, CompileError> {
    let syntax = match file.syntax() {
        "proto3" => Syntax::Proto3,
        _ => Syntax::Proto2,
    };

    Ok(FileSchema {
        name:     file.name().to_string(),
        package:  file.package().to_string(),
        syntax,
        enums:    file.enum_type.iter().map(parse_enum).collect(),
        messages: file
            .message_type
            .iter()
            .map(parse_message)
            .collect::<Result<_, _>>()?,
        services: file.service.iter().map(parse_service).collect(),
    })
}

fn parse_message(message: &DescriptorProto) -> Result<MessageSchema, CompileError> {
    let map_entry = message
        .options
        .as_ref()
        .and_then(|options| options.map_entry)
        .unwrap_or(false);

    Ok(MessageSchema {
        name:     message.name().to_string(),
        fields:   message
            .field
            .iter()
            .map(|field| parse_field(message.name(), field))
            .collect::<Result<_, _>>()?,
        oneofs:   message
            .oneof_decl
            .iter()
            .map(|oneof| OneofSchema {
                name: oneof.name().to_string(),
            })
            .collect(),
        messages: message
            .nested_type
            .iter()
            .map(parse_message)
            .collect::<Result<_, _>>()?,
        enums:    message.enum_type.iter().map(parse_enum).collect(),
        map_entry,
    })
}

fn parse_field(owner: &str, field: &FieldDescriptorProto) -> Result<FieldSchema, CompileError> {
    let unsupported = |kind: String| CompileError::UnsupportedFieldType {
        field: format!("{}.{}", owner, field.name()),
        kind,
    };

    let raw_type = field
        .r#type
        .ok_or_else(|| unsupported("<unset>".to_string()))?;
    let kind = match ProtoType::try_from(raw_type).map_err(|_| unsupported(raw_type.to_string()))? {
        ProtoType::Double   => FieldKind::Double,
        ProtoType::Float    => FieldKind::Float,
        ProtoType::Int64    => FieldKind::Int64,
        ProtoType::Uint64   => FieldKind::Uint64,
        ProtoType::Int32    => FieldKind::Int32,
        ProtoType::Fixed64  => FieldKind::Fixed64,
        ProtoType::Fixed32  => FieldKind::Fixed32,
        ProtoType::Bool     => FieldKind::Bool,
        ProtoType::String   => FieldKind::String,
        ProtoType::Group    => FieldKind::Group,
        ProtoType::Message  => FieldKind::Message,
        ProtoType::Bytes    => FieldKind::Bytes,
        ProtoType::Uint32   => FieldKind::Uint32,
        ProtoType::Enum     => FieldKind::Enum,
        ProtoType::Sfixed32 => FieldKind::Sfixed32,
        ProtoType::Sfixed64 => FieldKind::Sfixed64,
        ProtoType::Sint32   => FieldKind::Sint32,
        ProtoType::Sint64   => FieldKind::Sint64,
    };

    let label = match field.label.map(ProtoLabel::try_from) {
        Some(Ok(ProtoLabel::Repeated)) => Label::Repeated,
        Some(Ok(ProtoLabel::Required)) => Label::Required,
        _ => Label::Optional,
    };

    let json_name = match &field.json_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => to_lower_camel(field.name()),
    };

    Ok(FieldSchema {
        name: field.name().to_string(),
        json_name,
        number: field.number(),
        kind,
        label,
        type_name: field.type_name.clone().filter(|name| !name.is_empty()),
        oneof_index: field
            .oneof_index
            .and_then(|index| usize::try_from(index).ok()),
        proto3_optional: field.proto3_optional.unwrap_or(false),
    })
}

fn parse_enum(enumeration: &EnumDescriptorProto) -> EnumSchema {
    EnumSchema {
        name:   enumeration.name().to_string(),
        values: enumeration
            .value
            .iter()
            .map(|value| EnumValueSchema {
                name:   value.name().to_string(),
                number: value.number(),
            })
            .collect(),
    }
}

fn parse_service(service: &ServiceDescriptorProto) -> ServiceSchema {
    ServiceSchema {
        name:    service.name().to_string(),
        methods: service
            .method
            .iter()
            .map(|method| MethodSchema {
                name:             method.name().to_string(),
                input_type:       method.input_type().to_string(),
                output_type:      method.output_type().to_string(),
                client_streaming: method.client_streaming(),
                server_streaming: method.server_streaming(),
            })
            .collect(),
    }
}
