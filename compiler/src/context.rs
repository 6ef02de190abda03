use std::cell::RefCell;

use crate::{
    error::CompileError,
    helpers::{Helper, HelperRegistry, HelperSet},
    index::TypeIndex,
    options::Config,
    types::FileSchema,
};

/// Everything generation of one file reads, plus that file's helper usage.
pub struct Context<'a> {
    pub config:   &'a Config,
    pub index:    &'a TypeIndex<'a>,
    pub registry: &'a HelperRegistry,
    pub file:     &'a FileSchema,
    used:         RefCell<HelperSet>,
}

impl<'a> Context<'a> {
    pub fn new(
        config: &'a Config,
        index: &'a TypeIndex<'a>,
        registry: &'a HelperRegistry,
        file: &'a FileSchema,
    ) -> Self {
        Self {
            config,
            index,
            registry,
            file,
            used: RefCell::new(HelperSet::default()),
        }
    }

    /// Rust path of a schema type as seen from this file.
    pub fn path(&self, full_name: &str, suffix: &str) -> Result<String, CompileError> {
        self.index
            .rust_path(full_name, &self.file.name, &self.config.module_root, suffix)
    }

    /// Marks a helper used by this file and returns its function name.
    pub fn helper(&self, helper: Helper) -> &'static str {
        self.used.borrow_mut().mark(self.registry, helper)
    }

    pub fn take_helpers(&self) -> HelperSet {
        self.used.take()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{
        EnumSchema, EnumValueSchema, FieldKind, FieldSchema, Label, MessageSchema, MethodSchema,
        OneofSchema, ServiceSchema, Syntax,
    };

    pub fn field(name: &str, number: i32, kind: FieldKind, label: Label, type_name: Option<&str>) -> FieldSchema {
        FieldSchema {
            name: name.to_string(),
            json_name: crate::case::to_lower_camel(name),
            number,
            kind,
            label,
            type_name: type_name.map(str::to_string),
            oneof_index: None,
            proto3_optional: false,
        }
    }

    pub fn scalar(name: &str, number: i32, kind: FieldKind) -> FieldSchema {
        field(name, number, kind, Label::Optional, None)
    }

    pub fn message(name: &str, fields: Vec<FieldSchema>) -> MessageSchema {
        MessageSchema {
            name: name.to_string(),
            fields,
            oneofs: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            map_entry: false,
        }
    }

    pub fn map_entry(name: &str, key: FieldKind, value: FieldSchema) -> MessageSchema {
        let mut entry = message(name, vec![scalar("key", 1, key), value]);
        entry.map_entry = true;
        entry
    }

    pub fn file(name: &str, package: &str, messages: Vec<MessageSchema>) -> FileSchema {
        FileSchema {
            name: name.to_string(),
            package: package.to_string(),
            syntax: Syntax::Proto3,
            enums: Vec::new(),
            messages,
            services: Vec::new(),
        }
    }

    /// Well-known types, a second module and a shop file exercising most
    /// field shapes. The shop file is last.
    pub fn fixture() -> Vec<FileSchema> {
        let timestamp = file(
            "google/protobuf/timestamp.proto",
            "google.protobuf",
            vec![message(
                "Timestamp",
                vec![scalar("seconds", 1, FieldKind::Int64), scalar("nanos", 2, FieldKind::Int32)],
            )],
        );
        let wrappers = file(
            "google/protobuf/wrappers.proto",
            "google.protobuf",
            vec![
                message("StringValue", vec![scalar("value", 1, FieldKind::String)]),
                message("Int64Value", vec![scalar("value", 1, FieldKind::Int64)]),
            ],
        );
        let user = file(
            "common/user.proto",
            "common",
            vec![message("User", vec![scalar("id", 1, FieldKind::String)])],
        );

        let mut item = message(
            "Item",
            vec![
                scalar("name", 1, FieldKind::String),
                scalar("price", 2, FieldKind::Int64),
                field("tags", 3, FieldKind::String, Label::Repeated, None),
                field("status", 4, FieldKind::Enum, Label::Optional, Some(".shop.Item.Status")),
            ],
        );
        item.enums.push(EnumSchema {
            name:   "Status".to_string(),
            values: vec![
                EnumValueSchema {
                    name:   "UNKNOWN".to_string(),
                    number: 0,
                },
                EnumValueSchema {
                    name:   "ACTIVE".to_string(),
                    number: 1,
                },
            ],
        });

        let mut coupon = scalar("coupon", 6, FieldKind::String);
        coupon.oneof_index = Some(0);
        let mut discount = scalar("discount", 7, FieldKind::Int32);
        discount.oneof_index = Some(0);

        let mut cart = message(
            "Cart",
            vec![
                field("items", 1, FieldKind::Message, Label::Repeated, Some(".shop.Item")),
                field("counts", 2, FieldKind::Message, Label::Repeated, Some(".shop.Cart.CountsEntry")),
                field("owner", 3, FieldKind::Message, Label::Optional, Some(".common.User")),
                field("note", 4, FieldKind::Message, Label::Optional, Some(".google.protobuf.StringValue")),
                field("created", 5, FieldKind::Message, Label::Optional, Some(".google.protobuf.Timestamp")),
                coupon,
                discount,
            ],
        );
        cart.oneofs.push(OneofSchema {
            name: "discount_kind".to_string(),
        });
        cart.messages.push(map_entry("CountsEntry", FieldKind::String, scalar("value", 2, FieldKind::Int32)));

        let category = message(
            "Category",
            vec![
                scalar("name", 1, FieldKind::String),
                field("parent", 2, FieldKind::Message, Label::Optional, Some(".shop.Category")),
            ],
        );

        let batch_request = message(
            "BatchGetItemsRequest",
            vec![field("ids", 1, FieldKind::String, Label::Repeated, None)],
        );
        let batch_response = message(
            "BatchGetItemsResponse",
            vec![field("items", 1, FieldKind::Message, Label::Repeated, Some(".shop.Item"))],
        );
        let mut keyed_response = message(
            "BulkItemsByIdResponse",
            vec![field(
                "items",
                1,
                FieldKind::Message,
                Label::Repeated,
                Some(".shop.BulkItemsByIdResponse.ItemsEntry"),
            )],
        );
        keyed_response.messages.push(map_entry(
            "ItemsEntry",
            FieldKind::String,
            field("value", 2, FieldKind::Message, Label::Optional, Some(".shop.Item")),
        ));

        let mut shop = file(
            "shop/cart.proto",
            "shop",
            vec![item, cart, category, batch_request, batch_response, keyed_response],
        );
        shop.services.push(ServiceSchema {
            name:    "Shop".to_string(),
            methods: vec![
                MethodSchema {
                    name:             "BatchGetItems".to_string(),
                    input_type:       ".shop.BatchGetItemsRequest".to_string(),
                    output_type:      ".shop.BatchGetItemsResponse".to_string(),
                    client_streaming: false,
                    server_streaming: false,
                },
                MethodSchema {
                    name:             "BulkItemsById".to_string(),
                    input_type:       ".shop.BatchGetItemsRequest".to_string(),
                    output_type:      ".shop.BulkItemsByIdResponse".to_string(),
                    client_streaming: false,
                    server_streaming: false,
                },
                MethodSchema {
                    name:             "WatchCart".to_string(),
                    input_type:       ".shop.Cart".to_string(),
                    output_type:      ".shop.Cart".to_string(),
                    client_streaming: false,
                    server_streaming: true,
                },
            ],
        });

        vec![timestamp, wrappers, user, shop]
    }

    /// Runs `f` with a context for the last file of `files`.
    pub fn with_context<R>(files: &[FileSchema], config: &Config, f: impl FnOnce(&Context<'_>) -> R) -> R {
        let index = TypeIndex::build(files).unwrap();
        let registry = HelperRegistry::new(config.long);
        let file = files.last().unwrap();
        let ctx = Context::new(config, &index, &registry, file);
        f(&ctx)
    }
}
