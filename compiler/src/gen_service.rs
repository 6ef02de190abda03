//! Service traits and client implementations.

use crate::{
    batch::{detect, BatchMethod},
    case::{field_ident, to_upper_snake},
    code::CodeWriter,
    context::Context,
    error::CompileError,
    options::ClientImpl,
    types::{MethodSchema, ServiceSchema},
};

const BOX_FUTURE: &str = "::protoweave::futures_util::future::BoxFuture";
const BOX_STREAM: &str = "::protoweave::futures_util::stream::BoxStream";
const STATUS: &str = "::protoweave::tonic::Status";
const METADATA: &str = "::protoweave::tonic::metadata::MetadataMap";

/// A method with its Rust-facing names resolved. Derived from the schema,
/// which is never modified.
struct MethodView<'a> {
    schema:   &'a MethodSchema,
    ident:    String,
    request:  String,
    response: String,
}

impl MethodView<'_> {
    fn signature(&self) -> String {
        let input = if self.schema.client_streaming {
            format!("requests: {}<'static, {}>", BOX_STREAM, self.request)
        } else {
            format!("request: {}", self.request)
        };
        let output = if self.schema.server_streaming {
            format!("{}<'static, Result<{}, {}>>", BOX_STREAM, self.response, STATUS)
        } else {
            format!("{}<'_, Result<{}, {}>>", BOX_FUTURE, self.response, STATUS)
        };
        format!("fn {}(&self, {}) -> {}", self.ident, input, output)
    }
}

struct ServiceView<'a> {
    schema:    &'a ServiceSchema,
    /// `package.Service`, as sent on the wire.
    full_name: String,
    constant:  String,
    methods:   Vec<MethodView<'a>>,
    batches:   Vec<BatchMethod<'a>>,
}

impl ServiceView<'_> {
    fn descriptor(&self, method: &MethodView<'_>) -> String {
        format!("{}_{}_DESC", to_upper_snake(&self.schema.name), to_upper_snake(&method.schema.name))
    }

    /// The view of the bulk method behind `batch`.
    fn bulk(&self, batch: &BatchMethod<'_>) -> Result<&MethodView<'_>, CompileError> {
        self.methods
            .iter()
            .find(|method| method.schema.name == batch.method.name)
            .ok_or_else(|| CompileError::UnresolvedType {
                name:    batch.method.name.clone(),
                context: self.full_name.clone(),
            })
    }
}

fn view<'a>(ctx: &Context<'_>, service: &'a ServiceSchema) -> Result<ServiceView<'a>, CompileError> {
    let methods = service
        .methods
        .iter()
        .map(|method| {
            Ok(MethodView {
                schema:   method,
                ident:    field_ident(&method.name),
                request:  ctx.path(&method.input_type, "")?,
                response: ctx.path(&method.output_type, "")?,
            })
        })
        .collect::<Result<Vec<_>, CompileError>>()?;

    let full_name = if ctx.file.package.is_empty() {
        service.name.clone()
    } else {
        format!("{}.{}", ctx.file.package, service.name)
    };

    Ok(ServiceView {
        schema: service,
        full_name,
        constant: format!("{}_SERVICE_NAME", to_upper_snake(&service.name)),
        methods,
        batches: detect(ctx, service)?,
    })
}

fn accessor_signature(batch: &BatchMethod<'_>) -> String {
    format!(
        "fn {}(&self, {}: {}) -> {}<'_, Result<{}, {}>>",
        batch.accessor, batch.param, batch.key_type, BOX_FUTURE, batch.value_type, STATUS
    )
}

/// Extraction of per-key results from `response`, given the requested keys in `keys`.
fn fan_out(batch: &BatchMethod<'_>, keys: &str) -> String {
    if batch.keyed {
        format!("::protoweave::batch::by_key(&{}, response.{})", keys, batch.output_field)
    } else {
        format!("::protoweave::batch::by_position({}.len(), response.{})", keys, batch.output_field)
    }
}

fn write_trait(service: &ServiceView<'_>, w: &mut CodeWriter) {
    w.open(format!("pub trait {}: Send + Sync", service.schema.name));
    for method in &service.methods {
        w.line(format!("{};", method.signature()));
    }

    for batch in &service.batches {
        w.blank();
        w.line(format!("/// Single-key form of `{}`.", batch.bulk));
        w.open(accessor_signature(batch));
        w.open("Box::pin(async move");
        w.line(format!("let keys = vec![{}];", batch.param));
        w.line(format!(
            "let request = {} {{ {}: keys.clone() }};",
            batch.request_path, batch.input_field
        ));
        w.line(format!("let response = self.{}(request).await?;", batch.bulk));
        w.line(format!("::protoweave::batch::single({})", fan_out(batch, "keys")));
        w.close_with("})");
        w.close();
    }
    w.close();
}

/// Loader construction; `call` issues the bulk request bound as `request`.
fn write_loader(batch: &BatchMethod<'_>, captures: &[&str], call: &str, w: &mut CodeWriter) {
    w.open(format!("let {} =", batch.loader_field()));
    for capture in captures {
        w.line(format!("let {c} = {c}.clone();", c = capture));
    }
    w.open(format!("::protoweave::DataLoader::new(move |keys: Vec<{}>|", batch.key_type));
    for capture in captures {
        w.line(format!("let {c} = {c}.clone();", c = capture));
    }
    w.open("async move");
    w.line(format!(
        "let request = {} {{ {}: keys.clone() }};",
        batch.request_path, batch.input_field
    ));
    w.line(format!("{}.await.map(|response| {})", call, fan_out(batch, "keys")));
    w.close();
    w.close_with("})");
    w.close_with("};");
}

fn write_rpc_client(service: &ServiceView<'_>, w: &mut CodeWriter) -> Result<(), CompileError> {
    let client = format!("{}ClientImpl", service.schema.name);

    w.open(format!("pub struct {}", client));
    w.line("rpc: ::std::sync::Arc<dyn ::protoweave::rpc::Rpc>,");
    for batch in &service.batches {
        w.line(format!(
            "{}: ::protoweave::DataLoader<{}, {}>,",
            batch.loader_field(),
            batch.key_type,
            batch.value_type
        ));
    }
    w.close();
    w.blank();

    w.open(format!("impl {}", client));
    w.open("pub fn new(rpc: ::std::sync::Arc<dyn ::protoweave::rpc::Rpc>) -> Self");
    for batch in &service.batches {
        let call = format!(
            "::protoweave::rpc::unary::<_, {}>(rpc.as_ref(), {}, \"{}\", &request)",
            service.bulk(batch)?.response,
            service.constant,
            batch.method.name
        );
        write_loader(batch, &["rpc"], &call, w);
    }
    write_constructor_tail(&["rpc"], service, w);
    w.close();
    w.close();
    w.blank();

    w.open(format!("impl {} for {}", service.schema.name, client));
    for (position, method) in service.methods.iter().enumerate() {
        if position > 0 {
            w.blank();
        }
        w.open(method.signature());
        let target = format!("self.rpc.as_ref(), {}, \"{}\"", service.constant, method.schema.name);
        match (method.schema.client_streaming, method.schema.server_streaming) {
            (false, false) => {
                w.line(format!(
                    "Box::pin(async move {{ ::protoweave::rpc::unary({}, &request).await }})",
                    target
                ));
            }
            (false, true) => {
                w.line(format!("::protoweave::rpc::server_streaming({}, &request)", target));
            }
            (true, false) => {
                w.line(format!("::protoweave::rpc::client_streaming({}, requests)", target));
            }
            (true, true) => {
                w.line(format!("::protoweave::rpc::bidi_streaming({}, requests)", target));
            }
        }
        w.close();
    }
    write_accessor_overrides(service, w);
    w.close();
    Ok(())
}

fn write_constructor_tail(fields: &[&str], service: &ServiceView<'_>, w: &mut CodeWriter) {
    w.open("Self");
    for field in fields {
        w.line(format!("{},", field));
    }
    for batch in &service.batches {
        w.line(format!("{},", batch.loader_field()));
    }
    w.close();
}

fn write_accessor_overrides(service: &ServiceView<'_>, w: &mut CodeWriter) {
    for batch in &service.batches {
        w.blank();
        w.open(accessor_signature(batch));
        w.line(format!(
            "Box::pin(async move {{ self.{}.load({}).await.map_err({}::from) }})",
            batch.loader_field(),
            batch.param,
            STATUS
        ));
        w.close();
    }
}

fn write_descriptors(service: &ServiceView<'_>, w: &mut CodeWriter) {
    for method in &service.methods {
        w.open(format!(
            "pub const {}: ::protoweave::grpc::MethodDescriptor = ::protoweave::grpc::MethodDescriptor",
            service.descriptor(method)
        ));
        w.line(format!("service: {},", service.constant));
        w.line(format!("method: \"{}\",", method.schema.name));
        w.line(format!("client_streaming: {},", method.schema.client_streaming));
        w.line(format!("server_streaming: {},", method.schema.server_streaming));
        w.close_with("};");
    }
}

fn write_grpc_client(service: &ServiceView<'_>, w: &mut CodeWriter) -> Result<(), CompileError> {
    let client = format!("{}ClientImpl", service.schema.name);

    write_descriptors(service, w);
    w.blank();

    w.open(format!("pub struct {}", client));
    w.line("transport: ::std::sync::Arc<dyn ::protoweave::grpc::Transport>,");
    w.line(format!("metadata: {},", METADATA));
    w.line("retry: ::protoweave::RetryPolicy,");
    for batch in &service.batches {
        w.line(format!(
            "{}: ::protoweave::DataLoader<{}, {}>,",
            batch.loader_field(),
            batch.key_type,
            batch.value_type
        ));
    }
    w.close();
    w.blank();

    w.open(format!("impl {}", client));
    w.open("pub fn new(transport: ::std::sync::Arc<dyn ::protoweave::grpc::Transport>) -> Self");
    w.line(format!(
        "Self::with_options(transport, {}::new(), ::protoweave::RetryPolicy::default())",
        METADATA
    ));
    w.close();
    w.blank();

    w.line("/// `metadata` is sent with every call; `retry` governs server streams.");
    w.open(format!(
        "pub fn with_options(transport: ::std::sync::Arc<dyn ::protoweave::grpc::Transport>, metadata: {}, retry: ::protoweave::RetryPolicy) -> Self",
        METADATA
    ));
    for batch in &service.batches {
        let bulk = service.bulk(batch)?;
        let call = format!(
            "::protoweave::grpc::unary::<_, {}>(transport.as_ref(), {}, &request, metadata)",
            bulk.response,
            service.descriptor(bulk)
        );
        write_loader(batch, &["transport", "metadata"], &call, w);
    }
    write_constructor_tail(&["transport", "metadata", "retry"], service, w);
    w.close();
    w.close();
    w.blank();

    w.open(format!("impl {} for {}", service.schema.name, client));
    for (position, method) in service.methods.iter().enumerate() {
        if position > 0 {
            w.blank();
        }
        let descriptor = service.descriptor(method);
        w.open(method.signature());
        match (method.schema.client_streaming, method.schema.server_streaming) {
            (false, false) => {
                w.line(format!(
                    "Box::pin(async move {{ ::protoweave::grpc::unary(self.transport.as_ref(), {}, &request, self.metadata.clone()).await }})",
                    descriptor
                ));
            }
            (false, true) => {
                w.line("::protoweave::grpc::server_streaming(");
                w.indent();
                w.line("::std::sync::Arc::clone(&self.transport),");
                w.line(format!("{},", descriptor));
                w.line("&request,");
                w.line("self.metadata.clone(),");
                w.line("self.retry.clone(),");
                w.close_with(")");
            }
            (true, false) => {
                w.line(format!(
                    "::protoweave::grpc::client_streaming(self.transport.as_ref(), {}, requests, self.metadata.clone())",
                    descriptor
                ));
            }
            (true, true) => {
                w.line(format!(
                    "::protoweave::grpc::bidi_streaming(self.transport.as_ref(), {}, requests, self.metadata.clone())",
                    descriptor
                ));
            }
        }
        w.close();
    }
    write_accessor_overrides(service, w);
    w.close();
    Ok(())
}

pub fn write_service(ctx: &Context<'_>, service: &ServiceSchema, w: &mut CodeWriter) -> Result<(), CompileError> {
    let view = view(ctx, service)?;
    tracing::debug!(service = %view.full_name, methods = view.methods.len(), "generating service");

    w.line(format!("pub const {}: &str = \"{}\";", view.constant, view.full_name));
    w.blank();
    write_trait(&view, w);

    match ctx.config.client_impl {
        ClientImpl::None => {}
        ClientImpl::Rpc => {
            w.blank();
            write_rpc_client(&view, w)?;
        }
        ClientImpl::Grpc => {
            w.blank();
            write_grpc_client(&view, w)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{fixture, with_context};
    use crate::options::Config;

    fn generated(config: &Config) -> String {
        let files = fixture();
        with_context(&files, config, |ctx| {
            let mut w = CodeWriter::new();
            write_service(ctx, &ctx.file.services[0], &mut w).unwrap();
            w.finish()
        })
    }

    #[test]
    fn trait_lists_methods_and_accessors() {
        let out = generated(&Config::parse("outputClientImpl=false").unwrap());
        assert!(out.contains("pub const SHOP_SERVICE_NAME: &str = \"shop.Shop\";"));
        assert!(out.contains("pub trait Shop: Send + Sync {"));
        assert!(out.contains(
            "fn batch_get_items(&self, request: BatchGetItemsRequest) -> ::protoweave::futures_util::future::BoxFuture<'_, Result<BatchGetItemsResponse, ::protoweave::tonic::Status>>;"
        ));
        assert!(out.contains(
            "fn watch_cart(&self, request: Cart) -> ::protoweave::futures_util::stream::BoxStream<'static, Result<Cart, ::protoweave::tonic::Status>>;"
        ));
        assert!(out.contains("/// Single-key form of `batch_get_items`."));
        assert!(out.contains("::protoweave::batch::single(::protoweave::batch::by_position(keys.len(), response.items))"));
        assert!(out.contains("::protoweave::batch::single(::protoweave::batch::by_key(&keys, response.items))"));
        assert!(!out.contains("ClientImpl"));
    }

    #[test]
    fn rpc_client_uses_loaders() {
        let out = generated(&Config::default());
        assert!(out.contains("pub struct ShopClientImpl {"));
        assert!(out.contains("get_item_loader: ::protoweave::DataLoader<String, Item>,"));
        assert!(out.contains("::protoweave::rpc::unary::<_, BatchGetItemsResponse>(rpc.as_ref(), SHOP_SERVICE_NAME, \"BatchGetItems\", &request)"));
        assert!(out.contains("::protoweave::rpc::server_streaming(self.rpc.as_ref(), SHOP_SERVICE_NAME, \"WatchCart\", &request)"));
        assert!(out.contains("Box::pin(async move { self.get_item_loader.load(id).await.map_err(::protoweave::tonic::Status::from) })"));
    }

    #[test]
    fn grpc_client_has_descriptors_and_retry() {
        let out = generated(&Config::parse("outputClientImpl=grpc").unwrap());
        assert!(out.contains(
            "pub const SHOP_WATCH_CART_DESC: ::protoweave::grpc::MethodDescriptor = ::protoweave::grpc::MethodDescriptor {"
        ));
        assert!(out.contains("server_streaming: true,"));
        let call = [
            "    fn watch_cart(&self, request: Cart) -> ::protoweave::futures_util::stream::BoxStream<'static, Result<Cart, ::protoweave::tonic::Status>> {",
            "        ::protoweave::grpc::server_streaming(",
            "            ::std::sync::Arc::clone(&self.transport),",
            "            SHOP_WATCH_CART_DESC,",
            "            &request,",
            "            self.metadata.clone(),",
            "            self.retry.clone(),",
            "        )",
            "    }",
        ]
        .join("\n");
        assert!(out.contains(&call));
        assert!(out.contains("pub fn with_options(transport: ::std::sync::Arc<dyn ::protoweave::grpc::Transport>,"));
        assert!(out.contains("::protoweave::grpc::unary::<_, BatchGetItemsResponse>(transport.as_ref(), SHOP_BATCH_GET_ITEMS_DESC, &request, metadata)"));
    }
}
