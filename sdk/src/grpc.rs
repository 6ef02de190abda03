//! gRPC transport for `outputClientImpl=grpc` clients.
//!
//! Generated clients carry one [`MethodDescriptor`] constant per method and
//! hand encoded frames to a [`Transport`]. [`GrpcTransport`] is the tonic
//! implementation; tests and alternative stacks implement the trait directly.

use std::str::FromStr;
use std::sync::Arc;

use bytes::{Buf, BufMut};
use futures_util::future::{self, BoxFuture};
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};
use http::uri::PathAndQuery;
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};

use protoweave_runtime::Message;

use crate::retry::{self, RetryPolicy};
use crate::rpc::{decode_frames, decode_status, encode_frames, encode_status, Frame};

/// Static description of one RPC method, emitted as a `_DESC` constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub service:          &'static str,
    pub method:           &'static str,
    pub client_streaming: bool,
    pub server_streaming: bool,
}

impl MethodDescriptor {
    /// The HTTP/2 path, `/package.Service/Method`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

pub trait Transport: Send + Sync {
    fn unary(
        &self,
        method: MethodDescriptor,
        request: Vec<u8>,
        metadata: MetadataMap,
    ) -> BoxFuture<'_, Result<Vec<u8>, Status>>;

    fn server_streaming(
        &self,
        method: MethodDescriptor,
        request: Vec<u8>,
        metadata: MetadataMap,
    ) -> BoxStream<'static, Result<Vec<u8>, Status>>;

    fn client_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, Frame>,
        metadata: MetadataMap,
    ) -> BoxFuture<'_, Result<Vec<u8>, Status>>;

    fn streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, Frame>,
        metadata: MetadataMap,
    ) -> BoxStream<'static, Result<Vec<u8>, Status>>;
}

/// A [`Transport`] over a tonic [`Channel`].
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    client: Grpc<Channel>,
}

impl GrpcTransport {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: Grpc::new(channel),
        }
    }

    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(endpoint.into())?.connect().await?;
        Ok(Self::new(channel))
    }
}

async fn ready(mut client: Grpc<Channel>) -> Result<Grpc<Channel>, Status> {
    client
        .ready()
        .await
        .map_err(|e| Status::unavailable(format!("transport is not ready: {e}")))?;
    Ok(client)
}

fn http_path(method: &MethodDescriptor) -> Result<PathAndQuery, Status> {
    PathAndQuery::from_str(&method.path())
        .map_err(|e| Status::internal(format!("invalid method path {}: {e}", method.path())))
}

fn build_request<T>(message: T, metadata: MetadataMap) -> Request<T> {
    let mut request = Request::new(message);
    *request.metadata_mut() = metadata;
    request
}

fn failed<T: Send + 'static>(status: Status) -> BoxStream<'static, Result<T, Status>> {
    stream::once(future::ready(Err(status))).boxed()
}

impl Transport for GrpcTransport {
    fn unary(
        &self,
        method: MethodDescriptor,
        request: Vec<u8>,
        metadata: MetadataMap,
    ) -> BoxFuture<'_, Result<Vec<u8>, Status>> {
        async move {
            let mut client = ready(self.client.clone()).await?;
            let response = client
                .unary(build_request(Ok(request), metadata), http_path(&method)?, FrameCodec)
                .await?;
            Ok(response.into_inner())
        }
        .boxed()
    }

    fn server_streaming(
        &self,
        method: MethodDescriptor,
        request: Vec<u8>,
        metadata: MetadataMap,
    ) -> BoxStream<'static, Result<Vec<u8>, Status>> {
        let client = self.client.clone();
        async move {
            let mut client = ready(client).await?;
            let response = client
                .server_streaming(build_request(Ok(request), metadata), http_path(&method)?, FrameCodec)
                .await?;
            Ok::<_, Status>(response.into_inner())
        }
        .map(|opened| match opened {
            Ok(frames) => frames.boxed(),
            Err(status) => failed(status),
        })
        .flatten_stream()
        .boxed()
    }

    fn client_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, Frame>,
        metadata: MetadataMap,
    ) -> BoxFuture<'_, Result<Vec<u8>, Status>> {
        async move {
            let mut client = ready(self.client.clone()).await?;
            let response = client
                .client_streaming(build_request(requests, metadata), http_path(&method)?, FrameCodec)
                .await?;
            Ok(response.into_inner())
        }
        .boxed()
    }

    fn streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, Frame>,
        metadata: MetadataMap,
    ) -> BoxStream<'static, Result<Vec<u8>, Status>> {
        let client = self.client.clone();
        async move {
            let mut client = ready(client).await?;
            let response = client
                .streaming(build_request(requests, metadata), http_path(&method)?, FrameCodec)
                .await?;
            Ok::<_, Status>(response.into_inner())
        }
        .map(|opened| match opened {
            Ok(frames) => frames.boxed(),
            Err(status) => failed(status),
        })
        .flatten_stream()
        .boxed()
    }
}

/// Passes already-encoded message bodies through tonic's framing untouched.
#[derive(Debug, Clone, Copy, Default)]
struct FrameCodec;

#[derive(Debug, Clone, Copy, Default)]
struct FrameEncoder;

#[derive(Debug, Clone, Copy, Default)]
struct FrameDecoder;

impl Codec for FrameCodec {
    type Encode  = Frame;
    type Decode  = Vec<u8>;
    type Encoder = FrameEncoder;
    type Decoder = FrameDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        FrameEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        FrameDecoder
    }
}

impl Encoder for FrameEncoder {
    type Item  = Frame;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put_slice(&item?);
        Ok(())
    }
}

impl Decoder for FrameDecoder {
    type Item  = Vec<u8>;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut body = vec![0; src.remaining()];
        src.copy_to_slice(&mut body);
        Ok(Some(body))
    }
}

pub async fn unary<Req, Resp>(
    transport: &dyn Transport,
    method: MethodDescriptor,
    request: &Req,
    metadata: MetadataMap,
) -> Result<Resp, Status>
where
    Req: Message,
    Resp: Message,
{
    let data = request.encode_to_vec().map_err(encode_status)?;
    let bytes = transport.unary(method, data, metadata).await?;
    Resp::decode_bytes(&bytes).map_err(decode_status)
}

/// Opens a server stream that reconnects on transient failures per `policy`.
pub fn server_streaming<Req, Resp>(
    transport: Arc<dyn Transport>,
    method: MethodDescriptor,
    request: &Req,
    metadata: MetadataMap,
    policy: RetryPolicy,
) -> BoxStream<'static, Result<Resp, Status>>
where
    Req: Message,
    Resp: Message + Send + 'static,
{
    let data = match request.encode_to_vec() {
        Ok(data) => data,
        Err(error) => return failed(encode_status(error)),
    };
    let frames = retry::retrying(
        move || transport.server_streaming(method, data.clone(), metadata.clone()),
        policy,
    );
    decode_frames(frames.boxed())
}

pub fn client_streaming<'a, Req, Resp>(
    transport: &'a dyn Transport,
    method: MethodDescriptor,
    requests: BoxStream<'static, Req>,
    metadata: MetadataMap,
) -> BoxFuture<'a, Result<Resp, Status>>
where
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
{
    let call = transport.client_streaming(method, encode_frames(requests), metadata);
    async move {
        let bytes = call.await?;
        Resp::decode_bytes(&bytes).map_err(decode_status)
    }
    .boxed()
}

pub fn bidi_streaming<Req, Resp>(
    transport: &dyn Transport,
    method: MethodDescriptor,
    requests: BoxStream<'static, Req>,
    metadata: MetadataMap,
) -> BoxStream<'static, Result<Resp, Status>>
where
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
{
    decode_frames(transport.streaming(method, encode_frames(requests), metadata))
}
