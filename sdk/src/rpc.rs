//! The plain request abstraction behind `outputClientImpl=true` clients.
//!
//! An [`Rpc`] moves opaque byte payloads addressed by `(service, method)`;
//! the typed helpers in this module encode requests and decode responses so
//! generated clients stay one line per method.

use futures_util::future::{self, BoxFuture};
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};
use tonic::Status;

use protoweave_runtime::{CodecError, Message};

/// One encoded request frame of a client stream.
pub type Frame = Result<Vec<u8>, Status>;

pub trait Rpc: Send + Sync {
    fn request(
        &self,
        service: &'static str,
        method: &'static str,
        data: Vec<u8>,
    ) -> BoxFuture<'_, Result<Vec<u8>, Status>>;

    fn server_streaming(
        &self,
        service: &'static str,
        method: &'static str,
        _data: Vec<u8>,
    ) -> BoxStream<'static, Result<Vec<u8>, Status>> {
        stream::once(future::ready(Err(unimplemented(service, method)))).boxed()
    }

    fn client_streaming(
        &self,
        service: &'static str,
        method: &'static str,
        _requests: BoxStream<'static, Frame>,
    ) -> BoxFuture<'_, Result<Vec<u8>, Status>> {
        future::ready(Err(unimplemented(service, method))).boxed()
    }

    fn bidi_streaming(
        &self,
        service: &'static str,
        method: &'static str,
        _requests: BoxStream<'static, Frame>,
    ) -> BoxStream<'static, Result<Vec<u8>, Status>> {
        stream::once(future::ready(Err(unimplemented(service, method)))).boxed()
    }
}

fn unimplemented(service: &str, method: &str) -> Status {
    Status::unimplemented(format!("{service}/{method} is not supported by this Rpc"))
}

pub(crate) fn encode_status(error: CodecError) -> Status {
    Status::internal(format!("failed to encode request: {error}"))
}

pub(crate) fn decode_status(error: CodecError) -> Status {
    Status::internal(format!("failed to decode response: {error}"))
}

pub(crate) fn encode_frames<Req>(requests: BoxStream<'static, Req>) -> BoxStream<'static, Frame>
where
    Req: Message + Send + 'static,
{
    requests
        .map(|request| request.encode_to_vec().map_err(encode_status))
        .boxed()
}

pub(crate) fn decode_frames<Resp>(
    frames: BoxStream<'static, Result<Vec<u8>, Status>>,
) -> BoxStream<'static, Result<Resp, Status>>
where
    Resp: Message + Send + 'static,
{
    frames
        .map(|frame| frame.and_then(|bytes| Resp::decode_bytes(&bytes).map_err(decode_status)))
        .boxed()
}

pub async fn unary<Req, Resp>(
    rpc: &dyn Rpc,
    service: &'static str,
    method: &'static str,
    request: &Req,
) -> Result<Resp, Status>
where
    Req: Message,
    Resp: Message,
{
    let data = request.encode_to_vec().map_err(encode_status)?;
    let bytes = rpc.request(service, method, data).await?;
    Resp::decode_bytes(&bytes).map_err(decode_status)
}

pub fn server_streaming<Req, Resp>(
    rpc: &dyn Rpc,
    service: &'static str,
    method: &'static str,
    request: &Req,
) -> BoxStream<'static, Result<Resp, Status>>
where
    Req: Message,
    Resp: Message + Send + 'static,
{
    match request.encode_to_vec() {
        Ok(data) => decode_frames(rpc.server_streaming(service, method, data)),
        Err(error) => stream::once(future::ready(Err(encode_status(error)))).boxed(),
    }
}

pub fn client_streaming<'a, Req, Resp>(
    rpc: &'a dyn Rpc,
    service: &'static str,
    method: &'static str,
    requests: BoxStream<'static, Req>,
) -> BoxFuture<'a, Result<Resp, Status>>
where
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
{
    let call = rpc.client_streaming(service, method, encode_frames(requests));
    async move {
        let bytes = call.await?;
        Resp::decode_bytes(&bytes).map_err(decode_status)
    }
    .boxed()
}

pub fn bidi_streaming<Req, Resp>(
    rpc: &dyn Rpc,
    service: &'static str,
    method: &'static str,
    requests: BoxStream<'static, Req>,
) -> BoxStream<'static, Result<Resp, Status>>
where
    Req: Message + Send + 'static,
    Resp: Message + Send + 'static,
{
    decode_frames(rpc.bidi_streaming(service, method, encode_frames(requests)))
}
