use crate::error::BoxError;
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

/// Largest request body a router reads unless told otherwise, 2 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The request body as seen by the pipeline, whatever the host server produced.
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// Boxes any host body into a [`RequestBody`].
pub fn boxed<B>(body: B) -> RequestBody
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::<BoxError>::into).boxed_unsync()
}

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("failed to read body: {0}")]
    Read(#[source] BoxError),
    #[error("body is not valid json: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Reads at most `limit` bytes and parses them as JSON; an empty body reads as `{}`.
pub async fn read_json(body: RequestBody, limit: usize) -> Result<Value, BodyError> {
    let collect: BoxFuture<'static, _> = Box::pin(Limited::new(body, limit).collect());
    let bytes = match collect.await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => return Err(BodyError::TooLarge { limit }),
        Err(e) => return Err(BodyError::Read(e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_slice(&bytes).map_err(BodyError::Malformed)
}

/// A fully buffered response body.
#[derive(Debug)]
pub struct ResponseBody {
    inner: Option<Bytes>,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Some(bytes) } }
    }

    /// The bytes not yet polled, mostly useful in tests.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_deref().unwrap_or_default()
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<()> for ResponseBody {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().inner.take().map(|bytes| Ok(Frame::data(bytes))))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            None => SizeHint::with_exact(0),
            Some(bytes) => SizeHint::with_exact(bytes.len() as u64),
        }
    }
}
