//! Transport API: the pluggable layer that executes a request against the docker daemon.

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use http::header::{HeaderValue, USER_AGENT};
use http::Request;
use serde::de::DeserializeOwned;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Error;

/// Value sent in the `User-Agent` header when the caller did not set one.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "capstan/",
    env!("CARGO_PKG_VERSION"),
    " Docker Engine API client. See ",
    env!("CARGO_PKG_REPOSITORY")
);

/// A stream of body chunks, as handed out by a [Transport].
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Executes a fully assembled request and hands back the response head, with a body that may
/// still be streaming from the socket.
///
/// Implementations must be safe to share between threads. Every call is independent: nothing is
/// cached, and nothing is retried.
pub trait Transport: fmt::Debug + Send + Sync {
    /// Send the request and resolve once the status line and headers have been received.
    fn execute(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>> {
        (**self).execute(request)
    }
}

/// Response headers, in the order the server sent them.
///
/// Names are matched case-insensitively; a name that appears more than once keeps all of its
/// values, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// An empty header list.
    pub fn new() -> Headers {
        Headers::default()
    }

    /// Add a value, keeping any value already recorded under the same name.
    pub fn append<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, values)) => values.push(value.into()),
            None => self.entries.push((name, vec![value.into()])),
        }
    }

    /// The first value recorded under this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Every value recorded under this name.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// Whether a value is recorded under this name.
    pub fn contains(&self, name: &str) -> bool {
        !self.get_all(name).is_empty()
    }

    /// Iterate over the header names and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// The number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no header was received.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The body of a [Response].
///
/// The body is read lazily: framing errors surface when it is consumed, not when the response
/// head is parsed.
pub struct Body {
    stream: BodyStream,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body(..)")
    }
}

impl Body {
    /// A body without content.
    pub fn empty() -> Body {
        Body::from_stream(stream::empty())
    }

    /// A body made of a single chunk.
    pub fn from_bytes<B: Into<Bytes>>(bytes: B) -> Body {
        let bytes = bytes.into();
        Body::from_stream(stream::once(async move { Ok(bytes) }))
    }

    /// A body that fails with this error once it is read.
    pub fn failed(err: Error) -> Body {
        Body::from_stream(stream::once(async move { Err(err) }))
    }

    /// A body backed by a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Body
    where
        S: Stream<Item = Result<Bytes, Error>> + Send + 'static,
    {
        Body {
            stream: Box::pin(stream),
        }
    }

    /// Hand out the chunks as they arrive.
    pub fn into_stream(self) -> BodyStream {
        self.stream
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        let buf = self
            .stream
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        Ok(buf.freeze())
    }

    /// Read the whole body as UTF-8 text.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Read the whole body and discard it.
    pub async fn drain(mut self) -> Result<(), Error> {
        while let Some(chunk) = self.stream.next().await {
            chunk?;
        }
        Ok(())
    }
}

/// A response from the docker daemon.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Assemble a response from its parts.
    pub fn new(status: u16, headers: Headers, body: Body) -> Response {
        Response {
            status,
            headers,
            body,
        }
    }

    /// The status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Take the body, dropping the head.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        self.body.bytes().await
    }

    /// Read the whole body as UTF-8 text.
    pub async fn text(self) -> Result<String, Error> {
        self.body.text().await
    }

    /// Read the whole body and deserialize it from JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, Error> {
        let bytes = self.body.bytes().await?;
        decode_json(&bytes)
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(bytes).map_err(|e| {
        if e.is_data() {
            Error::json_data(&e, bytes)
        } else {
            e.into()
        }
    })
}

/// Sets the `User-Agent` header on requests that do not carry one.
#[derive(Debug, Clone)]
pub struct UserAgentTransport<T> {
    inner: T,
    agent: HeaderValue,
}

impl<T: Transport> UserAgentTransport<T> {
    /// Wrap a transport with the default user agent.
    pub fn new(inner: T) -> UserAgentTransport<T> {
        UserAgentTransport {
            inner,
            agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }

    /// Wrap a transport with a custom user agent.
    pub fn with_agent(inner: T, agent: HeaderValue) -> UserAgentTransport<T> {
        UserAgentTransport { inner, agent }
    }
}

impl<T: Transport> Transport for UserAgentTransport<T> {
    fn execute(&self, mut request: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>> {
        if !request.headers().contains_key(USER_AGENT) {
            request
                .headers_mut()
                .insert(USER_AGENT, self.agent.clone());
        }
        self.inner.execute(request)
    }
}
