#![cfg(unix)]
//! Unix domain socket transport speaking raw HTTP/1.1.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use http::Request;
use log::debug;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::UnixStream;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::Error;
use crate::read::parse_response;
use crate::transport::{Response, Transport};

/// Talks to the docker daemon over a unix domain socket.
///
/// Each request opens its own connection and writes a literal HTTP/1.1 request; the raw response
/// is parsed by hand. The connection stays open while the response body is being read.
#[derive(Debug, Clone)]
pub struct UnixTransport {
    path: PathBuf,
    timeout: Duration,
}

impl UnixTransport {
    /// A transport for the socket at `path`.
    pub fn new<P: AsRef<Path>>(path: P, timeout: Duration) -> UnixTransport {
        UnixTransport {
            path: path.as_ref().to_path_buf(),
            timeout,
        }
    }

    async fn send(&self, request: Request<Bytes>) -> Result<Response, Error> {
        let raw = encode_request(&request);
        debug!(
            "Sending {} {} over {}",
            request.method(),
            request.uri(),
            self.path.display()
        );

        let exchange = async {
            let mut stream = BufStream::new(UnixStream::connect(&self.path).await?);
            stream.write_all(&raw).await?;
            stream.flush().await?;
            parse_response(stream).await
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::RequestTimeoutError)?
    }
}

impl Transport for UnixTransport {
    fn execute(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>> {
        Box::pin(self.send(request))
    }
}

/// Write the request line, headers and body of a request.
pub(crate) fn encode_request(request: &Request<Bytes>) -> Vec<u8> {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let body = request.body();

    let mut raw = format!("{} {} HTTP/1.1\r\n", request.method(), target).into_bytes();

    if !request.headers().contains_key(HOST) {
        let host = request.uri().host().unwrap_or("localhost");
        raw.extend_from_slice(format!("Host: {}\r\n", host).as_bytes());
    }
    for (name, value) in request.headers() {
        if name == CONTENT_LENGTH {
            continue;
        }
        raw.extend_from_slice(name.as_str().as_bytes());
        raw.extend_from_slice(b": ");
        raw.extend_from_slice(value.as_bytes());
        raw.extend_from_slice(b"\r\n");
    }
    if !body.is_empty() && !request.headers().contains_key(CONTENT_TYPE) {
        raw.extend_from_slice(b"Content-Type: application/json\r\n");
    }
    raw.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    raw.extend_from_slice(body);
    raw
}
