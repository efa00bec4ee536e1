#![cfg(feature = "http")]
//! TCP transport backed by hyper.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::TryStreamExt;
use http::Request;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use log::debug;

use std::time::Duration;

use crate::errors::Error;
use crate::transport::{Body, Headers, Response, Transport};

/// Talks to the docker daemon over TCP through a pooled hyper client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpTransport {
    /// A transport with its own connection pool.
    pub fn new(timeout: Duration) -> HttpTransport {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);

        let client = Client::builder(TokioExecutor::new()).build(http_connector);

        HttpTransport { client, timeout }
    }

    async fn send(&self, request: Request<Bytes>) -> Result<Response, Error> {
        debug!("Sending {} {}", request.method(), request.uri());

        let response = tokio::time::timeout(self.timeout, self.client.request(request.map(Full::new)))
            .await
            .map_err(|_| Error::RequestTimeoutError)??;

        let (parts, body) = response.into_parts();
        let mut headers = Headers::new();
        for (name, value) in &parts.headers {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }

        let body = body.into_data_stream().map_err(Error::from);
        Ok(Response::new(
            parts.status.as_u16(),
            headers,
            Body::from_stream(body),
        ))
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>> {
        Box::pin(self.send(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reads_status_headers_and_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: 27\r\n\r\n{\"message\":\"no such image\"}",
                )
                .await
                .unwrap();
        });

        let transport = HttpTransport::new(Duration::from_secs(5));
        let request = Request::builder()
            .uri(format!("http://{}/v1.41/images/nope/json", addr))
            .body(Bytes::new())
            .unwrap();
        let response = transport.execute(request).await.unwrap();

        assert_eq!(response.status(), 404);
        assert_eq!(response.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(
            response.text().await.unwrap(),
            "{\"message\":\"no such image\"}"
        );
    }
}
