use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{HeaderMap, Request};
use tokio::runtime::Runtime;

use capstan::errors::Error;
use capstan::transport::{Body, Headers, Response, Transport};
use capstan::{Docker, API_DEFAULT_VERSION};

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

pub const BASE: &str = "http://localhost/v1.41";

#[allow(unused_macros)]
macro_rules! connect_to_mock_and_run {
    ($mock:expr, $exec:expr) => {{
        let rt = Runtime::new().unwrap();
        let mock: MockTransport = $mock;
        let fut = $exec(mock.docker(), mock.clone());
        run_runtime(rt, fut);
    }};
}

/// A request as the transport received it.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Recorded {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn query_pair(&self, key: &str) -> Option<String> {
        let url = url::Url::parse(&self.uri).unwrap();
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

#[derive(Debug)]
struct Canned {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    chunks: Vec<Bytes>,
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<Canned>,
    requests: Vec<Recorded>,
}

/// Serves canned responses in order and records every request.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    pub fn respond(self, status: u16, body: &'static str) -> MockTransport {
        let headers = if body.is_empty() {
            vec![]
        } else {
            vec![("Content-Type", "application/json")]
        };
        self.push(Canned {
            status,
            headers,
            chunks: vec![Bytes::from_static(body.as_bytes())],
        })
    }

    /// A streaming response, delivered in the given chunks.
    pub fn respond_chunked(self, status: u16, chunks: Vec<Vec<u8>>) -> MockTransport {
        self.push(Canned {
            status,
            headers: vec![("Transfer-Encoding", "chunked")],
            chunks: chunks.into_iter().map(Bytes::from).collect(),
        })
    }

    fn push(self, canned: Canned) -> MockTransport {
        self.state.lock().unwrap().responses.push_back(canned);
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no request was made")
    }

    pub fn docker(&self) -> Docker {
        Docker::connect_with_transport(self.clone(), "http://localhost", API_DEFAULT_VERSION)
            .unwrap()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(Recorded {
            method: request.method().to_string(),
            uri: request.uri().to_string(),
            headers: request.headers().clone(),
            body: request.body().clone(),
        });

        let response = state.responses.pop_front().map(|canned| {
            let mut headers = Headers::new();
            for (name, value) in canned.headers {
                headers.append(name, value);
            }
            let body = Body::from_stream(futures_util::stream::iter(
                canned.chunks.into_iter().map(Ok::<_, Error>),
            ));
            Response::new(canned.status, headers, body)
        });

        Box::pin(async move {
            response.ok_or_else(|| {
                Error::from(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "no canned response left",
                ))
            })
        })
    }
}

/// An 8 byte stream header followed by the payload.
#[allow(dead_code)]
pub fn frame(stream: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![stream, 0, 0, 0];
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

#[allow(dead_code)]
pub fn status_of(err: Error) -> u16 {
    match err {
        Error::UnexpectedResponse { actual, .. } => actual,
        other => panic!("expected an unexpected response error, got {:?}", other),
    }
}

#[allow(dead_code)]
pub(crate) fn run_runtime<T>(rt: Runtime, future: T)
where
    T: Future<Output = Result<(), Error>>,
{
    rt.block_on(future)
        .map_err(|e| {
            println!("{:?}", e);
            e
        })
        .unwrap();
}
