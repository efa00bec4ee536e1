//! Errors for this module.

use std::fmt;

use serde_json::Value;

/// A capability of the docker client that a connection may choose not to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The network API.
    Networks,
    /// Running commands inside containers.
    Exec,
    /// The plugin API.
    Plugins,
    /// Swarm management.
    Swarm,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Networks => "networks",
            Capability::Exec => "exec",
            Capability::Plugins => "plugins",
            Capability::Swarm => "swarm",
        };
        f.write_str(name)
    }
}

/// The type of error embedded in an Error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error emitted when the docker server responds with a status code that the endpoint does
    /// not document for a successful call.
    #[error("Expected status {expected} but got {actual} when calling {endpoint}. Response body was {payload}")]
    UnexpectedResponse {
        /// The endpoint that was called, without its query string.
        endpoint: String,
        /// The status code the docker server responded with.
        actual: u16,
        /// The primary status code the endpoint documents as a success.
        expected: u16,
        /// The JSON error payload, or an empty object if the body was not JSON.
        payload: Value,
    },
    /// Error emitted before any request is made, when the connection does not offer the
    /// requested capability.
    #[error("The {capability} API is not supported by this docker connection")]
    UnsupportedOperation {
        /// The capability that was asked for.
        capability: Capability,
    },
    /// Error emitted when a response carries neither a `Content-Length` nor a
    /// `Transfer-Encoding` header, so its body cannot be delimited.
    #[error("Transfer-Encoding header is missing")]
    MissingTransferEncoding,
    /// Error emitted when a response is framed with a transfer encoding other than `chunked`.
    #[error("Transfer-Encoding '{encoding}' is not supported, only chunked encoding is supported")]
    UnsupportedTransferEncoding {
        /// The value of the `Transfer-Encoding` header.
        encoding: String,
    },
    /// Error emitted when a raw response or a multiplexed stream does not follow its framing.
    #[error("Malformed response from the docker server: {message}")]
    MalformedResponse {
        /// A description of what could not be parsed.
        message: String,
    },
    /// Error emitted when a create call succeeds but the response lacks the identifier of the new
    /// resource.
    #[error("The docker server did not return an identifier for the created {kind}")]
    MissingId {
        /// The kind of resource that was created.
        kind: &'static str,
    },
    /// Error emitted by the daemon in the middle of a progress stream, e.g. while pulling an image.
    #[error("Docker stream error: {error}")]
    DockerStreamError {
        /// The error message sent by the daemon.
        error: String,
    },
    /// Error emitted when a request times out.
    #[error("Timeout error")]
    RequestTimeoutError,
    /// Error facilitating debugging failed JSON parsing.
    #[error("Failed to deserialize JSON: {message}")]
    JsonDataError {
        /// Short section of the json close to the error.
        message: String,
        /// Entire JSON payload. This field is toggled with the **json_data_content** feature cargo
        /// flag.
        #[cfg(feature = "json_data_content")]
        contents: String,
        /// Character sequence at error location.
        column: usize,
    },
    /// Generic error when reading, writing or connecting to a socket.
    #[error(transparent)]
    IOError {
        /// The original error emitted.
        #[from]
        err: std::io::Error,
    },
    /// Error emitted when a payload or response cannot be (de)serialized as JSON.
    #[error(transparent)]
    JsonSerdeError {
        /// The original error emitted by serde.
        #[from]
        err: serde_json::Error,
    },
    /// Error emitted when query parameters cannot be URL encoded.
    #[error(transparent)]
    URLEncodedError {
        /// The original error emitted by serde.
        #[from]
        err: serde_urlencoded::ser::Error,
    },
    /// Error emitted when a base URL cannot be parsed.
    #[error(transparent)]
    URLParseError {
        /// The original error emitted.
        #[from]
        err: url::ParseError,
    },
    /// Error emitted when a response body is not valid UTF-8.
    #[error(transparent)]
    StrFromUtf8Error {
        /// The original error emitted.
        #[from]
        err: std::string::FromUtf8Error,
    },
    /// Error emitted when the status line or a header carries an invalid number.
    #[error(transparent)]
    ParseIntError {
        /// The original error emitted.
        #[from]
        err: std::num::ParseIntError,
    },
    /// Error emitted when the request cannot be assembled.
    #[error(transparent)]
    HttpClientError {
        /// The original error emitted.
        #[from]
        err: http::Error,
    },
    /// Error emitted when a request URI is invalid.
    #[error(transparent)]
    InvalidUriError {
        /// The original error emitted.
        #[from]
        err: http::uri::InvalidUri,
    },
    /// Error emitted when the body of a response fails to stream.
    #[error(transparent)]
    HyperResponseError {
        /// The original error emitted.
        #[from]
        err: hyper::Error,
    },
    /// Error emitted by the pooled hyper client.
    #[cfg(feature = "http")]
    #[error("Error in the hyper legacy client: {}", err)]
    HyperLegacyError {
        /// The original error emitted.
        #[from]
        err: hyper_util::client::legacy::Error,
    },
}

impl Error {
    /// The status code the docker server responded with, if this is an unexpected response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::UnexpectedResponse { actual, .. } => Some(*actual),
            _ => None,
        }
    }

    pub(crate) fn malformed<T: Into<String>>(message: T) -> Error {
        Error::MalformedResponse {
            message: message.into(),
        }
    }

    pub(crate) fn json_data(err: &serde_json::Error, _contents: &[u8]) -> Error {
        Error::JsonDataError {
            message: err.to_string(),
            #[cfg(feature = "json_data_content")]
            contents: String::from_utf8_lossy(_contents).into_owned(),
            column: err.column(),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        match err {
            Error::IOError { err } => err,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
