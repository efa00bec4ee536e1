//! Exec API: Run new commands inside running containers

use bytes::Bytes;
use http::request::Builder;
use http::Method;
use serde_derive::Serialize;
use serde_json::{Map, Value};

use crate::docker::{serialize_payload, Client};
use crate::errors::Error;
use crate::read::demultiplex;
use crate::resource::{impl_resource, Inspectable};
use crate::uri::Endpoint;

/// Exec configuration used in the [Start Exec API](Exec::start)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartExecBody {
    detach: bool,
    tty: bool,
}

/// A command set up to run inside a container.
#[derive(Debug, Clone)]
pub struct Exec {
    id: String,
    json: Map<String, Value>,
    client: Client,
    endpoint: Endpoint,
}

impl_resource!(Exec);

impl Exec {
    pub(crate) fn new(
        id: String,
        json: Map<String, Value>,
        client: Client,
        endpoint: Endpoint,
    ) -> Exec {
        Exec {
            id,
            json,
            client,
            endpoint,
        }
    }

    fn tty(&self) -> bool {
        self.json
            .get("Tty")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// ---
    ///
    /// # Start Exec
    ///
    /// Starts a previously set up exec instance.
    ///
    /// # Arguments
    ///
    ///  - `detach`: return as soon as the command started, without its output.
    ///
    /// # Returns
    ///
    ///  - The output of the command, with the stream framing stripped. Empty when detached.
    pub async fn start(&self, detach: bool) -> Result<String, Error> {
        let tty = self.tty();
        let url = self.endpoint.child("start");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(StartExecBody { detach, tty })),
        );

        let response = self.client.process_request(req, &[200]).await?;
        if detach {
            response.into_body().drain().await?;
            return Ok(String::new());
        }

        let mut output = Vec::new();
        for frame in demultiplex(response.bytes().await?, tty)? {
            output.extend_from_slice(frame.as_ref());
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

impl Inspectable for Exec {
    async fn inspect(&self) -> Result<Value, Error> {
        let url = self.endpoint.child("json");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::GET),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_value(req, &[200]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_body_is_pascal_case() {
        let body = serde_json::to_string(&StartExecBody {
            detach: false,
            tty: true,
        })
        .unwrap();
        assert_eq!(body, r#"{"Detach":false,"Tty":true}"#);
    }
}
