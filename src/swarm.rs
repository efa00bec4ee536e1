//! Swarm API: Docker swarm is a container orchestration tool, meaning that it allows the user to manage multiple containers deployed across multiple host machines.

use bytes::Bytes;
use http::request::Builder;
use http::Method;
use serde_derive::Serialize;
use serde_json::{Map, Value};

use crate::docker::{serialize_payload, Client};
use crate::errors::Error;
use crate::json;
use crate::resource::Inspectable;
use crate::uri::Endpoint;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:2377";

/// Parameters used in the [Leave Swarm API](Swarm::leave)
#[derive(Debug, Clone, Copy, Serialize)]
struct LeaveSwarmQuery {
    force: bool,
}

/// The swarm a docker daemon takes part in.
#[derive(Debug, Clone)]
pub struct Swarm {
    client: Client,
    endpoint: Endpoint,
}

impl Swarm {
    pub(crate) fn new(client: Client, endpoint: Endpoint) -> Swarm {
        Swarm { client, endpoint }
    }

    /// The endpoint of the swarm.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// ---
    ///
    /// # Init Swarm
    ///
    /// Initialize a new swarm, with this daemon as its manager.
    ///
    /// # Arguments
    ///
    ///  - `listen_addr`: the address used for inter-manager communication, e.g. `0.0.0.0:2377`.
    ///
    /// # Returns
    ///
    ///  - The body of the response, i.e. the id of the node as a JSON string.
    pub async fn init(&self, listen_addr: &str) -> Result<String, Error> {
        self.init_with(&json::object("ListenAddr", listen_addr))
            .await
    }

    /// Initialize a new swarm from a full configuration, merged over the defaults
    /// `{"ListenAddr": "0.0.0.0:2377", "ForceNewCluster": false}`.
    pub async fn init_with(&self, config: &Map<String, Value>) -> Result<String, Error> {
        let defaults = json::merge(
            &json::object("ListenAddr", DEFAULT_LISTEN_ADDR),
            &json::object("ForceNewCluster", false),
        );
        let payload = json::merge(&defaults, config);

        let url = self.endpoint.child("init");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(&payload)),
        );

        self.client.process_into_string(req, &[200]).await
    }

    /// Join an existing swarm, e.g. with
    /// `{"ListenAddr": "0.0.0.0:2377", "RemoteAddrs": ["10.0.0.1:2377"], "JoinToken": "..."}`.
    pub async fn join(&self, config: &Map<String, Value>) -> Result<(), Error> {
        let url = self.endpoint.child("join");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(config)),
        );

        self.client.process_into_drained(req, &[200]).await
    }

    /// Leave the swarm. A manager only leaves when `force` is set.
    pub async fn leave(&self, force: bool) -> Result<(), Error> {
        let url = self.endpoint.child("leave");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            Some(LeaveSwarmQuery { force }),
            Ok(Bytes::new()),
        );

        self.client.process_into_drained(req, &[200]).await
    }
}

impl Inspectable for Swarm {
    async fn inspect(&self) -> Result<Value, Error> {
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::GET),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_value(req, &[200]).await
    }
}
