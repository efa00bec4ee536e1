//! Network API: Networks are user-defined networks that containers can be attached to.

use bytes::Bytes;
use http::request::Builder;
use http::Method;
use log::debug;
use serde_derive::Serialize;
use serde_json::{Map, Value};

use crate::docker::{serialize_payload, Client};
use crate::errors::Error;
use crate::json;
use crate::options::{FilterOptions, Filters};
use crate::resource::{
    created_id, impl_resource, list, Filterable, Inspectable, Listing, Removable, ResourceIter,
};
use crate::uri::Endpoint;

const LISTING: Listing = Listing {
    kind: "network",
    id_key: "Id",
    items_key: None,
};

/// Body of the [Disconnect Network API](Network::disconnect)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DisconnectNetworkBody<'a> {
    container: &'a str,
    force: bool,
}

/// The networks of a docker daemon.
#[derive(Debug, Clone)]
pub struct Networks {
    client: Client,
    endpoint: Endpoint,
    filters: Filters,
}

impl Networks {
    pub(crate) fn new(client: Client, endpoint: Endpoint) -> Networks {
        Networks {
            client,
            endpoint,
            filters: Filters::new(),
        }
    }

    /// The endpoint of the collection.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The networks matching the accumulated filters.
    pub async fn iter(&self) -> Result<ResourceIter<Network>, Error> {
        list(
            &self.client,
            &self.endpoint,
            &self.endpoint,
            Some(FilterOptions {
                filters: &self.filters,
            }),
            LISTING,
            Network::new,
        )
        .await
    }

    /// A handle to a network by name or id, without contacting the daemon.
    pub fn get(&self, id: &str) -> Network {
        Network::new(
            id.to_string(),
            json::object("Id", id),
            self.client.clone(),
            self.endpoint.child(id),
        )
    }

    /// Create a network with the daemon's default driver.
    pub async fn create(&self, name: &str) -> Result<Network, Error> {
        self.create_with(name, &Map::new()).await
    }

    /// ---
    ///
    /// # Create Network
    ///
    /// # Arguments
    ///
    ///  - `name`: the name of the network.
    ///  - `config`: the rest of the network configuration, e.g. `{"Driver": "overlay"}`. A
    ///    `Name` in it is overridden by `name`.
    pub async fn create_with(
        &self,
        name: &str,
        config: &Map<String, Value>,
    ) -> Result<Network, Error> {
        let payload = json::merge(config, &json::object("Name", name));
        let url = self.endpoint.child("create");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(&payload)),
        );

        let response: Map<String, Value> = self.client.process_into_value(req, &[201]).await?;
        let id = created_id(&response, "Id", LISTING.kind)?;
        debug!("Created network {} ({})", name, id);

        let endpoint = self.endpoint.child(&id);
        Ok(Network::new(
            id,
            json::merge(&payload, &response),
            self.client.clone(),
            endpoint,
        ))
    }

    /// Delete unused networks matching the accumulated filters.
    pub async fn prune(&self) -> Result<Value, Error> {
        let url = self.endpoint.child("prune");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            Some(FilterOptions {
                filters: &self.filters,
            }),
            Ok(Bytes::new()),
        );

        self.client.process_into_value(req, &[200]).await
    }
}

impl Filterable for Networks {
    fn filters(&self) -> &Filters {
        &self.filters
    }

    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

/// A handle to one network.
#[derive(Debug, Clone)]
pub struct Network {
    id: String,
    json: Map<String, Value>,
    client: Client,
    endpoint: Endpoint,
}

impl_resource!(Network);

impl Network {
    pub(crate) fn new(
        id: String,
        json: Map<String, Value>,
        client: Client,
        endpoint: Endpoint,
    ) -> Network {
        Network {
            id,
            json,
            client,
            endpoint,
        }
    }

    /// Attach a container to the network.
    pub async fn connect(&self, container: &str) -> Result<(), Error> {
        self.connect_with(&json::object("Container", container))
            .await
    }

    /// Attach a container with a full endpoint configuration, e.g.
    /// `{"Container": "web", "EndpointConfig": {"Aliases": ["app"]}}`.
    pub async fn connect_with(&self, config: &Map<String, Value>) -> Result<(), Error> {
        let url = self.endpoint.child("connect");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(config)),
        );

        self.client.process_into_unit(req, &[200]).await
    }

    /// ---
    ///
    /// # Disconnect Network
    ///
    /// # Arguments
    ///
    ///  - `container`: the container to detach.
    ///  - `force`: detach even if the container is not running.
    pub async fn disconnect(&self, container: &str, force: bool) -> Result<(), Error> {
        let url = self.endpoint.child("disconnect");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(DisconnectNetworkBody { container, force })),
        );

        self.client.process_into_unit(req, &[200]).await
    }
}

impl Inspectable for Network {
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

impl Removable for Network {
    async fn remove(&self) -> Result<(), Error> {
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::DELETE),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_unit(req, &[204]).await
    }
}
