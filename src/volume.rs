//! Volume API: Create and manage persistent storage that can be attached to containers.

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
    kind: "volume",
    id_key: "Name",
    items_key: Some("Volumes"),
};

/// Parameters used in the [Remove Volume API](Volume::remove_with)
#[derive(Debug, Clone, Copy, Serialize)]
struct RemoveVolumeQuery {
    force: bool,
}

/// The volumes of a docker daemon.
#[derive(Debug, Clone)]
pub struct Volumes {
    client: Client,
    endpoint: Endpoint,
    filters: Filters,
}

impl Volumes {
    pub(crate) fn new(client: Client, endpoint: Endpoint) -> Volumes {
        Volumes {
            client,
            endpoint,
            filters: Filters::new(),
        }
    }

    /// The endpoint of the collection.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// ---
    ///
    /// # List Volumes
    ///
    /// The daemon wraps the listing in an object; the volumes are read from its `Volumes` key.
    pub async fn iter(&self) -> Result<ResourceIter<Volume>, Error> {
        list(
            &self.client,
            &self.endpoint,
            &self.endpoint,
            Some(FilterOptions {
                filters: &self.filters,
            }),
            LISTING,
            Volume::new,
        )
        .await
    }

    /// A handle to a volume by name, without contacting the daemon.
    pub fn get(&self, name: &str) -> Volume {
        Volume::new(
            name.to_string(),
            json::object("Name", name),
            self.client.clone(),
            self.endpoint.child(name),
        )
    }

    /// Create an anonymous volume with the default driver.
    pub async fn create(&self) -> Result<Volume, Error> {
        self.create_with(&Map::new()).await
    }

    /// Create a volume, e.g. from `{"Name": "data", "Driver": "local"}`.
    pub async fn create_with(&self, config: &Map<String, Value>) -> Result<Volume, Error> {
        let url = self.endpoint.child("create");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(config)),
        );

        let response: Map<String, Value> = self.client.process_into_value(req, &[201]).await?;
        let name = created_id(&response, "Name", LISTING.kind)?;
        debug!("Created volume {}", name);

        let endpoint = self.endpoint.child(&name);
        Ok(Volume::new(name, response, self.client.clone(), endpoint))
    }

    /// Delete unused volumes matching the accumulated filters.
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

impl Filterable for Volumes {
    fn filters(&self) -> &Filters {
        &self.filters
    }

    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

/// A handle to one volume.
#[derive(Debug, Clone)]
pub struct Volume {
    id: String,
    json: Map<String, Value>,
    client: Client,
    endpoint: Endpoint,
}

impl_resource!(Volume);

impl Volume {
    pub(crate) fn new(
        id: String,
        json: Map<String, Value>,
        client: Client,
        endpoint: Endpoint,
    ) -> Volume {
        Volume {
            id,
            json,
            client,
            endpoint,
        }
    }

    /// ---
    ///
    /// # Remove Volume
    ///
    /// # Arguments
    ///
    ///  - `force`: remove the volume even if it is in use.
    pub async fn remove_with(&self, force: bool) -> Result<(), Error> {
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::DELETE),
            Some(RemoveVolumeQuery { force }),
            Ok(Bytes::new()),
        );

        self.client.process_into_unit(req, &[204]).await
    }
}

impl Inspectable for Volume {
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

impl Removable for Volume {
    async fn remove(&self) -> Result<(), Error> {
        self.remove_with(false).await
    }
}
