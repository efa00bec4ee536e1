//! Image API: creating, manipulating and pushing docker images

use bytes::Bytes;
use http::request::Builder;
use http::Method;
use log::debug;
use serde_derive::Serialize;
use serde_json::{Map, Value};

use crate::docker::Client;
use crate::errors::Error;
use crate::json;
use crate::options::{FilterOptions, Filters, ListOptions};
use crate::read::consume_progress;
use crate::resource::{impl_resource, list, Filterable, Inspectable, Listing, Removable, ResourceIter};
use crate::uri::Endpoint;

const LISTING: Listing = Listing {
    kind: "image",
    id_key: "Id",
    items_key: None,
};

/// Parameters used in the [Pull Image API](Images::pull)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateImageQuery<'a> {
    from_image: &'a str,
    tag: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct TagImageQuery<'a> {
    repo: &'a str,
    tag: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct PushImageQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
}

/// The images stored by a docker daemon.
#[derive(Debug, Clone)]
pub struct Images {
    client: Client,
    endpoint: Endpoint,
    filters: Filters,
}

impl Images {
    pub(crate) fn new(client: Client, endpoint: Endpoint) -> Images {
        Images {
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
    /// # List Images
    ///
    /// Returns the top-level images matching the accumulated filters.
    pub async fn iter(&self) -> Result<ResourceIter<Image>, Error> {
        self.list(false).await
    }

    /// Like [Images::iter], but includes intermediate layers.
    pub async fn all(&self) -> Result<ResourceIter<Image>, Error> {
        self.list(true).await
    }

    async fn list(&self, all: bool) -> Result<ResourceIter<Image>, Error> {
        let query = ListOptions {
            all,
            filters: &self.filters,
        };
        list(
            &self.client,
            &self.endpoint,
            &self.endpoint.child("json"),
            Some(query),
            LISTING,
            Image::new,
        )
        .await
    }

    /// A handle to an image by name or id, without contacting the daemon.
    ///
    /// Names may contain slashes, e.g. `library/alpine:3.19`.
    pub fn get(&self, name: &str) -> Image {
        Image::new(
            name.to_string(),
            json::object("Id", name),
            self.client.clone(),
            self.endpoint.child(name),
        )
    }

    /// ---
    ///
    /// # Pull Image
    ///
    /// Pull an image from a registry. The call resolves once the daemon finished the download.
    ///
    /// # Arguments
    ///
    ///  - `from_image`: the image to pull, e.g. `library/alpine`.
    ///  - `tag`: the tag to pull.
    ///
    /// # Returns
    ///
    ///  - A handle to the pulled image, or a [DockerStreamError](Error::DockerStreamError) if the
    ///    daemon reported a failure in its progress stream.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use capstan::Docker;
    /// # let docker = Docker::connect_with_http_defaults().unwrap();
    /// async {
    ///     let alpine = docker.images().pull("alpine", "3.19").await.unwrap();
    /// };
    /// ```
    pub async fn pull(&self, from_image: &str, tag: &str) -> Result<Image, Error> {
        let url = self.endpoint.child("create");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            Some(CreateImageQuery { from_image, tag }),
            Ok(Bytes::new()),
        );

        let response = self.client.process_request(req, &[200]).await?;
        consume_progress(response.into_body().into_stream(), from_image).await?;
        debug!("Pulled {}:{}", from_image, tag);

        Ok(self.get(&format!("{}:{}", from_image, tag)))
    }

    /// Delete unused images matching the accumulated filters.
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

impl Filterable for Images {
    fn filters(&self) -> &Filters {
        &self.filters
    }

    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

/// A handle to one image.
#[derive(Debug, Clone)]
pub struct Image {
    id: String,
    json: Map<String, Value>,
    client: Client,
    endpoint: Endpoint,
}

impl_resource!(Image);

impl Image {
    pub(crate) fn new(
        id: String,
        json: Map<String, Value>,
        client: Client,
        endpoint: Endpoint,
    ) -> Image {
        Image {
            id,
            json,
            client,
            endpoint,
        }
    }

    /// The layers the image is built from, newest first.
    pub async fn history(&self) -> Result<Value, Error> {
        let url = self.endpoint.child("history");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::GET),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_value(req, &[200]).await
    }

    /// ---
    ///
    /// # Tag Image
    ///
    /// Create a tag that refers to this image.
    ///
    /// # Arguments
    ///
    ///  - `repo`: the repository, e.g. `registry.example.com/web`.
    ///  - `tag`: the name of the new tag.
    pub async fn tag(&self, repo: &str, tag: &str) -> Result<(), Error> {
        let url = self.endpoint.child("tag");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            Some(TagImageQuery { repo, tag }),
            Ok(Bytes::new()),
        );

        self.client.process_into_unit(req, &[201]).await
    }

    /// ---
    ///
    /// # Push Image
    ///
    /// Push the image to the registry its name refers to. The registry credentials are taken
    /// from the client, see [Docker::with_registry_auth](crate::Docker::with_registry_auth).
    pub async fn push(&self, tag: Option<&str>) -> Result<(), Error> {
        let url = self.endpoint.child("push");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            Some(PushImageQuery { tag }),
            Ok(Bytes::new()),
        );

        let response = self.client.process_request(req, &[200]).await?;
        consume_progress(response.into_body().into_stream(), &self.id).await
    }
}

impl Inspectable for Image {
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

impl Removable for Image {
    async fn remove(&self) -> Result<(), Error> {
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::DELETE),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_drained(req, &[200]).await
    }
}
