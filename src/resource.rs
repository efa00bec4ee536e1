//! Capabilities shared by the resource handles and collections.

use bytes::Bytes;
use http::request::Builder;
use http::Method;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use std::future::Future;

use crate::docker::Client;
use crate::errors::Error;
use crate::options::Filters;
use crate::uri::Endpoint;

/// A client-side handle to one remote docker object.
///
/// The handle owns the JSON it was built from: either an element of a listing, the response of a
/// create call, or just the identifier. It never caches the result of an inspection.
pub trait Resource {
    /// The identifier used to address the object, i.e. the last part of its endpoint.
    fn id(&self) -> &str;

    /// The JSON snapshot this handle was built from.
    fn json(&self) -> &Map<String, Value>;

    /// The endpoint addressing the object.
    fn endpoint(&self) -> &Endpoint;

    /// A field of the snapshot.
    fn get(&self, key: &str) -> Option<&Value> {
        self.json().get(key)
    }

    /// A string field of the snapshot.
    fn get_str(&self, key: &str) -> Option<&str> {
        self.json().get(key).and_then(Value::as_str)
    }
}

/// Objects whose current state can be fetched from the daemon.
pub trait Inspectable {
    /// Fetch the current state. Every call issues a fresh request.
    fn inspect(&self) -> impl Future<Output = Result<Value, Error>> + Send;
}

/// Objects that can be deleted with default options.
pub trait Removable {
    /// Delete the object.
    fn remove(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Collections whose listing can be narrowed with filters.
pub trait Filterable: Sized {
    /// The filters accumulated so far.
    fn filters(&self) -> &Filters;

    #[doc(hidden)]
    fn filters_mut(&mut self) -> &mut Filters;

    /// Merge more filters into the ones already set.
    ///
    /// ## Examples
    ///
    /// ```rust,no_run
    /// use capstan::{Docker, Filterable};
    ///
    /// let docker = Docker::connect_with_local_defaults().unwrap();
    /// let containers = docker
    ///     .containers()
    ///     .filter([("status", vec!["exited"])])
    ///     .filter([("label", vec!["tier=web"])]);
    /// ```
    fn filter<K, V, I, F>(mut self, filters: F) -> Self
    where
        F: IntoIterator<Item = (K, I)>,
        I: IntoIterator<Item = V>,
        K: Into<String>,
        V: Into<String>,
    {
        self.filters_mut().merge(filters);
        self
    }
}

type Constructor<R> = fn(String, Map<String, Value>, Client, Endpoint) -> R;

/// Handles over the elements of a listing.
///
/// The listing is fetched in full when the iterator is created; handles are built as the
/// iterator advances. Each call to the listing method issues a new request and returns a new
/// iterator.
#[derive(Debug)]
pub struct ResourceIter<R> {
    items: std::vec::IntoIter<(String, Map<String, Value>)>,
    client: Client,
    collection: Endpoint,
    make: Constructor<R>,
}

impl<R> Iterator for ResourceIter<R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        let (id, json) = self.items.next()?;
        let endpoint = self.collection.child(&id);
        Some((self.make)(id, json, self.client.clone(), endpoint))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<R> ExactSizeIterator for ResourceIter<R> {}

/// Where a listing endpoint keeps its elements and how they are identified.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Listing {
    pub(crate) kind: &'static str,
    pub(crate) id_key: &'static str,
    /// The key holding the array, for endpoints that wrap it in an object.
    pub(crate) items_key: Option<&'static str>,
}

pub(crate) async fn list<R, O>(
    client: &Client,
    collection: &Endpoint,
    url: &Endpoint,
    query: Option<O>,
    listing: Listing,
    make: Constructor<R>,
) -> Result<ResourceIter<R>, Error>
where
    O: Serialize,
{
    let req = client.build_request(url, Builder::new().method(Method::GET), query, Ok(Bytes::new()));
    let body: Value = client.process_into_value(req, &[200]).await?;

    let array = match listing.items_key {
        Some(key) => match body {
            Value::Object(mut wrapper) => wrapper.remove(key).unwrap_or(Value::Null),
            other => other,
        },
        None => body,
    };
    let elements = match array {
        Value::Array(elements) => elements,
        Value::Null => Vec::new(),
        other => {
            return Err(Error::malformed(format!(
                "expected a list of {}s, got {}",
                listing.kind, other
            )))
        }
    };

    let items = elements
        .into_iter()
        .map(|element| {
            let json = match element {
                Value::Object(json) => json,
                other => {
                    return Err(Error::malformed(format!(
                        "expected a {} object, got {}",
                        listing.kind, other
                    )))
                }
            };
            let id = json
                .get(listing.id_key)
                .and_then(Value::as_str)
                .ok_or(Error::MissingId { kind: listing.kind })?
                .to_string();
            Ok((id, json))
        })
        .collect::<Result<Vec<_>, Error>>()?;
    debug!("Listed {} {}s", items.len(), listing.kind);

    Ok(ResourceIter {
        items: items.into_iter(),
        client: client.clone(),
        collection: collection.clone(),
        make,
    })
}

/// The identifier of a created object, read from the create response.
pub(crate) fn created_id(
    response: &Map<String, Value>,
    id_key: &str,
    kind: &'static str,
) -> Result<String, Error> {
    response
        .get(id_key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(Error::MissingId { kind })
}

macro_rules! impl_resource {
    ($ty:ident) => {
        impl $crate::resource::Resource for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn json(&self) -> &serde_json::Map<String, serde_json::Value> {
                &self.json
            }

            fn endpoint(&self) -> &$crate::uri::Endpoint {
                &self.endpoint
            }
        }
    };
}

pub(crate) use impl_resource;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Body, Headers, Response, Transport};
    use futures_util::future::BoxFuture;
    use http::Request;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Canned(&'static str);

    impl Transport for Canned {
        fn execute(&self, _: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>> {
            let body = self.0;
            Box::pin(async move { Ok(Response::new(200, Headers::new(), Body::from_bytes(body))) })
        }
    }

    #[derive(Debug)]
    struct Named {
        id: String,
        json: Map<String, Value>,
        endpoint: Endpoint,
    }

    impl_resource!(Named);

    fn named(id: String, json: Map<String, Value>, _: Client, endpoint: Endpoint) -> Named {
        Named { id, json, endpoint }
    }

    const VOLUMES: Listing = Listing {
        kind: "volume",
        id_key: "Name",
        items_key: Some("Volumes"),
    };

    async fn listed(body: &'static str, listing: Listing) -> Result<ResourceIter<Named>, Error> {
        let client = Client::new(Arc::new(Canned(body)));
        let collection = Endpoint::parse("http://localhost/v1.41/volumes").unwrap();
        list(&client, &collection, &collection, None::<()>, listing, named).await
    }

    #[tokio::test]
    async fn unwraps_nested_listing() {
        let mut iter = listed(
            r#"{"Volumes":[{"Name":"data","Driver":"local"},{"Name":"logs"}],"Warnings":null}"#,
            VOLUMES,
        )
        .await
        .unwrap();

        assert_eq!(iter.len(), 2);
        let data = iter.next().unwrap();
        assert_eq!(data.id(), "data");
        assert_eq!(data.get_str("Driver"), Some("local"));
        assert_eq!(data.endpoint().as_str(), "http://localhost/v1.41/volumes/data");
        assert_eq!(iter.next().unwrap().id(), "logs");
        assert!(iter.next().is_none());
    }

    #[tokio::test]
    async fn null_listing_is_empty() {
        let iter = listed(r#"{"Volumes":null,"Warnings":null}"#, VOLUMES).await.unwrap();
        assert_eq!(iter.count(), 0);
    }

    #[tokio::test]
    async fn element_without_id_is_rejected() {
        match listed(r#"{"Volumes":[{"Driver":"local"}]}"#, VOLUMES).await {
            Err(Error::MissingId { kind }) => assert_eq!(kind, "volume"),
            other => panic!("unexpected result: {:?}", other.map(|iter| iter.count())),
        }
    }

    #[test]
    fn reads_created_id() {
        let response = crate::json::object("Id", "f00d");
        assert_eq!(created_id(&response, "Id", "container").unwrap(), "f00d");
        assert!(matches!(
            created_id(&Map::new(), "Id", "network"),
            Err(Error::MissingId { kind: "network" })
        ));
    }
}
