//! System API: interface for interacting with the Docker server and/or Registry.

use bytes::Bytes;
use chrono::{NaiveDateTime, TimeZone};
use futures_core::Stream;
use http::request::Builder;
use http::Method;
use serde_derive::Serialize;
use serde_json::Value;

use crate::docker::{Client, Docker};
use crate::errors::Error;
use crate::options::{serialize_as_json, Filters};
use crate::read::{decode_stream, JsonLineDecoder};
use crate::resource::Filterable;
use crate::uri::Endpoint;

/// Parameters used in the [Events API](Events::monitor)
#[derive(Debug, Clone, Serialize)]
struct EventsQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    until: Option<i64>,
    #[serde(
        serialize_with = "serialize_as_json",
        skip_serializing_if = "Filters::is_empty"
    )]
    filters: &'a Filters,
}

/// Milliseconds since the epoch of a date-time in the local time zone.
fn epoch_millis(datetime: &NaiveDateTime) -> i64 {
    match chrono::Local.from_local_datetime(datetime).earliest() {
        Some(local) => local.timestamp_millis(),
        None => datetime.and_utc().timestamp_millis(),
    }
}

/// The event stream of a docker daemon.
#[derive(Debug, Clone)]
pub struct Events {
    client: Client,
    endpoint: Endpoint,
    since: Option<NaiveDateTime>,
    until: Option<NaiveDateTime>,
    filters: Filters,
}

impl Events {
    pub(crate) fn new(client: Client, endpoint: Endpoint) -> Events {
        Events {
            client,
            endpoint,
            since: None,
            until: None,
            filters: Filters::new(),
        }
    }

    /// Replay events from this local date-time on.
    pub fn since(self, since: NaiveDateTime) -> Events {
        Events {
            since: Some(since),
            ..self
        }
    }

    /// Stop the stream at this local date-time.
    pub fn until(self, until: NaiveDateTime) -> Events {
        Events {
            until: Some(until),
            ..self
        }
    }

    /// ---
    ///
    /// # Monitor Events
    ///
    /// Stream real-time events from the server.
    ///
    /// # Returns
    ///
    ///  - A stream of JSON event records, read as the daemon sends them. Without an `until`
    ///    bound the stream never ends; dropping it closes the connection.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use capstan::Docker;
    /// # let docker = Docker::connect_with_http_defaults().unwrap();
    /// use capstan::Filterable;
    /// use futures_util::stream::TryStreamExt;
    ///
    /// async {
    ///     let mut events = docker
    ///         .events()
    ///         .filter([("type", vec!["container"])])
    ///         .monitor()
    ///         .await
    ///         .unwrap();
    ///     while let Some(event) = events.try_next().await.unwrap() {
    ///         println!("{} {}", event["Action"], event["Actor"]["ID"]);
    ///     }
    /// };
    /// ```
    pub async fn monitor(
        &self,
    ) -> Result<impl Stream<Item = Result<Value, Error>> + Send + Unpin, Error> {
        let query = EventsQuery {
            since: self.since.as_ref().map(epoch_millis),
            until: self.until.as_ref().map(epoch_millis),
            filters: &self.filters,
        };
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::GET),
            Some(query),
            Ok(Bytes::new()),
        );

        let response = self.client.process_request(req, &[200]).await?;
        Ok(decode_stream(
            response.into_body().into_stream(),
            JsonLineDecoder::<Value>::new(),
        ))
    }
}

impl Filterable for Events {
    fn filters(&self) -> &Filters {
        &self.filters
    }

    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

/// The report of the [Disk Usage API](Docker::disk_usage).
#[derive(Debug, Clone, PartialEq)]
pub struct DiskUsage {
    json: Value,
}

impl DiskUsage {
    /// Wrap a `/system/df` report.
    pub fn new(json: Value) -> DiskUsage {
        DiskUsage { json }
    }

    /// The raw report.
    pub fn json(&self) -> &Value {
        &self.json
    }

    /// Bytes used by image layers.
    pub fn layers_size(&self) -> i64 {
        size(self.json.get("LayersSize"))
    }

    /// Bytes used by the root filesystems of all containers.
    pub fn containers_size(&self) -> i64 {
        sum(self.json.get("Containers"), |container| {
            container.get("SizeRootFs")
        })
    }

    /// Bytes used by all volumes.
    pub fn volumes_size(&self) -> i64 {
        sum(self.json.get("Volumes"), |volume| {
            volume.get("UsageData").and_then(|usage| usage.get("Size"))
        })
    }

    /// Layers, container filesystems and volumes, in bytes.
    pub fn total_space(&self) -> i64 {
        self.layers_size() + self.containers_size() + self.volumes_size()
    }
}

// Docker reports -1 for sizes it did not compute.
fn size(value: Option<&Value>) -> i64 {
    value.and_then(Value::as_i64).filter(|size| *size > 0).unwrap_or(0)
}

fn sum<F>(list: Option<&Value>, field: F) -> i64
where
    F: Fn(&Value) -> Option<&Value>,
{
    list.and_then(Value::as_array)
        .map(|items| items.iter().map(|item| size(field(item))).sum())
        .unwrap_or(0)
}

impl Docker {
    /// ---
    ///
    /// # Ping
    ///
    /// This is a dummy endpoint you can use to test if the server is accessible.
    ///
    /// # Returns
    ///
    ///  - A String, wrapped in a Future.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use capstan::Docker;
    /// # let docker = Docker::connect_with_http_defaults().unwrap();
    /// async {
    ///     assert_eq!(docker.ping().await.unwrap(), "OK");
    /// };
    /// ```
    pub async fn ping(&self) -> Result<String, Error> {
        let url = self.base.child("_ping");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::GET),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_string(req, &[200]).await
    }

    /// ---
    ///
    /// # Version
    ///
    /// Returns the version of Docker that is running and various information about the system
    /// that Docker is running on.
    pub async fn version(&self) -> Result<Value, Error> {
        let url = self.base.child("version");
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
    /// # Info
    ///
    /// Returns Docker client and server information that is running.
    pub async fn info(&self) -> Result<Value, Error> {
        let url = self.base.child("info");
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
    /// # Data Usage
    ///
    /// Show docker disk usage
    pub async fn disk_usage(&self) -> Result<DiskUsage, Error> {
        let url = self.base.child("system").child("df");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::GET),
            None::<()>,
            Ok(Bytes::new()),
        );

        let json = self.client.process_into_value(req, &[200]).await?;
        Ok(DiskUsage::new(json))
    }
}
