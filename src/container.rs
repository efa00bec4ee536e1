//! Container API: run docker containers and manage their lifecycle

use bytes::Bytes;
use futures_core::Stream;
use http::request::Builder;
use http::Method;
use log::debug;
use serde_derive::Serialize;
use serde_json::{Map, Value};

use std::fmt;

use crate::docker::{serialize_payload, Client};
use crate::errors::{Capability, Error};
use crate::exec::Exec;
use crate::json;
use crate::options::{FilterOptions, Filters, ListOptions};
use crate::read::{decode_stream, demultiplex, LogOutputDecoder};
use crate::resource::{
    created_id, impl_resource, list, Filterable, Inspectable, Listing, Removable, ResourceIter,
};
use crate::uri::Endpoint;

const LISTING: Listing = Listing {
    kind: "container",
    id_key: "Id",
    items_key: None,
};

/// A frame of the stream returned by [Logs::follow].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// A frame written to standard error.
    StdErr {
        #[allow(missing_docs)]
        message: Bytes,
    },
    /// A frame written to standard output.
    StdOut {
        #[allow(missing_docs)]
        message: Bytes,
    },
    /// A frame read from standard input.
    StdIn {
        #[allow(missing_docs)]
        message: Bytes,
    },
    /// Raw output of a container running with a TTY.
    Console {
        #[allow(missing_docs)]
        message: Bytes,
    },
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self {
            LogOutput::StdErr { message } => message,
            LogOutput::StdOut { message } => message,
            LogOutput::StdIn { message } => message,
            LogOutput::Console { message } => message,
        };
        write!(f, "{}", String::from_utf8_lossy(message))
    }
}

impl AsRef<[u8]> for LogOutput {
    fn as_ref(&self) -> &[u8] {
        match self {
            LogOutput::StdErr { message }
            | LogOutput::StdOut { message }
            | LogOutput::StdIn { message }
            | LogOutput::Console { message } => message.as_ref(),
        }
    }
}

impl LogOutput {
    /// Get the raw bytes of the output
    pub fn into_bytes(self) -> Bytes {
        match self {
            LogOutput::StdErr { message }
            | LogOutput::StdOut { message }
            | LogOutput::StdIn { message }
            | LogOutput::Console { message } => message,
        }
    }
}

/// The containers of a docker daemon.
#[derive(Debug, Clone)]
pub struct Containers {
    client: Client,
    endpoint: Endpoint,
    filters: Filters,
}

#[derive(Debug, Serialize)]
struct CreateContainerQuery<'a> {
    name: &'a str,
}

impl Containers {
    pub(crate) fn new(client: Client, endpoint: Endpoint) -> Containers {
        Containers {
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
    /// # List Containers
    ///
    /// Returns the running containers matching the accumulated filters.
    ///
    /// # Returns
    ///
    ///  - An iterator over [Container] handles, in the order the daemon listed them.
    pub async fn iter(&self) -> Result<ResourceIter<Container>, Error> {
        self.list(false).await
    }

    /// ---
    ///
    /// # List All Containers
    ///
    /// Like [Containers::iter], but includes stopped containers.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use capstan::Docker;
    /// # let docker = Docker::connect_with_http_defaults().unwrap();
    /// use capstan::Resource;
    ///
    /// async {
    ///     for container in docker.containers().all().await.unwrap() {
    ///         println!("{}", container.id());
    ///     }
    /// };
    /// ```
    pub async fn all(&self) -> Result<ResourceIter<Container>, Error> {
        self.list(true).await
    }

    async fn list(&self, all: bool) -> Result<ResourceIter<Container>, Error> {
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
            Container::new,
        )
        .await
    }

    /// A handle to a container, without contacting the daemon.
    pub fn get(&self, id: &str) -> Container {
        Container::new(
            id.to_string(),
            json::object("Id", id),
            self.client.clone(),
            self.endpoint.child(id),
        )
    }

    /// ---
    ///
    /// # Create Container
    ///
    /// Create a container running `image` with its default command.
    pub async fn create(&self, image: &str) -> Result<Container, Error> {
        self.create_inner(None, &json::object("Image", image)).await
    }

    /// Create a container from a full container configuration.
    pub async fn create_json(&self, config: &Map<String, Value>) -> Result<Container, Error> {
        self.create_inner(None, config).await
    }

    /// Create a container with a name, from a full container configuration.
    pub async fn create_named(
        &self,
        name: &str,
        config: &Map<String, Value>,
    ) -> Result<Container, Error> {
        self.create_inner(Some(CreateContainerQuery { name }), config)
            .await
    }

    async fn create_inner(
        &self,
        query: Option<CreateContainerQuery<'_>>,
        config: &Map<String, Value>,
    ) -> Result<Container, Error> {
        let url = self.endpoint.child("create");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            query,
            serialize_payload(Some(config)),
        );

        let response: Map<String, Value> = self.client.process_into_value(req, &[201]).await?;
        let id = created_id(&response, "Id", LISTING.kind)?;
        debug!("Created container {}", id);

        let json = json::merge(config, &response);
        let endpoint = self.endpoint.child(&id);
        Ok(Container::new(id, json, self.client.clone(), endpoint))
    }

    /// ---
    ///
    /// # Prune Containers
    ///
    /// Delete stopped containers matching the accumulated filters.
    ///
    /// # Returns
    ///
    ///  - The daemon's report, with `ContainersDeleted` and `SpaceReclaimed`.
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

impl Filterable for Containers {
    fn filters(&self) -> &Filters {
        &self.filters
    }

    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

/// A handle to one container.
#[derive(Debug, Clone)]
pub struct Container {
    id: String,
    json: Map<String, Value>,
    client: Client,
    endpoint: Endpoint,
}

impl_resource!(Container);

#[derive(Debug, Serialize)]
struct RemoveContainerQuery {
    v: bool,
    force: bool,
    link: bool,
}

#[derive(Debug, Serialize)]
struct RenameContainerQuery<'a> {
    name: &'a str,
}

impl Container {
    pub(crate) fn new(
        id: String,
        json: Map<String, Value>,
        client: Client,
        endpoint: Endpoint,
    ) -> Container {
        Container {
            id,
            json,
            client,
            endpoint,
        }
    }

    async fn post(&self, action: &str, expected: &[u16]) -> Result<(), Error> {
        let url = self.endpoint.child(action);
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_unit(req, expected).await
    }

    /// Start the container.
    pub async fn start(&self) -> Result<(), Error> {
        self.post("start", &[204]).await
    }

    /// Stop the container.
    ///
    /// A container that is already stopped makes the daemon respond `304`, which fails like any
    /// other unexpected status.
    pub async fn stop(&self) -> Result<(), Error> {
        self.post("stop", &[204]).await
    }

    /// Restart the container.
    pub async fn restart(&self) -> Result<(), Error> {
        self.post("restart", &[204]).await
    }

    /// Send `SIGKILL` to the container.
    pub async fn kill(&self) -> Result<(), Error> {
        self.post("kill", &[204]).await
    }

    /// Pause all processes of the container.
    pub async fn pause(&self) -> Result<(), Error> {
        self.post("pause", &[204]).await
    }

    /// Resume the processes of a paused container.
    pub async fn unpause(&self) -> Result<(), Error> {
        self.post("unpause", &[204]).await
    }

    /// ---
    ///
    /// # Rename Container
    ///
    /// # Arguments
    ///
    ///  - `name`: the new name. It is form-encoded into the query.
    pub async fn rename(&self, name: &str) -> Result<(), Error> {
        let url = self.endpoint.child("rename");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            Some(RenameContainerQuery { name }),
            Ok(Bytes::new()),
        );

        self.client.process_into_unit(req, &[204]).await
    }

    /// ---
    ///
    /// # Remove Container
    ///
    /// # Arguments
    ///
    ///  - `volumes`: also remove the anonymous volumes of the container.
    ///  - `force`: kill the container first if it is running.
    ///  - `link`: remove the link instead of the container.
    pub async fn remove_with(&self, volumes: bool, force: bool, link: bool) -> Result<(), Error> {
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::DELETE),
            Some(RemoveContainerQuery {
                v: volumes,
                force,
                link,
            }),
            Ok(Bytes::new()),
        );

        self.client.process_into_unit(req, &[204]).await
    }

    /// Block until the container stops, then return its exit status.
    pub async fn wait(&self) -> Result<Value, Error> {
        let url = self.endpoint.child("wait");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_value(req, &[200]).await
    }

    /// The processes running inside the container.
    pub async fn top(&self) -> Result<Value, Error> {
        let url = self.endpoint.child("top");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::GET),
            None::<()>,
            Ok(Bytes::new()),
        );

        self.client.process_into_value(req, &[200]).await
    }

    /// The logs of the container, reading both output streams.
    ///
    /// The framing of the log stream follows the `Config.Tty` flag of this handle's snapshot,
    /// unless set explicitly with [Logs::tty].
    pub fn logs(&self) -> Logs {
        let tty = self
            .json
            .get("Config")
            .and_then(|config| config.get("Tty"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Logs {
            client: self.client.clone(),
            endpoint: self.endpoint.child("logs"),
            stdout: true,
            stderr: true,
            timestamps: false,
            tail: None,
            tty,
        }
    }

    /// ---
    ///
    /// # Create Exec
    ///
    /// Set up a command to run inside the container.
    ///
    /// # Arguments
    ///
    ///  - `config`: the exec configuration, e.g. `{"Cmd": ["date"], "AttachStdout": true}`.
    ///
    /// # Returns
    ///
    ///  - An [Exec] handle, to be started with [Exec::start].
    pub async fn exec(&self, config: &Map<String, Value>) -> Result<Exec, Error> {
        self.client.ensure(Capability::Exec)?;

        let url = self.endpoint.child("exec");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(config)),
        );

        let response: Map<String, Value> = self.client.process_into_value(req, &[201]).await?;
        let id = created_id(&response, "Id", "exec instance")?;
        let endpoint = self.endpoint.parent().parent().child("exec").child(&id);

        Ok(Exec::new(
            id,
            json::merge(config, &response),
            self.client.clone(),
            endpoint,
        ))
    }
}

impl Inspectable for Container {
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

impl Removable for Container {
    async fn remove(&self) -> Result<(), Error> {
        self.remove_with(false, false, false).await
    }
}

/// The logs of one container.
///
/// Every builder call returns a new view; the container's handle is left untouched.
#[derive(Debug, Clone)]
pub struct Logs {
    client: Client,
    endpoint: Endpoint,
    stdout: bool,
    stderr: bool,
    timestamps: bool,
    tail: Option<String>,
    tty: bool,
}

#[derive(Debug, Serialize)]
struct LogsQuery<'a> {
    follow: bool,
    stdout: bool,
    stderr: bool,
    timestamps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tail: Option<&'a str>,
}

impl Logs {
    /// Read standard output only.
    pub fn stdout(self) -> Logs {
        Logs {
            stdout: true,
            stderr: false,
            ..self
        }
    }

    /// Read standard error only.
    pub fn stderr(self) -> Logs {
        Logs {
            stdout: false,
            stderr: true,
            ..self
        }
    }

    /// Prefix every line with its timestamp.
    pub fn timestamps(self) -> Logs {
        Logs {
            timestamps: true,
            ..self
        }
    }

    /// Only read the last `lines` lines.
    pub fn tail(self, lines: usize) -> Logs {
        Logs {
            tail: Some(lines.to_string()),
            ..self
        }
    }

    /// Whether the container runs with a TTY, in which case the output is not multiplexed.
    pub fn tty(self, tty: bool) -> Logs {
        Logs { tty, ..self }
    }

    /// The endpoint of the logs.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn query(&self, follow: bool) -> LogsQuery<'_> {
        LogsQuery {
            follow,
            stdout: self.stdout,
            stderr: self.stderr,
            timestamps: self.timestamps,
            tail: self.tail.as_deref(),
        }
    }

    /// ---
    ///
    /// # Fetch Logs
    ///
    /// Read the logs written so far, with the stream framing stripped.
    pub async fn fetch(&self) -> Result<String, Error> {
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::GET),
            Some(self.query(false)),
            Ok(Bytes::new()),
        );

        let body = self.client.process_request(req, &[200]).await?.bytes().await?;
        let mut text = Vec::with_capacity(body.len());
        for frame in demultiplex(body, self.tty)? {
            text.extend_from_slice(frame.as_ref());
        }

        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// ---
    ///
    /// # Follow Logs
    ///
    /// Keep the connection open and decode frames as the daemon writes them.
    ///
    /// The stream ends when the container stops. Dropping it closes the connection.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use capstan::Docker;
    /// # let docker = Docker::connect_with_http_defaults().unwrap();
    /// use futures_util::stream::TryStreamExt;
    ///
    /// async {
    ///     let logs = docker.containers().get("web").logs().tail(10);
    ///     let mut stream = logs.follow().await.unwrap();
    ///     while let Some(line) = stream.try_next().await.unwrap() {
    ///         print!("{}", line);
    ///     }
    /// };
    /// ```
    pub async fn follow(
        &self,
    ) -> Result<impl Stream<Item = Result<LogOutput, Error>> + Send + Unpin, Error> {
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::GET),
            Some(self.query(true)),
            Ok(Bytes::new()),
        );

        let response = self.client.process_request(req, &[200]).await?;
        Ok(decode_stream(
            response.into_body().into_stream(),
            LogOutputDecoder::new(self.tty),
        ))
    }
}
