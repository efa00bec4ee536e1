use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::request::Builder;
use http::Request;
use log::debug;
use serde::de::DeserializeOwned;
use serde::ser::Serialize;

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{RegistryAuth, RegistryAuthTransport};
use crate::container::Containers;
use crate::errors::{Capability, Error};
use crate::exec::Exec;
use crate::image::Images;
use crate::network::Networks;
use crate::plugin::Plugins;
use crate::status::expect_status;
use crate::swarm::Swarm;
use crate::system::Events;
use crate::transport::{decode_json, Response, Transport, UserAgentTransport};
use crate::uri::Endpoint;
use crate::volume::Volumes;

/// The default `DOCKER_SOCKET` address that we will try to connect to.
#[cfg(unix)]
pub const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

/// The default `DOCKER_HOST` address that we will try to connect to.
pub const DEFAULT_DOCKER_HOST: &str = "tcp://localhost:2375";

/// Default timeout for all requests is 2 minutes.
pub const DEFAULT_TIMEOUT: u64 = 120;

/// Default Client Version to communicate with the server.
pub const API_DEFAULT_VERSION: &ClientVersion = &ClientVersion {
    major_version: 1,
    minor_version: 41,
};

/// Advisory version stub to use for communicating with the Server. The docker server will error if
/// a higher client version is used than is compatible with the server. Beware also, that the
/// docker server will return stubs for a higher version than the version set when communicating.
///
/// See also [negotiate_version](Docker::negotiate_version()), and the `client_version` argument
/// when instantiating the [Docker] client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClientVersion {
    /// The major version number.
    pub major_version: usize,
    /// The minor version number.
    pub minor_version: usize,
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major_version, self.minor_version)
    }
}

impl ClientVersion {
    fn parse(version: &str) -> Option<ClientVersion> {
        let (major, minor) = version.split_once('.')?;
        Some(ClientVersion {
            major_version: major.parse().ok()?,
            minor_version: minor.parse().ok()?,
        })
    }
}

/// How the client reaches the docker daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    /// A unix domain socket.
    #[cfg(unix)]
    Unix,
    /// Plain HTTP over TCP.
    Http,
    /// A transport supplied by the caller.
    Custom,
}

/// Request plumbing shared by the client and every resource handle it hands out.
#[derive(Debug, Clone)]
pub(crate) struct Client {
    transport: Arc<dyn Transport>,
    disabled: Arc<[Capability]>,
}

impl Client {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Client {
        Client {
            transport,
            disabled: Arc::from(Vec::new()),
        }
    }

    pub(crate) fn ensure(&self, capability: Capability) -> Result<(), Error> {
        if self.disabled.contains(&capability) {
            debug!("Refusing {} call on this connection", capability);
            Err(Error::UnsupportedOperation { capability })
        } else {
            Ok(())
        }
    }

    pub(crate) fn build_request<O>(
        &self,
        endpoint: &Endpoint,
        builder: Builder,
        query: Option<O>,
        payload: Result<Bytes, Error>,
    ) -> Result<Request<Bytes>, Error>
    where
        O: Serialize,
    {
        let uri = endpoint.with_query(query)?;
        let payload = payload?;
        let builder = if payload.is_empty() {
            builder
        } else {
            builder.header(CONTENT_TYPE, "application/json")
        };
        Ok(builder.uri(uri).body(payload)?)
    }

    pub(crate) async fn process_request(
        &self,
        req: Result<Request<Bytes>, Error>,
        expected: &[u16],
    ) -> Result<Response, Error> {
        let request = req?;
        let endpoint = strip_query(&request.uri().to_string());
        debug!("{} {}", request.method(), request.uri());

        let response = self.transport.execute(request).await?;
        expect_status(response, &endpoint, expected).await
    }

    pub(crate) async fn process_into_value<T>(
        &self,
        req: Result<Request<Bytes>, Error>,
        expected: &[u16],
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response = self.process_request(req, expected).await?;
        let bytes = response.bytes().await?;
        decode_json(&bytes)
    }

    pub(crate) async fn process_into_string(
        &self,
        req: Result<Request<Bytes>, Error>,
        expected: &[u16],
    ) -> Result<String, Error> {
        self.process_request(req, expected).await?.text().await
    }

    pub(crate) async fn process_into_unit(
        &self,
        req: Result<Request<Bytes>, Error>,
        expected: &[u16],
    ) -> Result<(), Error> {
        self.process_request(req, expected).await?;
        Ok(())
    }

    pub(crate) async fn process_into_drained(
        &self,
        req: Result<Request<Bytes>, Error>,
        expected: &[u16],
    ) -> Result<(), Error> {
        self.process_request(req, expected)
            .await?
            .into_body()
            .drain()
            .await
    }
}

fn strip_query(uri: &str) -> String {
    match uri.split_once('?') {
        Some((endpoint, _)) => endpoint.to_string(),
        None => uri.to_string(),
    }
}

pub(crate) fn serialize_payload<S>(body: Option<S>) -> Result<Bytes, Error>
where
    S: Serialize,
{
    match body {
        Some(body) => Ok(Bytes::from(serde_json::to_vec(&body)?)),
        None => Ok(Bytes::new()),
    }
}

/// ---
/// # Docker
///
/// The main interface for calling the Docker API. Construct a new Docker instance using one of the
/// connect methods:
///  - [`Docker::connect_with_http_defaults`](Docker::connect_with_http_defaults())
///  - [`Docker::connect_with_unix_defaults`](Docker::connect_with_unix_defaults())
///  - [`Docker::connect_with_local_defaults`](Docker::connect_with_local_defaults())
///
/// The client is cheap to clone; every clone shares the same transport.
#[derive(Debug, Clone)]
pub struct Docker {
    pub(crate) client: Client,
    pub(crate) base: Endpoint,
    client_type: ClientType,
    version: ClientVersion,
}

impl Docker {
    /// Connect using unsecured HTTP.
    ///
    /// # Arguments
    ///
    ///  - `addr`: connection url including scheme and port, e.g. `tcp://localhost:2375`.
    ///  - `timeout`: the read/write timeout (seconds) to use for every hyper connection
    ///  - `client_version`: the client version to communicate with the server.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use capstan::{API_DEFAULT_VERSION, Docker};
    ///
    /// let connection = Docker::connect_with_http(
    ///                    "http://my-custom-docker-server:2735", 4, API_DEFAULT_VERSION)
    ///                    .unwrap();
    /// ```
    #[cfg(feature = "http")]
    pub fn connect_with_http(
        addr: &str,
        timeout: u64,
        client_version: &ClientVersion,
    ) -> Result<Docker, Error> {
        let client_addr = addr.replacen("tcp://", "", 1).replacen("http://", "", 1);
        let transport = crate::http::HttpTransport::new(Duration::from_secs(timeout));

        Docker::assemble(
            UserAgentTransport::new(transport),
            &format!("http://{}", client_addr),
            ClientType::Http,
            client_version,
        )
    }

    /// Connect using unsecured HTTP using defaults that are signalled by environment variables.
    ///
    /// # Defaults
    ///
    ///  - The connection url is sourced from the `DOCKER_HOST` environment variable, and defaults
    ///    to `localhost:2375`.
    ///  - The number of threads used for the HTTP connection pool defaults to 1.
    ///  - The request timeout defaults to 2 minutes.
    #[cfg(feature = "http")]
    pub fn connect_with_http_defaults() -> Result<Docker, Error> {
        let host = env::var("DOCKER_HOST").unwrap_or_else(|_| DEFAULT_DOCKER_HOST.to_string());
        Docker::connect_with_http(&host, DEFAULT_TIMEOUT, API_DEFAULT_VERSION)
    }

    /// Connect using a Unix socket.
    ///
    /// # Arguments
    ///
    ///  - `path`: connection unix socket path, with or without the `unix://` scheme.
    ///  - `timeout`: the read/write timeout (seconds) to use for every connection
    ///  - `client_version`: the client version to communicate with the server.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use capstan::{API_DEFAULT_VERSION, Docker};
    ///
    /// let connection = Docker::connect_with_unix("/var/run/docker.sock", 120, API_DEFAULT_VERSION).unwrap();
    /// ```
    #[cfg(unix)]
    pub fn connect_with_unix(
        path: &str,
        timeout: u64,
        client_version: &ClientVersion,
    ) -> Result<Docker, Error> {
        let path = path.strip_prefix("unix://").unwrap_or(path);
        let transport = crate::unix::UnixTransport::new(path, Duration::from_secs(timeout));

        Docker::assemble(
            UserAgentTransport::new(transport),
            "http://localhost",
            ClientType::Unix,
            client_version,
        )
    }

    /// Connect using the Unix socket at `/var/run/docker.sock`, or the `unix://` address in
    /// `DOCKER_HOST` when it is set.
    #[cfg(unix)]
    pub fn connect_with_unix_defaults() -> Result<Docker, Error> {
        let socket = match env::var("DOCKER_HOST") {
            Ok(host) if host.starts_with("unix://") => host,
            _ => DEFAULT_SOCKET.to_string(),
        };
        Docker::connect_with_unix(&socket, DEFAULT_TIMEOUT, API_DEFAULT_VERSION)
    }

    /// Connect using the local machine connection method with default arguments.
    ///
    /// This is a simple wrapper over the OS specific handlers:
    ///  * Unix: [`Docker::connect_with_unix_defaults`]
    ///  * Other targets: [`Docker::connect_with_http_defaults`]
    #[cfg(unix)]
    pub fn connect_with_local_defaults() -> Result<Docker, Error> {
        Docker::connect_with_unix_defaults()
    }

    /// Connect using the local machine connection method with default arguments.
    #[cfg(all(not(unix), feature = "http"))]
    pub fn connect_with_local_defaults() -> Result<Docker, Error> {
        Docker::connect_with_http_defaults()
    }

    /// Connect through a transport supplied by the caller, addressing the daemon at `base_url`.
    ///
    /// Requests that do not set a `User-Agent` get the default one, as with the other
    /// constructors.
    pub fn connect_with_transport<T>(
        transport: T,
        base_url: &str,
        client_version: &ClientVersion,
    ) -> Result<Docker, Error>
    where
        T: Transport + 'static,
    {
        Docker::assemble(
            UserAgentTransport::new(transport),
            base_url,
            ClientType::Custom,
            client_version,
        )
    }

    fn assemble<T>(
        transport: T,
        base_url: &str,
        client_type: ClientType,
        client_version: &ClientVersion,
    ) -> Result<Docker, Error>
    where
        T: Transport + 'static,
    {
        let base = Endpoint::parse(base_url)?.child(&format!("v{}", client_version));
        debug!("Docker client addressing {}", base);

        Ok(Docker {
            client: Client::new(Arc::new(transport)),
            base,
            client_type,
            version: *client_version,
        })
    }

    /// Return a client that authenticates with a registry on every request that does not carry
    /// its own auth header.
    pub fn with_registry_auth(&self, auth: Arc<dyn RegistryAuth>) -> Docker {
        let transport = RegistryAuthTransport::new(self.client.transport.clone(), auth);
        Docker {
            client: Client {
                transport: Arc::new(transport),
                disabled: self.client.disabled.clone(),
            },
            ..self.clone()
        }
    }

    /// Return a client on which `capability` fails with
    /// [UnsupportedOperation](Error::UnsupportedOperation) before any request is sent.
    pub fn without(&self, capability: Capability) -> Docker {
        let mut disabled = self.client.disabled.to_vec();
        if !disabled.contains(&capability) {
            disabled.push(capability);
        }
        Docker {
            client: Client {
                transport: self.client.transport.clone(),
                disabled: Arc::from(disabled),
            },
            ..self.clone()
        }
    }

    /// Whether this connection offers `capability`.
    pub fn supports(&self, capability: Capability) -> bool {
        self.client.ensure(capability).is_ok()
    }

    /// The versioned base URL every endpoint is derived from.
    pub fn base(&self) -> &Endpoint {
        &self.base
    }

    /// How this client reaches the daemon.
    pub fn client_type(&self) -> ClientType {
        self.client_type
    }

    /// The API version this client speaks.
    pub fn client_version(&self) -> ClientVersion {
        self.version
    }

    /// Ask the server for the highest API version it supports and return a client pinned to the
    /// lower of that and the current version.
    pub async fn negotiate_version(self) -> Result<Docker, Error> {
        let version = self.version().await?;
        let server = version
            .get("ApiVersion")
            .and_then(serde_json::Value::as_str)
            .and_then(ClientVersion::parse);

        match server {
            Some(server) if server < self.version => {
                debug!("Downgrading client version to {}", server);
                let base = self.base.parent().child(&format!("v{}", server));
                Ok(Docker {
                    base,
                    version: server,
                    ..self
                })
            }
            _ => Ok(self),
        }
    }

    /// The containers on this daemon.
    pub fn containers(&self) -> Containers {
        Containers::new(self.client.clone(), self.base.child("containers"))
    }

    /// The images on this daemon.
    pub fn images(&self) -> Images {
        Images::new(self.client.clone(), self.base.child("images"))
    }

    /// The volumes on this daemon.
    pub fn volumes(&self) -> Volumes {
        Volumes::new(self.client.clone(), self.base.child("volumes"))
    }

    /// The networks on this daemon.
    pub fn networks(&self) -> Result<Networks, Error> {
        self.client.ensure(Capability::Networks)?;
        Ok(Networks::new(self.client.clone(), self.base.child("networks")))
    }

    /// The plugins installed on this daemon.
    pub fn plugins(&self) -> Result<Plugins, Error> {
        self.client.ensure(Capability::Plugins)?;
        Ok(Plugins::new(self.client.clone(), self.base.child("plugins")))
    }

    /// The swarm this daemon takes part in.
    pub fn swarm(&self) -> Result<Swarm, Error> {
        self.client.ensure(Capability::Swarm)?;
        Ok(Swarm::new(self.client.clone(), self.base.child("swarm")))
    }

    /// A handle to an exec instance created earlier.
    pub fn exec(&self, id: &str) -> Result<Exec, Error> {
        self.client.ensure(Capability::Exec)?;
        Ok(Exec::new(
            id.to_string(),
            crate::json::object("Id", id),
            self.client.clone(),
            self.base.child("exec").child(id),
        ))
    }

    /// The event stream of this daemon.
    pub fn events(&self) -> Events {
        Events::new(self.client.clone(), self.base.child("events"))
    }
}
