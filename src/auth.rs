//! Registry authentication: credentials, their encodings, and the transport that sends them.

use base64::{engine::general_purpose::URL_SAFE, Engine};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::header::{HeaderName, HeaderValue};
use http::Request;
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};

use std::fmt;
use std::sync::Arc;

use crate::errors::Error;
use crate::transport::{Response, Transport};

/// Header carrying the credentials of a single pull or push.
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";
/// Header carrying a map of registry credentials.
pub const REGISTRY_CONFIG_HEADER: &str = "X-Registry-Config";

/// Credentials to a docker registry, as loaded from a docker config file or supplied by the
/// caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerCredentials {
    #[allow(missing_docs)]
    pub username: Option<String>,
    #[allow(missing_docs)]
    pub password: Option<String>,
    #[allow(missing_docs)]
    pub auth: Option<String>,
    #[allow(missing_docs)]
    pub email: Option<String>,
    #[allow(missing_docs)]
    pub serveraddress: Option<String>,
    #[allow(missing_docs)]
    pub identitytoken: Option<String>,
    #[allow(missing_docs)]
    pub registrytoken: Option<String>,
}

impl DockerCredentials {
    /// The auth strategy these credentials support.
    ///
    /// An identity token takes precedence over a username and password.
    pub fn into_auth(self, registry: &str) -> Option<Arc<dyn RegistryAuth>> {
        if let Some(token) = self.identitytoken {
            return Some(Arc::new(IdentityTokenAuth::new(registry, token)));
        }
        match (self.username, self.password) {
            (Some(username), Some(password)) => Some(Arc::new(RegistryConfigAuth::new(
                registry, username, password,
            ))),
            _ => None,
        }
    }
}

/// A way of authenticating with a registry through a request header.
pub trait RegistryAuth: fmt::Debug + Send + Sync {
    /// Name of the header that carries the credentials.
    fn header_name(&self) -> &'static str;

    /// The JSON object describing the credentials.
    fn payload(&self) -> Value;

    /// The header value: the base64 encoding of the JSON payload.
    fn encoded(&self) -> Result<String, Error> {
        let json = serde_json::to_vec(&self.payload())?;
        Ok(URL_SAFE.encode(json))
    }
}

/// Per-request authentication with an identity token, sent as `X-Registry-Auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTokenAuth {
    registry: String,
    token: String,
}

impl IdentityTokenAuth {
    /// Authenticate with `registry` using an identity token.
    pub fn new<R: Into<String>, T: Into<String>>(registry: R, token: T) -> IdentityTokenAuth {
        IdentityTokenAuth {
            registry: registry.into(),
            token: token.into(),
        }
    }
}

impl RegistryAuth for IdentityTokenAuth {
    fn header_name(&self) -> &'static str {
        REGISTRY_AUTH_HEADER
    }

    fn payload(&self) -> Value {
        json!({ &self.registry: { "identitytoken": &self.token } })
    }
}

/// Registry configuration with a username and password, sent as `X-Registry-Config`.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryConfigAuth {
    registry: String,
    username: String,
    password: String,
}

impl fmt::Debug for RegistryConfigAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfigAuth")
            .field("registry", &self.registry)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RegistryConfigAuth {
    /// Authenticate with `registry` using a username and password.
    pub fn new<R, U, P>(registry: R, username: U, password: P) -> RegistryConfigAuth
    where
        R: Into<String>,
        U: Into<String>,
        P: Into<String>,
    {
        RegistryConfigAuth {
            registry: registry.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl RegistryAuth for RegistryConfigAuth {
    fn header_name(&self) -> &'static str {
        REGISTRY_CONFIG_HEADER
    }

    fn payload(&self) -> Value {
        json!({
            &self.registry: { "username": &self.username, "password": &self.password }
        })
    }
}

/// Adds the registry auth header to requests that do not already carry it.
///
/// A header set by the caller is left untouched, so a single call can authenticate against a
/// different registry.
#[derive(Debug, Clone)]
pub struct RegistryAuthTransport<T> {
    inner: T,
    auth: Arc<dyn RegistryAuth>,
}

impl<T: Transport> RegistryAuthTransport<T> {
    /// Wrap a transport.
    pub fn new(inner: T, auth: Arc<dyn RegistryAuth>) -> RegistryAuthTransport<T> {
        RegistryAuthTransport { inner, auth }
    }

    fn authorize(&self, request: &mut Request<Bytes>) -> Result<(), Error> {
        let name = HeaderName::from_bytes(self.auth.header_name().as_bytes())
            .map_err(|e| Error::from(http::Error::from(e)))?;
        if !request.headers().contains_key(&name) {
            let value = HeaderValue::try_from(self.auth.encoded()?)
                .map_err(|e| Error::from(http::Error::from(e)))?;
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }
}

impl<T: Transport> Transport for RegistryAuthTransport<T> {
    fn execute(&self, mut request: Request<Bytes>) -> BoxFuture<'_, Result<Response, Error>> {
        match self.authorize(&mut request) {
            Ok(()) => self.inner.execute(request),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }
}
