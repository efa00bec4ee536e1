//! Plugin API: manage Docker plugins

use bytes::Bytes;
use http::request::Builder;
use http::Method;
use log::debug;
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::docker::{serialize_payload, Client};
use crate::errors::Error;
use crate::json;
use crate::options::{FilterOptions, Filters};
use crate::read::consume_progress;
use crate::resource::{impl_resource, list, Filterable, Inspectable, Listing, Removable, ResourceIter};
use crate::uri::Endpoint;

const LISTING: Listing = Listing {
    kind: "plugin",
    id_key: "Name",
    items_key: None,
};

/// Describes a permission the user has to accept upon installing the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginPrivilege {
    #[allow(missing_docs)]
    #[serde(default)]
    pub name: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub description: String,
    #[allow(missing_docs)]
    #[serde(default, deserialize_with = "nullable_list")]
    pub value: Vec<String>,
}

fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let list: Option<Vec<String>> = serde::Deserialize::deserialize(deserializer)?;
    Ok(list.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize)]
struct PullPluginQuery<'a> {
    remote: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
struct RemotePluginQuery<'a> {
    remote: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct RemovePluginQuery {
    force: bool,
}

/// The plugins installed on a docker daemon.
#[derive(Debug, Clone)]
pub struct Plugins {
    client: Client,
    endpoint: Endpoint,
    filters: Filters,
}

impl Plugins {
    pub(crate) fn new(client: Client, endpoint: Endpoint) -> Plugins {
        Plugins {
            client,
            endpoint,
            filters: Filters::new(),
        }
    }

    /// The endpoint of the collection.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The installed plugins matching the accumulated filters.
    pub async fn iter(&self) -> Result<ResourceIter<Plugin>, Error> {
        list(
            &self.client,
            &self.endpoint,
            &self.endpoint,
            Some(FilterOptions {
                filters: &self.filters,
            }),
            LISTING,
            Plugin::new,
        )
        .await
    }

    /// A handle to an installed plugin, e.g. `vieux/sshfs:latest`, without contacting the daemon.
    pub fn get(&self, name: &str) -> Plugin {
        Plugin::new(
            name.to_string(),
            json::object("Name", name),
            self.client.clone(),
            self.endpoint.child(name),
        )
    }

    /// ---
    ///
    /// # Get Plugin Privileges
    ///
    /// The permissions a plugin asks for, to be granted when installing it.
    ///
    /// # Arguments
    ///
    ///  - `remote`: the plugin reference on its registry.
    pub async fn privileges(&self, remote: &str) -> Result<Vec<PluginPrivilege>, Error> {
        let url = self.endpoint.child("privileges");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::GET),
            Some(RemotePluginQuery { remote }),
            Ok(Bytes::new()),
        );

        self.client.process_into_value(req, &[200]).await
    }

    /// ---
    ///
    /// # Install Plugin
    ///
    /// Pull a plugin from a registry and install it, granting the given privileges.
    ///
    /// # Arguments
    ///
    ///  - `remote`: the plugin reference on its registry.
    ///  - `name`: the local name of the plugin, `remote` if unset.
    ///  - `privileges`: the privileges to grant, usually those returned by [Plugins::privileges].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use capstan::Docker;
    /// # let docker = Docker::connect_with_http_defaults().unwrap();
    /// async {
    ///     let plugins = docker.plugins().unwrap();
    ///     let privileges = plugins.privileges("vieux/sshfs").await.unwrap();
    ///     let sshfs = plugins
    ///         .pull_and_install("vieux/sshfs", Some("sshfs"), &privileges)
    ///         .await
    ///         .unwrap();
    /// };
    /// ```
    pub async fn pull_and_install(
        &self,
        remote: &str,
        name: Option<&str>,
        privileges: &[PluginPrivilege],
    ) -> Result<Plugin, Error> {
        let url = self.endpoint.child("pull");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            Some(PullPluginQuery { remote, name }),
            serialize_payload(Some(privileges)),
        );

        self.client.process_into_drained(req, &[204]).await?;
        let name = name.unwrap_or(remote);
        debug!("Installed plugin {} from {}", name, remote);

        Ok(self.get(name))
    }
}

impl Filterable for Plugins {
    fn filters(&self) -> &Filters {
        &self.filters
    }

    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

/// A handle to one installed plugin.
#[derive(Debug, Clone)]
pub struct Plugin {
    id: String,
    json: Map<String, Value>,
    client: Client,
    endpoint: Endpoint,
}

impl_resource!(Plugin);

impl Plugin {
    pub(crate) fn new(
        id: String,
        json: Map<String, Value>,
        client: Client,
        endpoint: Endpoint,
    ) -> Plugin {
        Plugin {
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

    /// Enable the plugin.
    pub async fn enable(&self) -> Result<(), Error> {
        self.post("enable", &[200]).await
    }

    /// Disable the plugin.
    pub async fn disable(&self) -> Result<(), Error> {
        self.post("disable", &[200]).await
    }

    /// Remove the plugin, disabling it first if `force` is set.
    pub async fn remove_with(&self, force: bool) -> Result<(), Error> {
        let req = self.client.build_request(
            &self.endpoint,
            Builder::new().method(Method::DELETE),
            Some(RemovePluginQuery { force }),
            Ok(Bytes::new()),
        );

        self.client.process_into_drained(req, &[200]).await
    }

    /// ---
    ///
    /// # Upgrade Plugin
    ///
    /// Replace the plugin with another version. The plugin must be disabled.
    ///
    /// # Arguments
    ///
    ///  - `remote`: the reference of the new version on its registry.
    ///  - `privileges`: the privileges to grant to the new version.
    pub async fn upgrade(&self, remote: &str, privileges: &[PluginPrivilege]) -> Result<(), Error> {
        let url = self.endpoint.child("upgrade");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            Some(RemotePluginQuery { remote }),
            serialize_payload(Some(privileges)),
        );

        self.client.process_into_drained(req, &[204]).await
    }

    /// Push the plugin to the registry its name refers to.
    pub async fn push(&self) -> Result<(), Error> {
        let url = self.endpoint.child("push");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            Ok(Bytes::new()),
        );

        let response = self.client.process_request(req, &[200]).await?;
        consume_progress(response.into_body().into_stream(), &self.id).await
    }

    /// Set plugin settings, each as `KEY=value`, e.g. `DEBUG=1`.
    pub async fn configure<S: AsRef<str>>(&self, settings: &[S]) -> Result<(), Error> {
        let settings: Vec<&str> = settings.iter().map(AsRef::as_ref).collect();
        let url = self.endpoint.child("set");
        let req = self.client.build_request(
            &url,
            Builder::new().method(Method::POST),
            None::<()>,
            serialize_payload(Some(&settings)),
        );

        self.client.process_into_unit(req, &[204]).await
    }
}

impl Inspectable for Plugin {
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

impl Removable for Plugin {
    async fn remove(&self) -> Result<(), Error> {
        self.remove_with(false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileges_round_trip_in_pascal_case() {
        let privileges: Vec<PluginPrivilege> = serde_json::from_str(
            r#"[{"Name":"network","Description":"","Value":["host"]},{"Name":"mount","Description":"","Value":null}]"#,
        )
        .unwrap();

        assert_eq!(privileges[0].value, vec!["host"]);
        assert!(privileges[1].value.is_empty());
        assert_eq!(
            serde_json::to_value(&privileges[0]).unwrap(),
            serde_json::json!({"Name": "network", "Description": "", "Value": ["host"]})
        );
    }
}
