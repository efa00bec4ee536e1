//! [![license](https://img.shields.io/badge/License-Apache%202.0-blue.svg)](https://opensource.org/licenses/Apache-2.0)
//!
//! # Capstan: a typed, asynchronous rust client for the docker engine API
//!
//! Capstan talks to the docker daemon over its unix socket or over TCP, and models the remote
//! objects (containers, images, networks, volumes, plugins, the swarm) as collections and handles
//! that issue one HTTP request per operation.
//!
//! # Install
//!
//! Add the following to your `Cargo.toml` file
//!
//! ```nocompile
//! [dependencies]
//! capstan = "*"
//! ```
//!
//! # API
//!
//! ## Version
//!
//! The [Docker API](https://docs.docker.com/engine/api/v1.41/) is pegged at version `1.41`. The
//! version is part of every endpoint and can be lowered per client, see
//! [Docker::negotiate_version].
//!
//! # Usage
//!
//! ## Connecting with the docker daemon
//!
//! Connect to the docker server according to your architecture and security remit.
//!
//! ### Unix socket
//!
//! The client will connect to the standard unix socket location `/var/run/docker.sock`. Use the
//! `Docker::connect_with_unix` method API to parameterise the interface.
//!
//! ```rust
//! use capstan::Docker;
//! #[cfg(unix)]
//! Docker::connect_with_unix_defaults();
//! ```
//!
//! ### Local
//!
//! The client will connect to the OS specific handler it is compiled for.
//!
//! ```rust
//! use capstan::Docker;
//! Docker::connect_with_local_defaults();
//! ```
//!
//! ### HTTP
//!
//! The client will connect to the location pointed to by `DOCKER_HOST` environment variable, or
//! `localhost:2375` if missing. Use the `Docker::connect_with_http` method API to parameterise
//! the interface. HTTP support is behind the default `http` cargo feature.
//!
//! ```rust
//! use capstan::Docker;
//! #[cfg(feature = "http")]
//! Docker::connect_with_http_defaults();
//! ```
//!
//! ### Custom transports
//!
//! Anything implementing [Transport](transport::Transport) can carry the requests, which is how
//! the integration tests run without a daemon. See [Docker::connect_with_transport].
//!
//! ## Examples
//!
//! Note: all these examples need a [Tokio
//! Runtime](https://tokio.rs/docs/getting-started/runtime/).
//!
//! ### Version
//!
//! First, check that the API is working with your server:
//!
//! ```rust,no_run
//! use capstan::Docker;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // Use a connection function described above
//! // let docker = Docker::connect_...;
//! # let docker = Docker::connect_with_local_defaults().unwrap();
//! let version = docker.version().await.unwrap();
//! println!("{}", version["ApiVersion"]);
//! # }
//! ```
//!
//! ### Listing containers
//!
//! ```rust,no_run
//! use capstan::{Docker, Filterable, Inspectable, Resource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! # let docker = Docker::connect_with_local_defaults().unwrap();
//! let exited = docker
//!     .containers()
//!     .filter([("status", vec!["exited"])])
//!     .all()
//!     .await
//!     .unwrap();
//!
//! for container in exited {
//!     let state = container.inspect().await.unwrap();
//!     println!("{} -> {}", container.id(), state["State"]["ExitCode"]);
//! }
//! # }
//! ```
//!
//! ### Running a container
//!
//! ```rust,no_run
//! use capstan::{Docker, Removable};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! # let docker = Docker::connect_with_local_defaults().unwrap();
//! docker.images().pull("alpine", "3.19").await.unwrap();
//!
//! let container = docker.containers().create("alpine:3.19").await.unwrap();
//! container.start().await.unwrap();
//! container.wait().await.unwrap();
//! print!("{}", container.logs().fetch().await.unwrap());
//! container.remove().await.unwrap();
//! # }
//! ```
#![deny(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]
#![warn(rust_2018_idioms, missing_copy_implementations, unused_qualifications)]

// declare modules
pub mod auth;
pub mod container;
mod docker;
pub mod errors;
pub mod exec;
#[cfg(feature = "http")]
pub mod http;
pub mod image;
pub mod json;
pub mod network;
mod options;
pub mod plugin;
mod read;
mod resource;
mod status;
pub mod swarm;
pub mod system;
pub mod transport;
#[cfg(unix)]
pub mod unix;
mod uri;
pub mod volume;

// publicly re-export
pub use crate::docker::{
    ClientType, ClientVersion, Docker, API_DEFAULT_VERSION, DEFAULT_DOCKER_HOST, DEFAULT_TIMEOUT,
};
#[cfg(unix)]
pub use crate::docker::DEFAULT_SOCKET;
pub use crate::errors::Capability;
pub use crate::options::Filters;
pub use crate::resource::{Filterable, Inspectable, Removable, Resource, ResourceIter};
pub use crate::uri::Endpoint;
