use serde::Serialize;
use url::Url;

use std::fmt;

use crate::errors::Error;

/// An absolute URL addressing one resource or collection of the Docker Engine API.
///
/// Child endpoints are derived by appending path segments; an endpoint is never modified in
/// place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parse an absolute URL such as `http://localhost:2375/v1.41`.
    pub fn parse(url: &str) -> Result<Endpoint, Error> {
        Ok(Endpoint {
            url: Url::parse(url)?,
        })
    }

    /// The endpoint below this one, e.g. `{containers}/{id}`.
    ///
    /// Slashes inside `path` separate segments, so image references such as
    /// `library/alpine:3` address the nested path docker expects.
    pub fn child(&self, path: &str) -> Endpoint {
        let mut url = self.url.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Endpoint { url }
    }

    /// The endpoint one segment up, or this endpoint if it is already the root.
    pub fn parent(&self) -> Endpoint {
        let mut url = self.url.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().pop();
        }
        Endpoint { url }
    }

    /// The last path segment, typically the resource id.
    pub fn last_segment(&self) -> Option<&str> {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
    }

    /// The URL as a string.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The underlying URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL with the query parameters appended in `application/x-www-form-urlencoded` form.
    pub(crate) fn with_query<O: Serialize>(&self, query: Option<O>) -> Result<String, Error> {
        let encoded = match query {
            Some(query) => serde_urlencoded::to_string(query)?,
            None => String::new(),
        };
        if encoded.is_empty() {
            Ok(self.url.to_string())
        } else {
            Ok(format!("{}?{}", self.url, encoded))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
