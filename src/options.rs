//! Query parameters shared by the list, prune and monitor endpoints.

use serde::ser::{self, Serialize, SerializeMap, Serializer};

use std::collections::BTreeMap;

/// Accumulated filters for a listing, serialized as the JSON `filters` query parameter
/// (a `map[string][]string`).
///
/// Keys are case-sensitive. Merging more filters into a set extends the values of keys that are
/// already present instead of replacing them.
///
/// ## Examples
///
/// ```rust
/// use capstan::Filters;
///
/// let mut filters = Filters::new();
/// filters.merge([("label", vec!["maintainer=capstan"])]);
/// filters.merge([("label", vec!["tier=web"]), ("status", vec!["running"])]);
///
/// assert_eq!(filters.get("label").unwrap(), ["maintainer=capstan", "tier=web"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    inner: BTreeMap<String, Vec<String>>,
}

impl Filters {
    /// An empty filter set.
    pub fn new() -> Filters {
        Filters::default()
    }

    /// Merge filters into this set. Values already present under a key are kept once.
    pub fn merge<K, V, I, F>(&mut self, filters: F) -> &mut Filters
    where
        F: IntoIterator<Item = (K, I)>,
        I: IntoIterator<Item = V>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, values) in filters {
            let entry = self.inner.entry(key.into()).or_default();
            for value in values {
                let value = value.into();
                if !entry.contains(&value) {
                    entry.push(value);
                }
            }
        }
        self
    }

    /// The values accumulated for a key.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.inner.get(key).map(Vec::as_slice)
    }

    /// Iterate over the filter keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether no filter was added.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Serialize for Filters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for (key, values) in &self.inner {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

impl<K, V, I> FromIterator<(K, I)> for Filters
where
    I: IntoIterator<Item = V>,
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<F: IntoIterator<Item = (K, I)>>(iter: F) -> Filters {
        let mut filters = Filters::new();
        filters.merge(iter);
        filters
    }
}

pub(crate) fn serialize_as_json<T, S>(t: &T, s: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    s.serialize_str(
        &serde_json::to_string(t).map_err(|e| ser::Error::custom(format!("{e}")))?,
    )
}

/// Query of the list endpoints.
#[derive(Debug, Clone, serde_derive::Serialize)]
pub(crate) struct ListOptions<'a> {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) all: bool,
    #[serde(
        serialize_with = "serialize_as_json",
        skip_serializing_if = "Filters::is_empty"
    )]
    pub(crate) filters: &'a Filters,
}

/// Query of the prune endpoints and of the listings that take no other parameter.
#[derive(Debug, Clone, serde_derive::Serialize)]
pub(crate) struct FilterOptions<'a> {
    #[serde(
        serialize_with = "serialize_as_json",
        skip_serializing_if = "Filters::is_empty"
    )]
    pub(crate) filters: &'a Filters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates_values() {
        let mut filters = Filters::new();
        filters.merge([("label", vec!["a=1"]), ("name", vec!["web"])]);
        filters.merge([("label", vec!["b=2", "a=1"])]);

        assert_eq!(filters.get("label").unwrap(), ["a=1", "b=2"]);
        assert_eq!(filters.get("name").unwrap(), ["web"]);
        assert_eq!(filters.get("status"), None);
    }

    #[test]
    fn keys_are_case_sensitive() {
        let filters: Filters = [("Label", vec!["a"]), ("label", vec!["b"])]
            .into_iter()
            .collect();
        assert_eq!(filters.iter().count(), 2);
    }

    #[test]
    fn list_query_embeds_filters_as_json() {
        let filters: Filters = [("status", vec!["exited"])].into_iter().collect();
        let query = serde_urlencoded::to_string(ListOptions {
            all: true,
            filters: &filters,
        })
        .unwrap();

        assert_eq!(query, "all=true&filters=%7B%22status%22%3A%5B%22exited%22%5D%7D");
    }

    #[test]
    fn list_query_skips_defaults() {
        let filters = Filters::new();
        let query = serde_urlencoded::to_string(ListOptions {
            all: false,
            filters: &filters,
        })
        .unwrap();

        assert_eq!(query, "");
    }
}
