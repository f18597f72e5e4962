//! Declarative mock definitions and document parsing.
//!
//! A mock document is a list of endpoints:
//!
//! ```yaml
//! endpoints:
//!   - method: GET
//!     uri: /ping
//!     params: ""
//!     response:
//!       status: 200
//!       headers:
//!         Content-Type: text/plain
//!       body: pong
//! ```

use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::mimic::error::{MimicError, MimicResult};

/// Root of a mock document.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MockDocument {
    pub endpoints: Vec<EndpointDefinition>,
}

/// A request signature paired with its canned response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EndpointDefinition {
    /// HTTP method, matched verbatim.
    pub method: String,

    /// Declared request headers. Not used for matching.
    #[serde(default)]
    pub headers: HeaderList,

    /// Request URI (path and query) as the client sends it.
    #[serde(alias = "path")]
    pub uri: String,

    /// Opaque, canonically encoded form parameter signature.
    #[serde(default)]
    pub params: String,

    /// Canned response. An endpoint without one is indexed but cannot render.
    #[serde(default)]
    pub response: Option<ResponseDefinition>,
}

/// Canned response for a matched endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResponseDefinition {
    pub status: u16,

    #[serde(default)]
    pub headers: HeaderList,

    #[serde(default)]
    pub body: String,
}

/// Header mapping that remembers document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing an earlier value for the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = HeaderList::new();
        for (k, v) in iter {
            list.insert(k, v);
        }
        list
    }
}

impl<'de> Deserialize<'de> for HeaderList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderListVisitor;

        impl<'de> Visitor<'de> for HeaderListVisitor {
            type Value = HeaderList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut list = HeaderList::new();
                while let Some((name, value)) = map.next_entry::<String, String>()? {
                    list.insert(name, value);
                }
                Ok(list)
            }

            // `headers:` with no value in YAML.
            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(HeaderList::new())
            }
        }

        deserializer.deserialize_any(HeaderListVisitor)
    }
}

/// Serialisation formats accepted for mock documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Toml,
    Json,
}

impl DocumentFormat {
    /// Pick a format from the file extension. Unknown extensions are YAML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => DocumentFormat::Toml,
            Some("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

impl MockDocument {
    /// Parse a mock document from its textual form.
    pub fn parse(content: &str, format: DocumentFormat) -> MimicResult<Self> {
        match format {
            DocumentFormat::Yaml => {
                // An empty YAML file is an empty document, not an error.
                if content.trim().is_empty() {
                    return Ok(MockDocument::default());
                }
                serde_yaml::from_str(content).map_err(|e| MimicError::Parse(e.to_string()))
            }
            DocumentFormat::Toml => {
                toml::from_str(content).map_err(|e| MimicError::Parse(e.to_string()))
            }
            DocumentFormat::Json => {
                serde_json::from_str(content).map_err(|e| MimicError::Parse(e.to_string()))
            }
        }
    }

    /// Read and parse a mock document from disk.
    pub fn from_file(path: &Path) -> MimicResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, DocumentFormat::from_path(path))
    }
}
