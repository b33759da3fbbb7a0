//! Request header set as reflected back to the client
//!
//! Names are lowercased and kept in arrival order. Repeated headers are
//! folded into one entry:
//!
//! * `set-cookie` is always a list, even with a single value
//! * `cookie` values are joined with `"; "`
//! * headers that only make sense once keep their first value
//! * everything else is joined with `", "`

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Headers where a repeat is dropped rather than merged
const SINGLE_VALUED: &[&str] = &[
    "age",
    "authorization",
    "content-length",
    "content-type",
    "etag",
    "expires",
    "from",
    "host",
    "if-modified-since",
    "if-unmodified-since",
    "last-modified",
    "location",
    "max-forwards",
    "proxy-authorization",
    "referer",
    "retry-after",
    "server",
    "user-agent",
];

/// One reflected header value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// The value as a string, lists joined with `", "`
    pub fn joined(&self) -> String {
        match self {
            HeaderValue::Single(value) => value.clone(),
            HeaderValue::Multiple(values) => values.join(", "),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Single(value.to_string())
    }
}

/// Ordered, lowercased header map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, HeaderValue)>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map from raw header lines, folding repeats
    pub fn from_raw<'a, I>(raw: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut headers = Self::new();
        for (name, value) in raw {
            headers.append(name, &decode_latin1(value));
        }
        headers
    }

    /// Adds one header line
    pub fn append(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let value = value.to_string();

        let Some(existing) = self.entries.iter_mut().find(|(n, _)| *n == name) else {
            let value = if name == "set-cookie" {
                HeaderValue::Multiple(vec![value])
            } else {
                HeaderValue::Single(value)
            };
            self.entries.push((name, value));
            return;
        };

        match &mut existing.1 {
            HeaderValue::Multiple(values) => values.push(value),
            HeaderValue::Single(_) if SINGLE_VALUED.contains(&name.as_str()) => {}
            HeaderValue::Single(current) => {
                let separator = if name == "cookie" { "; " } else { ", " };
                current.push_str(separator);
                current.push_str(&value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let name = name.to_ascii_lowercase();
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Header bytes map one-to-one onto chars
fn decode_latin1(value: &[u8]) -> String {
    value.iter().map(|&b| char::from(b)).collect()
}

impl Serialize for RequestHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RequestHeaders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = RequestHeaders;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to a string or list of strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, HeaderValue>()? {
                    entries.push((name, value));
                }
                Ok(RequestHeaders { entries })
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}
