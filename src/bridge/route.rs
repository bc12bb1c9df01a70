//! Topic routing
//!
//! With no routes every packet goes to the default topic. Otherwise the
//! first matching route wins and unmatched packets are dropped.

use core::fmt::{self, Write};

use heapless::{String, Vec};

use super::data::DataType;

pub const MAX_TOPIC_ROUTES: usize = 16;
pub const MAX_ROUTE_FIELD: usize = 64;

/// `"key":"value"`
type JsonPattern = String<{ MAX_ROUTE_FIELD * 2 + 6 }>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// Key, value or topic longer than the field limit
    FieldTooLong,
    /// Already holding the maximum number of routes
    TooManyRoutes,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::FieldTooLong => {
                write!(f, "route field longer than {} bytes", MAX_ROUTE_FIELD)
            }
            RouteError::TooManyRoutes => write!(f, "more than {} routes", MAX_TOPIC_ROUTES),
        }
    }
}

impl core::error::Error for RouteError {}

fn field(value: &str) -> Result<String<MAX_ROUTE_FIELD>, RouteError> {
    let mut out = String::new();
    out.push_str(value).map_err(|_| RouteError::FieldTooLong)?;
    Ok(out)
}

/// Send packets matching `key`/`value` to `topic`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRoute {
    key: String<MAX_ROUTE_FIELD>,
    value: String<MAX_ROUTE_FIELD>,
    topic: String<MAX_ROUTE_FIELD>,
}

impl TopicRoute {
    pub fn new(key: &str, value: &str, topic: &str) -> Result<Self, RouteError> {
        Ok(Self {
            key: field(key)?,
            value: field(value)?,
            topic: field(topic)?,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether `packet` contains `"key":"value"`
    fn matches_json(&self, packet: &[u8]) -> bool {
        let mut pattern = JsonPattern::new();
        if write!(pattern, "\"{}\":\"{}\"", self.key, self.value).is_err() {
            return false;
        }
        let pattern = pattern.as_bytes();
        if pattern.len() >= packet.len() {
            return false;
        }
        packet.windows(pattern.len()).any(|window| window == pattern)
    }

    /// Whether the byte at offset `key` equals the hex byte `value`
    fn matches_binary(&self, packet: &[u8]) -> bool {
        let Ok(offset) = self.key.parse::<usize>() else {
            return false;
        };
        if self.value.len() != 2 || !self.value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }
        let Ok(expected) = u8::from_str_radix(&self.value, 16) else {
            return false;
        };
        packet.get(offset) == Some(&expected)
    }

    pub fn matches(&self, packet: &[u8], data_type: DataType) -> bool {
        match data_type {
            DataType::Json => self.matches_json(packet),
            DataType::JsonConvert | DataType::Any => self.matches_binary(packet),
        }
    }
}

/// Ordered route table with a fallback topic
#[derive(Debug, Clone)]
pub struct Router {
    default_topic: String<MAX_ROUTE_FIELD>,
    routes: Vec<TopicRoute, MAX_TOPIC_ROUTES>,
}

impl Router {
    pub fn new(default_topic: &str) -> Result<Self, RouteError> {
        Ok(Self {
            default_topic: field(default_topic)?,
            routes: Vec::new(),
        })
    }

    pub fn add(&mut self, route: TopicRoute) -> Result<(), RouteError> {
        self.routes
            .push(route)
            .map_err(|_| RouteError::TooManyRoutes)
    }

    pub fn routes(&self) -> &[TopicRoute] {
        &self.routes
    }

    pub fn default_topic(&self) -> &str {
        &self.default_topic
    }

    /// Topic for `packet`, or `None` when routes exist and none match
    pub fn select(&self, packet: &[u8], data_type: DataType) -> Option<&str> {
        if self.routes.is_empty() {
            return Some(&self.default_topic);
        }
        self.routes
            .iter()
            .find(|route| route.matches(packet, data_type))
            .map(|route| route.topic())
    }
}
