use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Scheme used to reach a check's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("'{other}' is not one of http, https")),
        }
    }
}

/// HTTP method a check is probed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Upper-cased form used on the wire and in alerts
    pub fn as_upper(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "get"),
            Method::Post => write!(f, "post"),
            Method::Put => write!(f, "put"),
            Method::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "delete" => Ok(Method::Delete),
            other => Err(format!("'{other}' is not one of get, post, put, delete")),
        }
    }
}

/// Classified reachability of a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

/// A validated check record
///
/// Only produced by [`crate::monitoring::validation::validate_check`]. Fields
/// the engine does not know about are carried in `extra` so that writing the
/// record back does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    pub user_key: String,
    pub protocol: Protocol,
    pub target: String,
    pub method: Method,
    /// Kept as written; values that are not HTTP status codes never match
    pub success_codes: Vec<i64>,
    pub timeout_seconds: u64,
    pub state: CheckState,
    /// `None` until the first probe completes
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Check {
    /// Fully qualified URL of the probe target
    pub fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}", self.protocol, self.target))
    }

    /// Whether `code` is one of the acceptable response codes
    pub fn accepts(&self, code: u16) -> bool {
        self.success_codes.contains(&i64::from(code))
    }

    /// Text sent to the owner when the check changes state
    pub fn alert_message(&self) -> String {
        format!(
            "Alert: Your check for {} {}://{} is currently {}",
            self.method.as_upper(),
            self.protocol,
            self.target,
            self.state
        )
    }

    /// Serialize back into the JSON shape kept in the record store
    pub fn to_record(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
