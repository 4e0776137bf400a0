//! Connection configuration repair and endpoint resolution.
//!
//! Operators paste whatever their telemetry vendor console hands them: a
//! JavaScript object literal assigned to a variable, commented lines, single
//! quotes, trailing commas. Two repair passes turn that into something a strict
//! JSON parser accepts:
//!
//! * [`repair_connection_config`] runs whenever the text is edited and
//!   rewrites the common JavaScript-isms.
//! * [`parse_connection_config`] runs at request time, slices the outermost
//!   `{ ... }` span and parses it strictly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field names quoted by the edit-time repair when they appear as bare keys.
pub const KNOWN_CONFIG_KEYS: [&str; 8] = [
    "apiKey",
    "authDomain",
    "databaseURL",
    "projectId",
    "storageBucket",
    "messagingSenderId",
    "appId",
    "measurementId",
];

const DATABASE_URL_FIELDS: [&str; 2] = ["databaseURL", "databaseUrl"];

static FULL_LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*//.*$").expect("static regex is valid"));

static TRAILING_COMMA_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\}").expect("static regex is valid"));

static TRAILING_COMMA_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\]").expect("static regex is valid"));

static BARE_KNOWN_KEYS: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
    KNOWN_CONFIG_KEYS
        .iter()
        .map(|key| {
            let pattern = format!(r"\b{}\s*:", regex::escape(key));
            let regex = Regex::new(&pattern).expect("known key pattern is valid");
            (regex, format!("\"{key}\":"))
        })
        .collect()
});

/// Errors from the request-time parse of a stored connection config.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigParseError {
    #[error("connection config contains no `{{...}}` object")]
    NoObject,
    #[error("connection config is not valid JSON: {message}")]
    InvalidJson { message: String },
}

/// Strictly parsed connection config.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    fields: Map<String, Value>,
}

impl ConnectionConfig {
    /// The upstream endpoint named by the config, if any.
    ///
    /// Empty strings and non-string values count as absent.
    pub fn database_url(&self) -> Option<&str> {
        DATABASE_URL_FIELDS.iter().find_map(|field| {
            self.fields
                .get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty())
        })
    }
}

/// Why a request ended up on the default endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    NoConfig,
    MissingDatabaseUrl,
    Unparsable(ConfigParseError),
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NoConfig => "no_config",
            FallbackReason::MissingDatabaseUrl => "missing_database_url",
            FallbackReason::Unparsable(_) => "unparsable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSource {
    CustomConfig,
    DefaultFallback(FallbackReason),
}

impl EndpointSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointSource::CustomConfig => "custom_config",
            EndpointSource::DefaultFallback(_) => "default_fallback",
        }
    }
}

/// Endpoint and resource path for one proxy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub endpoint_url: String,
    pub resource_path: String,
    pub source: EndpointSource,
}

impl ConnectionDescriptor {
    /// Resolve the endpoint from an optional stored config, falling back to
    /// `default_endpoint` whenever the config is absent or unusable.
    pub fn resolve(
        connection_config: Option<&str>,
        resource_path: &str,
        default_endpoint: &str,
    ) -> Self {
        let (endpoint_url, source) = match connection_config.map(str::trim) {
            None | Some("") => (
                default_endpoint.to_string(),
                EndpointSource::DefaultFallback(FallbackReason::NoConfig),
            ),
            Some(raw) => match parse_connection_config(raw) {
                Ok(config) => match config.database_url() {
                    Some(url) => (url.to_string(), EndpointSource::CustomConfig),
                    None => (
                        default_endpoint.to_string(),
                        EndpointSource::DefaultFallback(FallbackReason::MissingDatabaseUrl),
                    ),
                },
                Err(err) => (
                    default_endpoint.to_string(),
                    EndpointSource::DefaultFallback(FallbackReason::Unparsable(err)),
                ),
            },
        };

        Self {
            endpoint_url,
            resource_path: resource_path.to_string(),
            source,
        }
    }
}

/// Best-effort edit-time repair of a pasted connection config.
///
/// The output is not guaranteed to be valid JSON; [`parse_connection_config`]
/// still has to cope with whatever is left.
pub fn repair_connection_config(input: &str) -> String {
    let mut text = strip_assignment_prefix(input);

    text = FULL_LINE_COMMENT.replace_all(&text, "").into_owned();

    for (pattern, replacement) in BARE_KNOWN_KEYS.iter() {
        text = pattern
            .replace_all(&text, replacement.as_str())
            .into_owned();
    }

    text = text.replace('\'', "\"");

    text = TRAILING_COMMA_OBJECT.replace_all(&text, "}").into_owned();
    TRAILING_COMMA_ARRAY.replace_all(&text, "]").into_owned()
}

/// `const cfg = {...};` style input only qualifies when there is no `:`
/// anywhere, otherwise an `=` inside a value would truncate real content.
fn strip_assignment_prefix(input: &str) -> String {
    if !input.contains('=') || input.contains(':') {
        return input.to_string();
    }

    match input.split_once('=') {
        Some((_, rest)) => {
            let rest = rest.trim();
            rest.strip_suffix(';').unwrap_or(rest).to_string()
        }
        None => input.to_string(),
    }
}

/// Slice `input` to the span between its first `{` and last `}`.
pub fn outermost_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

/// Request-time repair followed by a strict parse.
pub fn parse_connection_config(input: &str) -> Result<ConnectionConfig, ConfigParseError> {
    let object = outermost_object(input.trim()).ok_or(ConfigParseError::NoObject)?;
    let value: Value =
        serde_json::from_str(object).map_err(|err| ConfigParseError::InvalidJson {
            message: err.to_string(),
        })?;

    match value {
        Value::Object(fields) => Ok(ConnectionConfig { fields }),
        other => Err(ConfigParseError::InvalidJson {
            message: format!("expected an object, found {other}"),
        }),
    }
}
