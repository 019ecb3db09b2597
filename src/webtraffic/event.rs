use serde::{Deserialize, Serialize};

/// Raw text payload as delivered by a record source.
///
/// No structure is assumed beyond being decodable text; interpretation is
/// entirely the decoder's job.
pub type RawRecord = String;

/// A single decoded web-traffic event.
///
/// Wire format is a JSON object like:
///
/// ```json
/// {
///    "timestamp":"1992-09-11 22:11:43",
///    "user_agent":"Opera/8.69.(X11; Linux x86_64; my-MM) Presto/2.9.177 Version/12.00",
///    "ip":"169.197.157.15",
///    "email":"josefina65@hotmail.com",
///    "first_name":"Ivan",
///    "last_name":"Becerra",
///    "country":"Azerbaiyán"
/// }
/// ```
///
/// Only `country` is semantically required; every other field is optional
/// and maps to `None` when absent. Events are immutable once decoded and are
/// discarded after being folded into a window accumulator.
///
/// The embedded `timestamp` is source-provided text and is not used for
/// window assignment; windowing runs on processing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebTrafficEvent {
    /// Country the traffic originated from; the partitioning key
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl WebTrafficEvent {
    /// Creates an event carrying only a country, the minimum a valid event
    /// needs. Mostly useful in tests and demos.
    pub fn with_country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            timestamp: None,
            user_agent: None,
            ip: None,
            email: None,
            first_name: None,
            last_name: None,
        }
    }
}
