//! Canonical upstream query construction.
//!
//! Merges caller-supplied parameters over a fixed default set, restricted to
//! an allow-list, and serializes the result into the query string sent to the
//! upstream WMS endpoint.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

/// Defaults applied to every GetMap request. Callers may override any of
/// these through the allow-list.
const DEFAULT_PARAMS: &[(&str, &str)] = &[
    ("SERVICE", "WMS"),
    ("VERSION", "1.3.0"),
    ("REQUEST", "GetMap"),
    ("FORMAT", "image/png"),
    ("TRANSPARENT", "TRUE"),
    ("CRS", "EPSG:4326"),
    ("WIDTH", "512"),
    ("HEIGHT", "512"),
    ("LANGUAGE", "fin"),
];

/// Parameters callers are allowed to set or override. Anything else in the
/// inbound query string is dropped.
const ALLOWED_PARAMS: &[&str] = &[
    "SERVICE",
    "VERSION",
    "REQUEST",
    "LAYERS",
    "STYLES",
    "FORMAT",
    "TRANSPARENT",
    "CRS",
    "BBOX",
    "WIDTH",
    "HEIGHT",
    "LANGUAGE",
];

/// Percent-encode everything except RFC 3986 unreserved characters.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Same set with `/` kept literal, used only for the FORMAT value. The
/// upstream rejects `image%2Fpng`.
const MIME_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Error type for request normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The merged descriptor has no BBOX; never defaulted, always rejected.
    #[error("Missing BBOX (latMin,lonMin,latMax,lonMax)")]
    MissingBbox,
}

/// A normalized tile request: the ordered upstream parameter set plus the
/// out-of-band debug flag.
#[derive(Debug, Clone)]
pub struct TileQuery {
    params: Vec<(String, String)>,
    debug: bool,
}

impl TileQuery {
    /// Whether the caller requested the debug echo path.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Look up a parameter by canonical (upper-case) name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to the upstream query string.
    ///
    /// Every value is percent-encoded except the `/` inside the FORMAT value,
    /// which the upstream requires literal.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| {
                let set = if k == "FORMAT" { MIME_VALUE } else { QUERY_VALUE };
                format!("{}={}", k, utf8_percent_encode(v, set))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Merge caller parameters over the defaults and validate the result.
///
/// Keys are matched case-insensitively against the allow-list; matches are
/// stored under their canonical upper-case name so later duplicates overwrite
/// earlier ones. `DEBUG=true` (any case) toggles the debug flag and is
/// stripped from the descriptor.
pub fn normalize<I>(raw: I) -> Result<TileQuery, NormalizeError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut params: Vec<(String, String)> = DEFAULT_PARAMS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut debug = false;

    for (key, value) in raw {
        if key.eq_ignore_ascii_case("DEBUG") {
            debug = value.eq_ignore_ascii_case("true");
            continue;
        }

        let canonical = match ALLOWED_PARAMS
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(&key))
        {
            Some(name) => *name,
            None => continue,
        };

        match params.iter_mut().find(|(k, _)| k == canonical) {
            Some(entry) => entry.1 = value,
            None => params.push((canonical.to_string(), value)),
        }
    }

    if !params.iter().any(|(k, _)| k == "BBOX") {
        return Err(NormalizeError::MissingBbox);
    }

    Ok(TileQuery { params, debug })
}
