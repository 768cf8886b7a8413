use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StrandError;

/// `protocol://domain/path`; protocol per RFC 3986 scheme rules, lowercase.
static URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z][a-z+.\-]*)://([^/]+)(/.*)?$").expect("uri regex is valid")
});

/// Placeholder substituted with the caller's public key before dispatch.
pub const KEY_PLACEHOLDER: &str = ":key";
/// Placeholder substituted with a payload digest before dispatch.
pub const SIGNATURE_PLACEHOLDER: &str = ":signature";

/// A parsed record URI. The canonical string form is
/// `protocol://domain/seg0/seg1/...`; the program key `protocol://domain`
/// selects the validator that governs writes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri {
    pub protocol: String,
    pub domain: String,
    pub path: Vec<String>,
}

impl Uri {
    /// Parse a canonical URI string. Fails with `InvalidUri` when the regex
    /// does not match or the domain is empty.
    pub fn parse(s: &str) -> Result<Self, StrandError> {
        let caps = URI_RE
            .captures(s)
            .ok_or_else(|| StrandError::InvalidUri(s.to_string()))?;

        let protocol = caps[1].to_string();
        let domain = caps[2].to_string();
        if domain.is_empty() {
            return Err(StrandError::InvalidUri(s.to_string()));
        }

        let path = caps
            .get(3)
            .map(|m| {
                m.as_str()
                    .trim_start_matches('/')
                    .split('/')
                    .filter(|seg| !seg.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { protocol, domain, path })
    }

    /// The schema-registry key: `protocol://domain`.
    pub fn program_key(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }

    /// Canonical string form.
    pub fn canonical(&self) -> String {
        if self.path.is_empty() {
            self.program_key()
        } else {
            format!("{}/{}", self.program_key(), self.path.join("/"))
        }
    }
}

/// Textually substitute `:key` and (optionally) `:signature` in a template
/// URI string. Substitution is applied before the URI reaches the schema
/// registry; placeholders are never stored.
pub fn substitute(template: &str, key: &str, signature: Option<&str>) -> String {
    let mut out = template.replace(KEY_PLACEHOLDER, key);
    if let Some(sig) = signature {
        out = out.replace(SIGNATURE_PLACEHOLDER, sig);
    }
    out
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uri({})", self.canonical())
    }
}

impl FromStr for Uri {
    type Err = StrandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = StrandError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Uri::parse(&s)
    }
}

impl From<Uri> for String {
    fn from(u: Uri) -> String {
        u.canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_protocol_domain_path() {
        let u = Uri::parse("mutable://open/greetings/hello").unwrap();
        assert_eq!(u.protocol, "mutable");
        assert_eq!(u.domain, "open");
        assert_eq!(u.path, vec!["greetings", "hello"]);
        assert_eq!(u.program_key(), "mutable://open");
        assert_eq!(u.canonical(), "mutable://open/greetings/hello");
    }

    #[test]
    fn parses_pathless_uri() {
        let u = Uri::parse("immutable://inbox").unwrap();
        assert!(u.path.is_empty());
        assert_eq!(u.canonical(), "immutable://inbox");
    }

    #[test]
    fn rejects_malformed_uris() {
        for bad in [
            "",
            "no-scheme-here",
            "://open/x",
            "Mutable://open/x", // uppercase protocol
            "9proto://open/x",  // protocol must start with a letter
            "mutable:/open/x",
        ] {
            assert!(Uri::parse(bad).is_err(), "expected reject: {bad}");
        }
    }

    #[test]
    fn blob_digest_path_survives_parsing() {
        let u = Uri::parse("blob://open/sha256:9f86d081884c7d65").unwrap();
        assert_eq!(u.path, vec!["sha256:9f86d081884c7d65"]);
    }

    #[test]
    fn substitutes_placeholders() {
        let out = substitute(
            "mutable://accounts/:key/subscribers/:signature",
            "ab12",
            Some("ffee"),
        );
        assert_eq!(out, "mutable://accounts/ab12/subscribers/ffee");

        let partial = substitute("mutable://accounts/:key/profile", "ab12", None);
        assert_eq!(partial, "mutable://accounts/ab12/profile");
    }

    #[test]
    fn serde_round_trip() {
        let u = Uri::parse("link://open/pointer").unwrap();
        let json = serde_json::to_string(&u).unwrap();
        assert_eq!(json, "\"link://open/pointer\"");
        let back: Uri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, u);
    }
}
