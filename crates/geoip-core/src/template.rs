//! Lookup path templates.
//!
//! A template such as `/location/:ip` is a `/`-separated list of literal
//! segments plus exactly one `:ip` parameter segment. Matching is positional:
//! a request path matches when it has the same number of segments, every
//! literal segment is equal, and the parameter segment is non-empty.

use crate::error::{GeoIpError, GeoIpResult};

/// Name of the single supported path parameter.
const IP_PARAM: &str = ":ip";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Ip,
}

/// A parsed lookup path template.
///
/// # Examples
///
/// ```
/// use geoip_core::PathTemplate;
///
/// let template = PathTemplate::parse("/location/:ip").unwrap();
/// assert_eq!(template.match_path("/location/8.8.8.8"), Some("8.8.8.8"));
/// assert_eq!(template.match_path("/other/8.8.8.8"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns [`GeoIpError::Config`] if the template does not start with
    /// `/`, declares a parameter other than `:ip`, or does not contain
    /// exactly one `:ip` segment.
    pub fn parse(template: &str) -> GeoIpResult<Self> {
        let rest = template.strip_prefix('/').ok_or_else(|| {
            GeoIpError::Config(format!("lookup path must start with '/': {template}"))
        })?;

        let mut segments = Vec::new();
        for part in rest.split('/') {
            if part == IP_PARAM {
                segments.push(Segment::Ip);
            } else if part.starts_with(':') {
                return Err(GeoIpError::Config(format!(
                    "unsupported path parameter '{part}' in {template}, only {IP_PARAM} is allowed"
                )));
            } else {
                segments.push(Segment::Literal(part.to_owned()));
            }
        }

        let params = segments.iter().filter(|s| **s == Segment::Ip).count();
        if params != 1 {
            return Err(GeoIpError::Config(format!(
                "lookup path must contain exactly one {IP_PARAM} segment, found {params}: {template}"
            )));
        }

        Ok(Self {
            raw: template.to_owned(),
            segments,
        })
    }

    /// The template as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path, returning the raw (still percent-encoded) ip
    /// segment on success. A single trailing slash is tolerated.
    #[must_use]
    pub fn match_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix('/')?;
        let rest = if rest.len() > 1 {
            rest.strip_suffix('/').unwrap_or(rest)
        } else {
            rest
        };

        let mut parts = rest.split('/');
        let mut ip = None;
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Ip if part.is_empty() => return None,
                Segment::Ip => ip = Some(part),
            }
        }

        if parts.next().is_some() {
            return None;
        }
        ip
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
