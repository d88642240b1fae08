//! Lookup route matching and query decoding.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;

use geoip_core::PathTemplate;

/// Matches request paths against the configured lookup template.
#[derive(Debug, Clone)]
pub struct LookupRoute {
    template: PathTemplate,
}

impl LookupRoute {
    /// Create a route for `template`.
    #[must_use]
    pub fn new(template: PathTemplate) -> Self {
        Self { template }
    }

    /// The template this route serves.
    #[must_use]
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Extract the percent-decoded `:ip` segment, or `None` if `path` is not
    /// the lookup path.
    ///
    /// Invalid UTF-8 after decoding is replaced rather than rejected; such an
    /// address never parses, so the lookup reports it as invalid.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<String> {
        let raw = self.template.match_path(path)?;
        Some(percent_decode_str(raw).decode_utf8_lossy().into_owned())
    }
}

/// Decode a URL query string into an ordered map.
///
/// `+` decodes to a space and percent escapes are resolved. When a key
/// repeats, the last value wins.
#[must_use]
pub fn parse_query(query: Option<&str>) -> BTreeMap<String, String> {
    query
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}
