//! Path template compilation on top of [`matchit`].
//!
//! A [`Matcher`] is compiled once per route and extracts the named segments of a
//! concrete request path. Templates use matchit syntax (`/users/{id}`, `/files/{*path}`),
//! the `:name` segment shorthand (`/users/:id`) is accepted as well.

use crate::error::RouteDefinitionError;
use serde_json::{Map, Value};
use std::borrow::Cow;

type InnerRouter = matchit::Router<()>;

/// A compiled path template.
pub struct Matcher {
    template: String,
    names: Vec<String>,
    inner: InnerRouter,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher").field("template", &self.template).field("names", &self.names).finish()
    }
}

impl Matcher {
    /// Compiles `template`, rejecting unnamed placeholders.
    pub fn compile(template: &str) -> Result<Self, RouteDefinitionError> {
        let (normalized, names) = normalize(template)?;

        let mut inner = InnerRouter::new();
        inner
            .insert(normalized, ())
            .map_err(|source| RouteDefinitionError::InvalidTemplate { template: template.to_string(), source })?;

        Ok(Self { template: template.to_string(), names, inner })
    }

    /// The template this matcher was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names, in template order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Matches `path`, returning the percent-decoded parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let matched = self.inner.at(path).ok()?;
        let params = matched.params.iter().map(|(name, value)| (name.to_string(), decode(value))).collect();
        Some(PathParams { params })
    }
}

fn decode(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Rewrites `:name` segments into matchit placeholders and collects the names.
fn normalize(template: &str) -> Result<(String, Vec<String>), RouteDefinitionError> {
    let positional = || RouteDefinitionError::PositionalParameter { template: template.to_string() };
    let unsupported = |segment: &str| RouteDefinitionError::UnsupportedSegment {
        template: template.to_string(),
        segment: segment.to_string(),
    };

    let mut names = Vec::new();
    let mut segments = Vec::new();

    for segment in template.split('/') {
        if segment == "*" || segment.contains('(') {
            return Err(positional());
        }

        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(positional());
            }
            if !is_identifier(name) {
                return Err(unsupported(segment));
            }
            names.push(name.to_string());
            segments.push(Cow::Owned(format!("{{{name}}}")));
            continue;
        }

        let mut rest = segment;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                return Err(unsupported(segment));
            };
            let name = rest[start + 1..start + len].trim_start_matches('*');
            if name.is_empty() {
                return Err(positional());
            }
            if !is_identifier(name) {
                return Err(unsupported(segment));
            }
            names.push(name.to_string());
            rest = &rest[start + len + 1..];
        }
        segments.push(Cow::Borrowed(segment));
    }

    Ok((segments.join("/"), names))
}

fn is_identifier(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Named parameters extracted from a request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the decoded value of a parameter by its name
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Raw string mapping, the input of params validation.
    pub fn into_json(self) -> Value {
        let map = self.params.into_iter().map(|(key, value)| (key, Value::String(value))).collect::<Map<_, _>>();
        Value::Object(map)
    }
}
