//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile `/api/test/{probeName}` style patterns into segments
//! - Match a request path segment by segment
//! - Capture `{param}` segments by name
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - A parameter captures exactly one non-empty segment
//! - A single trailing slash is ignored (`/health/` matches `/health`)
//! - No regex to guarantee O(n) matching

/// One compiled path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Values captured by `{param}` segments, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    trimmed.split('/').skip(1)
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|segment| {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(name) => Segment::Param(name.to_string()),
                    None => Segment::Literal(segment.to_string()),
                }
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `path`, returning captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        if !path.starts_with('/') {
            return None;
        }
        let mut params = Vec::new();
        let mut parts = split(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => params.push((name.clone(), part.to_string())),
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(PathParams(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let pattern = PathPattern::parse("/api/inventory/low-stock");
        assert!(pattern.matches("/api/inventory/low-stock").is_some());
        assert!(pattern.matches("/api/inventory/low-stock/").is_some());
        assert!(pattern.matches("/api/inventory").is_none());
        assert!(pattern.matches("/api/inventory/low-stock/extra").is_none());
        assert!(pattern.matches("/API/inventory/low-stock").is_none());
    }

    #[test]
    fn test_param_capture() {
        let pattern = PathPattern::parse("/api/crm/contacts/{contactId}");
        let params = pattern.matches("/api/crm/contacts/abc123").unwrap();
        assert_eq!(params.get("contactId"), Some("abc123"));
        assert_eq!(params.get("other"), None);

        assert!(pattern.matches("/api/crm/contacts/").is_none());
        assert!(pattern.matches("/api/crm/contacts//").is_none());
    }

    #[test]
    fn test_root_and_health() {
        assert!(PathPattern::parse("/health").matches("/health").is_some());
        assert!(PathPattern::parse("/health").matches("/").is_none());
        assert!(PathPattern::parse("/health").matches("health").is_none());
    }
}
