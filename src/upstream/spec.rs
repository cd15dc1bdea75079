//! Compiled, per-provider upstream description.
//!
//! One [`UpstreamSpec`] replaces what would otherwise be a hand-written client
//! per provider: the base URL, the auth scheme, static headers and the
//! response unwrapping rule are all data.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use serde_json::Value;
use url::Url;

use crate::config::schema::{AuthScheme, UpstreamConfig};
use crate::upstream::error::{UpstreamError, UpstreamResult};

/// A configured third-party API.
#[derive(Clone)]
pub struct UpstreamSpec {
    pub name: String,
    base_url: Option<Url>,
    pub auth: AuthScheme,
    credential: Option<String>,
    headers: HeaderMap,
    params: BTreeMap<String, String>,
    pub probe_path: String,
    pub unwrap_field: Option<String>,
    pub timeout: Duration,
}

// Credentials never reach logs.
impl fmt::Debug for UpstreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSpec")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("auth", &self.auth)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("probe_path", &self.probe_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl UpstreamSpec {
    /// Compile an upstream definition. `default_timeout` applies when the
    /// definition has no override.
    pub fn from_config(config: &UpstreamConfig, default_timeout: Duration) -> UpstreamResult<Self> {
        let invalid = |message: String| UpstreamError::InvalidRequest {
            upstream: config.name.clone(),
            message,
        };

        let base_url = if config.base_url.trim().is_empty() {
            None
        } else {
            Some(Url::parse(config.base_url.trim()).map_err(|e| invalid(e.to_string()))?)
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(name, value);
        }

        let credential = config
            .api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Ok(Self {
            name: config.name.clone(),
            base_url,
            auth: config.auth.clone(),
            credential,
            headers,
            params: config.params.clone(),
            probe_path: config.probe_path.clone(),
            unwrap_field: config.unwrap_field.clone(),
            timeout: config.timeout_ms.map(Duration::from_millis).unwrap_or(default_timeout),
        })
    }

    fn not_configured(&self, reason: impl Into<String>) -> UpstreamError {
        UpstreamError::NotConfigured {
            upstream: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Verify everything needed for a call is present, without any I/O.
    pub fn check_configured(&self) -> UpstreamResult<&Url> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| self.not_configured("base URL is not set"))?;
        if self.auth != AuthScheme::None && self.credential.is_none() {
            return Err(self.not_configured("API key is not set"));
        }
        Ok(base)
    }

    pub fn is_configured(&self) -> bool {
        self.check_configured().is_ok()
    }

    /// Provider parameter such as `location_id`.
    pub fn param(&self, key: &str) -> UpstreamResult<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| self.not_configured(format!("parameter '{}' is not set", key)))
    }

    /// Resolve `path` against the base URL, keeping any base path prefix
    /// (`https://api.openai.com/v1` + `/models`).
    pub fn endpoint(&self, path: &str) -> UpstreamResult<Url> {
        let base = self.check_configured()?;
        let route = path.split(['?', '#']).next().unwrap_or_default();
        let dot_segment = route.split('/').any(|segment| {
            let segment = segment.to_ascii_lowercase().replace("%2e", ".");
            segment == "." || segment == ".."
        });
        if dot_segment {
            return Err(UpstreamError::InvalidRequest {
                upstream: self.name.clone(),
                message: format!("path '{}' contains a dot segment", path),
            });
        }
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| UpstreamError::InvalidRequest {
            upstream: self.name.clone(),
            message: e.to_string(),
        })
    }

    /// The probe path with `{param}` placeholders substituted.
    pub fn resolved_probe_path(&self) -> UpstreamResult<String> {
        let mut path = self.probe_path.clone();
        while let Some(start) = path.find('{') {
            let Some(len) = path[start..].find('}') else {
                break;
            };
            let key = path[start + 1..start + len].to_string();
            let value = self.param(&key)?.to_string();
            path.replace_range(start..=start + len, &value);
        }
        Ok(path)
    }

    /// Attach static headers and the credential.
    pub(crate) fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.headers(self.headers.clone());
        let Some(credential) = self.credential.as_deref() else {
            return builder;
        };
        match &self.auth {
            AuthScheme::None => builder,
            AuthScheme::Bearer => builder.header(AUTHORIZATION, format!("Bearer {}", credential)),
            AuthScheme::Header { name } => builder.header(name.as_str(), credential),
            AuthScheme::Query { param } => builder.query(&[(param.as_str(), credential)]),
        }
    }

    /// Apply the provider's unwrapping rule to a response body.
    pub fn unwrap_response(&self, value: Value) -> Value {
        match (&self.unwrap_field, value) {
            (Some(field), Value::Object(mut map)) if map.contains_key(field) => {
                map.remove(field).unwrap_or(Value::Null)
            }
            (_, value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::default_upstreams;
    use serde_json::json;

    fn spec(name: &str) -> UpstreamConfig {
        default_upstreams()
            .into_iter()
            .find(|u| u.name == name)
            .unwrap()
    }

    #[test]
    fn test_missing_credential_is_not_configured() {
        let spec = UpstreamSpec::from_config(&spec("openai"), Duration::from_secs(5)).unwrap();
        let err = spec.check_configured().unwrap_err();
        assert!(matches!(err, UpstreamError::NotConfigured { ref reason, .. } if reason.contains("API key")));
    }

    #[test]
    fn test_missing_base_url_is_not_configured() {
        let mut config = spec("shopify");
        config.api_key = Some("shpat".into());
        let spec = UpstreamSpec::from_config(&config, Duration::from_secs(5)).unwrap();
        assert!(!spec.is_configured());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let mut config = spec("openai");
        config.api_key = Some("sk-test".into());
        let spec = UpstreamSpec::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(
            spec.endpoint("/models").unwrap().as_str(),
            "https://api.openai.com/v1/models"
        );
        assert_eq!(spec.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_endpoint_rejects_dot_segments() {
        let mut config = spec("crm");
        config.api_key = Some("token".into());
        let spec = UpstreamSpec::from_config(&config, Duration::from_secs(5)).unwrap();
        for path in ["/contacts/../locations/x", "/contacts/%2E%2e/tasks", "/./contacts"] {
            let err = spec.endpoint(path).unwrap_err();
            assert!(matches!(err, UpstreamError::InvalidRequest { .. }), "{}", path);
        }
        assert!(spec.endpoint("/contacts/abc.def/tasks").is_ok());
    }

    #[test]
    fn test_probe_path_substitution() {
        let mut config = spec("crm");
        config.api_key = Some("token".into());
        let unresolved = UpstreamSpec::from_config(&config, Duration::from_secs(5)).unwrap();
        assert!(unresolved.resolved_probe_path().is_err());

        config.params.insert("location_id".into(), "loc-42".into());
        let spec = UpstreamSpec::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(spec.resolved_probe_path().unwrap(), "/locations/loc-42");
    }

    #[test]
    fn test_unwrap_response() {
        let spec = UpstreamSpec::from_config(&spec("openai"), Duration::from_secs(5)).unwrap();
        assert_eq!(
            spec.unwrap_response(json!({"object": "list", "data": [1, 2]})),
            json!([1, 2])
        );
        assert_eq!(spec.unwrap_response(json!("raw")), json!("raw"));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let mut config = spec("openai");
        config.api_key = Some("sk-very-secret".into());
        let spec = UpstreamSpec::from_config(&config, Duration::from_secs(5)).unwrap();
        let debug = format!("{:?}", spec);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
