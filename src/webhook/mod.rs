//! Inbound webhook verification.
//!
//! # Data Flow
//! ```text
//! POST /api/webhooks/{provider}
//!     → WebhookRegistry::get (unknown provider → 404)
//!     → WebhookProvider::verify (raw bytes + signature header)
//!     → ReplayGuard (signature already accepted → 409)
//!     → handler acknowledges
//! ```
//!
//! # Design Decisions
//! - Verification runs on the exact raw body bytes, before JSON parsing
//! - Fails closed unless skipping is explicitly configured
//! - Skipped verification is logged as a security warning on every request

pub mod replay;
pub mod verifier;

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName};

use crate::config::schema::{WebhookConfig, WebhookProviderConfig, PLACEHOLDER_SECRET};

pub use replay::ReplayGuard;
pub use verifier::{sign, verify};

/// Outcome of checking one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// Verification disabled for this provider.
    Skipped,
    Rejected(&'static str),
    /// Valid signature already accepted inside the replay window.
    Replayed,
}

impl Verification {
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Verification::Verified => "verified",
            Verification::Skipped => "skipped",
            Verification::Rejected(_) => "rejected",
            Verification::Replayed => "replayed",
        }
    }
}

/// One configured webhook sender.
#[derive(Debug)]
pub struct WebhookProvider {
    name: String,
    signature_header: HeaderName,
    secret: Option<String>,
    skip_verification: bool,
}

impl WebhookProvider {
    fn from_config(config: &WebhookProviderConfig) -> Option<Self> {
        let signature_header = HeaderName::from_bytes(config.signature_header.as_bytes()).ok()?;
        Some(Self {
            name: config.name.clone(),
            signature_header,
            secret: config.secret.clone().filter(|s| !s.trim().is_empty()),
            skip_verification: config.skip_verification,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit opt-out, or the shipped placeholder secret left in place.
    pub fn skips_verification(&self) -> bool {
        self.skip_verification
            || self
                .secret
                .as_deref()
                .map(|s| s.starts_with(PLACEHOLDER_SECRET))
                .unwrap_or(false)
    }

    fn signature<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get(&self.signature_header)
            .and_then(|v| v.to_str().ok())
    }

    /// Check a delivery's signature.
    pub fn verify(&self, headers: &HeaderMap, raw_body: &[u8]) -> Verification {
        if self.skips_verification() {
            tracing::warn!(
                provider = %self.name,
                "SECURITY: webhook signature verification is disabled for this provider"
            );
            return Verification::Skipped;
        }
        if self.secret.is_none() {
            return Verification::Rejected("webhook secret is not configured");
        }
        let Some(signature) = self.signature(headers) else {
            return Verification::Rejected("missing signature header");
        };
        if verify(raw_body, Some(signature), self.secret.as_deref()) {
            Verification::Verified
        } else {
            Verification::Rejected("invalid signature")
        }
    }
}

/// Providers by name plus the shared replay guard.
#[derive(Debug)]
pub struct WebhookRegistry {
    providers: Vec<WebhookProvider>,
    replay: ReplayGuard,
}

impl WebhookRegistry {
    pub fn from_config(config: &WebhookConfig) -> Self {
        let providers = config
            .providers
            .iter()
            .filter_map(|p| {
                let provider = WebhookProvider::from_config(p);
                if provider.is_none() {
                    tracing::error!(provider = %p.name, header = %p.signature_header, "Invalid signature header, provider disabled");
                }
                provider
            })
            .collect();
        Self {
            providers,
            replay: ReplayGuard::new(Duration::from_secs(config.replay_window_secs)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&WebhookProvider> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn providers(&self) -> impl Iterator<Item = &WebhookProvider> {
        self.providers.iter()
    }

    /// Verify a delivery and apply replay protection to verified ones.
    pub fn check(&self, provider: &WebhookProvider, headers: &HeaderMap, raw_body: &[u8]) -> Verification {
        let outcome = provider.verify(headers, raw_body);
        if outcome != Verification::Verified {
            return outcome;
        }
        // Keyed on the decoded digest so re-encoding a captured signature
        // does not get past the guard.
        let key = match provider.signature(headers).and_then(verifier::decode_signature) {
            Some(digest) => format!("{}:{}", provider.name, hex::encode(digest)),
            None => return outcome,
        };
        if self.replay.check_and_record(&key) {
            Verification::Verified
        } else {
            Verification::Replayed
        }
    }
}
