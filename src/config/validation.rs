//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (admission capacity >= 1)
//! - Check that the upstream base URL and referer are well-formed
//! - Check that header-bearing fields are usable as HTTP header values
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use reqwest::header::HeaderValue;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic configuration problem.
#[derive(Debug)]
pub enum ValidationError {
    EmptyBindAddress,
    ZeroAdmissionCapacity,
    InvalidUpstreamUrl(String),
    InvalidReferer(String),
    RefererNotHeaderSafe(String),
    UserAgentNotHeaderSafe(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyBindAddress => write!(f, "listener.bind_address is empty"),
            ValidationError::ZeroAdmissionCapacity => {
                write!(f, "admission.capacity must be at least 1")
            }
            ValidationError::InvalidUpstreamUrl(url) => {
                write!(f, "upstream.base_url is not a valid URL: {}", url)
            }
            ValidationError::InvalidReferer(url) => {
                write!(f, "upstream.referer is not a valid URL: {}", url)
            }
            ValidationError::RefererNotHeaderSafe(value) => {
                write!(f, "upstream.referer is not a valid header value: {}", value)
            }
            ValidationError::UserAgentNotHeaderSafe(value) => {
                write!(
                    f,
                    "upstream.user_agent_fallback is not a valid header value: {}",
                    value
                )
            }
        }
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    }

    if config.admission.capacity == 0 {
        errors.push(ValidationError::ZeroAdmissionCapacity);
    }

    if Url::parse(&config.upstream.base_url).is_err() {
        errors.push(ValidationError::InvalidUpstreamUrl(
            config.upstream.base_url.clone(),
        ));
    }

    if Url::parse(&config.upstream.referer).is_err() {
        errors.push(ValidationError::InvalidReferer(
            config.upstream.referer.clone(),
        ));
    }

    // The raw strings go into outbound headers as-is; the URL parser is more
    // permissive than the header grammar, so check both.
    if HeaderValue::from_str(&config.upstream.referer).is_err() {
        errors.push(ValidationError::RefererNotHeaderSafe(
            config.upstream.referer.clone(),
        ));
    }

    if HeaderValue::from_str(&config.upstream.user_agent_fallback).is_err() {
        errors.push(ValidationError::UserAgentNotHeaderSafe(
            config.upstream.user_agent_fallback.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
