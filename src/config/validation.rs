//! Configuration validation.
//!
//! Serde handles syntax; this module checks meaning. Every problem is
//! collected so an operator can fix a config file in one pass.

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;
use crate::http::server::HEALTH_ROUTE;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error(
        "listener.route `{0}` must be a static path starting with `/` and must not be the health route"
    )]
    Route(String),

    #[error("upstream.base_url `{0}` must be an absolute http(s) URL without query or fragment")]
    BaseUrl(String),

    #[error("upstream.stream_path `{0}` must start with `/`")]
    StreamPath(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let route = &config.listener.route;
    if !route.starts_with('/') || route == HEALTH_ROUTE || !is_static_route(route) {
        errors.push(ValidationError::Route(route.clone()));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url)
            if matches!(url.scheme(), "http" | "https")
                && url.has_host()
                && url.query().is_none()
                && url.fragment().is_none() => {}
        _ => errors.push(ValidationError::BaseUrl(config.upstream.base_url.clone())),
    }

    if !config.upstream.stream_path.starts_with('/') {
        errors.push(ValidationError::StreamPath(config.upstream.stream_path.clone()));
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream.connect_timeout_secs"));
    }
    if config.upstream.response_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream.response_timeout_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Routes are matched literally; the router panics on capture or wildcard syntax.
fn is_static_route(route: &str) -> bool {
    !route.contains(['{', '}', '*']) && !route.split('/').any(|segment| segment.starts_with(':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.base_url = "ftp://events".into();
        config.upstream.stream_path = "stream".into();
        config.upstream.connect_timeout_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("not-an-address".into()),
                ValidationError::BaseUrl("ftp://events".into()),
                ValidationError::StreamPath("stream".into()),
                ValidationError::ZeroTimeout("upstream.connect_timeout_secs"),
            ]
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        let mut config = RelayConfig::default();
        config.upstream.base_url = "/just/a/path".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn route_cannot_shadow_health_check() {
        let mut config = RelayConfig::default();
        config.listener.route = HEALTH_ROUTE.into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::Route(HEALTH_ROUTE.into())])
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = RelayConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn idle_timeout_may_be_disabled() {
        let mut config = RelayConfig::default();
        config.timeouts.idle_secs = None;
        assert!(validate_config(&config).is_ok());

        config.timeouts.idle_secs = Some(0);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn base_url_with_query_or_fragment_is_rejected() {
        for base_url in [
            "http://events.internal:9000/?tenant=a",
            "http://events.internal:9000/#frag",
        ] {
            let mut config = RelayConfig::default();
            config.upstream.base_url = base_url.into();
            assert_eq!(
                validate_config(&config),
                Err(vec![ValidationError::BaseUrl(base_url.into())])
            );
        }
    }

    #[test]
    fn route_must_be_static() {
        for route in ["/events/{id}", "/events/*rest", "/{*all}", "/events/:id"] {
            let mut config = RelayConfig::default();
            config.listener.route = route.into();
            assert_eq!(
                validate_config(&config),
                Err(vec![ValidationError::Route(route.into())])
            );
        }
    }
}
