//! Configuration validation.
//!
//! Semantic checks on top of what serde already guarantees. Validation is
//! a pure function over the parsed config and reports every problem it
//! finds rather than stopping at the first.

use std::collections::HashSet;

use axum::http::Method;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. "routes[2].methods".
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(err(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }

    let mut seen_names = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = |suffix: &str| format!("routes[{}].{}", i, suffix);

        if !seen_names.insert(route.name.as_str()) {
            errors.push(err(field("name"), format!("duplicate route name: {}", route.name)));
        }

        if !route.upstream_path_template.starts_with('/') {
            errors.push(err(field("upstream_path_template"), "must start with '/'"));
        }

        if route.methods.is_empty() {
            errors.push(err(field("methods"), "at least one method is required"));
        }
        for method in &route.methods {
            if Method::from_bytes(method.as_bytes()).is_err() {
                errors.push(err(field("methods"), format!("unknown HTTP method: {}", method)));
            }
        }

        match Url::parse(&route.downstream_base_url) {
            Ok(url) => {
                if url.scheme() != "http" {
                    errors.push(err(
                        field("downstream_base_url"),
                        format!("unsupported scheme '{}', only http is forwarded", url.scheme()),
                    ));
                }
                if url.host_str().is_none() {
                    errors.push(err(field("downstream_base_url"), "missing host"));
                }
            }
            Err(e) => {
                errors.push(err(field("downstream_base_url"), format!("invalid URL: {}", e)));
            }
        }

        if route.rate_limit.limit == 0 {
            errors.push(err(field("rate_limit.limit"), "must be greater than zero"));
        }
        if route.rate_limit.window_secs == 0 {
            errors.push(err(field("rate_limit.window_secs"), "must be greater than zero"));
        }

        if route.resilience.failure_threshold == 0 {
            errors.push(err(field("resilience.failure_threshold"), "must be greater than zero"));
        }
        if route.resilience.timeout_ms == 0 {
            errors.push(err(field("resilience.timeout_ms"), "must be greater than zero"));
        }
        if route.resilience.break_duration_secs == 0 {
            errors.push(err(field("resilience.break_duration_secs"), "must be greater than zero"));
        }
    }

    for (i, origin) in config.cors.allowed_origins.iter().enumerate() {
        let field = format!("cors.allowed_origins[{}]", i);
        if origin == "*" {
            errors.push(err(field, "wildcard origins are not supported"));
        } else if Url::parse(origin).is_err() {
            errors.push(err(field, format!("not an absolute origin: {}", origin)));
        }
    }

    if let Some(auth) = &config.auth {
        if auth.signing_key.is_empty() {
            errors.push(err("auth.signing_key", "must not be empty"));
        }
        if auth.issuer.is_empty() {
            errors.push(err("auth.issuer", "must not be empty"));
        }
        if auth.audience.is_empty() {
            errors.push(err("auth.audience", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    fn base_route() -> RouteConfig {
        RouteConfig {
            name: "r1".into(),
            upstream_path_template: "/api/things/{id}".into(),
            methods: vec!["GET".into()],
            downstream_base_url: "http://127.0.0.1:9001".into(),
            auth_required: true,
            idempotent: false,
            rate_limit: Default::default(),
            resilience: Default::default(),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = GatewayConfig::default();
        let mut bad = base_route();
        bad.methods = vec!["FETCH".into()];
        bad.downstream_base_url = "not a url".into();
        bad.rate_limit.limit = 0;
        config.routes.push(bad);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }

    #[test]
    fn rejects_duplicate_route_names() {
        let mut config = GatewayConfig::default();
        config.routes.push(base_route());
        config.routes.push(base_route());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate route name")));
    }

    #[test]
    fn rejects_wildcard_origin() {
        let mut config = GatewayConfig::default();
        config.cors.allowed_origins.push("*".into());

        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_https_downstream() {
        let mut config = GatewayConfig::default();
        let mut route = base_route();
        route.downstream_base_url = "https://internal:9001".into();
        config.routes.push(route);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("unsupported scheme")));
    }
}
