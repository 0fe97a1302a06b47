//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors: missing routes, routes with zero or several strategies,
//! patterns that do not compile, bad proxy destinations and methods,
//! fixed errors that are not errors, and entries that can never match
//! because an identical earlier entry shadows them. Returns a list of
//! [`ValidationError`] values with per-field suggestions.

use std::collections::HashSet;

use url::Url;

use super::model::{Config, ErrorConfig, FilesConfig, ProxyConfig};
use crate::error::ValidationError;

pub const VALID_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "CONNECT", "TRACE",
];

/// Validate a path pattern. Returns `Ok(())` or a human-readable error.
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
    if pattern.is_empty() {
        return Ok(());
    }
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| format!("'{pattern}' is not a valid pattern: {e}"))
}

/// Validate a proxy destination URL. Returns `Ok(())` or a human-readable error.
pub fn validate_destination(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{url}' has no host"))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

/// Validate an HTTP method string. Methods are case-sensitive, as on the wire.
pub fn validate_method(method: &str) -> Result<(), String> {
    if VALID_METHODS.contains(&method) {
        Ok(())
    } else {
        Err(format!("'{method}' is not a valid HTTP method"))
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routes.is_empty() {
        errors.push(ValidationError {
            route: "(root)".into(),
            field: "routes".into(),
            message: "at least one route must be defined".into(),
            suggestion: Some("end the table with a catch-all 'files' route".into()),
        });
        return Err(errors);
    }

    if config.defaults.fallback_root.as_os_str().is_empty() {
        errors.push(ValidationError {
            route: "(root)".into(),
            field: "defaults.fallback_root".into(),
            message: "fallback root cannot be empty".into(),
            suggestion: None,
        });
    }

    let mut seen = HashSet::new();

    for (i, route) in config.routes.iter().enumerate() {
        let route_id = route.label(i);

        if let Err(msg) = validate_pattern(&route.path) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "path".into(),
                message: msg,
                suggestion: None,
            });
        }

        if !seen.insert((route.host.as_str(), route.path.as_str())) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "path".into(),
                message: "duplicate host and path, this route can never match".into(),
                suggestion: Some("remove it or merge it into the earlier entry".into()),
            });
        }

        match route.strategy_count() {
            0 => errors.push(ValidationError {
                route: route_id.clone(),
                field: "(strategy)".into(),
                message: "route has no handler".into(),
                suggestion: Some("add one of 'files', 'proxy' or 'error'".into()),
            }),
            1 => {}
            n => errors.push(ValidationError {
                route: route_id.clone(),
                field: "(strategy)".into(),
                message: format!("route has {n} handlers, exactly 1 allowed"),
                suggestion: None,
            }),
        }

        if let Some(ref files) = route.files {
            validate_files(&route_id, files, &mut errors);
        }
        if let Some(ref proxy) = route.proxy {
            validate_proxy(&route_id, proxy, &mut errors);
        }
        if let Some(ref error) = route.error {
            validate_error(&route_id, error, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_files(route_id: &str, files: &FilesConfig, errors: &mut Vec<ValidationError>) {
    if files.root.as_os_str().is_empty() {
        errors.push(ValidationError {
            route: route_id.to_string(),
            field: "files.root".into(),
            message: "root cannot be empty".into(),
            suggestion: None,
        });
    }
    if !files.prefix.starts_with('/') {
        errors.push(ValidationError {
            route: route_id.to_string(),
            field: "files.prefix".into(),
            message: "prefix must start with '/'".into(),
            suggestion: Some(format!("did you mean '/{}'?", files.prefix)),
        });
    }
}

fn validate_proxy(route_id: &str, proxy: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    if let Err(msg) = validate_destination(&proxy.to) {
        errors.push(ValidationError {
            route: route_id.to_string(),
            field: "proxy.to".into(),
            message: msg,
            suggestion: None,
        });
    }
    for method in &proxy.methods {
        if let Err(msg) = validate_method(method) {
            let upper = method.to_uppercase();
            errors.push(ValidationError {
                route: route_id.to_string(),
                field: "proxy.methods".into(),
                message: msg,
                suggestion: VALID_METHODS
                    .contains(&upper.as_str())
                    .then(|| format!("did you mean '{upper}'?")),
            });
        }
    }
}

fn validate_error(route_id: &str, error: &ErrorConfig, errors: &mut Vec<ValidationError>) {
    if !(400..=599).contains(&error.status) {
        errors.push(ValidationError {
            route: route_id.to_string(),
            field: "error.status".into(),
            message: format!("{} is not a 4xx or 5xx status", error.status),
            suggestion: None,
        });
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} routes, {} proxied\n",
        config.routes.len(),
        config.proxy_routes()
    )];

    for (i, route) in config.routes.iter().enumerate() {
        let handler = if let Some(ref files) = route.files {
            format!(
                "files {} (prefix {}{})",
                files.root.display(),
                files.prefix,
                if files.index { ", listing" } else { "" }
            )
        } else if let Some(ref proxy) = route.proxy {
            let methods = if proxy.methods.is_empty() {
                "*".to_string()
            } else {
                proxy.methods.join(", ")
            };
            format!(
                "proxy {} (strip {:?}, methods {methods})",
                proxy.to, proxy.strip_prefix
            )
        } else if let Some(ref error) = route.error {
            format!("error {}", error.status)
        } else {
            "none".to_string()
        };
        lines.push(format!("  {}  -> {handler}", route.label(i)));
    }

    if !config.has_catch_all() {
        lines.push(format!(
            "\n  warning: no trailing catch-all route, unmatched requests use {}",
            config.defaults.fallback_root.display()
        ));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
