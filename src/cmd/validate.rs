//! `frontdoor validate`: check a route file for errors.
//!
//! Parses the file, runs field validation, then builds the route table the
//! server would use. Results are printed as text or JSON; any failure is
//! returned so the process exits non-zero.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::sources::parse_config_str;
use crate::config::validation;
use crate::error::FrontdoorError;
use crate::routing::RouteTable;

pub fn execute(args: &ValidateArgs) -> Result<(), FrontdoorError> {
    let path = &args.config;

    if !path.exists() {
        return Err(FrontdoorError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "route": e.route,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(FrontdoorError::ConfigValidation { errors });
    }

    // Field checks passed; building the table catches anything they miss.
    let table = RouteTable::from_config(&config)?;

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "routes": table.len(),
                    "proxy_routes": config.proxy_routes(),
                    "catch_all": config.has_catch_all(),
                    "fallback_root": config.defaults.fallback_root,
                })
            );
        }
    }

    Ok(())
}
