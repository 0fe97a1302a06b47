//! `frontdoor init`: write a starter route file.
//!
//! The template shows one route of each kind (proxy, retired path, static
//! files) in YAML, JSON or TOML.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::FrontdoorError;

pub fn execute(args: &InitArgs) -> Result<(), FrontdoorError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("frontdoor.{}", args.format.extension())));

    if output.exists() && !args.force {
        return Err(FrontdoorError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat) -> &'static str {
    match format {
        ConfigFormat::Yaml => YAML_TEMPLATE,
        ConfigFormat::Json => JSON_TEMPLATE,
        ConfigFormat::Toml => TOML_TEMPLATE,
    }
}

const YAML_TEMPLATE: &str = r#"# frontdoor routes. First match wins, so put narrow routes first.

defaults:
  fallback_root: /var/www        # served when nothing matches

routes:
  # Forward /api/... to a local service, dropping the /api prefix.
  - host: www.example.com        # omit to match any host
    path: "^/api/"               # regex, searched in the request path
    proxy:
      to: http://localhost:8080/
      strip_prefix: /api/
      # methods: [GET, HEAD]     # omit to allow every method
      # gzip: true               # compress text responses

  # Retired section.
  - path: "^/old/"
    error:
      status: 410
      message: "410 Gone"

  # Everything else from disk. .shtml files get server-side includes.
  - files:
      root: /var/www/example
      prefix: /
      index: false               # true = list directories without an index
"#;

const JSON_TEMPLATE: &str = r#"{
  "defaults": {
    "fallback_root": "/var/www"
  },
  "routes": [
    {
      "host": "www.example.com",
      "path": "^/api/",
      "proxy": {
        "to": "http://localhost:8080/",
        "strip_prefix": "/api/"
      }
    },
    {
      "path": "^/old/",
      "error": { "status": 410, "message": "410 Gone" }
    },
    {
      "files": { "root": "/var/www/example", "prefix": "/", "index": false }
    }
  ]
}
"#;

const TOML_TEMPLATE: &str = r#"# frontdoor routes. First match wins, so put narrow routes first.

[defaults]
fallback_root = "/var/www"

[[routes]]
host = "www.example.com"
path = "^/api/"
[routes.proxy]
to = "http://localhost:8080/"
strip_prefix = "/api/"
# methods = ["GET", "HEAD"]
# gzip = true

[[routes]]
path = "^/old/"
[routes.error]
status = 410
message = "410 Gone"

[[routes]]
[routes.files]
root = "/var/www/example"
prefix = "/"
index = false
"#;
