// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JSON Schema validation of [`super::OidcPluginConfig`].

use anyhow::{Context, Result};
use jsonschema::validator_for;

use super::OidcPluginConfig;

/// Structural schema for the configuration tree. Hand-maintained rather
/// than generated, mirroring the teacher's embedded
/// `resources/config.schema.json` but scoped to this plugin's fields.
const CONFIG_SCHEMA: &str = r#"{
  "type": "object",
  "required": ["issuer", "signing_key"],
  "properties": {
    "issuer": { "type": "string", "minLength": 1 },
    "signing_key": { "type": "string", "minLength": 1 },
    "signing_algorithm": { "type": "string" },
    "server": {
      "type": "object",
      "properties": {
        "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
        "address": { "type": "string" },
        "endpoint_prefix": { "type": "string" }
      }
    },
    "clients": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["client_id"],
        "properties": {
          "client_id": { "type": "string", "minLength": 1 }
        }
      }
    }
  }
}"#;

/// Validate the configuration's serialized form against [`CONFIG_SCHEMA`].
pub fn validate_against_schema(config: &OidcPluginConfig) -> Result<()> {
    let schema_value: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("embedded config schema is malformed")?;
    let validator = validator_for(&schema_value).context("failed to compile config schema")?;
    let instance = serde_json::to_value(config).context("failed to serialize config")?;

    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| format!("{e} at {}", e.instance_path))
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("configuration schema validation failed: {}", errors.join("; "));
    }
    Ok(())
}

/// Print the embedded schema, for the `--show-config-schema` CLI flag.
pub fn print_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("failed to parse embedded schema")?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_schema() {
        let config = OidcPluginConfig::default();
        assert!(validate_against_schema(&config).is_ok());
    }

    #[test]
    fn empty_issuer_fails_schema() {
        let mut config = OidcPluginConfig::default();
        config.issuer = String::new();
        assert!(validate_against_schema(&config).is_err());
    }
}
