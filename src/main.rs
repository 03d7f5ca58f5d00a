// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Standalone demo entry point for the OIDC/OAuth2 authorization server
// plugin, booted against the in-memory host and token store.
mod build_info;
mod claims;
mod client_auth;
mod config;
mod consent;
mod crypto;
mod dcr;
mod discovery;
mod dpop;
mod error;
mod flows;
mod host;
mod introspect;
mod par;
mod request;
mod server;
mod store;
mod subject;
mod token_factory;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use config::OidcPluginConfig;
use crypto::{JwtKeyConfig, KeyManager};
use host::memory::MemoryHost;
use jsonwebtoken::Algorithm;
use log::info;
use store::memory::MemoryStore;

// Include the license notice generated by build.rs
// This file is generated at build time and contains the license notice for the project
// It is included in the binary to ensure compliance with the license terms
// The content of this file is generated based on the Cargo.lock file and the project's dependencies
include!(concat!(env!("OUT_DIR"), "/license_notice.rs"));

/// Standalone OIDC/OAuth2 authorization server
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Return a working demo configuration file with comments, use
    /// --get-demo-config > demo.yaml
    #[arg(long = "get-demo-config")]
    get_demo_config: bool,

    /// Server listen address, overriding the configuration file
    #[arg(short)]
    web_address: Option<String>,

    /// Server listen port, overriding the configuration file
    #[arg(short = 'p')]
    web_port: Option<u16>,

    /// Print version information and exit
    #[arg(long)]
    show_version: bool,

    /// Print detailed build information and exit
    #[arg(long)]
    build_info: bool,

    /// Print version hash and exit (for maintenance purposes)
    #[arg(long)]
    get_version_hash: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Show the license notice for this project and exit
    #[arg(long = "show-license-notice")]
    show_license_notice: bool,
}

#[rocket::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.show_license_notice {
        println!("{}", LICENSE_NOTICE);
        return Ok(());
    }

    if args.show_version {
        build_info::print_version_info();
        return Ok(());
    }

    if args.build_info {
        build_info::print_build_info();
        return Ok(());
    }

    if args.get_version_hash {
        println!("{}", build_info::get_version_hash());
        return Ok(());
    }

    if args.get_demo_config {
        let demo_config = include_str!("../config.example.yaml");
        println!(
            "#Save this demo configuration file in a yaml file\n#    and use --config FILE:\n#\n{}",
            demo_config
        );
        return Ok(());
    }

    if args.show_config_schema {
        return config::utils::print_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }
        OidcPluginConfig::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let mut config = match &args.config {
        Some(path) => OidcPluginConfig::from_file(path)?,
        None => OidcPluginConfig::default(),
    };
    if let Some(address) = args.web_address {
        config.server.address = address;
    }
    if let Some(port) = args.web_port {
        config.server.port = port;
    }

    info!("Starting OIDC authority on {}:{}", config.server.address, config.server.port);

    let signing_algorithm = match config.signing_algorithm.as_str() {
        "HS384" => Algorithm::HS384,
        "HS512" => Algorithm::HS512,
        _ => Algorithm::HS256,
    };
    let key_config = JwtKeyConfig::new_symmetric(config.signing_key.as_bytes(), signing_algorithm)?;
    let keys = Arc::new(KeyManager::from_single_key("default", key_config)?);

    let store: Arc<dyn store::TokenStore> = Arc::new(MemoryStore::new());
    let host: Arc<dyn host::Host> = Arc::new(MemoryHost::new(&config));

    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port));

    let state = server::AppState { config, store, host, keys };
    let rocket = server::build_rocket(figment, state);

    rocket.launch().await?;

    Ok(())
}
