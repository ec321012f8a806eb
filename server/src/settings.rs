//! Server configuration: YAML file with environment overrides.
//!
//! The config file path comes from `GATEHOUSE_CONFIG` (default
//! `./gatehouse.yaml`); a missing file yields defaults. Individual
//! environment variables override file values for container deployments.

use serde::Deserialize;
use std::env;

use gatehouse_core::config::AdmissionConfig;

use crate::prelude::*;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	pub listen: Box<str>,
	pub db_path: Box<str>,
	/// Bearer token for the admin endpoints; absent = admin surface
	/// disabled
	pub admin_token: Option<Box<str>>,
	pub admission: AdmissionConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: "127.0.0.1:8080".into(),
			db_path: "./data/gatehouse.db".into(),
			admin_token: None,
			admission: AdmissionConfig::default(),
		}
	}
}

pub fn load() -> GhResult<ServerConfig> {
	let path = env::var("GATEHOUSE_CONFIG").unwrap_or_else(|_| "./gatehouse.yaml".to_string());

	let mut config = match std::fs::read_to_string(&path) {
		Ok(content) => serde_yaml::from_str(&content)
			.map_err(|err| Error::ConfigError(format!("{}: {}", path, err)))?,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
			info!("No config file at {}, using defaults", path);
			ServerConfig::default()
		}
		Err(err) => return Err(err.into()),
	};

	if let Ok(listen) = env::var("GATEHOUSE_LISTEN") {
		config.listen = listen.into();
	}
	if let Ok(db_path) = env::var("GATEHOUSE_DB") {
		config.db_path = db_path.into();
	}
	if let Ok(token) = env::var("GATEHOUSE_ADMIN_TOKEN") {
		config.admin_token = Some(token.into());
	}
	if let Ok(url) = env::var("GATEHOUSE_WEBHOOK_URL") {
		config.admission.webhook_url = Some(url.into());
	}

	Ok(config)
}


// vim: ts=4
