use std::{env, str::FromStr};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Endpoint a credential points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
  pub host: String,
  pub port: u16,
  #[serde(default)]
  pub alter_id: u32,
  #[serde(default = "default_network")]
  pub network: String,
  #[serde(default)]
  pub name: Option<String>,
}

fn default_network() -> String {
  "tcp".into()
}

impl ServerDescriptor {
  fn new(host: &str, name: &str) -> Self {
    Self {
      host: host.into(),
      port: 443,
      alter_id: 0,
      network: default_network(),
      name: Some(name.into()),
    }
  }
}

/// Immutable business settings handed to every service.
#[derive(Debug, Clone)]
pub struct Config {
  pub port: u16,
  /// Age after which a pending payment is auto-accepted.
  pub auto_accept_days: i64,
  /// How often the auto-accept scan runs. Zero disables it.
  pub auto_accept_interval: Duration,
  pub trial_quota_mb: i64,
  pub trial_duration_days: i64,
  pub trial_location: String,
  /// Share of the plan allowance granted while a payment is under review.
  pub temp_grant_percent: f64,
  pub temp_grant_floor_mb: i64,
  pub temp_grant_days: i64,
  pub currency: String,
  pub servers: HashMap<String, ServerDescriptor>,
}

impl Default for Config {
  fn default() -> Self {
    let servers = [
      ("france", ServerDescriptor::new("fr.example.com", "France")),
      ("germany", ServerDescriptor::new("de.example.com", "Germany")),
      ("singapore", ServerDescriptor::new("sg.example.com", "Singapore")),
    ]
    .into_iter()
    .map(|(location, server)| (location.to_string(), server))
    .collect();

    Self {
      port: 3000,
      auto_accept_days: 3,
      auto_accept_interval: Duration::from_secs(10 * 60),
      trial_quota_mb: 200,
      trial_duration_days: 1,
      trial_location: "germany".into(),
      temp_grant_percent: 0.1,
      temp_grant_floor_mb: 200,
      temp_grant_days: 3,
      currency: "EUR".into(),
      servers,
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let defaults = Self::default();

    let auto_accept_interval = match env::var("AUTO_ACCEPT_INTERVAL") {
      Ok(raw) => humantime::parse_duration(&raw)
        .with_context(|| format!("Invalid AUTO_ACCEPT_INTERVAL `{raw}`"))?,
      Err(_) => defaults.auto_accept_interval,
    };

    let servers = match env::var("VPN_SERVERS") {
      Ok(raw) => Self::parse_servers(&raw)?,
      Err(_) => defaults.servers,
    };

    let config = Self {
      port: var_or("PORT", defaults.port)?,
      auto_accept_days: var_or("AUTO_ACCEPT_DAYS", defaults.auto_accept_days)?,
      auto_accept_interval,
      trial_quota_mb: var_or("TRIAL_QUOTA_MB", defaults.trial_quota_mb)?,
      trial_duration_days: var_or(
        "TRIAL_DURATION_DAYS",
        defaults.trial_duration_days,
      )?,
      trial_location: env::var("TRIAL_LOCATION")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or(defaults.trial_location),
      temp_grant_percent: var_or(
        "TEMP_GRANT_PERCENT",
        defaults.temp_grant_percent,
      )?,
      temp_grant_floor_mb: var_or(
        "TEMP_GRANT_FLOOR_MB",
        defaults.temp_grant_floor_mb,
      )?,
      temp_grant_days: var_or("TEMP_GRANT_DAYS", defaults.temp_grant_days)?,
      currency: env::var("BASE_CURRENCY").unwrap_or(defaults.currency),
      servers,
    };

    config.validate()?;
    Ok(config)
  }

  pub fn parse_servers(
    raw: &str,
  ) -> anyhow::Result<HashMap<String, ServerDescriptor>> {
    let servers: HashMap<String, ServerDescriptor> =
      json::from_str(raw).context("VPN_SERVERS must be a JSON object")?;
    Ok(
      servers
        .into_iter()
        .map(|(location, server)| (location.to_lowercase(), server))
        .collect(),
    )
  }

  fn validate(&self) -> anyhow::Result<()> {
    anyhow::ensure!(self.auto_accept_days >= 0, "AUTO_ACCEPT_DAYS < 0");
    anyhow::ensure!(self.trial_duration_days > 0, "TRIAL_DURATION_DAYS <= 0");
    anyhow::ensure!(self.temp_grant_days > 0, "TEMP_GRANT_DAYS <= 0");
    anyhow::ensure!(self.trial_quota_mb >= 0, "TRIAL_QUOTA_MB < 0");
    anyhow::ensure!(self.temp_grant_floor_mb >= 0, "TEMP_GRANT_FLOOR_MB < 0");
    anyhow::ensure!(
      (0.0..=1.0).contains(&self.temp_grant_percent),
      "TEMP_GRANT_PERCENT must be within 0..=1"
    );
    anyhow::ensure!(
      self.servers.contains_key(&self.trial_location),
      "TRIAL_LOCATION `{}` has no server",
      self.trial_location
    );
    Ok(())
  }

  /// Server for a plan location; a location without a server cannot be sold.
  pub fn server(&self, location: &str) -> Result<&ServerDescriptor> {
    self
      .servers
      .get(&location.to_lowercase())
      .ok_or(Error::PlanUnavailable)
  }
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match env::var(key) {
    Ok(raw) => {
      raw.trim().parse().with_context(|| format!("Invalid {key} `{raw}`"))
    }
    Err(_) => Ok(default),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn server_lookup_ignores_case() {
    let config = Config::default();
    assert_eq!(config.server("France").unwrap().host, "fr.example.com");
    assert!(matches!(config.server("mars"), Err(Error::PlanUnavailable)));
  }

  #[test]
  fn parse_servers_fills_defaults() {
    let servers = Config::parse_servers(
      r#"{"Finland": {"host": "fi.example.com", "port": 8443}}"#,
    )
    .unwrap();

    let fi = &servers["finland"];
    assert_eq!(fi.port, 8443);
    assert_eq!(fi.network, "tcp");
    assert_eq!(fi.alter_id, 0);
    assert_eq!(fi.name, None);
  }

  #[test]
  fn parse_servers_rejects_garbage() {
    assert!(Config::parse_servers("[1, 2]").is_err());
  }

  #[test]
  fn default_config_is_valid() {
    Config::default().validate().unwrap();
  }

  #[test]
  fn negative_grant_settings_are_rejected() {
    let cases = [
      Config { trial_duration_days: -1, ..Config::default() },
      Config { trial_duration_days: 0, ..Config::default() },
      Config { temp_grant_days: -3, ..Config::default() },
      Config { trial_quota_mb: -1, ..Config::default() },
      Config { temp_grant_floor_mb: -200, ..Config::default() },
    ];

    for config in cases {
      assert!(config.validate().is_err());
    }
  }
}
