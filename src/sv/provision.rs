//! Credential issuing. Pure apart from drawing a random identifier:
//! nothing here touches the database.

use base64::{Engine, engine::general_purpose::STANDARD};
use uuid::Uuid;

use crate::{
  config::{Config, ServerDescriptor},
  prelude::*,
};

pub const MB_PER_GIB: i64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// Reduced share of the allowance with a floor.
  Trial,
  Full,
}

/// An issued access record, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
  pub id: Uuid,
  pub config_payload: String,
  pub quota_mb: i64,
  pub issued_at: DateTime,
  pub expires_at: DateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct Provisioner {
  percent: f64,
  floor_mb: i64,
}

impl Provisioner {
  pub fn new(percent: f64, floor_mb: i64) -> Self {
    Self { percent, floor_mb }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.temp_grant_percent, config.temp_grant_floor_mb)
  }

  pub fn quota_mb(&self, allowance_gib: i64, mode: Mode) -> Result<i64> {
    let full = allowance_gib.checked_mul(MB_PER_GIB).ok_or_else(|| {
      Error::InvalidArgs(format!("Allowance of {allowance_gib} GiB is too large"))
    })?;
    Ok(match mode {
      Mode::Full => full,
      Mode::Trial => ((full as f64 * self.percent).floor() as i64)
        .max(self.floor_mb),
    })
  }

  pub fn issue(
    &self,
    server: &ServerDescriptor,
    allowance_gib: i64,
    days: i64,
    mode: Mode,
    now: DateTime,
  ) -> Result<Credential> {
    let quota_mb = self.quota_mb(allowance_gib, mode)?;
    self.issue_with_quota(server, quota_mb, days, now)
  }

  /// Issue with an explicit quota, for grants not derived from a plan.
  pub fn issue_with_quota(
    &self,
    server: &ServerDescriptor,
    quota_mb: i64,
    days: i64,
    now: DateTime,
  ) -> Result<Credential> {
    let expires_at = TimeDelta::try_days(days)
      .and_then(|span| now.checked_add_signed(span))
      .ok_or_else(|| {
        Error::InvalidArgs(format!("Grant of {days} days is out of range"))
      })?;

    // v4 draws 122 bits from the OS CSPRNG
    let id = Uuid::new_v4();

    Ok(Credential {
      id,
      config_payload: vmess_payload(server, &id),
      quota_mb,
      issued_at: now,
      expires_at,
    })
  }
}

fn vmess_payload(server: &ServerDescriptor, id: &Uuid) -> String {
  let id = id.to_string();
  let name = server.name.clone().unwrap_or_else(|| format!("VPN-{}", &id[..6]));

  let payload = json::json!({
    "v": "2",
    "ps": name,
    "add": server.host,
    "port": server.port,
    "id": id,
    "aid": server.alter_id,
    "net": server.network,
    "type": "none",
    "host": "",
    "path": "",
    "tls": "auto",
  });

  format!("{payload:#}")
}

/// `vmess://` link clients import directly. Payloads that are not JSON are
/// encoded as-is.
pub fn share_link(payload: &str) -> String {
  let compact = json::from_str::<json::Value>(payload)
    .map(|value| value.to_string())
    .unwrap_or_else(|_| payload.to_string());
  format!("vmess://{}", STANDARD.encode(compact))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn server(name: Option<&str>) -> ServerDescriptor {
    ServerDescriptor {
      host: "de.example.com".into(),
      port: 443,
      alter_id: 0,
      network: "tcp".into(),
      name: name.map(Into::into),
    }
  }

  fn provisioner() -> Provisioner {
    Provisioner::new(0.1, 200)
  }

  #[test]
  fn trial_quota_takes_share_of_allowance() {
    assert_eq!(provisioner().quota_mb(20, Mode::Trial).unwrap(), 2048);
    assert_eq!(provisioner().quota_mb(50, Mode::Trial).unwrap(), 5120);
  }

  #[test]
  fn trial_quota_respects_floor() {
    assert_eq!(provisioner().quota_mb(1, Mode::Trial).unwrap(), 200);
    assert_eq!(provisioner().quota_mb(0, Mode::Trial).unwrap(), 200);
  }

  #[test]
  fn full_grant_uses_whole_allowance() {
    let now = Utc::now().naive_utc();
    let credential = provisioner()
      .issue(&server(Some("Germany")), 20, 60, Mode::Full, now)
      .unwrap();

    assert_eq!(credential.quota_mb, 20480);
    assert_eq!(credential.expires_at, now + TimeDelta::days(60));
  }

  #[test]
  fn oversized_allowance_is_an_error() {
    let err = provisioner().quota_mb(i64::MAX / 512, Mode::Full).unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));
  }

  #[test]
  fn unrepresentable_expiry_is_an_error() {
    let now = Utc::now().naive_utc();
    let err = provisioner()
      .issue(&server(None), 10, 150_000_000, Mode::Full, now)
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));

    let err = provisioner()
      .issue_with_quota(&server(None), 200, i64::MAX, now)
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));
  }

  #[test]
  fn identifiers_are_fresh() {
    let now = Utc::now().naive_utc();
    let ids: HashSet<_> = (0..1000)
      .map(|_| {
        provisioner()
          .issue_with_quota(&server(None), 200, 1, now)
          .unwrap()
          .id
      })
      .collect();
    assert_eq!(ids.len(), 1000);
  }

  #[test]
  fn payload_embeds_server_and_identifier() {
    let now = Utc::now().naive_utc();
    let credential = provisioner()
      .issue(&server(Some("Germany")), 10, 30, Mode::Full, now)
      .unwrap();

    let payload: json::Value =
      json::from_str(&credential.config_payload).unwrap();
    assert_eq!(payload["add"], "de.example.com");
    assert_eq!(payload["port"], 443);
    assert_eq!(payload["id"], credential.id.to_string());
    assert_eq!(payload["ps"], "Germany");
    assert_eq!(payload["net"], "tcp");
  }

  #[test]
  fn unnamed_server_gets_name_from_identifier() {
    let now = Utc::now().naive_utc();
    let credential =
      provisioner().issue_with_quota(&server(None), 200, 1, now).unwrap();

    let payload: json::Value =
      json::from_str(&credential.config_payload).unwrap();
    let expected = format!("VPN-{}", &credential.id.to_string()[..6]);
    assert_eq!(payload["ps"], expected.as_str());
  }

  #[test]
  fn share_link_wraps_compact_payload() {
    let now = Utc::now().naive_utc();
    let credential = provisioner()
      .issue_with_quota(&server(Some("Germany")), 200, 1, now)
      .unwrap();

    let link = share_link(&credential.config_payload);
    let encoded = link.strip_prefix("vmess://").unwrap();
    let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();

    assert!(!decoded.contains('\n'));
    let original: json::Value =
      json::from_str(&credential.config_payload).unwrap();
    assert_eq!(json::from_str::<json::Value>(&decoded).unwrap(), original);
  }
}
