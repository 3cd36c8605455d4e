use sea_orm::SqlErr;
use tokio::sync::Mutex;

use crate::{
  config::Config,
  entity::{AuditAction, GrantKind, usage_grant, user},
  prelude::*,
  sv::{self, provision::Provisioner, txn},
};

/// Per-user async locks serializing the trial check-then-insert.
pub type UserLocks = DashMap<i64, Arc<Mutex<()>>>;

pub struct Trial<'a> {
  db: &'a DatabaseConnection,
  config: &'a Config,
  locks: &'a UserLocks,
}

impl<'a> Trial<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    config: &'a Config,
    locks: &'a UserLocks,
  ) -> Self {
    Self { db, config, locks }
  }

  /// Grant the one free trial a user is entitled to.
  pub async fn grant(&self, user_id: i64) -> Result<usage_grant::Model> {
    let lock = self.locks.entry(user_id).or_default().clone();
    let _guard = lock.lock().await;

    let this = self;
    txn::retry_once("trial", move || this.try_grant(user_id)).await
  }

  async fn try_grant(&self, user_id: i64) -> Result<usage_grant::Model> {
    let txn = self.db.begin().await?;

    user::Entity::find_by_id(user_id)
      .one(&txn)
      .await?
      .ok_or(Error::NotFound(Resource::User))?;

    if sv::Usage::has_trial(&txn, user_id).await? {
      return Err(Error::TrialAlreadyUsed);
    }

    let server = self.config.server(&self.config.trial_location)?;
    let credential = Provisioner::from_config(self.config).issue_with_quota(
      server,
      self.config.trial_quota_mb,
      self.config.trial_duration_days,
      Utc::now().naive_utc(),
    )?;

    // The unique index is authoritative when another process won the race.
    let grant = match sv::Usage::insert(
      &txn,
      user_id,
      None,
      GrantKind::Trial,
      &credential,
    )
    .await
    {
      Err(Error::Db(err))
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
      {
        return Err(Error::TrialAlreadyUsed);
      }
      other => other?,
    };

    sv::Audit::record(
      &txn,
      None,
      Some(user_id),
      AuditAction::Trial,
      Some(format!("{} MB granted", grant.quota_mb)),
    )
    .await?;

    txn.commit().await?;

    info!("trial granted to user {user_id}");
    Ok(grant)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::{fixtures, test_db};

  async fn trials(db: &DatabaseConnection, user_id: i64) -> usize {
    sv::Usage::new(db)
      .by_user(user_id)
      .await
      .unwrap()
      .into_iter()
      .filter(|g| g.is_trial())
      .count()
  }

  #[tokio::test]
  async fn grants_configured_trial() {
    let db = test_db::setup().await;
    fixtures::user(&db, 1).await;
    let config = Config::default();
    let locks = UserLocks::default();

    let grant = Trial::new(&db, &config, &locks).grant(1).await.unwrap();

    assert!(grant.is_trial());
    assert_eq!(grant.payment_id, None);
    assert_eq!(grant.quota_mb, config.trial_quota_mb);
    assert_eq!(
      (grant.expires_at - grant.created_at).num_days(),
      config.trial_duration_days
    );
    let payload: json::Value = json::from_str(&grant.config_payload).unwrap();
    assert_eq!(payload["add"], "de.example.com");
  }

  #[tokio::test]
  async fn second_trial_is_refused_without_mutation() {
    let db = test_db::setup().await;
    fixtures::user(&db, 1).await;
    let config = Config::default();
    let locks = UserLocks::default();
    let trial = Trial::new(&db, &config, &locks);

    trial.grant(1).await.unwrap();
    let before = sv::Audit::new(&db).by_user(1).await.unwrap().len();

    assert!(matches!(trial.grant(1).await, Err(Error::TrialAlreadyUsed)));
    assert_eq!(trials(&db, 1).await, 1);
    assert_eq!(sv::Audit::new(&db).by_user(1).await.unwrap().len(), before);
  }

  #[tokio::test]
  async fn concurrent_requests_yield_one_trial() {
    let db = test_db::setup().await;
    fixtures::user(&db, 1).await;
    let config = Config::default();
    let locks = UserLocks::default();
    let trial = Trial::new(&db, &config, &locks);

    let results = futures::future::join_all((0..8).map(|_| trial.grant(1))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
      results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::TrialAlreadyUsed))
    );
    assert_eq!(trials(&db, 1).await, 1);
  }

  #[tokio::test]
  async fn temporary_grants_do_not_consume_trial() {
    let db = test_db::setup().await;
    fixtures::user(&db, 1).await;
    let plan = fixtures::plan(&db, "france", 1, 10).await;
    let config = Config::default();
    let locks = UserLocks::default();

    sv::Review::new(&db, &config).submit(1, plan.id, None).await.unwrap();

    Trial::new(&db, &config, &locks).grant(1).await.unwrap();
    assert_eq!(trials(&db, 1).await, 1);
  }

  #[tokio::test]
  async fn store_rejects_duplicate_trial_rows() {
    let db = test_db::setup().await;
    fixtures::user(&db, 1).await;
    let config = Config::default();
    let locks = UserLocks::default();
    let first = Trial::new(&db, &config, &locks).grant(1).await.unwrap();

    let credential = Provisioner::from_config(&config).issue_with_quota(
      config.server("germany").unwrap(),
      100,
      1,
      first.created_at,
    )
    .unwrap();
    let err = sv::Usage::insert(&db, 1, None, GrantKind::Trial, &credential)
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      Error::Db(ref db_err)
        if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
    ));
  }

  #[tokio::test]
  async fn unknown_user_is_not_found() {
    let db = test_db::setup().await;
    let config = Config::default();
    let locks = UserLocks::default();

    assert!(matches!(
      Trial::new(&db, &config, &locks).grant(5).await,
      Err(Error::NotFound(Resource::User))
    ));
  }
}
