use sea_orm::ConnectOptions;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;

use crate::{config::Config, prelude::*, sv, sv::trial::UserLocks};

/// Plan picked with `/buy`, waiting for proof of payment.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
  pub plan_id: i32,
  pub at: DateTime,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub bot: Bot,
  pub admins: HashSet<i64>,
  pub secret: String,
  pub config: Config,
  pub trial_locks: UserLocks,
  pub selections: DashMap<i64, Selection>,
  pub shutdown: CancellationToken,
}

pub struct Services<'a> {
  pub user: sv::User<'a>,
  pub plan: sv::Plan<'a>,
  pub review: sv::Review<'a>,
  pub trial: sv::Trial<'a>,
  pub usage: sv::Usage<'a>,
  pub audit: sv::Audit<'a>,
}

impl AppState {
  pub async fn new(
    db_url: &str,
    token: &str,
    admins: HashSet<i64>,
    secret: String,
    config: Config,
  ) -> anyhow::Result<Self> {
    let mut opts = ConnectOptions::new(db_url);
    opts.sqlx_logging(false);

    let db = Database::connect(opts).await?;
    Migrator::up(&db, None).await?;

    Ok(Self::with_db(db, Bot::new(token), admins, secret, config))
  }

  pub fn with_db(
    db: DatabaseConnection,
    bot: Bot,
    admins: HashSet<i64>,
    secret: String,
    config: Config,
  ) -> Self {
    Self {
      db,
      bot,
      admins,
      secret,
      config,
      trial_locks: DashMap::new(),
      selections: DashMap::new(),
      shutdown: CancellationToken::new(),
    }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      user: sv::User::new(&self.db),
      plan: sv::Plan::new(&self.db),
      review: sv::Review::new(&self.db, &self.config),
      trial: sv::Trial::new(&self.db, &self.config, &self.trial_locks),
      usage: sv::Usage::new(&self.db),
      audit: sv::Audit::new(&self.db),
    }
  }

  pub fn is_admin(&self, user_id: i64) -> bool {
    self.admins.contains(&user_id)
  }

  /// Drop locks nobody is waiting on.
  pub fn gc_trial_locks(&self) {
    self.trial_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
  }

  /// Forget `/buy` selections never followed by proof of payment.
  pub fn gc_selections(&self, max_age: TimeDelta) {
    let now = Utc::now().naive_utc();
    self.selections.retain(|_, selection| now - selection.at < max_age);
  }
}

#[cfg(test)]
mod tests {
  use tokio_test::{assert_err, assert_ok};

  use super::*;
  use crate::sv::test_utils::{fixtures, test_db};

  async fn open(url: &str) -> AppState {
    assert_ok!(
      AppState::new(url, "1:test", HashSet::from([42]), "s".into(), Config::default())
        .await
    )
  }

  #[tokio::test]
  async fn file_database_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("vpn.db").display());

    let app = open(&url).await;
    assert_ok!(app.sv().user.get_or_create(7, Some("alice")).await);
    assert_ok!(app.sv().trial.grant(7).await);
    app.db.close().await.unwrap();

    let app = open(&url).await;
    let user = app.sv().user.by_id(7).await.unwrap().unwrap();
    assert_eq!(user.username.as_deref(), Some("alice"));
    assert_err!(app.sv().trial.grant(7).await);
    assert!(app.is_admin(42));
  }

  #[tokio::test]
  async fn stale_selections_are_collected() {
    let app = AppState::with_db(
      test_db::setup().await,
      Bot::new("1:test"),
      HashSet::new(),
      String::new(),
      Config::default(),
    );
    let now = Utc::now().naive_utc();
    app.selections.insert(1, Selection { plan_id: 1, at: now });
    app
      .selections
      .insert(2, Selection { plan_id: 1, at: now - TimeDelta::hours(2) });

    app.gc_selections(TimeDelta::hours(1));

    assert!(app.selections.contains_key(&1));
    assert!(!app.selections.contains_key(&2));
  }

  #[tokio::test]
  async fn idle_trial_locks_are_collected() {
    let app = AppState::with_db(
      test_db::setup().await,
      Bot::new("1:test"),
      HashSet::new(),
      String::new(),
      Config::default(),
    );
    fixtures::user(&app.db, 3).await;
    assert_ok!(app.sv().trial.grant(3).await);
    assert_eq!(app.trial_locks.len(), 1);

    app.gc_trial_locks();
    assert!(app.trial_locks.is_empty());
  }
}
