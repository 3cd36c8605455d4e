use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
  config::Config,
  plugins::{Plugin, telegram},
  prelude::*,
  state::AppState,
  sv::{self, review::Outcome},
};

pub struct GC;

#[async_trait]
impl Plugin for GC {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut interval = time::interval(Duration::from_secs(60));
    loop {
      tokio::select! {
        _ = app.shutdown.cancelled() => return Ok(()),
        _ = interval.tick() => {
          app.gc_trial_locks();
          app.gc_selections(TimeDelta::hours(1));
        }
      }
    }
  }
}

#[derive(Debug, Default)]
pub struct TickReport {
  pub scanned: usize,
  /// Lost to a concurrent manual decision.
  pub skipped: usize,
  pub failed: usize,
  pub accepted: Vec<Outcome>,
}

/// One auto-accept pass over overdue pending claims.
pub async fn tick(review: &sv::Review<'_>) -> Result<TickReport> {
  let overdue = review.overdue(Utc::now().naive_utc()).await?;
  let mut report = TickReport { scanned: overdue.len(), ..Default::default() };

  for payment in overdue {
    match review.auto_accept(payment.id).await {
      Ok(outcome) => report.accepted.push(outcome),
      Err(Error::InvalidTransition { from, .. }) => {
        debug!("auto-accept skipped payment #{}: already {from}", payment.id);
        report.skipped += 1;
      }
      Err(err) => {
        error!("auto-accept failed for payment #{}: {err}", payment.id);
        report.failed += 1;
      }
    }
  }

  Ok(report)
}

/// Periodic auto-accept of stale claims, stoppable through its own token.
pub struct AutoAccept {
  token: CancellationToken,
}

impl AutoAccept {
  pub fn new(token: CancellationToken) -> Self {
    Self { token }
  }

  pub fn token(&self) -> &CancellationToken {
    &self.token
  }

  /// Tick every `config.auto_accept_interval` until cancelled. The first
  /// tick fires immediately.
  pub async fn run<F, Fut>(
    &self,
    db: &DatabaseConnection,
    config: &Config,
    mut on_tick: F,
  ) -> anyhow::Result<()>
  where
    F: FnMut(TickReport) -> Fut,
    Fut: Future<Output = ()>,
  {
    let every = config.auto_accept_interval;
    if every.is_zero() {
      info!("Auto-accept disabled via config (0 interval)");
      return Ok(());
    }

    info!(
      "Auto-accept started (interval: {}, deadline: {}d)",
      humantime::format_duration(every),
      config.auto_accept_days
    );

    let review = sv::Review::new(db, config);
    let mut interval = time::interval(every);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        biased;
        _ = self.token.cancelled() => {
          info!("Auto-accept stopped");
          return Ok(());
        }
        _ = interval.tick() => {}
      }

      match tick(&review).await {
        Ok(report) => {
          if report.scanned > 0 {
            info!(
              "Auto-accept: {} scanned, {} accepted, {} skipped, {} failed",
              report.scanned,
              report.accepted.len(),
              report.skipped,
              report.failed
            );
          }
          on_tick(report).await;
        }
        Err(err) => error!("Auto-accept scan failed: {err}"),
      }
    }
  }
}

#[async_trait]
impl Plugin for AutoAccept {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let notify = app.clone();
    self
      .run(&app.db, &app.config, move |report| {
        let app = notify.clone();
        async move {
          for outcome in &report.accepted {
            telegram::notify_outcome(&app, outcome).await;
          }
        }
      })
      .await
  }
}
