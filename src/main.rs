mod config;
mod entity;
mod error;
mod i18n;
mod plugins;
mod prelude;
mod state;
mod sv;
mod utils;

use std::env;

use anyhow::Context;
use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  config::Config,
  plugins::{App, cron, server, telegram},
  prelude::*,
  state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "vpnbot=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let admins: HashSet<i64> = env::var("ADMIN_IDS")
    .context("ADMIN_IDS not set")?
    .split(',')
    .filter(|s| !s.trim().is_empty())
    .map(|id| id.trim().parse().context("Invalid Admin ID format"))
    .collect::<anyhow::Result<_>>()?;

  let db_url = env::var("DATABASE_URL")
    .unwrap_or_else(|_| "sqlite:vpnbot.db?mode=rwc".into());
  let token = env::var("TELOXIDE_TOKEN").context("TELOXIDE_TOKEN not set")?;
  let secret = env::var("SERVER_SECRET").context("SERVER_SECRET not set")?;
  let config = Config::from_env()?;

  info!("Starting vpnbot v{}", env!("CARGO_PKG_VERSION"));
  if admins.is_empty() {
    warn!("No admins configured, payments can only be auto-accepted");
  }

  let app = Arc::new(
    AppState::new(&db_url, &token, admins, secret, config)
      .await
      .context("Failed to initialise state")?,
  );

  let shutdown = app.shutdown.clone();
  tokio::spawn(async move {
    match tokio::signal::ctrl_c().await {
      Ok(()) => {
        info!("Shutting down...");
        shutdown.cancel();
      }
      Err(err) => error!("Failed to listen for ctrl-c: {err}"),
    }
  });

  App::new()
    .register(telegram::Plugin)
    .register(server::Plugin)
    .register(cron::AutoAccept::new(app.shutdown.child_token()))
    .register(cron::GC)
    .run(app)
    .await;

  Ok(())
}
