pub mod cron;
pub mod server;
pub mod telegram;

use std::sync::Arc;

use crate::state::AppState;

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct App {
  plugins: Vec<Box<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Box::new(plugin));
    self
  }

  /// Run every plugin side by side until all of them return.
  pub async fn run(self, app: Arc<AppState>) {
    let handles = self.plugins.into_iter().map(|plugin| {
      let app = app.clone();
      let name = plugin.name();

      tracing::info!("init `{}`", name);

      tokio::spawn(async move {
        if let Err(err) = plugin.start(app).await {
          tracing::error!("failed `{}`: {err}", name);
        }
        name
      })
    });

    for done in futures::future::join_all(handles).await {
      match done {
        Ok(name) => tracing::info!("stopped `{}`", name),
        Err(err) => tracing::error!("plugin task panicked: {err}"),
      }
    }
  }
}
