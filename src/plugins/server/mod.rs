mod handlers;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
  Router, middleware,
  routing::{get, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub struct Plugin;

/// Routes without the rate limiter, which needs peer addresses.
pub fn router(app: Arc<AppState>) -> Router {
  let admin = Router::new()
    .route("/users", get(handlers::users))
    .route("/payments", get(handlers::payments))
    .route("/users/{id}/audit", get(handlers::user_audit))
    .route("/usages", get(handlers::usages))
    .route("/payments/{id}/audit", get(handlers::audit))
    .route("/payments/{id}/accept", post(handlers::accept))
    .route("/payments/{id}/reject", post(handlers::reject))
    .route_layer(middleware::from_fn_with_state(app.clone(), handlers::auth));

  Router::new()
    .route("/health", get(handlers::health))
    .nest("/admin", admin)
    .with_state(app)
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let governor_limiter = governor_conf.limiter().clone();
    let shutdown = app.shutdown.clone();

    tokio::spawn(async move {
      let mut interval = tokio::time::interval(Duration::from_secs(60));
      loop {
        tokio::select! {
          _ = shutdown.cancelled() => break,
          _ = interval.tick() => governor_limiter.retain_recent(),
        }
      }
    });

    let router = router(app.clone())
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));
    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP Server listening on {addr}");

    axum::serve(listener, router)
      .with_graceful_shutdown(app.shutdown.clone().cancelled_owned())
      .await
      .context("HTTP server error")
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
  };
  use teloxide::Bot;
  use tower::ServiceExt;

  use super::*;
  use crate::{
    config::Config,
    sv::test_utils::{fixtures, test_db},
  };

  const SECRET: &str = "s3cret";

  async fn app() -> Arc<AppState> {
    let db = test_db::setup().await;
    Arc::new(AppState::with_db(
      db,
      Bot::new("1:test"),
      HashSet::new(),
      SECRET.into(),
      Config::default(),
    ))
  }

  fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(token) = token {
      req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    req.body(Body::empty()).unwrap()
  }

  fn post(uri: &str, body: json::Value) -> Request<Body> {
    Request::post(uri)
      .header(header::AUTHORIZATION, format!("Bearer {SECRET}"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  async fn body(res: axum::response::Response) -> json::Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    json::from_slice(&bytes).unwrap()
  }

  async fn pending_payment(app: &AppState) -> i32 {
    fixtures::user(&app.db, 7).await;
    let plan = fixtures::plan(&app.db, "france", 1, 10).await;
    app.sv().review.submit(7, plan.id, None).await.unwrap().payment.id
  }

  #[tokio::test]
  async fn health_needs_no_token() {
    let res = router(app().await).oneshot(get("/health", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn admin_routes_require_secret() {
    let app = app().await;

    let res =
      router(app.clone()).oneshot(get("/admin/users", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    for token in ["wrong", "s3cre", "s3cret2"] {
      let res = router(app.clone())
        .oneshot(get("/admin/users", Some(token)))
        .await
        .unwrap();
      assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{token}");
    }

    let res =
      router(app).oneshot(get("/admin/users", Some(SECRET))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn accept_returns_full_grant_and_audit() {
    let app = app().await;
    let id = pending_payment(&app).await;

    let res = router(app.clone())
      .oneshot(post(&format!("/admin/payments/{id}/accept"), json::json!({})))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let verdict = body(res).await;
    assert_eq!(verdict["payment"]["status"], "accepted");
    assert_eq!(verdict["grant"]["quota_mb"], 10 * 1024);

    let res = router(app)
      .oneshot(get(&format!("/admin/payments/{id}/audit"), Some(SECRET)))
      .await
      .unwrap();
    let actions: Vec<_> = body(res)
      .await
      .as_array()
      .unwrap()
      .iter()
      .map(|entry| entry["action"].as_str().unwrap().to_string())
      .collect();
    assert!(actions.contains(&"accept".to_string()));
    assert!(actions.contains(&"plan_activated".to_string()));
  }

  #[tokio::test]
  async fn second_decision_conflicts() {
    let app = app().await;
    let id = pending_payment(&app).await;
    let uri = format!("/admin/payments/{id}/reject");

    let res = router(app.clone())
      .oneshot(post(&uri, json::json!({ "reason": "fake receipt" })))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = router(app)
      .oneshot(post(&format!("/admin/payments/{id}/accept"), json::json!({})))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn reject_requires_reason() {
    let app = app().await;
    let id = pending_payment(&app).await;

    let res = router(app)
      .oneshot(post(
        &format!("/admin/payments/{id}/reject"),
        json::json!({ "reason": "  " }),
      ))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn user_audit_lists_submission() {
    let app = app().await;
    pending_payment(&app).await;

    let res = router(app.clone())
      .oneshot(get("/admin/users/7/audit", Some(SECRET)))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let entries = body(res).await;
    assert_eq!(entries[0]["action"], "submit");
    assert_eq!(entries[1]["action"], "temp_plan");

    let res = router(app)
      .oneshot(get("/admin/users/8/audit", Some(SECRET)))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn unknown_payment_is_not_found() {
    let res = router(app().await)
      .oneshot(post("/admin/payments/99/accept", json::json!({})))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }
}
