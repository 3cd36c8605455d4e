use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Request, State},
  http::{StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{audit_log, payment, usage_grant, user},
  plugins::telegram,
  prelude::*,
  state::AppState,
  sv::review::Outcome,
};

#[derive(Serialize)]
pub struct Status {
  success: bool,
  msg: Option<String>,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::InvalidTransition { .. } | Error::TrialAlreadyUsed => {
        StatusCode::CONFLICT
      }
      Error::PlanUnavailable => StatusCode::UNPROCESSABLE_ENTITY,
      Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
      Error::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
      Error::Db(err) => {
        error!("database error in admin api: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    let body = Status { success: false, msg: Some(self.user_message()) };
    (status, Json(body)).into_response()
  }
}

/// Requires `Authorization: Bearer <SERVER_SECRET>`.
pub async fn auth(
  State(app): State<Arc<AppState>>,
  req: Request,
  next: Next,
) -> Response {
  let token = req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "));

  match token {
    Some(token)
      if !app.secret.is_empty() && token_matches(token, &app.secret) =>
    {
      next.run(req).await
    }
    _ => (
      StatusCode::UNAUTHORIZED,
      Json(Status { success: false, msg: Some("Invalid token".into()) }),
    )
      .into_response(),
  }
}

/// Compares every byte so timing does not reveal the matching prefix.
fn token_matches(given: &str, secret: &str) -> bool {
  if given.len() != secret.len() {
    return false;
  }
  given
    .bytes()
    .zip(secret.bytes())
    .fold(0u8, |diff, (a, b)| diff | (a ^ b))
    == 0
}

pub async fn health() -> Json<Status> {
  Json(Status { success: true, msg: None })
}

pub async fn users(
  State(app): State<Arc<AppState>>,
) -> Result<Json<Vec<user::Model>>> {
  Ok(Json(app.sv().user.all().await?))
}

pub async fn payments(
  State(app): State<Arc<AppState>>,
) -> Result<Json<Vec<payment::Model>>> {
  Ok(Json(app.sv().review.all().await?))
}

pub async fn usages(
  State(app): State<Arc<AppState>>,
) -> Result<Json<Vec<usage_grant::Model>>> {
  Ok(Json(app.sv().usage.all().await?))
}

pub async fn audit(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
) -> Result<Json<Vec<audit_log::Model>>> {
  let sv = app.sv();
  sv.review.by_id(id).await?.ok_or(Error::NotFound(Resource::Payment))?;
  Ok(Json(sv.audit.by_payment(id).await?))
}

pub async fn user_audit(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<audit_log::Model>>> {
  let sv = app.sv();
  sv.user.by_id(id).await?.ok_or(Error::NotFound(Resource::User))?;
  Ok(Json(sv.audit.by_user(id).await?))
}

#[derive(Serialize)]
pub struct Verdict {
  payment: payment::Model,
  grant: Option<usage_grant::Model>,
}

impl From<Outcome> for Verdict {
  fn from(Outcome { payment, grant }: Outcome) -> Self {
    Self { payment, grant }
  }
}

pub async fn accept(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
) -> Result<Json<Verdict>> {
  let outcome = app.sv().review.accept(id).await?;
  notify(&app, &outcome);
  Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
pub struct RejectReq {
  reason: String,
}

pub async fn reject(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Json(req): Json<RejectReq>,
) -> Result<Json<Verdict>> {
  let reason = req.reason.trim();
  if reason.is_empty() {
    return Err(Error::InvalidArgs("A rejection reason is required".into()));
  }

  let outcome = app.sv().review.reject(id, reason).await?;
  notify(&app, &outcome);
  Ok(Json(outcome.into()))
}

fn notify(app: &Arc<AppState>, outcome: &Outcome) {
  let app = app.clone();
  let outcome = outcome.clone();
  tokio::spawn(async move { telegram::notify_outcome(&app, &outcome).await });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn token_must_match_exactly() {
    assert!(token_matches("s3cret", "s3cret"));
    assert!(!token_matches("s3cre", "s3cret"));
    assert!(!token_matches("s3cret!", "s3cret"));
    assert!(!token_matches("S3cret", "s3cret"));
  }
}
