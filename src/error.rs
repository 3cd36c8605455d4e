use std::fmt;

use sea_orm::DbErr;

use crate::entity::PaymentStatus;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
  User,
  Plan,
  Payment,
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Resource::User => "user",
      Resource::Plan => "plan",
      Resource::Payment => "payment",
    })
  }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("{0} not found")]
  NotFound(Resource),
  #[error("payment cannot move from `{from}` to `{to}`")]
  InvalidTransition { from: PaymentStatus, to: PaymentStatus },
  #[error("no plan matches the requested selection")]
  PlanUnavailable,
  #[error("trial already used")]
  TrialAlreadyUsed,
  #[error("storage is busy, try again: {0}")]
  Transient(String),
  #[error("invalid arguments: {0}")]
  InvalidArgs(String),
  #[error(transparent)]
  Db(#[from] DbErr),
}

impl Error {
  /// Failures worth a second attempt with a fresh read.
  pub fn is_transient(&self) -> bool {
    match self {
      Error::Transient(_) => true,
      Error::Db(DbErr::ConnectionAcquire(_) | DbErr::Conn(_)) => true,
      Error::Db(err @ (DbErr::Exec(_) | DbErr::Query(_))) => {
        let msg = err.to_string().to_lowercase();
        ["database is locked", "busy", "could not serialize", "deadlock"]
          .iter()
          .any(|needle| msg.contains(needle))
      }
      _ => false,
    }
  }

  pub fn user_message(&self) -> String {
    match self {
      Error::NotFound(what) => format!("The requested {what} does not exist."),
      Error::InvalidTransition { from, .. } => {
        format!("This payment was already processed ({from}).")
      }
      Error::PlanUnavailable => "This plan is not available.".into(),
      Error::TrialAlreadyUsed => "You already used your free trial.".into(),
      Error::Transient(_) => "Service is busy, please retry.".into(),
      Error::InvalidArgs(msg) => msg.clone(),
      Error::Db(_) => "Internal error, please contact support.".into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use sea_orm::RuntimeErr;

  use super::*;

  #[test]
  fn locked_database_is_transient() {
    let err = Error::Db(DbErr::Exec(RuntimeErr::Internal(
      "database is locked".into(),
    )));
    assert!(err.is_transient());
  }

  #[test]
  fn domain_errors_are_not_transient() {
    assert!(!Error::TrialAlreadyUsed.is_transient());
    assert!(!Error::PlanUnavailable.is_transient());
    assert!(
      !Error::InvalidTransition {
        from: PaymentStatus::Accepted,
        to: PaymentStatus::AutoAccepted,
      }
      .is_transient()
    );
    assert!(
      !Error::Db(DbErr::Custom("constraint failed".into())).is_transient()
    );
  }

  #[test]
  fn invalid_transition_names_both_states() {
    let err = Error::InvalidTransition {
      from: PaymentStatus::Rejected,
      to: PaymentStatus::Accepted,
    };
    assert_eq!(
      err.to_string(),
      "payment cannot move from `rejected` to `accepted`"
    );
  }
}
