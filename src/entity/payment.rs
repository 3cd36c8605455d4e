use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{plan, user};
use crate::error::Error;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "accepted")]
  Accepted,
  #[sea_orm(string_value = "rejected")]
  Rejected,
  #[sea_orm(string_value = "auto_accepted")]
  AutoAccepted,
}

impl PaymentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Accepted => "accepted",
      PaymentStatus::Rejected => "rejected",
      PaymentStatus::AutoAccepted => "auto_accepted",
    }
  }

  pub fn is_terminal(&self) -> bool {
    *self != PaymentStatus::Pending
  }

  /// The only place deciding which status a transition leads to.
  /// Terminal states accept nothing.
  pub fn advance(
    self,
    transition: Transition,
  ) -> crate::error::Result<PaymentStatus> {
    let to = transition.target();
    match self {
      PaymentStatus::Pending => Ok(to),
      from => Err(Error::InvalidTransition { from, to }),
    }
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
  Accept,
  Reject,
  AutoAccept,
}

impl Transition {
  pub fn target(self) -> PaymentStatus {
    match self {
      Transition::Accept => PaymentStatus::Accepted,
      Transition::Reject => PaymentStatus::Rejected,
      Transition::AutoAccept => PaymentStatus::AutoAccepted,
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub user_id: i64,
  pub plan_id: i32,
  pub amount: i64,
  pub status: PaymentStatus,
  /// Photo/document file id or free text sent as proof.
  pub evidence: Option<String>,
  pub created_at: DateTime,
  pub updated_at: DateTime,
  /// Review deadline, after which the claim is auto-accepted.
  pub expires_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::TgUserId"
  )]
  User,
  #[sea_orm(
    belongs_to = "plan::Entity",
    from = "Column::PlanId",
    to = "plan::Column::Id"
  )]
  Plan,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<plan::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Plan.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pending_advances_to_every_terminal_state() {
    for (transition, expected) in [
      (Transition::Accept, PaymentStatus::Accepted),
      (Transition::Reject, PaymentStatus::Rejected),
      (Transition::AutoAccept, PaymentStatus::AutoAccepted),
    ] {
      assert_eq!(PaymentStatus::Pending.advance(transition).unwrap(), expected);
      assert!(expected.is_terminal());
    }
  }

  #[test]
  fn terminal_states_never_move() {
    let terminal = [
      PaymentStatus::Accepted,
      PaymentStatus::Rejected,
      PaymentStatus::AutoAccepted,
    ];
    let transitions =
      [Transition::Accept, Transition::Reject, Transition::AutoAccept];

    for from in terminal {
      for transition in transitions {
        assert!(matches!(
          from.advance(transition),
          Err(Error::InvalidTransition { from: f, .. }) if f == from
        ));
      }
    }
  }
}
