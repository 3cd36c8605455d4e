use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{payment, user};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
  /// Standalone free trial, one per user.
  #[sea_orm(string_value = "trial")]
  Trial,
  /// Reduced grant issued while a payment awaits review.
  #[sea_orm(string_value = "temporary")]
  Temporary,
  #[sea_orm(string_value = "full")]
  #[default]
  Full,
}

impl fmt::Display for GrantKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      GrantKind::Trial => "trial",
      GrantKind::Temporary => "temporary",
      GrantKind::Full => "full",
    })
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_grants")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub user_id: i64,
  pub payment_id: Option<i32>,
  #[sea_orm(column_type = "Text")]
  pub config_payload: String,
  pub quota_mb: i64,
  pub expires_at: DateTime,
  pub kind: GrantKind,
  pub created_at: DateTime,
}

impl Model {
  pub fn is_trial(&self) -> bool {
    self.kind == GrantKind::Trial
  }
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
    belongs_to = "payment::Entity",
    from = "Column::PaymentId",
    to = "payment::Column::Id"
  )]
  Payment,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<payment::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payment.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
