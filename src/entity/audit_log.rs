use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Transition, payment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
  #[sea_orm(string_value = "submit")]
  Submit,
  #[sea_orm(string_value = "temp_plan")]
  TempPlan,
  #[sea_orm(string_value = "accept")]
  Accept,
  #[sea_orm(string_value = "reject")]
  Reject,
  #[sea_orm(string_value = "auto_accept")]
  AutoAccept,
  #[sea_orm(string_value = "plan_activated")]
  PlanActivated,
  #[sea_orm(string_value = "ban")]
  Ban,
  #[sea_orm(string_value = "trial")]
  Trial,
}

impl From<Transition> for AuditAction {
  fn from(transition: Transition) -> Self {
    match transition {
      Transition::Accept => AuditAction::Accept,
      Transition::Reject => AuditAction::Reject,
      Transition::AutoAccept => AuditAction::AutoAccept,
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub payment_id: Option<i32>,
  pub user_id: Option<i64>,
  pub action: AuditAction,
  #[sea_orm(column_type = "Text", nullable)]
  pub details: Option<String>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "payment::Entity",
    from = "Column::PaymentId",
    to = "payment::Column::Id"
  )]
  Payment,
}

impl Related<payment::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payment.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
