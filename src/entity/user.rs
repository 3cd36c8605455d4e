use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{payment, usage_grant};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub tg_user_id: i64,
  pub username: Option<String>,
  pub locale: String,
  pub banned: bool,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "payment::Entity")]
  Payments,
  #[sea_orm(has_many = "usage_grant::Entity")]
  UsageGrants,
}

impl Related<payment::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payments.def()
  }
}

impl Related<usage_grant::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::UsageGrants.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
