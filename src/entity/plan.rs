use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub location: String,
  pub duration_months: i32,
  pub max_users: i32,
  pub data_gib: i64,
  /// Minor currency units.
  pub price: i64,
  pub active: bool,
}

impl Model {
  /// Months are billed as 30 days.
  pub fn duration_days(&self) -> i64 {
    i64::from(self.duration_months) * 30
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
