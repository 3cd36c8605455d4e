use sea_orm_migration::prelude::*;

use super::{
  m20261001_000001_create_users::Users, m20261001_000002_create_plans::Plans,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Payments::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Payments::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Payments::UserId).big_integer().not_null())
          .col(ColumnDef::new(Payments::PlanId).integer().not_null())
          .col(ColumnDef::new(Payments::Amount).big_integer().not_null())
          .col(
            ColumnDef::new(Payments::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Payments::Evidence).string().null())
          .col(ColumnDef::new(Payments::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Payments::UpdatedAt).date_time().not_null())
          .col(ColumnDef::new(Payments::ExpiresAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_payments_user")
              .from(Payments::Table, Payments::UserId)
              .to(Users::Table, Users::TgUserId)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_payments_plan")
              .from(Payments::Table, Payments::PlanId)
              .to(Plans::Table, Plans::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_payments_user")
          .table(Payments::Table)
          .col(Payments::UserId)
          .to_owned(),
      )
      .await?;

    // the auto-accept scan filters on both
    manager
      .create_index(
        Index::create()
          .name("idx_payments_status_created")
          .table(Payments::Table)
          .col(Payments::Status)
          .col(Payments::CreatedAt)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Payments::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Payments {
  Table,
  Id,
  UserId,
  PlanId,
  Amount,
  Status,
  Evidence,
  CreatedAt,
  UpdatedAt,
  ExpiresAt,
}
