use sea_orm_migration::prelude::*;

use super::{
  m20261001_000001_create_users::Users,
  m20261001_000003_create_payments::Payments,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(UsageGrants::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(UsageGrants::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(UsageGrants::UserId).big_integer().not_null())
          .col(ColumnDef::new(UsageGrants::PaymentId).integer().null())
          .col(ColumnDef::new(UsageGrants::ConfigPayload).text().not_null())
          .col(ColumnDef::new(UsageGrants::QuotaMb).big_integer().not_null())
          .col(ColumnDef::new(UsageGrants::ExpiresAt).date_time().not_null())
          .col(ColumnDef::new(UsageGrants::Kind).string().not_null())
          .col(ColumnDef::new(UsageGrants::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_usage_grants_user")
              .from(UsageGrants::Table, UsageGrants::UserId)
              .to(Users::Table, Users::TgUserId)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_usage_grants_payment")
              .from(UsageGrants::Table, UsageGrants::PaymentId)
              .to(Payments::Table, Payments::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_usage_grants_user")
          .table(UsageGrants::Table)
          .col(UsageGrants::UserId)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_usage_grants_payment")
          .table(UsageGrants::Table)
          .col(UsageGrants::PaymentId)
          .to_owned(),
      )
      .await?;

    // One trial per user, enforced by the store even across processes.
    // Partial indexes are not expressible through the index builder.
    manager
      .get_connection()
      .execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_usage_grants_one_trial \
         ON usage_grants (user_id) WHERE kind = 'trial'",
      )
      .await?;

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(UsageGrants::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum UsageGrants {
  Table,
  Id,
  UserId,
  PaymentId,
  ConfigPayload,
  QuotaMb,
  ExpiresAt,
  Kind,
  CreatedAt,
}
