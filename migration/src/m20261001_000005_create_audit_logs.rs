use sea_orm_migration::prelude::*;

use super::m20261001_000003_create_payments::Payments;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AuditLogs::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AuditLogs::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(AuditLogs::PaymentId).integer().null())
          .col(ColumnDef::new(AuditLogs::UserId).big_integer().null())
          .col(ColumnDef::new(AuditLogs::Action).string_len(100).not_null())
          .col(ColumnDef::new(AuditLogs::Details).text().null())
          .col(ColumnDef::new(AuditLogs::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_audit_logs_payment")
              .from(AuditLogs::Table, AuditLogs::PaymentId)
              .to(Payments::Table, Payments::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_audit_logs_payment")
          .table(AuditLogs::Table)
          .col(AuditLogs::PaymentId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AuditLogs {
  Table,
  Id,
  PaymentId,
  UserId,
  Action,
  Details,
  CreatedAt,
}
