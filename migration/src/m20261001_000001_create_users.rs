use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Users::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Users::TgUserId)
              .big_integer()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(Users::Username).string_len(150).null())
          .col(
            ColumnDef::new(Users::Locale)
              .string_len(5)
              .not_null()
              .default("en"),
          )
          .col(
            ColumnDef::new(Users::Banned)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Users::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Users {
  Table,
  TgUserId,
  Username,
  Locale,
  Banned,
  CreatedAt,
}
