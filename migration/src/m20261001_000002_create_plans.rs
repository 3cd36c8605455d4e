use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Plans::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Plans::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Plans::Location).string_len(50).not_null())
          .col(ColumnDef::new(Plans::DurationMonths).integer().not_null())
          .col(ColumnDef::new(Plans::MaxUsers).integer().not_null())
          .col(ColumnDef::new(Plans::DataGib).big_integer().not_null())
          .col(ColumnDef::new(Plans::Price).big_integer().not_null())
          .col(
            ColumnDef::new(Plans::Active)
              .boolean()
              .not_null()
              .default(true),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_plans_selection")
          .table(Plans::Table)
          .col(Plans::Location)
          .col(Plans::DurationMonths)
          .col(Plans::MaxUsers)
          .col(Plans::DataGib)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Plans::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Plans {
  Table,
  Id,
  Location,
  DurationMonths,
  MaxUsers,
  DataGib,
  Price,
  Active,
}
