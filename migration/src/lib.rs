pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_users;
mod m20261001_000002_create_plans;
mod m20261001_000003_create_payments;
mod m20261001_000004_create_usage_grants;
mod m20261001_000005_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20261001_000001_create_users::Migration),
      Box::new(m20261001_000002_create_plans::Migration),
      Box::new(m20261001_000003_create_payments::Migration),
      Box::new(m20261001_000004_create_usage_grants::Migration),
      Box::new(m20261001_000005_create_audit_logs::Migration),
    ]
  }
}
