//! Shared test utilities for database setup

#[cfg(test)]
pub mod test_db {
  use sea_orm::{ConnectOptions, Database, DatabaseConnection};

  use crate::prelude::*;

  /// In-memory SQLite with the production migrations applied. A single
  /// connection keeps every query on the same database.
  pub async fn setup() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);

    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
  }
}

#[cfg(test)]
pub mod fixtures {
  use sea_orm::DatabaseConnection;

  use crate::{
    entity::{payment, plan, user},
    prelude::*,
    sv,
  };

  pub async fn user(db: &DatabaseConnection, tg_user_id: i64) -> user::Model {
    sv::User::new(db).get_or_create(tg_user_id, None).await.unwrap()
  }

  /// Single-user plan priced at 5.00 per month.
  pub async fn plan(
    db: &DatabaseConnection,
    location: &str,
    duration_months: i32,
    data_gib: i64,
  ) -> plan::Model {
    plan::ActiveModel {
      location: Set(location.into()),
      duration_months: Set(duration_months),
      max_users: Set(1),
      data_gib: Set(data_gib),
      price: Set(500 * i64::from(duration_months)),
      active: Set(true),
      ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
  }

  /// Shift a payment's creation time into the past.
  pub async fn backdate(db: &DatabaseConnection, payment_id: i32, age: TimeDelta) {
    let payment = payment::Entity::find_by_id(payment_id)
      .one(db)
      .await
      .unwrap()
      .unwrap();
    let created_at = Utc::now().naive_utc() - age;

    payment::ActiveModel { created_at: Set(created_at), ..payment.into() }
      .update(db)
      .await
      .unwrap();
  }
}
