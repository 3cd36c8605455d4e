use crate::{
  entity::{AuditAction, audit_log},
  prelude::*,
};

/// Append-only: entries are inserted and read, never updated or deleted.
pub struct Audit<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Audit<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Record an entry on `conn`, usually the transaction performing the
  /// change being audited.
  pub async fn record<C: ConnectionTrait>(
    conn: &C,
    payment_id: Option<i32>,
    user_id: Option<i64>,
    action: AuditAction,
    details: Option<String>,
  ) -> Result<audit_log::Model> {
    let entry = audit_log::ActiveModel {
      payment_id: Set(payment_id),
      user_id: Set(user_id),
      action: Set(action),
      details: Set(details),
      created_at: Set(Utc::now().naive_utc()),
      ..Default::default()
    };

    Ok(entry.insert(conn).await?)
  }

  pub async fn by_payment(
    &self,
    payment_id: i32,
  ) -> Result<Vec<audit_log::Model>> {
    Ok(
      audit_log::Entity::find()
        .filter(audit_log::Column::PaymentId.eq(payment_id))
        .order_by_asc(audit_log::Column::Id)
        .all(self.db)
        .await?,
    )
  }

  pub async fn by_user(&self, user_id: i64) -> Result<Vec<audit_log::Model>> {
    Ok(
      audit_log::Entity::find()
        .filter(audit_log::Column::UserId.eq(user_id))
        .order_by_asc(audit_log::Column::Id)
        .all(self.db)
        .await?,
    )
  }
}
