use crate::{
  entity::{GrantKind, usage_grant},
  prelude::*,
  sv::provision::Credential,
};

pub struct Usage<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Usage<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn insert<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    payment_id: Option<i32>,
    kind: GrantKind,
    credential: &Credential,
  ) -> Result<usage_grant::Model> {
    let grant = usage_grant::ActiveModel {
      user_id: Set(user_id),
      payment_id: Set(payment_id),
      config_payload: Set(credential.config_payload.clone()),
      quota_mb: Set(credential.quota_mb),
      expires_at: Set(credential.expires_at),
      kind: Set(kind),
      created_at: Set(credential.issued_at),
      ..Default::default()
    };

    Ok(grant.insert(conn).await?)
  }

  pub async fn has_trial<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
  ) -> Result<bool> {
    let count = usage_grant::Entity::find()
      .filter(usage_grant::Column::UserId.eq(user_id))
      .filter(usage_grant::Column::Kind.eq(GrantKind::Trial))
      .count(conn)
      .await?;
    Ok(count > 0)
  }

  pub async fn by_user(&self, user_id: i64) -> Result<Vec<usage_grant::Model>> {
    Ok(
      usage_grant::Entity::find()
        .filter(usage_grant::Column::UserId.eq(user_id))
        .order_by_desc(usage_grant::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn by_payment(
    &self,
    payment_id: i32,
  ) -> Result<Vec<usage_grant::Model>> {
    Ok(
      usage_grant::Entity::find()
        .filter(usage_grant::Column::PaymentId.eq(payment_id))
        .order_by_asc(usage_grant::Column::Id)
        .all(self.db)
        .await?,
    )
  }

  pub async fn all(&self) -> Result<Vec<usage_grant::Model>> {
    Ok(
      usage_grant::Entity::find()
        .order_by_asc(usage_grant::Column::Id)
        .all(self.db)
        .await?,
    )
  }

  pub async fn count_active(&self) -> Result<u64> {
    let now = Utc::now().naive_utc();
    Ok(
      usage_grant::Entity::find()
        .filter(usage_grant::Column::ExpiresAt.gt(now))
        .count(self.db)
        .await?,
    )
  }
}
