use sea_orm::SqlErr;

use crate::{entity::user, prelude::*};

pub const LOCALES: [&str; 2] = ["en", "fa"];

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Register on first contact. Later calls refresh nothing but the
  /// username.
  pub async fn get_or_create(
    &self,
    tg_user_id: i64,
    username: Option<&str>,
  ) -> Result<user::Model> {
    if let Some(user) =
      user::Entity::find_by_id(tg_user_id).one(self.db).await?
    {
      if username.is_some() && user.username.as_deref() != username {
        let updated = user::ActiveModel {
          username: Set(username.map(Into::into)),
          ..user.into()
        }
        .update(self.db)
        .await?;
        return Ok(updated);
      }
      return Ok(user);
    }

    self.register(tg_user_id, username).await
  }

  /// Insert a new user. Losing the insert to a concurrent update for the
  /// same user returns the row that won.
  async fn register(
    &self,
    tg_user_id: i64,
    username: Option<&str>,
  ) -> Result<user::Model> {
    let user = user::ActiveModel {
      tg_user_id: Set(tg_user_id),
      username: Set(username.map(Into::into)),
      locale: Set(LOCALES[0].into()),
      banned: Set(false),
      created_at: Set(Utc::now().naive_utc()),
    };

    match user.insert(self.db).await {
      Ok(user) => Ok(user),
      Err(err)
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
      {
        debug!("user {tg_user_id} registered concurrently, re-reading");
        user::Entity::find_by_id(tg_user_id)
          .one(self.db)
          .await?
          .ok_or(Error::NotFound(Resource::User))
      }
      Err(err) => Err(err.into()),
    }
  }

  pub async fn by_id(&self, tg_user_id: i64) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(tg_user_id).one(self.db).await?)
  }

  pub async fn set_locale(
    &self,
    tg_user_id: i64,
    locale: &str,
  ) -> Result<user::Model> {
    let locale = locale.trim().to_lowercase();
    if !LOCALES.contains(&locale.as_str()) {
      return Err(Error::InvalidArgs(format!(
        "Unsupported language, choose one of: {}",
        LOCALES.join(", ")
      )));
    }

    let user = user::Entity::find_by_id(tg_user_id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound(Resource::User))?;

    Ok(
      user::ActiveModel { locale: Set(locale), ..user.into() }
        .update(self.db)
        .await?,
    )
  }

  pub async fn locale(&self, tg_user_id: i64) -> String {
    match self.by_id(tg_user_id).await {
      Ok(Some(user)) => user.locale,
      _ => LOCALES[0].into(),
    }
  }

  pub async fn all(&self) -> Result<Vec<user::Model>> {
    Ok(
      user::Entity::find()
        .order_by_asc(user::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn count(&self) -> Result<u64> {
    Ok(user::Entity::find().count(self.db).await?)
  }
}
