use crate::{entity::plan, prelude::*};

/// What a customer picks in the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
  pub location: String,
  pub duration_months: i32,
  pub max_users: i32,
  pub data_gib: i64,
}

pub const MAX_DATA_GIB: i64 = 1 << 20;
pub const MAX_DURATION_MONTHS: i32 = 1200;

pub struct Plan<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Plan<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(
    &self,
    selection: Selection,
    price: i64,
  ) -> Result<plan::Model> {
    if selection.duration_months <= 0
      || selection.max_users <= 0
      || selection.data_gib <= 0
      || price < 0
    {
      return Err(Error::InvalidArgs(
        "Plan duration, users and data must be positive".into(),
      ));
    }
    if selection.data_gib > MAX_DATA_GIB
      || selection.duration_months > MAX_DURATION_MONTHS
    {
      return Err(Error::InvalidArgs(format!(
        "Plans are limited to {MAX_DATA_GIB} GiB and {MAX_DURATION_MONTHS} months"
      )));
    }

    let plan = plan::ActiveModel {
      location: Set(selection.location.trim().to_lowercase()),
      duration_months: Set(selection.duration_months),
      max_users: Set(selection.max_users),
      data_gib: Set(selection.data_gib),
      price: Set(price),
      active: Set(true),
      ..Default::default()
    };

    Ok(plan.insert(self.db).await?)
  }

  /// Catalog lookup; only active plans are sold.
  pub async fn find(&self, selection: &Selection) -> Result<plan::Model> {
    plan::Entity::find()
      .filter(plan::Column::Location.eq(selection.location.to_lowercase()))
      .filter(plan::Column::DurationMonths.eq(selection.duration_months))
      .filter(plan::Column::MaxUsers.eq(selection.max_users))
      .filter(plan::Column::DataGib.eq(selection.data_gib))
      .filter(plan::Column::Active.eq(true))
      .one(self.db)
      .await?
      .ok_or(Error::PlanUnavailable)
  }

  pub async fn by_id(&self, id: i32) -> Result<Option<plan::Model>> {
    Ok(plan::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn active(&self) -> Result<Vec<plan::Model>> {
    Ok(
      plan::Entity::find()
        .filter(plan::Column::Active.eq(true))
        .order_by_asc(plan::Column::Location)
        .order_by_asc(plan::Column::DurationMonths)
        .order_by_asc(plan::Column::MaxUsers)
        .order_by_asc(plan::Column::DataGib)
        .all(self.db)
        .await?,
    )
  }

  pub async fn set_active(&self, id: i32, active: bool) -> Result<()> {
    let plan = plan::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound(Resource::Plan))?;

    plan::ActiveModel { active: Set(active), ..plan.into() }
      .update(self.db)
      .await?;

    Ok(())
  }
}
