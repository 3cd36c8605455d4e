use sea_orm::{ActiveEnum, sea_query::Expr};

use crate::{
  config::Config,
  entity::{
    AuditAction, GrantKind, PaymentStatus, Transition, payment, plan,
    usage_grant, user,
  },
  prelude::*,
  sv::{
    self,
    provision::{Mode, Provisioner},
    txn,
  },
};

/// A pending claim together with the temporary grant issued for it.
#[derive(Debug, Clone)]
pub struct Submission {
  pub payment: payment::Model,
  pub grant: usage_grant::Model,
}

/// Result of a successful transition. `grant` is the full credential for
/// accept and auto-accept, `None` for reject.
#[derive(Debug, Clone)]
pub struct Outcome {
  pub payment: payment::Model,
  pub grant: Option<usage_grant::Model>,
}

/// Lifecycle of payment claims. Every status change goes through
/// [`Review::transition`], which is the only writer of `payments.status`.
pub struct Review<'a> {
  db: &'a DatabaseConnection,
  config: &'a Config,
}

impl<'a> Review<'a> {
  pub fn new(db: &'a DatabaseConnection, config: &'a Config) -> Self {
    Self { db, config }
  }

  pub async fn submit(
    &self,
    user_id: i64,
    plan_id: i32,
    evidence: Option<String>,
  ) -> Result<Submission> {
    let this = self;
    txn::retry_once("submit", move || {
      this.try_submit(user_id, plan_id, evidence.clone())
    })
    .await
  }

  pub async fn accept(&self, payment_id: i32) -> Result<Outcome> {
    self.transition(payment_id, Transition::Accept, None).await
  }

  pub async fn reject(&self, payment_id: i32, reason: &str) -> Result<Outcome> {
    self.transition(payment_id, Transition::Reject, Some(reason)).await
  }

  /// Only succeeds once the claim is at least `auto_accept_days` old.
  pub async fn auto_accept(&self, payment_id: i32) -> Result<Outcome> {
    self.transition(payment_id, Transition::AutoAccept, None).await
  }

  pub async fn transition(
    &self,
    payment_id: i32,
    transition: Transition,
    reason: Option<&str>,
  ) -> Result<Outcome> {
    let this = self;
    let outcome = txn::retry_once(transition_name(transition), move || {
      this.try_transition(payment_id, transition, reason)
    })
    .await?;

    info!(
      "payment #{} of user {} -> {}",
      payment_id, outcome.payment.user_id, outcome.payment.status
    );
    Ok(outcome)
  }

  async fn try_submit(
    &self,
    user_id: i64,
    plan_id: i32,
    evidence: Option<String>,
  ) -> Result<Submission> {
    let txn = self.db.begin().await?;

    user::Entity::find_by_id(user_id)
      .one(&txn)
      .await?
      .ok_or(Error::NotFound(Resource::User))?;

    let plan = plan::Entity::find_by_id(plan_id)
      .one(&txn)
      .await?
      .ok_or(Error::NotFound(Resource::Plan))?;
    if !plan.active {
      return Err(Error::PlanUnavailable);
    }
    let server = self.config.server(&plan.location)?;

    let now = Utc::now().naive_utc();
    let payment = payment::ActiveModel {
      user_id: Set(user_id),
      plan_id: Set(plan.id),
      amount: Set(plan.price),
      status: Set(PaymentStatus::Pending),
      evidence: Set(evidence),
      created_at: Set(now),
      updated_at: Set(now),
      expires_at: Set(now + TimeDelta::days(self.config.auto_accept_days)),
      ..Default::default()
    }
    .insert(&txn)
    .await?;

    sv::Audit::record(
      &txn,
      Some(payment.id),
      Some(user_id),
      AuditAction::Submit,
      payment.evidence.clone(),
    )
    .await?;

    let credential = Provisioner::from_config(self.config).issue(
      server,
      plan.data_gib,
      self.config.temp_grant_days,
      Mode::Trial,
      now,
    )?;
    let grant = sv::Usage::insert(
      &txn,
      user_id,
      Some(payment.id),
      GrantKind::Temporary,
      &credential,
    )
    .await?;

    sv::Audit::record(
      &txn,
      Some(payment.id),
      Some(user_id),
      AuditAction::TempPlan,
      Some(format!("{} MB granted", grant.quota_mb)),
    )
    .await?;

    txn.commit().await?;

    info!(
      "payment #{} submitted by user {} for plan #{}, temporary grant {} MB",
      payment.id, user_id, plan.id, grant.quota_mb
    );
    Ok(Submission { payment, grant })
  }

  async fn try_transition(
    &self,
    payment_id: i32,
    transition: Transition,
    reason: Option<&str>,
  ) -> Result<Outcome> {
    let txn = self.db.begin().await?;

    let payment = payment::Entity::find_by_id(payment_id)
      .one(&txn)
      .await?
      .ok_or(Error::NotFound(Resource::Payment))?;

    let outcome = self
      .apply(&txn, payment, transition, reason, Utc::now().naive_utc())
      .await?;
    txn.commit().await?;

    Ok(outcome)
  }

  /// Applies `transition` to a previously read claim. The status guard on
  /// the update is what decides the winner, not the read.
  async fn apply<C: ConnectionTrait>(
    &self,
    txn: &C,
    payment: payment::Model,
    transition: Transition,
    reason: Option<&str>,
    now: DateTime,
  ) -> Result<Outcome> {
    let payment_id = payment.id;
    let target = payment.status.advance(transition)?;

    if transition == Transition::AutoAccept && !self.is_overdue(&payment, now)
    {
      return Err(Error::InvalidTransition { from: payment.status, to: target });
    }

    // Compare-and-set: a concurrent transition committed since our read
    // leaves zero rows matched.
    let updated = payment::Entity::update_many()
      .col_expr(payment::Column::Status, Expr::value(target.to_value()))
      .col_expr(payment::Column::UpdatedAt, Expr::value(now))
      .filter(payment::Column::Id.eq(payment_id))
      .filter(payment::Column::Status.eq(PaymentStatus::Pending))
      .exec(txn)
      .await?;

    if updated.rows_affected != 1 {
      debug!("payment #{payment_id}: lost race for {target}");
      return Err(Error::InvalidTransition {
        from: PaymentStatus::Pending,
        to: target,
      });
    }

    sv::Audit::record(
      txn,
      Some(payment.id),
      Some(payment.user_id),
      transition.into(),
      reason.map(Into::into),
    )
    .await?;

    if transition == Transition::AutoAccept
      && let Some(owner) =
        user::Entity::find_by_id(payment.user_id).one(txn).await?
      && owner.banned
    {
      warn!(
        "auto-accepting payment #{} of banned user {}",
        payment.id, payment.user_id
      );
    }

    let grant = match transition {
      Transition::Reject => {
        self.ban(txn, &payment, reason).await?;
        None
      }
      Transition::Accept | Transition::AutoAccept => {
        Some(self.activate(txn, &payment, now).await?)
      }
    };

    let payment =
      payment::Model { status: target, updated_at: now, ..payment };
    Ok(Outcome { payment, grant })
  }

  async fn activate<C: ConnectionTrait>(
    &self,
    conn: &C,
    payment: &payment::Model,
    now: DateTime,
  ) -> Result<usage_grant::Model> {
    let plan = plan::Entity::find_by_id(payment.plan_id)
      .one(conn)
      .await?
      .ok_or(Error::NotFound(Resource::Plan))?;
    let server = self.config.server(&plan.location)?;

    let credential = Provisioner::from_config(self.config).issue(
      server,
      plan.data_gib,
      plan.duration_days(),
      Mode::Full,
      now,
    )?;
    let grant = sv::Usage::insert(
      conn,
      payment.user_id,
      Some(payment.id),
      GrantKind::Full,
      &credential,
    )
    .await?;

    sv::Audit::record(
      conn,
      Some(payment.id),
      Some(payment.user_id),
      AuditAction::PlanActivated,
      Some(format!(
        "{} MB until {}",
        grant.quota_mb,
        grant.expires_at.format("%Y-%m-%d")
      )),
    )
    .await?;

    Ok(grant)
  }

  async fn ban<C: ConnectionTrait>(
    &self,
    conn: &C,
    payment: &payment::Model,
    reason: Option<&str>,
  ) -> Result<()> {
    let user = user::Entity::find_by_id(payment.user_id)
      .one(conn)
      .await?
      .ok_or(Error::NotFound(Resource::User))?;

    user::ActiveModel { banned: Set(true), ..user.into() }
      .update(conn)
      .await?;

    sv::Audit::record(
      conn,
      Some(payment.id),
      Some(payment.user_id),
      AuditAction::Ban,
      reason.map(Into::into),
    )
    .await?;

    warn!(
      "user {} banned after rejected payment #{}",
      payment.user_id, payment.id
    );
    Ok(())
  }

  fn is_overdue(&self, payment: &payment::Model, now: DateTime) -> bool {
    now - payment.created_at >= TimeDelta::days(self.config.auto_accept_days)
  }

  /// Pending claims old enough to be auto-accepted at `now`.
  pub async fn overdue(&self, now: DateTime) -> Result<Vec<payment::Model>> {
    let threshold = now - TimeDelta::days(self.config.auto_accept_days);
    Ok(
      payment::Entity::find()
        .filter(payment::Column::Status.eq(PaymentStatus::Pending))
        .filter(payment::Column::CreatedAt.lte(threshold))
        .order_by_asc(payment::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn by_id(&self, payment_id: i32) -> Result<Option<payment::Model>> {
    Ok(payment::Entity::find_by_id(payment_id).one(self.db).await?)
  }

  pub async fn pending(&self) -> Result<Vec<payment::Model>> {
    Ok(
      payment::Entity::find()
        .filter(payment::Column::Status.eq(PaymentStatus::Pending))
        .order_by_asc(payment::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn by_user(&self, user_id: i64) -> Result<Vec<payment::Model>> {
    Ok(
      payment::Entity::find()
        .filter(payment::Column::UserId.eq(user_id))
        .order_by_desc(payment::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn all(&self) -> Result<Vec<payment::Model>> {
    Ok(
      payment::Entity::find()
        .order_by_asc(payment::Column::Id)
        .all(self.db)
        .await?,
    )
  }
}

fn transition_name(transition: Transition) -> &'static str {
  match transition {
    Transition::Accept => "accept",
    Transition::Reject => "reject",
    Transition::AutoAccept => "auto_accept",
  }
}
