use std::sync::Arc;

use teloxide::{
  prelude::*,
  types::Message,
  utils::{
    command::{BotCommands, ParseError},
    html,
  },
};

use super::{ReplyBot, callback};
use crate::{
  entity::plan,
  i18n,
  prelude::*,
  state::{self, AppState},
  sv::{plan::Selection, provision},
  utils,
};

fn parse_selection(
  input: String,
) -> std::result::Result<(String, i32, i32, i64), ParseError> {
  let usage = || {
    ParseError::IncorrectFormat(
      "Usage: /buy <location> <months> <users> <gib>\nExample: /buy germany 1 2 50"
        .into(),
    )
  };

  let parts: Vec<&str> = input.split_whitespace().collect();
  let [location, months, users, gib] = parts[..] else {
    return Err(usage());
  };

  Ok((
    location.to_lowercase(),
    months.parse().map_err(|_| usage())?,
    users.parse().map_err(|_| usage())?,
    gib.parse().map_err(|_| usage())?,
  ))
}

fn parse_reject(input: String) -> std::result::Result<(i32, String), ParseError> {
  let usage = || {
    ParseError::IncorrectFormat("Usage: /reject <payment_id> <reason>".into())
  };

  let (id, reason) = input.trim().split_once(' ').ok_or_else(usage)?;
  let reason = reason.trim();
  if reason.is_empty() {
    return Err(usage());
  }

  Ok((id.parse().map_err(|_| usage())?, reason.to_string()))
}

fn parse_addplan(
  input: String,
) -> std::result::Result<(String, i32, i32, i64, i64), ParseError> {
  let usage = || {
    ParseError::IncorrectFormat(
      "Usage: /addplan <location> <months> <users> <gib> <price>\nExample: /addplan france 3 1 100 12.50"
        .into(),
    )
  };

  let parts: Vec<&str> = input.split_whitespace().collect();
  let [location, months, users, gib, price] = parts[..] else {
    return Err(usage());
  };

  Ok((
    location.to_lowercase(),
    months.parse().map_err(|_| usage())?,
    users.parse().map_err(|_| usage())?,
    gib.parse().map_err(|_| usage())?,
    utils::parse_price(price).ok_or_else(usage)?,
  ))
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum UserCommand {
  #[command(description = "register and show the welcome message")]
  Start,
  #[command(description = "choose a language: en or fa")]
  Lang(String),
  #[command(description = "list available plans")]
  Plans,
  #[command(
    description = "pick a plan: <location> <months> <users> <gib>",
    parse_with = parse_selection
  )]
  Buy { location: String, months: i32, users: i32, gib: i64 },
  #[command(description = "show your payments and configs")]
  MyPlans,
  #[command(description = "get your one free trial")]
  Trial,
  #[command(description = "abort the current purchase")]
  Cancel,
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum AdminCommand {
  #[command(description = "list pending payments")]
  Pending,
  #[command(description = "accept a payment: <id>")]
  Accept(i32),
  #[command(
    description = "reject a payment and ban its owner: <id> <reason>",
    parse_with = parse_reject
  )]
  Reject { id: i32, reason: String },
  #[command(
    description = "add a plan: <location> <months> <users> <gib> <price>",
    parse_with = parse_addplan
  )]
  AddPlan { location: String, months: i32, users: i32, gib: i64, price: i64 },
  #[command(description = "stop selling a plan: <id>")]
  DisablePlan(i32),
  #[command(description = "show totals")]
  Stats,
}

/// Command list, escaped for HTML replies.
pub(super) fn help() -> String {
  html::escape(&UserCommand::descriptions().to_string())
}

pub(super) fn plan_line(plan: &plan::Model, currency: &str) -> String {
  format!(
    "<b>{}</b> · {} mo · {} user(s) · {} · {}",
    plan.location,
    plan.duration_months,
    plan.max_users,
    utils::format_quota(plan.data_gib.saturating_mul(provision::MB_PER_GIB)),
    utils::format_price(plan.price, currency)
  )
}

/// Remember the plan and ask for proof of payment.
pub(super) async fn select_plan(
  app: &AppState,
  bot: &ReplyBot,
  plan: &plan::Model,
) -> ResponseResult<()> {
  let locale = app.sv().user.locale(bot.user_id).await;
  let price = utils::format_price(plan.price, &app.config.currency);

  app.selections.insert(
    bot.user_id,
    state::Selection { plan_id: plan.id, at: Utc::now().naive_utc() },
  );

  bot
    .reply_html(format!(
      "{}\n{}",
      i18n::format(&locale, "price_preview", &[("price", &price)]),
      i18n::format(&locale, "payment_instructions", &[("price", &price)])
    ))
    .await?;
  Ok(())
}

pub async fn handle_user(
  app: Arc<AppState>,
  bot: ReplyBot,
  msg: Message,
  cmd: UserCommand,
) -> ResponseResult<()> {
  let sv = app.sv();
  let username = msg.from.as_ref().and_then(|u| u.username.as_deref());

  if let Err(err) = sv.user.get_or_create(bot.user_id, username).await {
    error!("Failed to register user {}: {err}", bot.user_id);
    bot.reply_html(format!("❌ {}", err.user_message())).await?;
    return Ok(());
  }
  let locale = sv.user.locale(bot.user_id).await;

  match cmd {
    UserCommand::Start => {
      bot
        .reply_with_keyboard(i18n::t(&locale, "start"), callback::language_menu())
        .await?;
    }
    UserCommand::Lang(code) => match sv.user.set_locale(bot.user_id, &code).await {
      Ok(user) => {
        bot.reply_html(i18n::t(&user.locale, "language_selected")).await?;
      }
      Err(err) => {
        bot.reply_html(format!("❌ {}", err.user_message())).await?;
      }
    },
    UserCommand::Plans => {
      let plans = match sv.plan.active().await {
        Ok(plans) => plans,
        Err(err) => {
          bot.reply_html(format!("❌ {}", err.user_message())).await?;
          return Ok(());
        }
      };

      if plans.is_empty() {
        bot.reply_html(i18n::t(&locale, "plan_unavailable")).await?;
        return Ok(());
      }

      let text = plans
        .iter()
        .map(|plan| plan_line(plan, &app.config.currency))
        .collect::<Vec<_>>()
        .join("\n");
      bot.reply_with_keyboard(text, callback::plans_menu(&plans)).await?;
    }
    UserCommand::Buy { location, months, users, gib } => {
      let selection = Selection {
        location,
        duration_months: months,
        max_users: users,
        data_gib: gib,
      };

      match sv.plan.find(&selection).await {
        Ok(plan) => select_plan(&app, &bot, &plan).await?,
        Err(Error::PlanUnavailable) => {
          bot.reply_html(i18n::t(&locale, "plan_unavailable")).await?;
        }
        Err(err) => {
          bot.reply_html(format!("❌ {}", err.user_message())).await?;
        }
      }
    }
    UserCommand::MyPlans => {
      let text = match my_plans(&app, bot.user_id, &locale).await {
        Ok(text) => text,
        Err(err) => format!("❌ {}", err.user_message()),
      };
      bot.reply_html(text).await?;
    }
    UserCommand::Trial => match sv.trial.grant(bot.user_id).await {
      Ok(grant) => {
        bot
          .reply_html(format!(
            "{}\n<code>{}</code>",
            i18n::t(&locale, "trial_granted"),
            provision::share_link(&grant.config_payload)
          ))
          .await?;
      }
      Err(Error::TrialAlreadyUsed) => {
        bot.reply_html(i18n::t(&locale, "trial_taken")).await?;
      }
      Err(err) => {
        bot.reply_html(format!("❌ {}", err.user_message())).await?;
      }
    },
    UserCommand::Cancel => {
      app.selections.remove(&bot.user_id);
      bot.reply_html(i18n::t(&locale, "cancelled")).await?;
    }
  }

  Ok(())
}

async fn my_plans(app: &AppState, user_id: i64, locale: &str) -> Result<String> {
  let sv = app.sv();
  let payments = sv.review.by_user(user_id).await?;
  let grants = sv.usage.by_user(user_id).await?;

  if payments.is_empty() && grants.is_empty() {
    return Ok(i18n::t(locale, "no_plans").to_string());
  }

  let mut text = format!("{}\n\n", i18n::t(locale, "my_plans"));
  for payment in &payments {
    let icon = if payment.status.is_terminal() { "🧾" } else { "⏳" };
    text.push_str(&format!(
      "{icon} #{} · {} · {}\n",
      payment.id,
      utils::format_price(payment.amount, &app.config.currency),
      payment.status
    ));
  }

  let now = Utc::now().naive_utc();
  for grant in grants.iter().filter(|grant| grant.expires_at > now) {
    text.push_str(&format!(
      "\n🔑 {} · {} · {}\n<code>{}</code>\n",
      grant.kind,
      utils::format_quota(grant.quota_mb),
      utils::format_date(grant.expires_at),
      provision::share_link(&grant.config_payload)
    ));
  }

  Ok(text)
}

pub async fn handle_admin(
  app: Arc<AppState>,
  bot: ReplyBot,
  cmd: AdminCommand,
) -> ResponseResult<()> {
  if !app.is_admin(bot.user_id) {
    return Ok(());
  }

  let text = match admin_command(&app, &bot, cmd).await {
    Ok(text) => text,
    Err(err) => format!("❌ {}", err.user_message()),
  };
  bot.reply_html(text).await?;
  Ok(())
}

async fn admin_command(
  app: &AppState,
  bot: &ReplyBot,
  cmd: AdminCommand,
) -> Result<String> {
  let sv = app.sv();

  match cmd {
    AdminCommand::Pending => {
      let pending = sv.review.pending().await?;
      if pending.is_empty() {
        return Ok("📭 No pending payments.".into());
      }

      let mut text = format!("⏳ <b>Pending payments ({})</b>\n\n", pending.len());
      for payment in &pending {
        let username = bot.infer_username(ChatId(payment.user_id)).await;
        text.push_str(&format!(
          "#{} · {} · {} · {} (auto {})\n",
          payment.id,
          username,
          utils::format_price(payment.amount, &app.config.currency),
          utils::format_date(payment.created_at),
          utils::format_date(payment.expires_at),
        ));
      }
      Ok(text)
    }
    AdminCommand::Accept(id) => {
      let outcome = sv.review.accept(id).await?;
      super::notify_outcome(app, &outcome).await;
      Ok(format!("✅ Payment #{id} accepted."))
    }
    AdminCommand::Reject { id, reason } => {
      let outcome = sv.review.reject(id, &reason).await?;
      super::notify_outcome(app, &outcome).await;
      Ok(format!(
        "⛔ Payment #{id} rejected, user <code>{}</code> banned.",
        outcome.payment.user_id
      ))
    }
    AdminCommand::AddPlan { location, months, users, gib, price } => {
      app.config.server(&location)?;

      let selection = Selection {
        location,
        duration_months: months,
        max_users: users,
        data_gib: gib,
      };
      let plan = sv.plan.create(selection, price).await?;
      info!("plan #{} added: {}", plan.id, plan.location);
      Ok(format!("➕ Plan #{} added\n{}", plan.id, plan_line(&plan, &app.config.currency)))
    }
    AdminCommand::DisablePlan(id) => {
      sv.plan.set_active(id, false).await?;
      app.selections.retain(|_, selection| selection.plan_id != id);
      info!("plan #{id} disabled");
      Ok(format!("🚫 Plan #{id} is no longer sold."))
    }
    AdminCommand::Stats => {
      let users = sv.user.count().await?.to_string();
      let plans = sv.usage.count_active().await?.to_string();
      let pending = sv.review.pending().await?.len().to_string();
      let locale = sv.user.locale(bot.user_id).await;

      Ok(i18n::format(
        &locale,
        "stats",
        &[("users", &users), ("plans", &plans), ("pending", &pending)],
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn help_escapes_argument_placeholders() {
    let help = help();
    assert!(!help.contains("<location>"));
    assert!(help.contains("&lt;location&gt; &lt;months&gt;"));
    assert!(help.contains("/buy"));
  }

  #[test]
  fn parses_buy_selection() {
    let cmd = UserCommand::parse("/buy Germany 1 2 50", "vpnbot").unwrap();
    assert_eq!(
      cmd,
      UserCommand::Buy { location: "germany".into(), months: 1, users: 2, gib: 50 }
    );
  }

  #[test]
  fn rejects_incomplete_buy() {
    assert!(UserCommand::parse("/buy germany 1", "vpnbot").is_err());
    assert!(UserCommand::parse("/buy germany one 1 50", "vpnbot").is_err());
  }

  #[test]
  fn reject_keeps_whole_reason() {
    let cmd =
      AdminCommand::parse("/reject 12 receipt is edited", "vpnbot").unwrap();
    assert_eq!(
      cmd,
      AdminCommand::Reject { id: 12, reason: "receipt is edited".into() }
    );
    assert!(AdminCommand::parse("/reject 12", "vpnbot").is_err());
  }

  #[test]
  fn addplan_takes_decimal_price() {
    let cmd = AdminCommand::parse("/addplan France 3 1 100 12.5", "vpnbot").unwrap();
    assert_eq!(
      cmd,
      AdminCommand::AddPlan {
        location: "france".into(),
        months: 3,
        users: 1,
        gib: 100,
        price: 1250
      }
    );
  }

  #[test]
  fn user_and_admin_commands_do_not_overlap() {
    assert!(UserCommand::parse("/accept 3", "vpnbot").is_err());
    assert!(AdminCommand::parse("/trial", "vpnbot").is_err());
  }

  #[test]
  fn plan_line_shows_quota_and_price() {
    let plan = plan::Model {
      id: 1,
      location: "france".into(),
      duration_months: 1,
      max_users: 2,
      data_gib: 50,
      price: 950,
      active: true,
    };
    assert_eq!(
      plan_line(&plan, "EUR"),
      "<b>france</b> · 1 mo · 2 user(s) · 50 GiB · 9.50 EUR"
    );
  }
}
