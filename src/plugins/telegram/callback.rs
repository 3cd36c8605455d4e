use std::sync::Arc;

use teloxide::{
  prelude::*,
  types::{InlineKeyboardButton, InlineKeyboardMarkup},
};

use super::{ReplyBot, command};
use crate::{entity::plan, i18n, prelude::*, state::AppState, sv::user::LOCALES};

/// Callback data enum - provides type-safe callback handling
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
  Lang(String),
  Plan(i32),
  Accept(i32),
}

impl Callback {
  pub fn to_data(&self) -> String {
    match self {
      Callback::Lang(code) => format!("lang:{code}"),
      Callback::Plan(id) => format!("plan:{id}"),
      Callback::Accept(id) => format!("accept:{id}"),
    }
  }

  pub fn from_data(data: &str) -> Option<Self> {
    let (kind, arg) = data.split_once(':')?;
    match kind {
      "lang" if LOCALES.contains(&arg) => Some(Callback::Lang(arg.into())),
      "plan" => arg.parse().ok().map(Callback::Plan),
      "accept" => arg.parse().ok().map(Callback::Accept),
      _ => None,
    }
  }
}

pub fn language_menu() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![
    InlineKeyboardButton::callback("English", Callback::Lang("en".into()).to_data()),
    InlineKeyboardButton::callback("فارسی", Callback::Lang("fa".into()).to_data()),
  ]])
}

pub fn plans_menu(plans: &[plan::Model]) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(plans.iter().map(|plan| {
    vec![InlineKeyboardButton::callback(
      format!(
        "{} · {}mo · {}u · {}GiB",
        plan.location, plan.duration_months, plan.max_users, plan.data_gib
      ),
      Callback::Plan(plan.id).to_data(),
    )]
  }))
}

pub fn review_menu(payment_id: i32) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
    "✅ Accept",
    Callback::Accept(payment_id).to_data(),
  )]])
}

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  data: &str,
) -> ResponseResult<()> {
  let Some(callback) = Callback::from_data(data) else {
    debug!("unknown callback data `{data}` from {}", bot.user_id);
    return Ok(());
  };

  let sv = app.sv();
  if let Err(err) = sv.user.get_or_create(bot.user_id, None).await {
    bot.reply_html(format!("❌ {}", err.user_message())).await?;
    return Ok(());
  }

  match callback {
    Callback::Lang(code) => {
      let text = match sv.user.set_locale(bot.user_id, &code).await {
        Ok(user) => i18n::t(&user.locale, "language_selected").to_string(),
        Err(err) => format!("❌ {}", err.user_message()),
      };
      bot.edit_html(text).await?;
    }
    Callback::Plan(id) => match sv.plan.by_id(id).await {
      Ok(Some(plan)) if plan.active => {
        command::select_plan(&app, &bot, &plan).await?;
      }
      Ok(_) => {
        let locale = sv.user.locale(bot.user_id).await;
        bot.reply_html(i18n::t(&locale, "plan_unavailable")).await?;
      }
      Err(err) => {
        bot.reply_html(format!("❌ {}", err.user_message())).await?;
      }
    },
    Callback::Accept(id) if app.is_admin(bot.user_id) => {
      let text = match sv.review.accept(id).await {
        Ok(outcome) => {
          super::notify_outcome(&app, &outcome).await;
          format!("✅ Payment #{id} accepted.")
        }
        Err(err) => format!("❌ #{id}: {}", err.user_message()),
      };
      bot.reply_html(text).await?;
    }
    Callback::Accept(_) => {}
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn data_round_trips() {
    for callback in
      [Callback::Lang("fa".into()), Callback::Plan(4), Callback::Accept(9)]
    {
      assert_eq!(Callback::from_data(&callback.to_data()), Some(callback));
    }
  }

  #[test]
  fn rejects_unknown_data() {
    assert_eq!(Callback::from_data("lang:de"), None);
    assert_eq!(Callback::from_data("plan:x"), None);
    assert_eq!(Callback::from_data("profile"), None);
  }
}
