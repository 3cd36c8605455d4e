//! Proof of payment following a plan selection.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use super::{ReplyBot, callback, command};
use crate::{
  i18n,
  prelude::*,
  state::AppState,
  sv::{provision, review::Submission},
  utils,
};

/// Stored form of whatever the customer sent as proof.
fn evidence_of(msg: &Message) -> Option<String> {
  if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
    return Some(format!("photo:{}", photo.file.id));
  }
  if let Some(document) = msg.document() {
    return Some(format!("document:{}", document.file.id));
  }
  msg.text().map(|text| format!("text:{}", text.trim()))
}

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  msg: Message,
) -> ResponseResult<()> {
  if let Some(text) = msg.text()
    && text.starts_with('/')
  {
    bot.reply_html(command::help()).await?;
    return Ok(());
  }

  let Some((_, selection)) = app.selections.remove(&bot.user_id) else {
    return Ok(());
  };

  let sv = app.sv();
  let locale = sv.user.locale(bot.user_id).await;

  if msg.text().is_some_and(|text| text.trim().eq_ignore_ascii_case("cancel")) {
    bot.reply_html(i18n::t(&locale, "cancelled")).await?;
    return Ok(());
  }

  let Some(evidence) = evidence_of(&msg) else {
    // Stickers and the like; keep waiting for real proof.
    app.selections.insert(bot.user_id, selection);
    return Ok(());
  };

  let Submission { payment, grant } =
    match sv.review.submit(bot.user_id, selection.plan_id, Some(evidence)).await
    {
      Ok(submission) => submission,
      Err(Error::PlanUnavailable | Error::NotFound(Resource::Plan)) => {
        bot.reply_html(i18n::t(&locale, "plan_unavailable")).await?;
        return Ok(());
      }
      Err(err) => {
        error!("submit failed for user {}: {err}", bot.user_id);
        bot.reply_html(format!("❌ {}", err.user_message())).await?;
        return Ok(());
      }
    };

  bot
    .reply_html(format!(
      "{}\n<code>{}</code>",
      i18n::t(&locale, "payment_pending"),
      provision::share_link(&grant.config_payload)
    ))
    .await?;

  let username = bot.infer_username(msg.chat.id).await;
  let text = format!(
    "💳 <b>New payment #{}</b>\n\
    From: {} (<code>{}</code>)\n\
    Amount: {}\n\
    Auto-accept: {}\n\n\
    /reject {} &lt;reason&gt;",
    payment.id,
    username,
    payment.user_id,
    utils::format_price(payment.amount, &app.config.currency),
    utils::format_date(payment.expires_at),
    payment.id,
  );
  bot
    .notify_admins(&app.admins, &text, Some(callback::review_menu(payment.id)))
    .await;

  for &admin in &app.admins {
    if let Err(err) =
      bot.inner.forward_message(ChatId(admin), msg.chat.id, msg.id).await
    {
      warn!("Failed to forward evidence to admin {admin}: {err}");
    }
  }

  Ok(())
}
