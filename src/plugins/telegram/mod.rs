mod callback;
mod command;
mod evidence;

use std::{collections::HashSet, sync::Arc};

use command::{AdminCommand, UserCommand};
use teloxide::{
  Bot,
  dispatching::{Dispatcher, HandlerExt, UpdateFilterExt},
  prelude::*,
  types::{
    BotCommandScope, CallbackQuery, ChatId, InlineKeyboardMarkup, Message,
    MessageId, ParseMode, Update,
  },
  utils::command::BotCommands,
};

use crate::{
  entity::PaymentStatus, i18n, prelude::*, state::AppState,
  sv::review::Outcome,
};

pub struct Plugin;

#[async_trait::async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    run_bot(app).await;
    Ok(())
  }
}

/// Users see only user commands, admins see both.
async fn setup_commands(bot: &Bot, admins: &HashSet<i64>) {
  if let Err(e) = bot
    .set_my_commands(UserCommand::bot_commands())
    .scope(BotCommandScope::Default)
    .await
  {
    warn!("Failed to set default commands: {}", e);
  }

  let mut admin_commands = UserCommand::bot_commands();
  admin_commands.extend(AdminCommand::bot_commands());

  for &admin_id in admins {
    if let Err(e) = bot
      .set_my_commands(admin_commands.clone())
      .scope(BotCommandScope::Chat { chat_id: ChatId(admin_id).into() })
      .await
    {
      warn!("Failed to set admin commands for {}: {}", admin_id, e);
    }
  }
}

pub async fn run_bot(app: Arc<AppState>) {
  info!("Starting Telegram bot...");

  let bot = app.bot.clone();
  setup_commands(&bot, &app.admins).await;

  let handler = teloxide::dptree::entry()
    .branch(
      Update::filter_message().filter_command::<UserCommand>().endpoint({
        let app = app.clone();
        move |bot: Bot, msg: Message, cmd: UserCommand| {
          let app = app.clone();
          command::handle_user(app, ReplyBot::from_message(bot, &msg), msg, cmd)
        }
      }),
    )
    .branch(
      Update::filter_message().filter_command::<AdminCommand>().endpoint({
        let app = app.clone();
        move |bot: Bot, msg: Message, cmd: AdminCommand| {
          let app = app.clone();
          command::handle_admin(app, ReplyBot::from_message(bot, &msg), cmd)
        }
      }),
    )
    .branch(Update::filter_message().endpoint({
      let app = app.clone();
      move |bot: Bot, msg: Message| {
        let app = app.clone();
        evidence::handle(app, ReplyBot::from_message(bot, &msg), msg)
      }
    }))
    .branch(Update::filter_callback_query().endpoint({
      let app = app.clone();
      move |bot: Bot, query: CallbackQuery| {
        let app = app.clone();
        callback_handle(app, bot, query)
      }
    }));

  let shutdown = app.shutdown.clone();
  let mut dispatcher = Dispatcher::builder(bot, handler).build();
  let token = dispatcher.shutdown_token();

  tokio::spawn(async move {
    shutdown.cancelled().await;
    if let Ok(done) = token.shutdown() {
      done.await;
    }
  });

  dispatcher.dispatch().await;
}

async fn callback_handle(
  app: Arc<AppState>,
  bot: Bot,
  query: CallbackQuery,
) -> ResponseResult<()> {
  if let Some(data) = query.data
    && let Some(msg) = query.message.as_ref()
  {
    let bot =
      ReplyBot::new(bot, query.from.id.0 as i64, msg.chat().id, msg.id());

    bot.inner.answer_callback_query(query.id.clone()).await?;

    callback::handle(app, bot, &data).await
  } else {
    Ok(())
  }
}

/// Tell the customer how their claim was decided.
pub async fn notify_outcome(app: &AppState, outcome: &Outcome) {
  let user_id = outcome.payment.user_id;
  let locale = app.sv().user.locale(user_id).await;

  let text = match (outcome.payment.status, &outcome.grant) {
    (PaymentStatus::Rejected, _) => {
      i18n::t(&locale, "payment_rejected").to_string()
    }
    (_, Some(grant)) => format!(
      "{}\n<code>{}</code>",
      i18n::t(&locale, "payment_accepted"),
      crate::sv::provision::share_link(&grant.config_payload)
    ),
    _ => return,
  };

  if let Err(err) = app
    .bot
    .send_message(ChatId(user_id), text)
    .parse_mode(ParseMode::Html)
    .await
  {
    warn!(
      "Failed to notify user {user_id} about payment #{}: {err}",
      outcome.payment.id
    );
  }
}

#[derive(Debug, Clone)]
struct ReplyBot {
  inner: Bot,
  pub user_id: i64,
  pub chat_id: ChatId,
  pub message_id: MessageId,
}

impl ReplyBot {
  pub fn new(
    inner: Bot,
    user_id: i64,
    chat_id: ChatId,
    message_id: MessageId,
  ) -> Self {
    Self { inner, user_id, chat_id, message_id }
  }

  fn from_message(inner: Bot, msg: &Message) -> Self {
    let user_id = msg.from.as_ref().map_or(msg.chat.id.0, |u| u.id.0 as i64);
    Self::new(inner, user_id, msg.chat.id, msg.id)
  }

  async fn reply_html(
    &self,
    text: impl Into<String>,
  ) -> ResponseResult<Message> {
    self
      .inner
      .send_message(self.chat_id, text.into())
      .parse_mode(ParseMode::Html)
      .await
  }

  async fn reply_with_keyboard(
    &self,
    text: impl Into<String>,
    keyboard: InlineKeyboardMarkup,
  ) -> ResponseResult<Message> {
    self
      .inner
      .send_message(self.chat_id, text.into())
      .parse_mode(ParseMode::Html)
      .reply_markup(keyboard)
      .await
  }

  async fn edit_html(&self, text: impl Into<String>) -> ResponseResult<()> {
    self
      .inner
      .edit_message_text(self.chat_id, self.message_id, text.into())
      .parse_mode(ParseMode::Html)
      .await?;
    Ok(())
  }

  /// Send to every admin; failures are only logged.
  async fn notify_admins(
    &self,
    admins: &HashSet<i64>,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
  ) {
    for &admin in admins {
      let mut req = self
        .inner
        .send_message(ChatId(admin), text)
        .parse_mode(ParseMode::Html);
      if let Some(keyboard) = &keyboard {
        req = req.reply_markup(keyboard.clone());
      }
      if let Err(err) = req.await {
        warn!("Failed to notify admin {admin}: {err}");
      }
    }
  }

  async fn infer_username(&self, chat_id: ChatId) -> String {
    match self.inner.get_chat(chat_id).await {
      Ok(chat) => {
        if let Some(username) = chat.username() {
          format!("@{}", username)
        } else {
          format!("<a href=\"tg://user?id={}\">unknown</a>", chat_id)
        }
      }
      Err(_) => format!("<code>{}</code> (API Error)", chat_id),
    }
  }
}
