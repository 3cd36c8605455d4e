//! Customer-facing strings. Placeholders are `{name}` and filled by
//! [`format`].

const EN: &[(&str, &str)] = &[
  ("start", "Welcome! Choose your language with /lang en or /lang fa, then see /plans."),
  ("language_selected", "Great, I'll use English."),
  ("price_preview", "Current price: {price}."),
  (
    "payment_instructions",
    "Pay {price} and send the payment proof (photo, document or text). /cancel to abort.",
  ),
  ("plan_unavailable", "Plan not available. Please try again."),
  ("trial_taken", "You already used your free trial."),
  ("trial_granted", "Here is your free trial config:"),
  ("payment_pending", "Payment pending manual review. Temporary config:"),
  ("payment_accepted", "Payment accepted! Here is your full configuration:"),
  ("payment_rejected", "Payment rejected. Contact support."),
  ("cancelled", "Cancelled."),
  ("my_plans", "Your plans:"),
  ("no_plans", "You have no plans yet. See /plans."),
  ("stats", "Users: {users}, Active Plans: {plans}, Pending Payments: {pending}"),
];

const FA: &[(&str, &str)] = &[
  ("start", "خوش آمدید! زبان را با /lang en یا /lang fa انتخاب کنید و سپس /plans را ببینید."),
  ("language_selected", "عالی، از این پس فارسی صحبت می‌کنم."),
  ("price_preview", "قیمت فعلی: {price}."),
  ("payment_instructions", "مبلغ {price} را پرداخت کرده و رسید را ارسال کنید. برای لغو /cancel"),
  ("plan_unavailable", "این پلن موجود نیست. دوباره تلاش کنید."),
  ("trial_taken", "شما قبلاً تست رایگان دریافت کرده‌اید."),
  ("trial_granted", "پلن تست رایگان شما:"),
  ("payment_pending", "پرداخت در انتظار تایید است. پلن موقت:"),
  ("payment_accepted", "پرداخت تایید شد! کانفیگ کامل:"),
  ("payment_rejected", "پرداخت رد شد. با پشتیبانی تماس بگیرید."),
  ("cancelled", "لغو شد."),
  ("my_plans", "پلن‌های شما:"),
  ("no_plans", "هنوز پلنی ندارید. /plans را ببینید."),
  ("stats", "کاربران: {users}، پلن‌های فعال: {plans}، پرداخت‌های در انتظار: {pending}"),
];

fn table(locale: &str) -> &'static [(&'static str, &'static str)] {
  match locale {
    "fa" => FA,
    _ => EN,
  }
}

fn lookup(
  table: &'static [(&'static str, &'static str)],
  key: &str,
) -> Option<&'static str> {
  table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Unknown locales fall back to English, unknown keys to the key itself.
pub fn t<'a>(locale: &str, key: &'a str) -> &'a str {
  lookup(table(locale), key).or_else(|| lookup(EN, key)).unwrap_or(key)
}

pub fn format(locale: &str, key: &str, args: &[(&str, &str)]) -> String {
  args.iter().fold(t(locale, key).to_string(), |text, (name, value)| {
    text.replace(&format!("{{{name}}}"), value)
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_english_key_is_translated() {
    for (key, _) in EN {
      assert!(lookup(FA, key).is_some(), "missing fa translation for {key}");
    }
  }

  #[test]
  fn falls_back_to_english_then_key() {
    assert_eq!(t("de", "trial_taken"), "You already used your free trial.");
    assert_eq!(t("fa", "no_such_key"), "no_such_key");
  }

  #[test]
  fn fills_placeholders() {
    let text =
      format("en", "stats", &[("users", "3"), ("plans", "2"), ("pending", "1")]);
    assert_eq!(text, "Users: 3, Active Plans: 2, Pending Payments: 1");
  }
}
