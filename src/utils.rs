use crate::prelude::*;

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

/// Prices are stored in minor units.
pub fn format_price(minor: i64, currency: &str) -> String {
  format!("{}.{:02} {}", minor / 100, (minor % 100).abs(), currency)
}

pub fn format_quota(mb: i64) -> String {
  if mb >= 1024 && mb % 1024 == 0 {
    format!("{} GiB", mb / 1024)
  } else {
    format!("{mb} MB")
  }
}

/// Parse a decimal amount like `9.5` or `12.00` into minor units.
pub fn parse_price(input: &str) -> Option<i64> {
  let input = input.trim();
  let (whole, frac) = input.split_once('.').unwrap_or((input, ""));
  let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
  if frac.len() > 2 || !digits(whole) || !digits(frac) {
    return None;
  }

  let whole: i64 = whole.parse().ok()?;
  let frac: i64 = match frac.len() {
    0 => 0,
    1 => frac.parse::<i64>().ok()? * 10,
    _ => frac.parse().ok()?,
  };
  whole.checked_mul(100)?.checked_add(frac)
}
