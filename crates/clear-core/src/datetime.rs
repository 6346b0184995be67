use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Local,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeDelta
};
use regex::Regex;

/// Wire format for due dates sent to the
/// backend, local time, no zone.
pub const DUE_DATE_FORMAT: &str =
  "%Y-%m-%d %H:%M:%S";

const PLAIN_DATE_FORMAT: &str =
  "%Y-%m-%d";

fn plain_date_re() -> Option<&'static Regex>
{
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$")
      .ok()
  })
  .as_ref()
}

fn relative_re() -> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^\+(?P<num>[0-9]+)(?P<unit>[dh])$"
    )
    .ok()
  })
  .as_ref()
}

/// Shape-only check for `YYYY-MM-DD`.
///
/// Calendar validity is the backend's
/// concern: `2024-13-01` passes here.
#[must_use]
pub fn is_plain_date(value: &str) -> bool {
  plain_date_re()
    .map(|re| re.is_match(value))
    .unwrap_or(false)
}

#[must_use]
pub fn format_due_date(
  due: NaiveDateTime
) -> String {
  due.format(DUE_DATE_FORMAT).to_string()
}

/// Parses a due date typed by the user.
///
/// Accepts `YYYY-MM-DD` (midnight),
/// `YYYY-MM-DD HH:MM[:SS]`, the same with a
/// `T` separator, RFC 3339 (converted to
/// local time), `today`, `tomorrow` and
/// relative `+Nd`/`+Nh`.
pub fn parse_due_input(
  input: &str,
  now: NaiveDateTime
) -> anyhow::Result<NaiveDateTime> {
  let token = input.trim();
  if token.is_empty() {
    return Err(anyhow!(
      "due date cannot be empty"
    ));
  }

  match token
    .to_ascii_lowercase()
    .as_str()
  {
    | "today" => {
      return Ok(
        now.date().and_time(NaiveTime::MIN)
      );
    }
    | "tomorrow" => {
      let next =
        now.date().succ_opt().ok_or_else(
          || anyhow!("date out of range")
        )?;
      return Ok(next.and_time(NaiveTime::MIN));
    }
    | _ => {}
  }

  if let Some(relative) =
    parse_relative(token, now)
  {
    return relative;
  }

  if let Ok(date) = NaiveDate::parse_from_str(
    token,
    PLAIN_DATE_FORMAT
  ) {
    return Ok(
      date.and_time(NaiveTime::MIN)
    );
  }

  for fmt in [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M"
  ] {
    if let Ok(parsed) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(parsed);
    }
  }

  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(
      parsed
        .with_timezone(&Local)
        .naive_local()
    );
  }

  Err(anyhow!(
    "unrecognized date: {token} (expected \
     YYYY-MM-DD, YYYY-MM-DD HH:MM[:SS], \
     today, tomorrow or +Nd)"
  ))
}

/// Renders a backend timestamp for the
/// task table. Unknown shapes are shown
/// verbatim.
#[must_use]
pub fn display_due(raw: &str) -> String {
  let raw = raw.trim();
  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(raw)
  {
    return parsed
      .with_timezone(&Local)
      .format("%Y-%m-%d %H:%M")
      .to_string();
  }
  for fmt in [
    DUE_DATE_FORMAT,
    "%Y-%m-%dT%H:%M:%S"
  ] {
    if let Ok(parsed) =
      NaiveDateTime::parse_from_str(
        raw, fmt
      )
    {
      return parsed
        .format("%Y-%m-%d %H:%M")
        .to_string();
    }
  }
  raw.to_string()
}

/// `None` when `token` is not a `+Nd`/`+Nh`
/// offset at all.
fn parse_relative(
  token: &str,
  now: NaiveDateTime
) -> Option<anyhow::Result<NaiveDateTime>> {
  let caps = relative_re()?.captures(token)?;
  let raw = caps.name("num")?.as_str();
  let offset = raw
    .parse::<i64>()
    .ok()
    .and_then(|num| {
      match caps.name("unit")?.as_str() {
        | "d" => TimeDelta::try_days(num),
        | "h" => TimeDelta::try_hours(num),
        | _ => None
      }
    })
    .and_then(|delta| {
      now.checked_add_signed(delta)
    });
  Some(offset.ok_or_else(|| {
    anyhow!("due offset +{raw} is out of range")
  }))
}
