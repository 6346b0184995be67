use serde::{
  Deserialize,
  Deserializer,
  Serialize
};
use serde_json::Value;

/// Business status code the backend uses
/// for a successful call.
pub const SUCCESS_CODE: i64 = 1;

/// Backend status code for a task that is
/// still in progress.
pub const STATUS_IN_PROGRESS: i64 = 1;

/// Backend status code for a finished
/// task.
pub const STATUS_DONE: i64 = 2;

/// The `{code, msg, data}` wrapper every
/// backend response uses.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Envelope<T> {
  pub code: i64,
  #[serde(default)]
  pub msg:  Option<String>,
  #[serde(default = "Option::default")]
  pub data: Option<T>
}

impl<T> Envelope<T> {
  pub fn is_success(&self) -> bool {
    self.code == SUCCESS_CODE
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct Credentials {
  pub username: String,
  pub password: String
}

/// Session object returned by login and
/// register, persisted verbatim by the
/// client.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct SessionUser {
  #[serde(
    deserialize_with = "string_or_number"
  )]
  pub id:       String,
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub tk:       String,
  #[serde(
    default,
    deserialize_with = "lenient_theme"
  )]
  pub theme:    Option<i64>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct CategoryRecord {
  #[serde(
    alias = "categoryId",
    deserialize_with = "string_or_number"
  )]
  pub id:            String,
  #[serde(
    rename = "categoryName",
    alias = "name",
    default
  )]
  pub category_name: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct CategoryAdd {
  pub name: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct CategoryUpdate {
  pub name: String,
  pub id:   String
}

/// A task as the backend lists it.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
  #[serde(
    default,
    deserialize_with = "opt_string_or_number"
  )]
  pub id:            Option<String>,
  #[serde(default)]
  pub title:         Option<String>,
  #[serde(default)]
  pub content:       Option<String>,
  #[serde(default)]
  pub status:        Option<i64>,
  #[serde(
    default,
    deserialize_with = "opt_string_or_number"
  )]
  pub category_id:   Option<String>,
  #[serde(default)]
  pub category_name: Option<String>,
  #[serde(default)]
  pub due_date:      Option<String>,
  #[serde(default)]
  pub created_at:    Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct TodoPage {
  #[serde(default)]
  pub records: Option<Vec<TodoRecord>>,
  #[serde(default)]
  pub total:   u64
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TodoCreate {
  pub title:       String,
  pub content:     String,
  pub category_id: Option<String>,
  pub due_date:    Option<String>
}

/// Partial task update. Absent fields are
/// left untouched by the backend.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct TodoUpdate {
  pub id:          String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub status:      Option<i64>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub content:     Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub category_id: Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
  #[serde(default)]
  pub username:      Option<String>,
  #[serde(default)]
  pub num_of_done:   u64,
  #[serde(default)]
  pub num_of_undone: u64
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
  pub old_password: String,
  pub new_password: String
}

fn value_to_id(
  value: Value
) -> Option<String> {
  match value {
    | Value::String(s) => Some(s),
    | Value::Number(n) => {
      Some(n.to_string())
    }
    | _ => None
  }
}

fn string_or_number<'de, D>(
  deserializer: D
) -> Result<String, D::Error>
where
  D: Deserializer<'de>
{
  let value =
    Value::deserialize(deserializer)?;
  value_to_id(value).ok_or_else(|| {
    serde::de::Error::custom(
      "expected a string or number id"
    )
  })
}

fn opt_string_or_number<'de, D>(
  deserializer: D
) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>
{
  let value =
    Value::deserialize(deserializer)?;
  Ok(value_to_id(value))
}

// Older sessions stored the theme as a
// string or null; anything non-numeric is
// dropped and normalized later.
fn lenient_theme<'de, D>(
  deserializer: D
) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>
{
  let value =
    Value::deserialize(deserializer)?;
  Ok(value.as_i64())
}
