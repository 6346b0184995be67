use std::time::Duration;

use chrono::{Local, Utc};
use clear_shared::{
    CategoryAdd, CategoryRecord, CategoryUpdate, Credentials, PasswordChange, SessionUser,
    TodoCreate, TodoPage, TodoUpdate, UserStatus,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::datetime::format_due_date;
use crate::envelope::{self, Decoded};
use crate::error::{ClientError, ClientResult};
use crate::filter::{TaskQuery, total_pages};
use crate::notify::Notifier;
use crate::task::{DEFAULT_CATEGORY_NAME, Task, TaskDraft, TaskPatch, status_code};

/// One page of normalized tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

/// HTTP client for the to-do backend.
///
/// Each method performs exactly one request. Failures carrying a server
/// message raise an error toast on the shared [`Notifier`]; everything else
/// fails silently and is left to the caller.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    notifier: Notifier,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, notifier: Notifier) -> ClientResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            notifier,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &Credentials) -> ClientResult<SessionUser> {
        let request = self.http.post(self.url("/user/login")).json(credentials);
        decode_data(self.send(request, false).await?)
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn register(&self, credentials: &Credentials) -> ClientResult<SessionUser> {
        let request = self.http.post(self.url("/user/register")).json(credentials);
        decode_data(self.send(request, false).await?)
    }

    /// Persists the 1-based palette index for the logged-in user.
    #[instrument(skip(self, token))]
    pub async fn update_theme(&self, token: Option<&str>, theme_id: usize) -> ClientResult<()> {
        let token = bearer(token)?;
        let request = self
            .http
            .put(self.url(&format!("/user/theme/{theme_id}")))
            .bearer_auth(token);
        self.send(request, true).await.map(|_| ())
    }

    #[instrument(skip(self, token))]
    pub async fn user_status(&self, token: Option<&str>) -> ClientResult<UserStatus> {
        let token = bearer(token)?;
        let request = self.http.get(self.url("/user/status")).bearer_auth(token);
        decode_data(self.send(request, false).await?)
    }

    #[instrument(skip_all)]
    pub async fn update_password(
        &self,
        token: Option<&str>,
        old_password: &str,
        new_password: &str,
    ) -> ClientResult<()> {
        let token = bearer(token)?;
        let body = PasswordChange {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        let request = self
            .http
            .put(self.url("/user/pwd"))
            .bearer_auth(token)
            .json(&body);
        self.send(request, true).await.map(|_| ())
    }

    #[instrument(skip(self, token))]
    pub async fn list_categories(&self, token: Option<&str>) -> ClientResult<Vec<CategoryRecord>> {
        let token = bearer(token)?;
        let request = self.http.get(self.url("/category")).bearer_auth(token);
        let data = self.send(request, false).await?;
        if data.is_null() {
            return Ok(vec![]);
        }
        decode_data(data)
    }

    /// Creates a category and returns the id the server assigned, when it
    /// reports one.
    #[instrument(skip(self, token))]
    pub async fn add_category(&self, token: Option<&str>, name: &str) -> ClientResult<Option<String>> {
        let token = bearer(token)?;
        let body = CategoryAdd {
            name: name.to_string(),
        };
        let request = self
            .http
            .post(self.url("/category"))
            .bearer_auth(token)
            .json(&body);
        let data = self.send(request, false).await?;
        Ok(confirmed_id(&data, &["id", "categoryId"]))
    }

    #[instrument(skip(self, token))]
    pub async fn update_category(&self, token: Option<&str>, id: &str, name: &str) -> ClientResult<()> {
        let token = bearer(token)?;
        let body = CategoryUpdate {
            name: name.to_string(),
            id: id.to_string(),
        };
        let request = self
            .http
            .post(self.url("/category"))
            .bearer_auth(token)
            .json(&body);
        self.send(request, false).await.map(|_| ())
    }

    #[instrument(skip(self, token))]
    pub async fn delete_category(&self, token: Option<&str>, id: &str) -> ClientResult<()> {
        let token = bearer(token)?;
        let request = self
            .http
            .delete(self.url(&format!("/category/{id}")))
            .bearer_auth(token);
        self.send(request, false).await.map(|_| ())
    }

    #[instrument(skip(self, token), fields(page = query.page, page_size = query.page_size))]
    pub async fn list_tasks(&self, token: Option<&str>, query: &TaskQuery) -> ClientResult<TaskPage> {
        let token = bearer(token)?;
        let request = self
            .http
            .get(self.url("/todo"))
            .bearer_auth(token)
            .query(&query.params());
        let data = self.send(request, false).await?;
        let page: TodoPage = if data.is_null() {
            TodoPage::default()
        } else {
            decode_data(data)?
        };

        let Some(records) = page.records else {
            return Ok(TaskPage {
                tasks: vec![],
                total: 0,
                total_pages: 0,
                current_page: 1,
            });
        };

        let now = Utc::now().to_rfc3339();
        let stamp = Local::now().timestamp_millis();
        let tasks = records
            .into_iter()
            .enumerate()
            .map(|(idx, record)| Task::from_record(record, &format!("{stamp}{idx}"), &now))
            .collect::<Vec<_>>();

        debug!(count = tasks.len(), total = page.total, "listed tasks");
        Ok(TaskPage {
            tasks,
            total: page.total,
            total_pages: total_pages(page.total, query.page_size),
            current_page: query.page,
        })
    }

    #[instrument(skip(self, token, draft), fields(title = %draft.title))]
    pub async fn add_task(&self, token: Option<&str>, draft: &TaskDraft) -> ClientResult<Task> {
        let token = bearer(token)?;
        let body = TodoCreate {
            title: draft.title.clone(),
            content: draft.content.clone(),
            category_id: draft.category_id.clone(),
            due_date: draft.due_date.map(format_due_date),
        };
        let request = self
            .http
            .post(self.url("/todo"))
            .bearer_auth(token)
            .json(&body);
        let data = self.send(request, false).await?;

        let id = confirmed_id(&data, &["id"])
            .unwrap_or_else(|| Local::now().timestamp_millis().to_string());
        Ok(Task {
            id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            category: draft
                .category
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY_NAME.to_string()),
            category_id: draft.category_id.clone(),
            due_date: body.due_date,
            completed: false,
            created_at: Utc::now().to_rfc3339(),
        })
    }

    #[instrument(skip(self, token, patch))]
    pub async fn update_task(&self, token: Option<&str>, id: &str, patch: &TaskPatch) -> ClientResult<()> {
        let token = bearer(token)?;
        let body = update_payload(id, patch);
        let request = self
            .http
            .post(self.url("/todo"))
            .bearer_auth(token)
            .json(&body);
        self.send(request, false).await.map(|_| ())
    }

    #[instrument(skip(self, token))]
    pub async fn delete_task(&self, token: Option<&str>, id: &str) -> ClientResult<()> {
        let token = bearer(token)?;
        let request = self
            .http
            .delete(self.url(&format!("/todo/{id}")))
            .bearer_auth(token);
        self.send(request, false).await.map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, notify_success: bool) -> ClientResult<Value> {
        let response = request.send().await.map_err(|err| {
            warn!(error = %err, "request failed before a response");
            ClientError::Transport(err)
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!(status, len = body.len(), "received response");

        let outcome = envelope::decode(status, &body);
        self.report_outcome(&outcome, notify_success);
        outcome.map(|decoded| decoded.data)
    }

    /// The notification layer: turns a classified outcome into at most one
    /// toast.
    fn report_outcome(&self, outcome: &Result<Decoded, ClientError>, notify_success: bool) {
        match outcome {
            Ok(decoded) if notify_success => {
                if let Some(message) = envelope::success_message(decoded) {
                    self.notifier.success(message);
                }
            }
            Ok(_) => {}
            Err(err) => {
                if let Some(message) = err.notification() {
                    self.notifier.error(message);
                } else {
                    debug!(error = %err, "silent failure");
                }
            }
        }
    }
}

fn bearer(token: Option<&str>) -> ClientResult<&str> {
    token
        .filter(|t| !t.trim().is_empty())
        .ok_or(ClientError::Unauthenticated)
}

fn decode_data<T: DeserializeOwned>(data: Value) -> ClientResult<T> {
    Ok(serde_json::from_value(data)?)
}

/// Extracts an id from a mutation response: either a bare string/number or
/// one of `keys` on an object.
fn confirmed_id(data: &Value, keys: &[&str]) -> Option<String> {
    let candidate = match data {
        Value::Object(map) => keys.iter().find_map(|k| map.get(*k)),
        other => Some(other),
    }?;
    match candidate {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn update_payload(id: &str, patch: &TaskPatch) -> TodoUpdate {
    let status = patch.completed.map(status_code);
    if patch.is_completion_only() {
        return TodoUpdate {
            id: id.to_string(),
            status,
            ..TodoUpdate::default()
        };
    }
    TodoUpdate {
        id: id.to_string(),
        status,
        title: patch.title.clone(),
        content: patch.content.clone(),
        category_id: patch.category_id.clone(),
        due_date: patch.due_date.map(format_due_date),
    }
}
