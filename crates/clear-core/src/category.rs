use clear_shared::CategoryRecord;
use tracing::{debug, error, info, instrument};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Update,
    Delete,
}

/// Published after every confirmed category mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChange {
    pub action: ChangeAction,
    pub category_id: String,
}

/// Cached category list for the logged-in user.
#[derive(Debug, Clone, Default)]
pub struct CategoryStore {
    categories: Vec<CategoryRecord>,
    loading: bool,
    loaded: bool,
    error: Option<String>,
    change: Option<CategoryChange>,
}

impl CategoryStore {
    pub fn categories(&self) -> &[CategoryRecord] {
        &self.categories
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&CategoryRecord> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Case-insensitive lookup by id or display name.
    pub fn resolve(&self, key: &str) -> Option<&CategoryRecord> {
        self.get(key).or_else(|| {
            self.categories
                .iter()
                .find(|c| c.category_name.eq_ignore_ascii_case(key))
        })
    }

    /// Loads the list unless it is already cached.
    pub async fn fetch(&mut self, api: &ApiClient, token: Option<&str>) -> ClientResult<&[CategoryRecord]> {
        if self.loaded && !self.loading {
            debug!(count = self.categories.len(), "categories cached");
            return Ok(&self.categories);
        }
        self.refresh(api, token).await
    }

    #[instrument(skip_all)]
    pub async fn refresh(&mut self, api: &ApiClient, token: Option<&str>) -> ClientResult<&[CategoryRecord]> {
        self.loading = true;
        self.error = None;
        let result = api.list_categories(token).await;
        self.loading = false;

        match result {
            Ok(categories) => {
                info!(count = categories.len(), "loaded categories");
                self.categories = categories;
                self.loaded = true;
                Ok(&self.categories)
            }
            Err(err) => {
                error!(error = %err, "failed to load categories");
                self.categories.clear();
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    #[instrument(skip(self, api, token))]
    pub async fn add(&mut self, api: &ApiClient, token: Option<&str>, name: &str) -> ClientResult<()> {
        let name = validate_name(name)?;
        self.loading = true;
        self.error = None;
        let result = api.add_category(token, name).await;

        let outcome = match result {
            Ok(Some(id)) => {
                self.categories.push(CategoryRecord {
                    id: id.clone(),
                    category_name: name.to_string(),
                });
                self.publish(ChangeAction::Add, id);
                Ok(())
            }
            Ok(None) => {
                debug!("server did not confirm an id; reloading categories");
                self.refresh(api, token).await.map(|_| ())
            }
            Err(err) => Err(err),
        };
        self.loading = false;

        self.finish(outcome, "add", || format!("Category \"{name}\" added"), api)
    }

    #[instrument(skip(self, api, token))]
    pub async fn update(&mut self, api: &ApiClient, token: Option<&str>, id: &str, name: &str) -> ClientResult<()> {
        let name = validate_name(name)?;
        self.loading = true;
        self.error = None;
        let result = api.update_category(token, id, name).await;
        self.loading = false;

        let outcome = result.map(|()| {
            if let Some(category) = self.categories.iter_mut().find(|c| c.id == id) {
                category.category_name = name.to_string();
                self.publish(ChangeAction::Update, id.to_string());
            }
        });
        self.finish(outcome, "update", || format!("Category \"{name}\" updated"), api)
    }

    #[instrument(skip(self, api, token))]
    pub async fn delete(&mut self, api: &ApiClient, token: Option<&str>, id: &str) -> ClientResult<()> {
        self.loading = true;
        self.error = None;
        let result = api.delete_category(token, id).await;
        self.loading = false;

        let outcome = result.map(|()| {
            self.categories.retain(|c| c.id != id);
            self.publish(ChangeAction::Delete, id.to_string());
        });
        self.finish(outcome, "delete", || "Category deleted".to_string(), api)
    }

    /// Hands the most recent change to an observer, once.
    pub fn take_change(&mut self) -> Option<CategoryChange> {
        self.change.take()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn publish(&mut self, action: ChangeAction, category_id: String) {
        debug!(?action, category_id = %category_id, "category changed");
        self.change = Some(CategoryChange {
            action,
            category_id,
        });
    }

    fn finish(
        &mut self,
        outcome: ClientResult<()>,
        op: &str,
        message: impl FnOnce() -> String,
        api: &ApiClient,
    ) -> ClientResult<()> {
        match outcome {
            Ok(()) => {
                api.notifier().success(message());
                Ok(())
            }
            Err(err) => {
                error!(op, error = %err, "category mutation failed");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

fn validate_name(name: &str) -> ClientResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ClientError::Validation(
            "category name cannot be empty".to_string(),
        ));
    }
    Ok(name)
}
