use std::sync::Arc;

use clear_shared::CategoryRecord;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiClient, TaskPage};
use crate::category::{CategoryChange, ChangeAction};
use crate::datetime::is_plain_date;
use crate::error::{ClientError, ClientResult};
use crate::filter::{Cursor, Filters, StatusFilter, TaskQuery, total_pages};
use crate::task::{DEFAULT_CATEGORY_NAME, Task, TaskDraft, TaskPatch};

/// Identifies one issued listing request. Only the most recently issued
/// ticket may change the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub query: TaskQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Stale,
}

/// The paginated, filtered view of the user's tasks.
///
/// Every mutation replaces the task snapshot instead of editing it, so a
/// snapshot handed out earlier never changes under its holder.
#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks: Arc<[Task]>,
    total: u64,
    loading: bool,
    initialized: bool,
    cursor: Cursor,
    seq: u64,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(Cursor::default())
    }
}

impl TaskStore {
    pub fn new(cursor: Cursor) -> Self {
        Self {
            tasks: Arc::from(Vec::new()),
            total: 0,
            loading: false,
            initialized: false,
            cursor,
            seq: 0,
        }
    }

    pub fn snapshot(&self) -> Arc<[Task]> {
        Arc::clone(&self.tasks)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.completed)
    }

    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.completed)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Records a new listing request for the current cursor.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        let query = self.cursor.query();
        self.issue(query)
    }

    /// Applies a listing result if `ticket` is still the latest one issued.
    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: ClientResult<TaskPage>,
    ) -> ClientResult<FetchOutcome> {
        if self.is_stale(&ticket) {
            return Ok(FetchOutcome::Stale);
        }
        self.loading = false;

        let page = result.inspect_err(|err| {
            error!(error = %err, "failed to fetch tasks; keeping previous list");
        })?;

        debug!(
            seq = ticket.seq,
            count = page.tasks.len(),
            total = page.total,
            pages = page.total_pages,
            "applying task page"
        );
        self.tasks = Arc::from(page.tasks);
        self.total = page.total;
        self.cursor.total_pages = page.total_pages;
        self.cursor.current_page = if page.total_pages == 0 {
            1
        } else {
            page.current_page.max(1)
        };
        self.initialized = true;
        Ok(FetchOutcome::Applied)
    }

    /// Reloads the current page. Without a token this does nothing.
    #[instrument(skip_all, fields(page = self.cursor.current_page))]
    pub async fn fetch(&mut self, api: &ApiClient, token: Option<&str>) -> ClientResult<()> {
        let Some(token) = active(token) else {
            debug!("not logged in; skipping task fetch");
            return Ok(());
        };

        self.load_current(api, token).await?;

        let cursor = &self.cursor;
        if cursor.total_pages > 0 && cursor.current_page > cursor.total_pages {
            info!(
                page = cursor.current_page,
                last = cursor.total_pages,
                "page out of range; reloading last page"
            );
            self.cursor.current_page = self.cursor.total_pages;
            self.load_current(api, token).await?;
        }
        Ok(())
    }

    /// Creates a task, then shows page one as the server orders it.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn add(
        &mut self,
        api: &ApiClient,
        token: Option<&str>,
        draft: &TaskDraft,
    ) -> ClientResult<Option<Task>> {
        if draft.title.trim().is_empty() {
            return Err(ClientError::Validation("task title cannot be empty".to_string()));
        }
        let Some(token) = active(token) else {
            debug!("not logged in; skipping add");
            return Ok(None);
        };

        self.loading = true;
        let created = api.add_task(Some(token), draft).await;
        self.loading = false;
        let created = created.inspect_err(|err| error!(error = %err, "failed to add task"))?;

        self.cursor.current_page = 1;
        self.settle(api, token).await;
        api.notifier()
            .success(format!("Task \"{}\" added", created.title));
        Ok(Some(created))
    }

    /// Sends a partial edit. A completion change that moves the task out of
    /// the active status filter reloads the page; anything else is patched
    /// into the local list.
    #[instrument(skip(self, api, token, patch))]
    pub async fn update(
        &mut self,
        api: &ApiClient,
        token: Option<&str>,
        id: &str,
        patch: &TaskPatch,
    ) -> ClientResult<()> {
        if patch.is_empty() {
            debug!("empty patch; nothing to send");
            return Ok(());
        }
        let Some(token) = active(token) else {
            debug!("not logged in; skipping update");
            return Ok(());
        };

        self.loading = true;
        let result = api.update_task(Some(token), id, patch).await;
        self.loading = false;
        result.inspect_err(|err| error!(error = %err, "failed to update task"))?;

        let message = match patch.completed {
            Some(true) => "Task marked as done",
            Some(false) => "Task marked as not done",
            None => "Task updated",
        };

        if let Some(completed) = patch.completed
            && self.cursor.filters.evicts_on_completion(completed)
        {
            debug!(id, "task left the status filter; reloading");
            api.notifier().success(message);
            self.settle(api, token).await;
            return Ok(());
        }

        if self.get(id).is_some() {
            self.tasks = self
                .tasks
                .iter()
                .cloned()
                .map(|mut task| {
                    if task.id == id {
                        patch.apply_to(&mut task);
                    }
                    task
                })
                .collect();
            api.notifier().success(message);
        } else {
            warn!(id, "updated task is not on the current page");
        }
        Ok(())
    }

    pub async fn toggle_completion(&mut self, api: &ApiClient, token: Option<&str>, id: &str) -> ClientResult<()> {
        let Some(task) = self.get(id) else {
            return Err(ClientError::Validation(format!("no task {id} on this page")));
        };
        let patch = TaskPatch::completion(!task.completed);
        self.update(api, token, id, &patch).await
    }

    /// Deletes a task and keeps the current page consistent: a short page
    /// is topped up with the first record of the following page, an empty
    /// page steps back one page.
    #[instrument(skip(self, api, token))]
    pub async fn delete(&mut self, api: &ApiClient, token: Option<&str>, id: &str) -> ClientResult<()> {
        let Some(token) = active(token) else {
            debug!("not logged in; skipping delete");
            return Ok(());
        };

        self.loading = true;
        let result = api.delete_task(Some(token), id).await;
        self.loading = false;
        result.inspect_err(|err| error!(error = %err, "failed to delete task"))?;
        api.notifier().success("Task deleted");

        let remaining = self
            .tasks
            .iter()
            .filter(|t| t.id != id)
            .cloned()
            .collect::<Vec<_>>();
        if remaining.len() < self.tasks.len() {
            self.total = self.total.saturating_sub(1);
        }
        let len = remaining.len();
        self.tasks = Arc::from(remaining);

        if len < self.cursor.items_per_page && self.cursor.has_next() {
            if len == 0 {
                // Nothing left to top up; the page itself is gone.
                self.settle(api, token).await;
            } else if let Err(err) = self.backfill(api, token, len).await {
                warn!(error = %err, "task deleted but backfill failed; page is short");
            }
            return Ok(());
        }

        if len == 0 {
            if self.cursor.current_page > 1 {
                self.cursor.current_page -= 1;
                debug!(page = self.cursor.current_page, "page emptied; stepping back");
                self.settle(api, token).await;
                return Ok(());
            }
            self.cursor.total_pages = 0;
        }
        Ok(())
    }

    pub async fn next_page(&mut self, api: &ApiClient, token: Option<&str>) -> ClientResult<bool> {
        if !self.cursor.has_next() {
            return Ok(false);
        }
        self.cursor.current_page += 1;
        self.fetch(api, token).await.map(|()| true)
    }

    pub async fn prev_page(&mut self, api: &ApiClient, token: Option<&str>) -> ClientResult<bool> {
        if !self.cursor.has_prev() {
            return Ok(false);
        }
        self.cursor.current_page -= 1;
        self.fetch(api, token).await.map(|()| true)
    }

    /// Jumps to `page`; a page past the end settles on the last one.
    pub async fn go_to_page(&mut self, api: &ApiClient, token: Option<&str>, page: u64) -> ClientResult<()> {
        self.cursor.current_page = page.max(1);
        self.fetch(api, token).await
    }

    pub async fn set_category(
        &mut self,
        api: &ApiClient,
        token: Option<&str>,
        category_id: Option<String>,
    ) -> ClientResult<()> {
        let category_id = category_id.filter(|c| !c.is_empty());
        if self.cursor.filters.category_id == category_id {
            return Ok(());
        }
        self.cursor.filters.category_id = category_id;
        self.refilter(api, token).await
    }

    pub async fn set_status(
        &mut self,
        api: &ApiClient,
        token: Option<&str>,
        status: Option<StatusFilter>,
    ) -> ClientResult<()> {
        if self.cursor.filters.status == status {
            return Ok(());
        }
        self.cursor.filters.status = status;
        self.refilter(api, token).await
    }

    /// Both bounds must look like `YYYY-MM-DD`; only the shape is checked.
    /// A rejected range leaves the store untouched.
    pub async fn set_date_range(
        &mut self,
        api: &ApiClient,
        token: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> ClientResult<()> {
        let start = start.filter(|d| !d.is_empty());
        let end = end.filter(|d| !d.is_empty());
        check_date_range(api, start, end)?;

        self.cursor.filters.start_date = start.map(str::to_string);
        self.cursor.filters.end_date = end.map(str::to_string);
        self.refilter(api, token).await
    }

    pub async fn set_keyword(&mut self, api: &ApiClient, token: Option<&str>, keyword: Option<String>) -> ClientResult<()> {
        self.cursor.filters.keyword = keyword
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.refilter(api, token).await
    }

    pub async fn clear_filters(&mut self, api: &ApiClient, token: Option<&str>) -> ClientResult<()> {
        self.cursor.filters = Default::default();
        self.refilter(api, token).await
    }

    /// Swaps in a whole filter set with a single reload. Dates are checked
    /// the same way [`Self::set_date_range`] checks them.
    pub async fn replace_filters(&mut self, api: &ApiClient, token: Option<&str>, filters: Filters) -> ClientResult<()> {
        check_date_range(api, filters.start_date.as_deref(), filters.end_date.as_deref())?;
        if filters == self.cursor.filters && self.initialized {
            return Ok(());
        }
        self.cursor.filters = filters;
        self.refilter(api, token).await
    }

    /// Brings cached tasks in line with a category mutation. Tasks of a
    /// deleted category become uncategorized; a rename relabels them.
    pub fn apply_category_change(&mut self, change: &CategoryChange, categories: &[CategoryRecord]) {
        let affected = self
            .tasks
            .iter()
            .filter(|t| t.category_id.as_deref() == Some(change.category_id.as_str()))
            .count();
        if affected == 0 {
            return;
        }

        let relabel = match change.action {
            ChangeAction::Add => return,
            ChangeAction::Delete => None,
            ChangeAction::Update => match categories.iter().find(|c| c.id == change.category_id) {
                Some(category) => Some(category.category_name.clone()),
                None => return,
            },
        };
        debug!(action = ?change.action, affected, "relabeling cached tasks");

        self.tasks = self
            .tasks
            .iter()
            .cloned()
            .map(|mut task| {
                if task.category_id.as_deref() == Some(change.category_id.as_str()) {
                    match &relabel {
                        Some(name) => task.category = name.clone(),
                        None => {
                            task.category_id = None;
                            task.category = DEFAULT_CATEGORY_NAME.to_string();
                        }
                    }
                }
                task
            })
            .collect();

        if change.action == ChangeAction::Delete
            && self.cursor.filters.category_id.as_deref() == Some(change.category_id.as_str())
        {
            self.cursor.filters.category_id = None;
        }
    }

    /// Drops all state, keeping only the page size.
    pub fn reset(&mut self) {
        let seq = self.seq;
        *self = Self::new(Cursor::new(self.cursor.items_per_page));
        // In-flight tickets from before the reset stay stale.
        self.seq = seq + 1;
    }

    /// Reloads after a mutation the server already accepted. A failed
    /// reload keeps the last good list and does not fail the mutation.
    async fn settle(&mut self, api: &ApiClient, token: &str) {
        if let Err(err) = self.fetch(api, Some(token)).await {
            warn!(error = %err, "change saved but reload failed; view may be stale");
        }
    }

    async fn refilter(&mut self, api: &ApiClient, token: Option<&str>) -> ClientResult<()> {
        self.cursor.current_page = 1;
        self.fetch(api, token).await
    }

    async fn load_current(&mut self, api: &ApiClient, token: &str) -> ClientResult<FetchOutcome> {
        let ticket = self.begin_fetch();
        let result = api.list_tasks(Some(token), &ticket.query).await;
        self.finish_fetch(ticket, result)
    }

    /// Appends the record that slid onto this page after a delete. `len`
    /// records remain, so the replacement sits at absolute position
    /// `(page - 1) * size + len + 1`.
    async fn backfill(&mut self, api: &ApiClient, token: &str, len: usize) -> ClientResult<()> {
        let size = self.cursor.items_per_page as u64;
        let position = (self.cursor.current_page - 1) * size + len as u64 + 1;
        let ticket = self.issue(TaskQuery {
            page: position,
            page_size: 1,
            filters: self.cursor.filters.clone(),
        });
        debug!(position, "backfilling page after delete");

        let result = api.list_tasks(Some(token), &ticket.query).await;
        if self.is_stale(&ticket) {
            return Ok(());
        }
        self.loading = false;
        let page = result.inspect_err(|err| error!(error = %err, "failed to backfill page"))?;

        let mut tasks = self.tasks.to_vec();
        for task in page.tasks {
            if tasks.iter().all(|t| t.id != task.id) {
                tasks.push(task);
            }
        }
        self.tasks = Arc::from(tasks);
        self.total = page.total;
        self.cursor.total_pages = total_pages(page.total, self.cursor.items_per_page);
        Ok(())
    }

    fn issue(&mut self, query: TaskQuery) -> FetchTicket {
        self.seq += 1;
        self.loading = true;
        FetchTicket {
            seq: self.seq,
            query,
        }
    }

    fn is_stale(&self, ticket: &FetchTicket) -> bool {
        let stale = ticket.seq != self.seq;
        if stale {
            debug!(seq = ticket.seq, latest = self.seq, "discarding stale task response");
        }
        stale
    }
}

fn active(token: Option<&str>) -> Option<&str> {
    token.filter(|t| !t.is_empty())
}

fn check_date_range(api: &ApiClient, start: Option<&str>, end: Option<&str>) -> ClientResult<()> {
    for (label, value) in [("start", start), ("end", end)] {
        if let Some(value) = value
            && !is_plain_date(value)
        {
            let message = format!("Invalid {label} date {value:?}, expected YYYY-MM-DD");
            api.notifier().error(message.clone());
            return Err(ClientError::Validation(message));
        }
    }
    Ok(())
}
