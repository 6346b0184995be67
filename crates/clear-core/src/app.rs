use std::path::{Path, PathBuf};

use anyhow::Context;
use clear_shared::Credentials;
use tracing::{debug, info, instrument};

use crate::api::ApiClient;
use crate::category::CategoryStore;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::error::ClientResult;
use crate::filter::Cursor;
use crate::notify::Notifier;
use crate::session::{AuthState, Settings};
use crate::tasks::TaskStore;
use crate::theme::{Palette, ThemeSwitcher};

pub const CURSOR_KEY: &str = "cursor";
pub const THEME_CSS_FILE: &str = "theme.css";

/// Everything one client session owns. Handlers receive this explicitly.
#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub storage: DataStore,
    pub notifier: Notifier,
    pub api: ApiClient,
    pub auth: AuthState,
    pub settings: Settings,
    pub categories: CategoryStore,
    pub tasks: TaskStore,
    pub theme: ThemeSwitcher,
}

impl App {
    pub fn open(config: Config, data_dir: &Path) -> anyhow::Result<Self> {
        let base_url = config.api_base_url();
        Self::with_base_url(config, data_dir, &base_url)
    }

    #[instrument(skip(config, data_dir))]
    pub fn with_base_url(config: Config, data_dir: &Path, base_url: &str) -> anyhow::Result<Self> {
        let storage = DataStore::open(data_dir)
            .with_context(|| format!("failed to open datastore at {}", data_dir.display()))?;
        let notifier = Notifier::new(config.toast_duration()?);
        let api = ApiClient::new(base_url, config.http_timeout()?, notifier.clone())
            .context("failed to build HTTP client")?;

        let page_size = config.page_size()?;
        let mut cursor = storage.get_json::<Cursor>(CURSOR_KEY).unwrap_or_default();
        cursor.items_per_page = page_size;

        let auth = AuthState::load(&storage);
        let settings = Settings::load(&storage);
        info!(base_url, authenticated = auth.is_authenticated(), "client ready");

        Ok(Self {
            config,
            storage,
            notifier,
            api,
            auth,
            settings,
            categories: CategoryStore::default(),
            tasks: TaskStore::new(cursor),
            theme: ThemeSwitcher::default(),
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.auth.token()
    }

    pub fn data_dir(&self) -> &Path {
        &self.storage.data_dir
    }

    /// Logs in and starts from a clean slate for the new user.
    pub async fn login(&mut self, credentials: &Credentials) -> ClientResult<()> {
        self.auth
            .login(&self.api, &mut self.storage, credentials)
            .await?;
        self.start_session()
    }

    pub async fn register(&mut self, credentials: &Credentials) -> ClientResult<()> {
        self.auth
            .register(&self.api, &mut self.storage, credentials)
            .await?;
        self.start_session()
    }

    /// Ends the session and drops every cached view so nothing leaks into
    /// the next one.
    pub fn logout(&mut self) -> ClientResult<()> {
        self.auth.logout(&mut self.storage)?;
        self.tasks.reset();
        self.categories.reset();
        self.storage.remove(CURSOR_KEY)?;
        Ok(())
    }

    pub async fn add_category(&mut self, name: &str) -> ClientResult<()> {
        let token = self.auth.token();
        self.categories.add(&self.api, token, name).await?;
        self.propagate_category_change();
        Ok(())
    }

    pub async fn rename_category(&mut self, id: &str, name: &str) -> ClientResult<()> {
        let token = self.auth.token();
        self.categories.update(&self.api, token, id, name).await?;
        self.propagate_category_change();
        Ok(())
    }

    pub async fn delete_category(&mut self, id: &str) -> ClientResult<()> {
        let token = self.auth.token();
        self.categories.delete(&self.api, token, id).await?;
        self.propagate_category_change();
        Ok(())
    }

    pub async fn apply_theme(&mut self, name: &str) -> ClientResult<&'static Palette> {
        self.theme
            .apply(name, &self.api, &mut self.auth, &mut self.storage)
            .await
    }

    pub fn init_theme(&mut self) -> &'static Palette {
        self.theme.init(&self.auth)
    }

    /// Writes the active root style where a front end can pick it up.
    pub fn write_theme_css(&self) -> anyhow::Result<PathBuf> {
        let css = self.theme.root_style().to_css();
        self.storage.write_file(THEME_CSS_FILE, &css)
    }

    pub fn save_cursor(&mut self) -> anyhow::Result<()> {
        let cursor = self.tasks.cursor().clone();
        self.storage.set_json(CURSOR_KEY, &cursor)
    }

    fn propagate_category_change(&mut self) {
        if let Some(change) = self.categories.take_change() {
            debug!(?change, "applying category change to tasks");
            self.tasks
                .apply_category_change(&change, self.categories.categories());
        }
    }

    fn start_session(&mut self) -> ClientResult<()> {
        self.tasks.reset();
        self.categories.reset();
        self.storage.remove(CURSOR_KEY)?;
        self.theme.init(&self.auth);
        Ok(())
    }
}
