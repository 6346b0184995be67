use clear_shared::{Credentials, SessionUser, UserStatus};
use tracing::{info, instrument, warn};

use crate::api::ApiClient;
use crate::datastore::DataStore;
use crate::error::{ClientError, ClientResult};

pub const SESSION_KEY: &str = "user";
pub const REDIRECT_KEY: &str = "redirectToLoginWhenNotAuth";
pub const DEFAULT_THEME_ID: i64 = 1;

/// Who is logged in. The persisted session under [`SESSION_KEY`] is the only
/// source of truth; this struct mirrors it in memory.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    user: Option<SessionUser>,
}

impl AuthState {
    pub fn load(storage: &DataStore) -> Self {
        let user = storage
            .get_json::<SessionUser>(SESSION_KEY)
            .map(normalize_theme);
        if let Some(user) = &user {
            info!(username = %user.username, "restored session");
        }
        Self { user }
    }

    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn login(
        &mut self,
        api: &ApiClient,
        storage: &mut DataStore,
        credentials: &Credentials,
    ) -> ClientResult<&SessionUser> {
        validate_credentials(credentials)?;
        let user = api.login(credentials).await?;
        self.establish(storage, user)?;
        api.notifier().success("Logged in");
        self.user.as_ref().ok_or(ClientError::Unauthenticated)
    }

    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn register(
        &mut self,
        api: &ApiClient,
        storage: &mut DataStore,
        credentials: &Credentials,
    ) -> ClientResult<&SessionUser> {
        validate_credentials(credentials)?;
        let user = api.register(credentials).await?;
        self.establish(storage, user)?;
        api.notifier().success("Registered");
        self.user.as_ref().ok_or(ClientError::Unauthenticated)
    }

    pub fn logout(&mut self, storage: &mut DataStore) -> ClientResult<()> {
        if let Some(user) = self.user.take() {
            info!(username = %user.username, "logged out");
        }
        storage.remove(SESSION_KEY)?;
        Ok(())
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.tk.as_str())
            .filter(|tk| !tk.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn theme_id(&self) -> Option<i64> {
        self.user.as_ref().and_then(|u| u.theme)
    }

    /// Records the chosen palette in the session, then in storage.
    pub fn set_theme(&mut self, storage: &mut DataStore, theme_id: i64) -> ClientResult<()> {
        let Some(user) = self.user.as_mut() else {
            return Err(ClientError::Unauthenticated);
        };
        user.theme = Some(theme_id);
        storage.set_json(SESSION_KEY, user)?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        api: &ApiClient,
        old_password: &str,
        new_password: &str,
    ) -> ClientResult<()> {
        if new_password.is_empty() {
            return Err(ClientError::Validation(
                "new password cannot be empty".to_string(),
            ));
        }
        api.update_password(self.token(), old_password, new_password)
            .await
    }

    pub async fn stats(&self, api: &ApiClient) -> ClientResult<UserStatus> {
        api.user_status(self.token()).await
    }

    fn establish(&mut self, storage: &mut DataStore, user: SessionUser) -> ClientResult<()> {
        let user = normalize_theme(user);
        if user.tk.is_empty() {
            warn!(username = %user.username, "server returned a session without a token");
        }
        storage.set_json(SESSION_KEY, &user)?;
        info!(username = %user.username, theme = ?user.theme, "session established");
        self.user = Some(user);
        Ok(())
    }
}

/// Client preferences kept next to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub redirect_to_login: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redirect_to_login: true,
        }
    }
}

impl Settings {
    pub fn load(storage: &DataStore) -> Self {
        match storage.get(REDIRECT_KEY) {
            Some(raw) => Self {
                redirect_to_login: raw == "1",
            },
            None => Self::default(),
        }
    }

    pub fn set_redirect_to_login(&mut self, storage: &mut DataStore, enabled: bool) -> ClientResult<()> {
        self.redirect_to_login = enabled;
        storage.set(REDIRECT_KEY, if enabled { "1" } else { "0" })?;
        Ok(())
    }
}

fn normalize_theme(mut user: SessionUser) -> SessionUser {
    if user.theme.is_none_or(|t| t < DEFAULT_THEME_ID) {
        user.theme = Some(DEFAULT_THEME_ID);
    }
    user
}

fn validate_credentials(credentials: &Credentials) -> ClientResult<()> {
    if credentials.username.trim().is_empty() || credentials.password.is_empty() {
        return Err(ClientError::Validation(
            "username and password are required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clear_shared::SessionUser;
    use tempfile::tempdir;

    use super::{AuthState, SESSION_KEY, Settings};
    use crate::datastore::DataStore;

    fn user(tk: &str, theme: Option<i64>) -> SessionUser {
        SessionUser {
            id: "1".to_string(),
            username: "a".to_string(),
            tk: tk.to_string(),
            theme,
        }
    }

    #[test]
    fn restored_session_normalizes_theme() {
        let temp = tempdir().expect("tempdir");
        let mut storage = DataStore::open(temp.path()).expect("open");
        storage
            .set_json(SESSION_KEY, &user("T", Some(0)))
            .expect("seed");

        let auth = AuthState::load(&storage);
        assert!(auth.is_authenticated());
        assert_eq!(auth.theme_id(), Some(1));
        assert_eq!(auth.token(), Some("T"));
    }

    #[test]
    fn empty_token_is_not_authenticated() {
        let temp = tempdir().expect("tempdir");
        let mut storage = DataStore::open(temp.path()).expect("open");
        storage.set_json(SESSION_KEY, &user("", Some(3))).expect("seed");

        let auth = AuthState::load(&storage);
        assert!(auth.user().is_some());
        assert!(!auth.is_authenticated());
        assert_eq!(auth.theme_id(), Some(3));
    }

    #[test]
    fn logout_and_set_theme() {
        let temp = tempdir().expect("tempdir");
        let mut storage = DataStore::open(temp.path()).expect("open");
        storage.set_json(SESSION_KEY, &user("T", None)).expect("seed");

        let mut auth = AuthState::load(&storage);
        auth.set_theme(&mut storage, 4).expect("set theme");
        assert_eq!(
            storage.get_json::<SessionUser>(SESSION_KEY).and_then(|u| u.theme),
            Some(4)
        );

        auth.logout(&mut storage).expect("logout");
        assert!(!auth.is_authenticated());
        assert_eq!(storage.get(SESSION_KEY), None);
        assert!(auth.set_theme(&mut storage, 2).is_err());
    }

    #[test]
    fn redirect_flag_defaults_on_and_persists() {
        let temp = tempdir().expect("tempdir");
        let mut storage = DataStore::open(temp.path()).expect("open");
        let mut settings = Settings::load(&storage);
        assert!(settings.redirect_to_login);

        settings
            .set_redirect_to_login(&mut storage, false)
            .expect("set");
        assert!(!Settings::load(&storage).redirect_to_login);
    }
}
