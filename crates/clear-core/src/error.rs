use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Http(u16),

    /// Business failure carrying a server-supplied message.
    #[error("{0}")]
    Api(String),

    #[error("request rejected by server (code {code})")]
    Rejected { code: i64 },

    #[error("not logged in")]
    Unauthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("theme not found: {0}")]
    ThemeNotFound(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ClientError {
    /// Message that must reach the user as an error toast, if any.
    ///
    /// Only server-supplied messages are surfaced; transport failures and
    /// responses without a message propagate silently.
    pub fn notification(&self) -> Option<&str> {
        match self {
            ClientError::Api(message) if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ClientError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::ClientError;

    #[test]
    fn only_api_messages_are_user_visible() {
        assert_eq!(
            ClientError::Api("duplicate name".to_string()).notification(),
            Some("duplicate name")
        );
        assert_eq!(ClientError::Http(500).notification(), None);
        assert_eq!(ClientError::Rejected { code: 0 }.notification(), None);
        assert_eq!(ClientError::Unauthenticated.notification(), None);
        assert_eq!(ClientError::Api("  ".to_string()).notification(), None);
    }
}
