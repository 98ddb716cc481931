use thiserror::Error;

/// Failure reported by the network collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Transport or HTTP failure. `retriable` is the collaborator's hint.
    #[error("Network error: {message}")]
    Network { message: String, retriable: bool },

    /// The API answered with a structured error.
    #[error("Server error {code}: {message}")]
    Server { code: i64, message: String },

    /// The payload did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn network(message: impl Into<String>, retriable: bool) -> Self {
        ClientError::Network {
            message: message.into(),
            retriable,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ClientError::Decode(message.into())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<piwigo_model::ModelError> for ClientError {
    fn from(err: piwigo_model::ModelError) -> Self {
        ClientError::Decode(err.to_string())
    }
}

/// Errors surfaced by the cache: stores, registry, uploads.
///
/// `Clone` so one failed page fetch can be handed to every caller that
/// attached to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Network error: {message}")]
    Network { message: String, retriable: bool },

    #[error("Server rejected the request ({code}): {message}")]
    ServerRejection { code: i64, message: String },

    #[error("Malformed server response: {0}")]
    Decode(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Superseded by a newer generation. Absorbed by the store API.
    #[error("Operation superseded (generation {generation})")]
    StaleOperation { generation: u64 },
}

impl CacheError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        CacheError::InvalidState(message.into())
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, CacheError::StaleOperation { .. })
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, CacheError::Network { retriable: true, .. })
    }

    /// Text to show a user: the server's message when there is one,
    /// otherwise a generic connectivity message.
    pub fn user_message(&self) -> String {
        match self {
            CacheError::ServerRejection { message, .. } if !message.trim().is_empty() => {
                message.clone()
            }
            CacheError::InvalidState(message) => message.clone(),
            _ => "Connection to the Piwigo server failed. Please try again.".to_string(),
        }
    }
}

impl From<ClientError> for CacheError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network { message, retriable } => {
                CacheError::Network { message, retriable }
            }
            ClientError::Server { code, message } => {
                CacheError::ServerRejection { code, message }
            }
            ClientError::Decode(message) => CacheError::Decode(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_onto_the_cache_taxonomy() {
        let err: CacheError = ClientError::network("reset", true).into();
        assert!(err.is_retriable());

        let err: CacheError = ClientError::Server {
            code: 403,
            message: "Access denied".into(),
        }
        .into();
        assert_eq!(err.user_message(), "Access denied");

        let err: CacheError = ClientError::decode("missing stat").into();
        assert!(matches!(err, CacheError::Decode(_)));
    }

    #[test]
    fn empty_server_messages_fall_back_to_generic_text() {
        let err = CacheError::ServerRejection {
            code: 1002,
            message: "  ".into(),
        };
        assert!(err.user_message().contains("Connection"));
        assert!(!err.is_retriable());
    }
}
