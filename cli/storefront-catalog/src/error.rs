//! Error handling for gateway operations.

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::ErrorBody;

/// Common error type for catalog API operations.
///
/// [CatalogClientError::Network] covers an unreachable gateway and timeouts,
/// [CatalogClientError::Request] an error status with a message.
#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error("could not reach the catalog")]
    Network(#[source] reqwest::Error),
    #[error("{}", fmt_request_error(.status, .message))]
    Request { status: StatusCode, message: String },
    #[error("item not found")]
    NotFound,
    #[error("invalid response from catalog")]
    InvalidResponse(#[source] serde_json::Error),
    #[error("invalid catalog url '{0}'")]
    InvalidUrl(String, #[source] url::ParseError),
    #[error("{0}")]
    Other(String),
}

impl CatalogClientError {
    /// Turn a generic 404 into [CatalogClientError::NotFound].
    ///
    /// Only meaningful for endpoints addressing a single item,
    /// listings answer 404 only if the API itself is misconfigured.
    pub(crate) fn into_not_found(self) -> Self {
        match self {
            CatalogClientError::Request { status, .. } if status == StatusCode::NOT_FOUND => {
                CatalogClientError::NotFound
            },
            other => other,
        }
    }
}

/// Errors uploading binary objects.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no object store configured")]
    NotConfigured,
    #[error("could not reach the object store")]
    Network(#[source] reqwest::Error),
    #[error("{}", fmt_request_error(.status, .message))]
    Request { status: StatusCode, message: String },
    #[error("invalid response from object store")]
    InvalidResponse(#[source] serde_json::Error),
    #[error("invalid object store url '{0}'")]
    InvalidUrl(String, #[source] url::ParseError),
}

/// Extension trait for converting unsuccessful responses into client errors.
pub trait MapResponseErrorExt: Sized {
    /// Passes successful responses through and consumes any other response,
    /// extracting the error message from its body.
    fn map_response_error(
        self,
    ) -> impl std::future::Future<Output = Result<Self, CatalogClientError>> + Send;
}

impl MapResponseErrorExt for reqwest::Response {
    async fn map_response_error(self) -> Result<Self, CatalogClientError> {
        if self.status().is_success() {
            return Ok(self);
        }

        let (status, message) = read_error_response(self).await;
        Err(CatalogClientError::Request { status, message })
    }
}

/// Read the status and a human readable message from an error response.
///
/// The API reports errors as `{ "error": <msg> }` or `{ "message": <msg> }`.
/// Bodies that don't match either are dropped,
/// they may well contain HTML from a proxy in front of the API.
pub(crate) async fn read_error_response(resp: reqwest::Response) -> (StatusCode, String) {
    let status = resp.status();
    let message = match resp.bytes().await {
        Ok(body) => serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message),
        Err(_) => None,
    };

    (status, message.unwrap_or_default())
}

fn fmt_request_error(status: &StatusCode, message: &str) -> String {
    if message.is_empty() {
        return format!("{status}");
    }
    format!("{status}: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_includes_message() {
        let err = CatalogClientError::Request {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "price must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "422 Unprocessable Entity: price must be positive"
        );
    }

    #[test]
    fn request_error_without_message_shows_status() {
        let err = CatalogClientError::Request {
            status: StatusCode::BAD_GATEWAY,
            message: String::new(),
        };
        assert_eq!(err.to_string(), "502 Bad Gateway");
    }

    #[test]
    fn only_404_becomes_not_found() {
        let not_found = CatalogClientError::Request {
            status: StatusCode::NOT_FOUND,
            message: "Item not found".to_string(),
        };
        assert!(matches!(
            not_found.into_not_found(),
            CatalogClientError::NotFound
        ));

        let forbidden = CatalogClientError::Request {
            status: StatusCode::FORBIDDEN,
            message: String::new(),
        };
        assert!(matches!(
            forbidden.into_not_found(),
            CatalogClientError::Request { .. }
        ));
    }
}
