use ntex::web;
use serde::Serialize;
use spdlog::error;
use thiserror::Error;

use crate::store::StoreError;

/// Request-level failures, one variant per HTTP outcome. Store errors keep
/// their detail for the log line only; the wire response stays generic so
/// nothing internal (paths, connection strings) leaks to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

impl ApiError {
    pub fn post_not_found() -> ApiError {
        ApiError::NotFound("Blog post not found".to_string())
    }

    pub fn to_response(&self) -> web::HttpResponse {
        match self {
            ApiError::BadRequest(message) => {
                web::HttpResponse::BadRequest().json(&ErrorBody { message })
            }
            ApiError::NotFound(message) => {
                web::HttpResponse::NotFound().json(&ErrorBody { message })
            }
            ApiError::Store(err) => {
                error!("Store failure: {}", err);
                web::HttpResponse::InternalServerError().json(&ErrorBody {
                    message: "Internal server error",
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let bad = ApiError::BadRequest("Invalid limit parameter".to_string());
        assert_eq!(bad.to_response().status().as_u16(), 400);

        let missing = ApiError::post_not_found();
        assert_eq!(missing.to_response().status().as_u16(), 404);

        let store = ApiError::Store(StoreError::Config("boom".to_string()));
        assert_eq!(store.to_response().status().as_u16(), 500);
    }

    #[test]
    fn test_not_found_message_is_stable() {
        assert_eq!(ApiError::post_not_found().to_string(), "Blog post not found");
    }
}
