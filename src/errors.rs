use actix_web::{http::StatusCode, HttpResponse};
use derive_more::Display;
use serde_json::json;

#[derive(Debug, Display)]
pub enum ServerError {
    #[display(fmt = "Unauthorized")]
    Unauthorized,
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "annotation {} was not found", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    StoreFailure(String),
}

impl From<r2d2::Error> for ServerError {
    fn from(err: r2d2::Error) -> ServerError {
        ServerError::StoreFailure(err.to_string())
    }
}

impl From<diesel::result::Error> for ServerError {
    fn from(err: diesel::result::Error) -> ServerError {
        ServerError::StoreFailure(err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> ServerError {
        ServerError::StoreFailure(err.to_string())
    }
}

impl From<actix_web::error::BlockingError> for ServerError {
    fn from(err: actix_web::error::BlockingError) -> ServerError {
        ServerError::StoreFailure(err.to_string())
    }
}

impl actix_web::error::ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServerError::Unauthorized => HttpResponse::Unauthorized().finish(),
            ServerError::StoreFailure(msg) => {
                log::error!("store failure: {msg}");
                HttpResponse::InternalServerError().json(json!({ "error": msg }))
            }
            _ => HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() })),
        }
    }
}
