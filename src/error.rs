use mongodb::bson::{de::Error as BsonDeError, ser::Error as BsonSerError};
use rocket::{
    form::Errors as FormErrors,
    http::Status,
    response::{self, status::Custom, Responder},
    serde::json::Error as JsonError,
    Request,
};
use thiserror::Error;

use crate::model::{
    storage::UploadError,
    store::StoreError,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("Bad request: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Malformed record: {0}")]
    Serialization(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(why: impl Into<String>) -> Self {
        Self::Validation(why.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Store(StoreError::ConcurrentModification { .. }) => Status::Conflict,
            Self::Upload(UploadError::MissingFile) => Status::BadRequest,
            Self::Store(_) | Self::Upload(_) | Self::Serialization(_) | Self::Io(_) => {
                Status::InternalServerError
            }
        }
    }
}

impl From<BsonSerError> for Error {
    fn from(err: BsonSerError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<BsonDeError> for Error {
    fn from(err: BsonDeError) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A JSON body that couldn't be read or didn't fit the expected shape.
impl<'r> From<JsonError<'r>> for Error {
    fn from(err: JsonError<'r>) -> Self {
        Self::Validation(err.to_string())
    }
}

/// A form body that couldn't be parsed.
impl<'r> From<FormErrors<'r>> for Error {
    fn from(err: FormErrors<'r>) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Errors are reported verbatim as a plain-text body.
impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        Custom(status, self.to_string()).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(Error::validation("x").status(), Status::BadRequest);
        assert_eq!(Error::not_found("x").status(), Status::NotFound);
        assert_eq!(
            Error::from(UploadError::MissingFile).status(),
            Status::BadRequest
        );
        assert_eq!(
            Error::from(StoreError::conflict("users", "u1")).status(),
            Status::Conflict
        );
        assert_eq!(
            Error::from(StoreError::already_exists("questions", "q1")).status(),
            Status::InternalServerError
        );
        assert_eq!(
            Error::from(UploadError::NotFinalized("avatar.png".to_string())).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn malformed_json_is_bad_request() {
        let body = r#"{"answer": "optionOne"}"#;
        let parse = rocket::serde::json::from_str::<crate::model::api::answer::AnswerSpec>(body)
            .unwrap_err();
        let err = Error::from(JsonError::Parse(body, parse));
        assert_eq!(err.status(), Status::BadRequest);
        assert!(err.to_string().starts_with("Bad request: "));
        assert!(err.to_string().contains("qid"));
    }
}
