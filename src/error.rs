use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("Failed to publish announcement: {0}")]
    Notification(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Shorthand for a 404 naming the missing thing.
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Status(Status::Conflict, msg.into())
    }
}

/// Stored data that breaks a ballot invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("Ballot {ballot} belongs to contest {actual}, not {expected}")]
    ForeignBallot { ballot: Id, expected: Id, actual: Id },
    #[error("Ballot {ballot} references unknown candidate {candidate}")]
    UnknownCandidate { ballot: Id, candidate: Id },
    #[error("Voter {voter} cast {cast} ballots but only {max} are allowed")]
    SelectionsExceeded { voter: Id, cast: usize, max: u32 },
    #[error("Voter {voter} selected candidate {candidate} more than once")]
    DuplicateSelection { voter: Id, candidate: Id },
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        Err(match self {
            Self::Status(status, msg) => {
                if status.code >= 500 {
                    error!("{msg}");
                } else {
                    debug!("{msg}");
                }
                status
            }
            Self::Db(err) => {
                error!("Database error: {err}");
                Status::InternalServerError
            }
            Self::Jwt(err) => match err.into_kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Integrity(err) => {
                error!("Data integrity violation: {err}");
                Status::InternalServerError
            }
            Self::Notification(msg) => {
                error!("Notification failure: {msg}");
                Status::BadGateway
            }
            Self::Timeout(msg) => {
                warn!("Timed out: {msg}");
                Status::GatewayTimeout
            }
        })
    }
}
