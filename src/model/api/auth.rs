use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{self, FromRequest},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::id::ApiId,
    common::role::Role,
    db::member::Member,
    mongodb::Id,
};
use crate::Config;

/// Authorization scheme expected in the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// JWT claims issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The member this token was issued to.
    pub sub: ApiId,
    pub role: Role,
    #[serde(rename = "exp", with = "ts_seconds")]
    pub expire_at: DateTime<Utc>,
}

impl Claims {
    /// Claims for `member`, valid for `ttl` from now.
    pub fn for_member(member: &Member, ttl: Duration) -> Self {
        Self {
            sub: member.id.into(),
            role: member.role,
            expire_at: Utc::now() + ttl,
        }
    }

    /// Sign these claims into a token.
    pub fn encode(&self, config: &Config) -> Result<String, JwtError> {
        jsonwebtoken::encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
    }

    /// Verify a token and extract its claims.
    pub fn decode(token: &str, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Self>| data.claims)
    }
}

#[cfg(test)]
impl Claims {
    /// An `Authorization` header carrying these claims.
    pub fn bearer_header(&self, config: &Config) -> rocket::http::Header<'static> {
        let token = self.encode(config).unwrap();
        rocket::http::Header::new("Authorization", format!("{BEARER_PREFIX}{token}"))
    }
}

/// An authenticated caller of any role.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Caller {
    pub member_id: Id,
    pub role: Role,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = Error;

    /// Verify the bearer token. A request without one is forwarded, so
    /// `Option<Caller>` serves anonymous callers.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<Config>>().await {
            request::Outcome::Success(config) => config,
            _ => {
                return request::Outcome::Error((
                    Status::InternalServerError,
                    Error::Status(
                        Status::InternalServerError,
                        "Config is not managed".to_string(),
                    ),
                ))
            }
        };

        let header = match req.headers().get_one("Authorization") {
            Some(header) => header,
            None => return request::Outcome::Forward(Status::Unauthorized),
        };
        let token = match header.strip_prefix(BEARER_PREFIX) {
            Some(token) => token.trim(),
            None => {
                return request::Outcome::Error((
                    Status::Unauthorized,
                    Error::Status(
                        Status::Unauthorized,
                        "Authorization header is not a bearer token".to_string(),
                    ),
                ))
            }
        };

        match Claims::decode(token, config) {
            Ok(claims) => request::Outcome::Success(Caller {
                member_id: claims.sub.into(),
                role: claims.role,
            }),
            Err(e) => {
                debug!("Rejected bearer token: {e}");
                request::Outcome::Error((Status::Unauthorized, e.into()))
            }
        }
    }
}

/// An authenticated administrator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdminCaller(pub Caller);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminCaller {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let caller = try_outcome!(req.guard::<Caller>().await);
        if caller.role == Role::Admin {
            request::Outcome::Success(AdminCaller(caller))
        } else {
            request::Outcome::Error((
                Status::Forbidden,
                Error::Status(
                    Status::Forbidden,
                    format!("{} is a {:?}, not an admin", caller.member_id, caller.role),
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_round_trip_through_a_token() {
        let config = Config::example();
        let member = Member::new(Some("North"), Role::Officer);
        let claims = Claims::for_member(&member, Duration::minutes(5));

        let token = claims.encode(&config).unwrap();
        let decoded = Claims::decode(&token, &config).unwrap();
        assert_eq!(*decoded.sub, member.id);
        assert_eq!(decoded.role, Role::Officer);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let config = Config::example();
        let member = Member::new(None, Role::Admin);
        let claims = Claims::for_member(&member, Duration::hours(-1));

        let token = claims.encode(&config).unwrap();
        assert!(Claims::decode(&token, &config).is_err());
    }
}
