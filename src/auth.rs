// src/auth.rs
//! Bearer-token authentication for HS256 JWTs issued by the hosted auth
//! provider, plus session revocation for sign-out.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::config_manager::AuthSettings;
use crate::core::database::{Database, SessionRepository, User, UserRepository};
use crate::utils::normalize_email;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Claims {
    /// Key under which sign-out records this token's session
    pub fn session_key(&self) -> String {
        match &self.session_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{}:{}", self.sub, self.iat),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    secret: String,
    pub audience: String,
    pub issuer: Option<String>,
    pub token_ttl_hours: i64,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            audience: "authenticated".to_string(),
            issuer: None,
            token_ttl_hours: 24,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            secret: settings.jwt_secret.clone(),
            audience: settings.audience.clone(),
            issuer: settings.issuer.clone(),
            token_ttl_hours: settings.token_ttl_hours,
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        match &self.issuer {
            Some(issuer) => {
                validation.set_issuer(&[issuer]);
                validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);
            }
            None => validation.set_required_spec_claims(&["exp", "sub", "aud"]),
        }

        let key = DecodingKey::from_secret(self.secret.as_bytes());
        decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("Token verification failed: {}", e);
                AuthError::TokenVerificationFailed
            })
    }

    /// Lifetime of tokens minted without an explicit one
    pub fn default_ttl(&self) -> Duration {
        Duration::hours(self.token_ttl_hours)
    }

    /// Mint a token the same shape as the provider's; used by the admin CLI and tests
    pub fn issue_token(
        &self,
        user_id: &str,
        email: &str,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            aud: self.audience.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            role: Some("authenticated".to_string()),
            session_id: Some(uuid::Uuid::new_v4().to_string()),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization token required")]
    MissingToken,
    #[error("Invalid authorization header format")]
    InvalidToken,
    #[error("Token verification failed")]
    TokenVerificationFailed,
    #[error("Session has been signed out")]
    SessionRevoked,
    #[error("Database error occurred")]
    DatabaseError,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::TokenVerificationFailed => "TOKEN_VERIFICATION_FAILED",
            AuthError::SessionRevoked => "SESSION_REVOKED",
            AuthError::DatabaseError => "DATABASE_ERROR",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AuthError::DatabaseError => Status::InternalServerError,
            _ => Status::Unauthorized,
        }
    }
}

/// Last guard failure of the request, read back by the error catchers
#[derive(Debug, Default)]
pub struct AuthFailure(pub Option<AuthError>);

fn fail<S>(req: &Request<'_>, err: AuthError) -> Outcome<S, AuthError> {
    req.local_cache(|| AuthFailure(Some(err)));
    Outcome::Error((err.status(), err))
}

fn bearer_token<'r>(req: &'r Request<'_>) -> Result<&'r str, AuthError> {
    match req.headers().get_one("Authorization") {
        Some(header) => header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidToken),
        None => Err(AuthError::MissingToken),
    }
}

/// Verified caller with its user row
pub struct AuthenticatedUser {
    pub user: User,
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_config = match req.guard::<&State<AuthConfig>>().await {
            Outcome::Success(config) => config,
            _ => return fail(req, AuthError::DatabaseError),
        };

        let database = match req.guard::<&State<Database>>().await {
            Outcome::Success(db) => db,
            _ => return fail(req, AuthError::DatabaseError),
        };

        let token = match bearer_token(req) {
            Ok(token) => token,
            Err(e) => {
                warn!("Rejected request to {}: {}", req.uri(), e);
                return fail(req, e);
            }
        };

        let claims = match auth_config.verify_token(token) {
            Ok(claims) => claims,
            Err(e) => return fail(req, e),
        };

        match SessionRepository::new(database.pool())
            .is_revoked(&claims.session_key())
            .await
        {
            Ok(false) => {}
            Ok(true) => {
                warn!("Revoked session used by {}", claims.sub);
                return fail(req, AuthError::SessionRevoked);
            }
            Err(e) => {
                error!("Session lookup failed: {}", e);
                return fail(req, AuthError::DatabaseError);
            }
        }

        let email = normalize_email(&claims.email);
        let user = match UserRepository::new(database.pool())
            .get_or_create(&claims.sub, &email)
            .await
        {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to load user {}: {}", claims.sub, e);
                return fail(req, AuthError::DatabaseError);
            }
        };

        info!("User {} authenticated", user.email);
        Outcome::Success(AuthenticatedUser { user, claims })
    }
}

// Optional auth guard that doesn't fail if no auth is provided
pub struct OptionalAuth {
    pub user: Option<AuthenticatedUser>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if req.headers().get_one("Authorization").is_none() {
            return Outcome::Success(OptionalAuth { user: None });
        }
        match AuthenticatedUser::from_request(req).await {
            Outcome::Success(auth) => Outcome::Success(OptionalAuth { user: Some(auth) }),
            _ => Outcome::Success(OptionalAuth { user: None }),
        }
    }
}
