// ABOUTME: Bearer-token authentication extracting a stable user identity per request
// ABOUTME: Verifies HS256 signature, pinned issuer, and expiration of identity-provider JWTs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Clipchef

//! Request authentication.
//!
//! The identity provider issues HS256 JWTs; this module verifies them with the
//! shared symmetric secret and a pinned issuer, then exposes the stable
//! `{id, email, role}` triple to the admission controller. Token verification
//! is the only CPU-only step of a request.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Verifier configured once at startup from the shared secret and issuer
#[derive(Clone)]
pub struct Authenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

/// Identity attached to the request scope after successful verification
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Stable identity-provider user id
    pub id: Uuid,
    /// Email, for logs only
    pub email: Option<String>,
    /// Identity-provider role claim
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    email: Option<String>,
    role: Option<String>,
}

impl Authenticator {
    /// Build a verifier for the given symmetric secret and issuer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the secret is empty; a misconfigured
    /// secret is fatal, not a per-request 401.
    pub fn new(jwt_secret: &str, issuer: &str) -> AppResult<Self> {
        if jwt_secret.trim().is_empty() {
            return Err(AppError::config("JWT secret is empty"));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.validate_exp = true;
        // Identity-provider tokens carry an "authenticated" audience we do not pin
        validation.validate_aud = false;
        Ok(Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        })
    }

    /// Authenticate a request from its `authorization` header.
    ///
    /// # Errors
    ///
    /// `AUTH_MISSING` when no bearer credential is present, `AUTH_EXPIRED`
    /// when the expiration claim is in the past, `AUTH_INVALID` for any other
    /// verification failure (signature, issuer, format, non-UUID subject).
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<AuthenticatedUser> {
        let token = bearer_token(headers).ok_or(AppError::AuthMissing)?;
        self.verify(token)
    }

    /// Verify a raw token string
    ///
    /// # Errors
    ///
    /// Same mapping as [`Self::authenticate`], minus `AUTH_MISSING`.
    pub fn verify(&self, token: &str) -> AppResult<AuthenticatedUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::AuthExpired,
                _ => AppError::auth_invalid(format!("invalid token: {e}")),
            }
        })?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::auth_invalid("token subject is not a user id"))?;
        Ok(AuthenticatedUser {
            id,
            email: data.claims.email,
            role: data.claims.role,
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use axum::http::header::AUTHORIZATION;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const SECRET: &str = "unit-test-secret-with-some-length";
    const ISSUER: &str = "https://project.supabase.co/auth/v1";

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        email: String,
        role: String,
        iss: String,
        exp: i64,
    }

    fn token(sub: &str, iss: &str, exp_offset_secs: i64) -> String {
        let claims = TestClaims {
            sub: sub.to_owned(),
            email: "cook@example.com".to_owned(),
            role: "authenticated".to_owned(),
            iss: iss.to_owned(),
            exp: Utc::now().timestamp() + exp_offset_secs,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn authenticator() -> Authenticator {
        Authenticator::new(SECRET, ISSUER).unwrap()
    }

    #[test]
    fn accepts_a_valid_token() {
        let user_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", token(&user_id.to_string(), ISSUER, 3600))
                .parse()
                .unwrap(),
        );
        let user = authenticator().authenticate(&headers).unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.email.as_deref(), Some("cook@example.com"));
    }

    #[test]
    fn missing_header_is_auth_missing() {
        let err = authenticator().authenticate(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.code(), "AUTH_MISSING");
    }

    #[test]
    fn expired_token_is_auth_expired() {
        let raw = token(&Uuid::new_v4().to_string(), ISSUER, -3600);
        let err = authenticator().verify(&raw).unwrap_err();
        assert_eq!(err.code(), "AUTH_EXPIRED");
    }

    #[test]
    fn wrong_issuer_is_auth_invalid() {
        let raw = token(
            &Uuid::new_v4().to_string(),
            "https://other.supabase.co/auth/v1",
            3600,
        );
        let err = authenticator().verify(&raw).unwrap_err();
        assert_eq!(err.code(), "AUTH_INVALID");
    }

    #[test]
    fn non_uuid_subject_is_auth_invalid() {
        let raw = token("service-role", ISSUER, 3600);
        let err = authenticator().verify(&raw).unwrap_err();
        assert_eq!(err.code(), "AUTH_INVALID");
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert!(matches!(
            Authenticator::new("  ", ISSUER),
            Err(AppError::Config(_))
        ));
    }
}
