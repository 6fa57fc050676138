pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::auth::repo::User;
use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::state::AppState;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};
use uuid::Uuid;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn validate_username(username: &str) -> Result<(), &'static str> {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    }
    if username.len() < 3 {
        return Err("Username must be at least 3 characters");
    }
    if username.len() > 20 {
        return Err("Username must be at most 20 characters");
    }
    if !USERNAME_RE.is_match(username) {
        return Err("Username may only contain letters, numbers and underscores");
    }
    Ok(())
}

/// 6-digit numeric code, uniform over 100000..=999999. The range excludes a
/// leading zero by construction, so the string form is always 6 characters.
pub(crate) fn new_verify_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Decide whether a submitted code verifies the account. Check order is
/// fixed: already-verified before mismatch before expiry, so an expired
/// wrong code is still reported as a mismatch.
pub(crate) fn check_verification(
    user: &User,
    code: &str,
    now: OffsetDateTime,
) -> Result<(), ApiError> {
    if user.is_verified {
        return Err(ApiError::AlreadyVerified);
    }
    if user.verify_code != code {
        return Err(ApiError::CodeMismatch);
    }
    if now >= user.verify_code_expires_at {
        return Err(ApiError::CodeExpired);
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            refresh_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(
        &self,
        user_id: Uuid,
        username: &str,
        kind: TokenKind,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid, username: &str) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, username, TokenKind::Access)
    }
    pub fn sign_refresh(&self, user_id: Uuid, username: &str) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, username, TokenKind::Refresh)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

/// Extracts and validates the bearer token, exposing the session claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthenticated("Not authenticated".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthenticated("Invalid Authorization header".into()))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(ApiError::Unauthenticated("Invalid or expired token".into()));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(ApiError::Unauthenticated("Access token required".into()));
        }

        Ok(AuthUser(claims))
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        let msg = err.to_string();
        assert!(!msg.is_empty());
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn usernames_within_bounds_pass() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("alice_42").is_ok());
        assert!(validate_username("A2345678901234567890").is_ok());
    }

    #[test]
    fn usernames_outside_bounds_fail() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("A23456789012345678901").is_err());
        assert!(validate_username("with space").is_err());
        assert!(validate_username("dash-ed").is_err());
        assert!(validate_username("dotted.name").is_err());
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("two words@x.com"));
    }

    #[test]
    fn verify_codes_are_six_digits_in_range() {
        for _ in 0..100 {
            let code = new_verify_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().expect("numeric");
            assert!((100_000..=999_999).contains(&n));
            assert!(!code.starts_with('0'));
        }
    }
}

#[cfg(test)]
mod verification_tests {
    use super::*;

    fn account(is_verified: bool, code: &str, expires_in_minutes: i64) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            verify_code: code.into(),
            verify_code_expires_at: now + TimeDuration::minutes(expires_in_minutes),
            is_verified,
            is_accepting_messages: true,
            created_at: now,
        }
    }

    #[test]
    fn matching_code_before_expiry_verifies() {
        let user = account(false, "482913", 10);
        assert!(check_verification(&user, "482913", OffsetDateTime::now_utc()).is_ok());
    }

    #[test]
    fn wrong_code_is_a_mismatch() {
        let user = account(false, "482913", 10);
        let err = check_verification(&user, "000000", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::CodeMismatch));
    }

    #[test]
    fn matching_code_after_expiry_is_expired() {
        let user = account(false, "482913", -1);
        let err = check_verification(&user, "482913", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::CodeExpired));
    }

    #[test]
    fn expiry_boundary_instant_is_expired() {
        let user = account(false, "482913", 0);
        let err = check_verification(&user, "482913", user.verify_code_expires_at).unwrap_err();
        assert!(matches!(err, ApiError::CodeExpired));
    }

    #[test]
    fn verified_account_always_rejects_regardless_of_code() {
        let user = account(true, "482913", 10);
        let err = check_verification(&user, "482913", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::AlreadyVerified));

        let err = check_verification(&user, "000000", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::AlreadyVerified));
    }

    #[test]
    fn mismatch_wins_over_expiry() {
        // Expired account submitting the wrong code: mismatch is reported
        // first so the error does not reveal expiry out of order.
        let user = account(false, "482913", -30);
        let err = check_verification(&user, "111111", OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, ApiError::CodeMismatch));
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id, "alice").expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn sign_and_verify_refresh_token_and_verify_refresh() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_refresh(user_id, "alice").expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn verify_refresh_rejects_access_token() {
        let keys = make_keys();
        let token = keys
            .sign_access(Uuid::new_v4(), "alice")
            .expect("sign access");
        let err = keys.verify_refresh(&token).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[tokio::test]
    async fn verify_rejects_tampered_token() {
        let keys = make_keys();
        let token = keys
            .sign_access(Uuid::new_v4(), "alice")
            .expect("sign access");
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(keys.verify(&tampered).is_err());
    }
}
