use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, CheckUsernameQuery, PublicUser, RefreshRequest, SignInRequest,
            SignUpRequest, VerifyRequest,
        },
        repo::User,
        services::{
            check_verification, hash_password, is_valid_email, new_verify_code, validate_username,
            verify_password, AuthUser, JwtKeys,
        },
    },
    email::send_verification_email,
    error::{Ack, ApiError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/verify", post(verify_code))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/auth/check-username", get(check_username))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn public_view(user: &User) -> PublicUser {
    PublicUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        is_verified: user.is_verified,
        is_accepting_messages: user.is_accepting_messages,
    }
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(mut payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if let Err(msg) = validate_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(ApiError::InvalidInput(msg.into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::InvalidInput("Invalid email".into()));
    }
    if payload.password.len() < 6 {
        warn!("password too short");
        return Err(ApiError::InvalidInput(
            "Password must be at least 6 characters".into(),
        ));
    }

    // Only verified accounts block an identity; a stale unverified
    // registration is evicted and replaced by the new attempt.
    if let Some(holder) =
        User::find_verified_holder(&state.db, &payload.username, &payload.email).await?
    {
        warn!(username = %payload.username, "identity already taken");
        let msg = if holder.username == payload.username {
            "Username already taken"
        } else {
            "Email already registered"
        };
        return Err(ApiError::Conflict(msg.into()));
    }

    let evicted = User::evict_unverified(&state.db, &payload.username, &payload.email).await?;
    if evicted > 0 {
        info!(count = evicted, "evicted stale unverified registrations");
    }

    let hash = hash_password(&payload.password)?;

    let verify_code = new_verify_code();
    let expires_at =
        OffsetDateTime::now_utc() + TimeDuration::minutes(state.config.verify_ttl_minutes);

    let user = match User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &hash,
        &verify_code,
        expires_at,
    )
    .await
    {
        Ok(u) => u,
        Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
            warn!(username = %payload.username, "lost registration race");
            return Err(ApiError::Conflict("User already exists".into()));
        }
        Err(e) => return Err(ApiError::Persistence(e.into())),
    };

    // The account row already exists at this point; a failed dispatch is
    // surfaced anyway, and the next sign-up attempt replaces the row.
    if let Err(e) =
        send_verification_email(state.mailer.as_ref(), &user.email, &user.username, &verify_code)
            .await
    {
        error!(error = %e, user_id = %user.id, "verification email failed");
        return Err(ApiError::Dependency {
            message: "Failed to send verification email".into(),
            status: None,
        });
    }

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(Ack::ok(
            "User registered successfully. Please verify your email.",
        )),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<Ack>, ApiError> {
    let user = User::find_by_username(&state.db, &payload.username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    check_verification(&user, &payload.code, OffsetDateTime::now_utc())?;

    User::mark_verified(&state.db, user.id).await?;
    info!(user_id = %user.id, username = %user.username, "account verified");
    Ok(Json(Ack::ok("Account verified successfully")))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = match User::find_by_identifier(&state.db, &payload.identifier).await? {
        Some(u) => u,
        None => {
            warn!(identifier = %payload.identifier, "sign-in unknown identifier");
            return Err(ApiError::Unauthenticated("Invalid credentials".into()));
        }
    };

    if !user.is_verified {
        warn!(user_id = %user.id, "sign-in before verification");
        return Err(ApiError::Unauthenticated("Account is not verified".into()));
    }

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        ApiError::Unauthenticated("Invalid credentials".into())
    })?;
    if !ok {
        warn!(user_id = %user.id, "sign-in invalid password");
        return Err(ApiError::Unauthenticated("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id, &user.username).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::Persistence(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id, &user.username).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        ApiError::Persistence(e)
    })?;

    info!(user_id = %user.id, username = %user.username, "user signed in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: public_view(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("User not found".into()))?;
    if !user.is_verified {
        return Err(ApiError::Unauthenticated("Account is not verified".into()));
    }

    let access_token = keys.sign_access(user.id, &user.username)?;
    let refresh_token = keys.sign_refresh(user.id, &user.username)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: public_view(&user),
    }))
}

#[instrument(skip(state))]
pub async fn check_username(
    State(state): State<AppState>,
    Query(query): Query<CheckUsernameQuery>,
) -> Result<Json<Ack>, ApiError> {
    if let Err(msg) = validate_username(&query.username) {
        return Err(ApiError::InvalidInput(msg.into()));
    }

    if User::find_verified_by_username(&state.db, &query.username)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    Ok(Json(Ack::ok("Username is unique and available")))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(public_view(&user)))
}

#[cfg(test)]
mod me_tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_me_response_serialization() {
        let response = PublicUser {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "test@example.com".to_string(),
            is_verified: true,
            is_accepting_messages: false,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains(r#""isVerified":true"#));
        assert!(json.contains(r#""isAcceptingMessages":false"#));
    }
}
