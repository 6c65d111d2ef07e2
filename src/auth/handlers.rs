use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AccessTokenResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RefreshRequest, RegisterRequest, ResetPasswordParams, ResetPasswordRequest,
            TokenPairResponse, VerifyEmailParams,
        },
        password::{hash_password, verify_password},
        repo::User,
        reset::ResetTokens,
        tokens::JwtKeys,
    },
    email::EmailJob,
    error::ApiError,
    extract::{Json as BodyJson, Query},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/verify-email", get(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/", post(reset_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_password_policy(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation_with_details(
            "Bad Request",
            json!({ "password": ["This password is too short. It must contain at least 8 characters."] }),
        ));
    }
    Ok(())
}

/// Post-commit side effect of registration: mint the verification token and
/// hand the welcome email to the dispatch queue.
fn queue_welcome_email(state: &AppState, user: &User) -> anyhow::Result<()> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign_verify(user.id, user.role)?;
    let verify_url = format!(
        "{}/api/auth/verify-email?token={}",
        state.config.frontend_url, token
    );
    state.mailer.enqueue(EmailJob::Welcome {
        email: user.email.clone(),
        username: user.username.clone(),
        verify_url,
    });
    Ok(())
}

fn queue_reset_email(state: &AppState, user: &User) {
    let token = ResetTokens::from_ref(state).make(user.id, &user.password_hash);
    let reset_url = format!(
        "{}/api/auth/reset-password/?uid={}&token={}",
        state.config.frontend_url, user.id, token
    );
    state.mailer.enqueue(EmailJob::PasswordReset {
        email: user.email.clone(),
        reset_url,
    });
}

/// Registration: persist the user unverified, then hand the welcome email to
/// the dispatch queue. The queue is decoupled; a failed send never rolls the
/// account back.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    BodyJson(mut payload): BodyJson<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if payload.username.is_empty() {
        return Err(ApiError::validation_with_details(
            "Bad Request",
            json!({ "username": ["This field may not be blank."] }),
        ));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation_with_details(
            "Bad Request",
            json!({ "email": ["Enter a valid email address."] }),
        ));
    }
    check_password_policy(&payload.password)?;

    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err(ApiError::validation_with_details(
            "Bad Request",
            json!({ "username": ["A user with that username already exists."] }),
        ));
    }
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::validation_with_details(
            "Bad Request",
            json!({ "email": ["A user with that email already exists."] }),
        ));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.username, &payload.email, &hash).await?;

    // Explicit post-commit side effect rather than a save hook.
    queue_welcome_email(&state, &user)?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    BodyJson(payload): BodyJson<LoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let user = User::find_by_username(&state.db, &payload.username)
        .await?
        .ok_or_else(|| {
            warn!(username = %payload.username, "login unknown username");
            ApiError::Authentication("Invalid credentials".into())
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Authentication("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access = keys.sign_access(user.id, user.role)?;
    let refresh = keys.sign_refresh(user.id, user.role)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenPairResponse { access, refresh }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    BodyJson(payload): BodyJson<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh)
        .map_err(|_| ApiError::Authentication("Token is invalid or expired".into()))?;

    let access = keys.sign_access(claims.sub, claims.role)?;
    Ok(Json(AccessTokenResponse { access }))
}

/// One-shot verification link. Repeating the call on a verified account is a
/// successful no-op; every failure collapses to the same generic 400.
#[instrument(skip(state, params))]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(params): Query<VerifyEmailParams>,
) -> Result<Json<MessageResponse>, ApiError> {
    let invalid = || ApiError::validation("Invalid or expired token");

    let token = params.token.ok_or_else(invalid)?;
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_email_token(&token).map_err(|_| invalid())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(invalid)?;

    if user.is_verified {
        return Ok(Json(MessageResponse {
            message: "Already verified",
        }));
    }

    User::mark_verified(&state.db, user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse {
        message: "Email verified",
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    BodyJson(payload): BodyJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    queue_reset_email(&state, &user);

    info!(user_id = %user.id, "password reset email queued");
    Ok(Json(MessageResponse {
        message: "Password reset email sent",
    }))
}

/// The reset token is derived from the current password hash, so a
/// successful reset invalidates the token just used along with any other
/// outstanding copies.
#[instrument(skip(state, params, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Query(params): Query<ResetPasswordParams>,
    BodyJson(payload): BodyJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let uid = params
        .uid
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    let user = User::find_by_id(&state.db, uid)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let token = params.token.unwrap_or_default();
    if !ResetTokens::from_ref(&state).check(user.id, &user.password_hash, &token) {
        warn!(user_id = %user.id, "reset token mismatch");
        return Err(ApiError::validation("Invalid or expired token"));
    }

    check_password_policy(&payload.password)?;
    let hash = hash_password(&payload.password)?;
    User::set_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password reset successful",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::Role;
    use crate::email::Mailer;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            password_hash: "$argon2id$fake-hash".into(),
            role: Role::User,
            is_verified: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn state_with_capture() -> (AppState, tokio::sync::mpsc::Receiver<EmailJob>) {
        let base = AppState::fake();
        let (mailer, rx) = Mailer::capture();
        (
            AppState::from_parts(base.db.clone(), base.config.clone(), mailer),
            rx,
        )
    }

    #[test]
    fn email_regex_accepts_plausible_addresses() {
        assert!(is_valid_email("alice@x.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn password_policy_rejects_short_passwords() {
        assert!(check_password_policy("short").is_err());
        assert!(check_password_policy("Secret123!").is_ok());
    }

    #[tokio::test]
    async fn registration_queues_exactly_one_welcome_email() {
        let (state, mut rx) = state_with_capture();
        let user = sample_user();

        queue_welcome_email(&state, &user).expect("queue welcome");

        let job = rx.try_recv().expect("one job queued");
        let EmailJob::Welcome {
            email,
            username,
            verify_url,
        } = job
        else {
            panic!("expected a welcome job");
        };
        assert_eq!(email, user.email);
        assert_eq!(username, user.username);

        // The embedded token must pass verification and name the new user.
        let token = verify_url.split("token=").nth(1).expect("token in url");
        let claims = JwtKeys::from_ref(&state)
            .verify_email_token(token)
            .expect("token accepted");
        assert_eq!(claims.sub, user.id);

        // Exactly one: nothing else on the channel.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn forgot_password_queues_exactly_one_reset_email() {
        let (state, mut rx) = state_with_capture();
        let user = sample_user();

        queue_reset_email(&state, &user);

        let job = rx.try_recv().expect("one job queued");
        let EmailJob::PasswordReset { email, reset_url } = job else {
            panic!("expected a reset job");
        };
        assert_eq!(email, user.email);
        assert!(reset_url.contains(&format!("uid={}", user.id)));

        // The embedded token must check out against the user's current hash.
        let token = reset_url.split("token=").nth(1).expect("token in url");
        assert!(ResetTokens::from_ref(&state).check(user.id, &user.password_hash, token));

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn verification_url_embeds_the_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys
            .sign_verify(Uuid::new_v4(), Role::User)
            .expect("sign");
        let url = format!(
            "{}/api/auth/verify-email?token={}",
            state.config.frontend_url, token
        );
        assert!(url.starts_with("http://localhost:8080/api/auth/verify-email?token="));
        assert!(url.ends_with(&token));
    }
}
