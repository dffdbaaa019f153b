use axum::{
    Json,
    extract::rejection::JsonRejection,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use tidings_types::api::{LoginLinkRequest, LoginLinkResponse, SessionResponse};
use tidings_types::models::TokenScope;

use crate::error::{ApiError, optional};
use crate::session::create_session_token;
use crate::state::{AppState, AppStateInner, run_blocking};

pub async fn request_login_link(
    State(state): State<AppState>,
    payload: Result<Json<LoginLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let email = normalize_email(req.email)?;
    let name = optional(req.name);

    let resp = run_blocking(&state, move |s| {
        let user_id = find_or_create_user(s, &email, name.as_deref())?;
        let issued = s
            .tokens()
            .issue_login_token(user_id, s.settings.login_token_ttl)?;

        Ok(LoginLinkResponse {
            success: true,
            url: s.settings.link(&format!("/auth/magic/{}", issued.raw)),
            user_id,
        })
    })
    .await?;

    Ok(Json(resp))
}

pub async fn redeem_login_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = run_blocking(&state, move |s| {
        let user_id = s.tokens().consume(&token, TokenScope::Login)?;

        let user = s
            .db
            .get_user_by_id(&user_id.to_string())
            .map_err(ApiError::Storage)?
            .ok_or_else(|| {
                warn!(%user_id, "Login token points at a missing user");
                ApiError::TokenNotFound
            })?;

        let token = create_session_token(&s.jwt_secret, user_id, &user.email, s.settings.session_ttl)
            .map_err(ApiError::Crypto)?;

        info!(%user_id, "Session issued");
        Ok(SessionResponse {
            success: true,
            token,
        })
    })
    .await?;

    Ok(Json(resp))
}

fn normalize_email(email: Option<String>) -> Result<String, ApiError> {
    let email = email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("email is required".into()))?;

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::Validation("email is invalid".into())),
    }
}

fn find_or_create_user(s: &AppStateInner, email: &str, name: Option<&str>) -> Result<Uuid, ApiError> {
    if let Some(user) = s.db.get_user_by_email(email).map_err(ApiError::Storage)? {
        return parse_user_id(&user.id);
    }

    let id = Uuid::new_v4();
    match s.db.create_user(&id.to_string(), email, name) {
        Ok(()) => {
            info!(user_id = %id, "Created user");
            Ok(id)
        }
        // Lost a race on the unique email; the other insert wins.
        Err(e) => match s.db.get_user_by_email(email).map_err(ApiError::Storage)? {
            Some(user) => parse_user_id(&user.id),
            None => Err(ApiError::Storage(e)),
        },
    }
}

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::Internal(format!("corrupt user id '{}': {}", raw, e)))
}
