use axum::{
    Json,
    extract::multipart::MultipartRejection,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use tracing::{debug, info};

use tidings_types::api::{
    ActorQuery, CreateMessageForm, CreateMessageResponse, DataResponse, ExistsResponse,
    OpenMessageRequest, ReplyRequest, ShareLinkResponse, SuccessResponse, UploadedFile,
};
use tidings_types::models::Actor;

use crate::compose;
use crate::error::{ApiError, optional, required};
use crate::session::Session;
use crate::state::{AppState, run_blocking};

pub async fn create_message(
    State(state): State<AppState>,
    session: Session,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart?).await?;
    let created = compose::create_message(&state, session.user_id, form).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateMessageResponse {
            success: true,
            slug: created.slug,
        }),
    ))
}

/// Decode the create form. Unknown fields are skipped; `hint` is an alias
/// for `passwordHint` and the client-supplied `senderId` is ignored in
/// favour of the session.
async fn read_form(mut multipart: Multipart) -> Result<CreateMessageForm, ApiError> {
    let mut form = CreateMessageForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read file bytes: {}", e)))?;
            form.file = Some(UploadedFile {
                file_name,
                content_type,
                data: Vec::from(data),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read field '{}': {}", name, e)))?;

        let slot = match name.as_str() {
            "recipientFirstName" => &mut form.recipient_first_name,
            "recipientLastName" => &mut form.recipient_last_name,
            "password" => &mut form.password,
            "passwordHint" | "hint" => &mut form.password_hint,
            "theme" => &mut form.theme,
            "type" => &mut form.kind,
            "text" => &mut form.text,
            other => {
                debug!("Ignoring form field '{}'", other);
                continue;
            }
        };
        *slot = Some(value);
    }

    Ok(form)
}

fn actor(first_name: Option<String>, last_name: Option<String>) -> Result<Actor, ApiError> {
    Ok(Actor::new(
        required(first_name, "firstName")?,
        required(last_name, "lastName")?,
    ))
}

pub async fn exists(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (exists, password_hint) = run_blocking(&state, move |s| s.gate().exists(&slug)).await?;

    Ok(Json(ExistsResponse {
        success: true,
        exists,
        password_hint,
    }))
}

pub async fn open(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: Result<Json<OpenMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let actor = actor(Some(req.first_name), Some(req.last_name))?;
    if req.password.is_empty() {
        return Err(ApiError::Validation("password is required".into()));
    }

    let message = run_blocking(&state, move |s| s.gate().open(&slug, &req.password, &actor)).await?;
    Ok(Json(DataResponse::new(message)))
}

pub async fn download(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    query: Result<Query<ActorQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let actor = actor(query.first_name, query.last_name).ok();

    let url = run_blocking(&state, move |s| s.gate().download(&slug, actor.as_ref())).await?;
    Ok(Redirect::temporary(&url))
}

pub async fn reply(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let actor = actor(Some(req.first_name), Some(req.last_name))?;
    let text = required(Some(req.reply_text), "replyText")?;

    run_blocking(&state, move |s| s.gate().reply(&slug, &actor, &text)).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse { success: true })))
}

pub async fn analytics(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let analytics = run_blocking(&state, move |s| s.gate().analytics(&slug)).await?;
    Ok(Json(DataResponse::new(analytics)))
}

pub async fn create_share_link(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let url = run_blocking(&state, move |s| {
        let issued = s
            .gate()
            .create_share_link(&slug, session.user_id, s.settings.share_token_ttl)?;
        info!(%slug, expires_at = %issued.expires_at, "Share link created");
        Ok(s.settings.link(&format!("/magic/{}", issued.raw)))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ShareLinkResponse { success: true, url }),
    ))
}

/// Opens are attributed to the visitor when both names are given,
/// otherwise to the generic magic-link actor.
pub async fn redeem_share_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
    query: Result<Query<ActorQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let actor = match (optional(query.first_name), optional(query.last_name)) {
        (Some(first), Some(last)) => Actor::new(first, last),
        _ => Actor::magic_link(),
    };

    let message = run_blocking(&state, move |s| s.gate().open_via_magic_link(&token, &actor)).await?;
    Ok(Json(DataResponse::new(message)))
}
