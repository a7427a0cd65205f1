//! HTTP request handlers.

use crate::auth::SignupProfile;
use crate::blobs::{COVER_FOLDER, PROFILE_FOLDER};
use crate::catalog;
use crate::db::{Listing, Owner, ThemeMode};
use crate::error::{AppError, Result};
use crate::listings::{ListingPatch, NewListing};
use crate::server::AppState;
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Session cookie name.
const COOKIE_NAME: &str = "owner_jwt";

/// Index route.
pub async fn root() -> &'static str {
    "Owner API running"
}

// ============================================================================
// AUTH API
// ============================================================================

/// Owner signup (multipart, optional `profileImage` file field).
pub async fn signup(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let form = read_form(multipart, &["profileImage"]).await?;

    let profile = SignupProfile {
        name: form.text("name"),
        email: form.text("email"),
        password: form.text("password"),
        kind: form.text("type"),
        store_name: form.opt_text("storeName"),
        bio: form.opt_text("bio"),
        whatsapp_number: form.opt_text("whatsappNumber"),
        username: form.opt_text("username"),
    };

    // Pre-check uniqueness before paying for an upload. The storage layer
    // still catches the race and reports the same conflict.
    if state.db.get_owner_by_email(&profile.email)?.is_some() {
        return Err(AppError::Conflict("Email already in use".to_string()));
    }
    if let Some(ref username) = profile.username
        && state.db.get_owner_by_username(username)?.is_some()
    {
        return Err(AppError::Conflict("Username already in use".to_string()));
    }

    // Profile image goes through the blob store before the record exists.
    // An unconfigured or failing store rejects the signup outright.
    let profile_image = match form.file {
        Some(file) => Some(
            state
                .blob_store()?
                .upload(file.bytes, &file.filename, PROFILE_FOLDER)
                .await?,
        ),
        None => None,
    };

    let owner = state.auth.signup(profile, profile_image)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Signup successful, pending approval",
            "ownerId": owner.id,
            "profileImage": owner.profile_image,
        })),
    ))
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Owner login. The token is delivered twice: as an HTTP-only cookie and in
/// the response body for callers that cannot use cookies.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response> {
    let (owner, token) = state.auth.login(&req.email, &req.password)?;

    let body = json!({
        "id": owner.id,
        "name": owner.name,
        "email": owner.email,
        "type": owner.kind,
        "profileImage": owner.profile_image,
        "token": token,
    });

    let cookie = session_cookie(&state, &token);
    let mut response = (StatusCode::OK, Json(body)).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::Internal(format!("Invalid cookie value: {}", e)))?,
    );

    Ok(response)
}

/// Current owner profile.
pub async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Owner>> {
    let owner = resolve_owner(&state, &headers)?;
    Ok(Json(owner))
}

/// Partial profile update (multipart, optional new `profileImage`).
pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Owner>> {
    let mut owner = resolve_owner(&state, &headers)?;
    let form = read_form(multipart, &["profileImage"]).await?;

    if let Some(name) = form.opt_text("name") {
        owner.name = name;
    }
    if let Some(store_name) = form.opt_text("storeName") {
        owner.store_name = Some(store_name);
    }
    if let Some(bio) = form.opt_text("bio") {
        owner.bio = Some(bio);
    }
    if let Some(whatsapp) = form.opt_text("whatsappNumber") {
        owner.whatsapp_number = Some(whatsapp);
    }

    // Same fail-closed policy as signup: no blob store, no image update.
    if let Some(file) = form.file {
        let url = state
            .blob_store()?
            .upload(file.bytes, &file.filename, PROFILE_FOLDER)
            .await?;
        owner.profile_image = Some(url);
    }

    state.db.update_owner_profile(&owner)?;
    Ok(Json(owner))
}

// ============================================================================
// OWNER BOOKS API
// ============================================================================

/// Create a listing (multipart; cover file under `image` or `coverImage`).
pub async fn create_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let owner = resolve_approved_owner(&state, &headers)?;
    let form = read_form(multipart, &["image", "coverImage"]).await?;

    let input = NewListing {
        title: form.text("title"),
        price: form.text("price"),
        currency: form.text("currency"),
        format: form.text("format"),
        author: form.opt_text("author"),
        description: form.opt_text("description"),
    };

    let file = form
        .file
        .ok_or_else(|| AppError::Validation("Image file required".to_string()))?;
    let cover_image = state
        .blob_store()?
        .upload(file.bytes, &file.filename, COVER_FOLDER)
        .await?;

    let listing = state.listings.create(&owner, input, cover_image)?;
    tracing::info!(listing = %listing.id, owner = %owner.id, "Listing created");

    Ok((StatusCode::CREATED, Json(populated_listing(&listing, &owner))))
}

/// All listings owned by the acting owner, drafts included.
pub async fn my_books(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Listing>>> {
    let owner = resolve_approved_owner(&state, &headers)?;
    let listings = state.listings.list_mine(&owner)?;
    Ok(Json(listings))
}

/// Partial listing update (multipart; optional replacement cover).
pub async fn update_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let owner = resolve_approved_owner(&state, &headers)?;
    let form = read_form(multipart, &["image", "coverImage"]).await?;

    let patch = ListingPatch {
        title: form.opt_text("title"),
        price: form.opt_text("price"),
        currency: form.opt_text("currency"),
        format: form.opt_text("format"),
        author: form.opt_text("author"),
        description: form.opt_text("description"),
    };

    let new_cover = match form.file {
        Some(file) => Some(
            state
                .blob_store()?
                .upload(file.bytes, &file.filename, COVER_FOLDER)
                .await?,
        ),
        None => None,
    };

    let listing = state.listings.update(&owner, &id, patch, new_cover)?;
    Ok(Json(populated_listing(&listing, &owner)))
}

/// Delete a listing (physical, irreversible).
pub async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let owner = resolve_approved_owner(&state, &headers)?;
    state.listings.delete(&owner, &id)?;
    tracing::info!(listing = %id, owner = %owner.id, "Listing deleted");
    Ok(Json(json!({ "message": "Book deleted" })))
}

// ============================================================================
// PUBLIC CATALOG
// ============================================================================

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

/// Public catalog search, unauthenticated.
pub async fn public_books(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<catalog::PublicListing>>> {
    let listings = catalog::search(&state.db, params.q.as_deref())?;
    Ok(Json(listings))
}

// ============================================================================
// INTERNAL THEME API
// ============================================================================

/// Theme sync request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSyncRequest {
    theme_mode: Option<String>,
}

/// Persist and broadcast the global theme. The optional shared secret gates
/// this write endpoint only.
pub async fn theme_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ThemeSyncRequest>,
) -> Result<Json<Value>> {
    if let Some(secret) = state.config.internal.resolve_shared_secret() {
        let incoming = headers
            .get("x-internal-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if incoming != secret {
            return Err(AppError::Forbidden("Forbidden".to_string()));
        }
    }

    let mode = req
        .theme_mode
        .as_deref()
        .map(ThemeMode::parse)
        .transpose()?
        .ok_or_else(|| AppError::Validation("Invalid themeMode".to_string()))?;

    let mode = state.theme.set_theme(mode)?;
    Ok(Json(json!({ "ok": true, "themeMode": mode })))
}

/// Current persisted theme; open read.
pub async fn theme_get(State(state): State<AppState>) -> Result<Json<Value>> {
    match state.theme.get_theme()? {
        Some(mode) => Ok(Json(json!({ "themeMode": mode }))),
        None => Err(AppError::NotFound("No theme set".to_string())),
    }
}

/// WebSocket subscription to theme change events. Subscribers that connect
/// after a change catch up via the GET endpoint.
pub async fn theme_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let rx = state.theme_events.subscribe();
    ws.on_upgrade(move |socket| theme_ws_loop(socket, rx))
}

async fn theme_ws_loop(mut socket: WebSocket, mut rx: broadcast::Receiver<ThemeMode>) {
    loop {
        match rx.recv().await {
            Ok(mode) => {
                let frame = json!({ "event": "theme:update", "themeMode": mode }).to_string();
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            // Missed events are acceptable; delivery is best-effort.
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// A parsed multipart form: text fields plus at most one accepted file.
struct ParsedForm {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

/// A file pulled out of a multipart request.
struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

impl ParsedForm {
    /// Required text field; empty string when absent (validated downstream).
    fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Optional text field; absent and supplied-but-empty are distinct only
    /// for fields where the caller cares (partial updates treat absence as
    /// "leave unchanged").
    fn opt_text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }
}

/// Drain a multipart body. Fields named in `file_fields` are read as bytes
/// (first match wins); everything else is text.
async fn read_form(mut multipart: Multipart, file_fields: &[&str]) -> Result<ParsedForm> {
    let mut fields = HashMap::new();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::Validation("Malformed multipart body".to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if file_fields.contains(&name.as_str()) {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| AppError::Validation("Malformed multipart body".to_string()))?;
            if file.is_none() {
                file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let text = field
                .text()
                .await
                .map_err(|_| AppError::Validation("Malformed multipart body".to_string()))?;
            fields.insert(name, text);
        }
    }

    Ok(ParsedForm { fields, file })
}

/// Build the session cookie. Secure is set unconditionally outside of the
/// explicit local-testing escape hatch; SameSite=None is required for
/// cross-site frontends.
fn session_cookie(state: &AppState, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=None; Max-Age={}",
        COOKIE_NAME,
        token,
        state.auth.session_seconds(),
    );
    if !state.config.auth.force_insecure_cookies {
        cookie.push_str("; Secure");
    }
    if let Some(domain) = &state.config.auth.cookie_domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    cookie
}

/// Extract the session token: cookie first, then bearer header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        for pair in cookies.split(';') {
            if let Some(value) = pair.trim().strip_prefix("owner_jwt=")
                && !value.is_empty()
            {
                return Some(value.to_string());
            }
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// First gate: resolve the token to a live owner.
fn resolve_owner(state: &AppState, headers: &HeaderMap) -> Result<Owner> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthenticated("Not authorized, no token".to_string()))?;

    state.auth.resolve(&token)
}

/// Both gates: resolved owner who is also approved.
fn resolve_approved_owner(state: &AppState, headers: &HeaderMap) -> Result<Owner> {
    let owner = resolve_owner(state, headers)?;
    state.auth.ensure_approved(&owner)?;
    Ok(owner)
}

/// Listing JSON with the minimal owner card embedded, so the frontend has
/// owner name/profile immediately after a write.
fn populated_listing(listing: &Listing, owner: &Owner) -> Value {
    let mut value = serde_json::to_value(listing).unwrap_or_default();
    value["owner"] = json!({
        "name": owner.name,
        "profileImage": owner.profile_image,
        "whatsappNumber": owner.whatsapp_number,
    });
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn token_from_cookie() {
        let headers = headers_with(header::COOKIE, "a=1; owner_jwt=tok-123; b=2");
        assert_eq!(extract_token(&headers), Some("tok-123".to_string()));
    }

    #[test]
    fn token_from_bearer_fallback() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer tok-456");
        assert_eq!(extract_token(&headers), Some("tok-456".to_string()));
    }

    #[test]
    fn cookie_takes_precedence_over_bearer() {
        let mut headers = headers_with(header::COOKIE, "owner_jwt=cookie-tok");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer bearer-tok"),
        );
        assert_eq!(extract_token(&headers), Some("cookie-tok".to_string()));
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
        let headers = headers_with(header::COOKIE, "owner_jwt=");
        assert_eq!(extract_token(&headers), None);
    }
}
