use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, Method},
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use gazette_shared::{can_view, AccountType, ChatId, FollowAction, IdSet, PostId, UserId};
use gazette_shared::constants::MIN_PASSWORD_LEN;
use gazette_store::{Chat, Comment, Database, Message, Notification, Post, UserProfile};

use crate::ai::TextGenerator;
use crate::auth::{self, optional_user, require_user};
use crate::blob_store::{BlobStore, ImageCategory};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<tokio::sync::Mutex<Database>>,
    pub blobs: Arc<BlobStore>,
    pub textgen: Arc<TextGenerator>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let uploads = ServeDir::new(state.config.upload_dir.clone());

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me).put(update_profile))
        .route("/users/search", get(search_users))
        .route("/users/:id", get(get_profile))
        .route("/users/:id/posts", get(list_user_posts))
        .route("/users/:id/followers", get(list_followers))
        .route("/users/:id/following", get(list_following))
        .route("/users/:id/follow", post(follow).delete(unfollow))
        .route("/users/:id/follow-request", delete(cancel_follow_request))
        .route("/follow-requests/respond", post(respond_to_follow_request))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id", get(get_post).put(update_post).delete(delete_post))
        .route("/posts/:id/like", post(toggle_like))
        .route("/posts/:id/dislike", post(toggle_dislike))
        .route("/posts/:id/comments", get(list_comments).post(add_comment))
        .route("/chats", get(list_chats).post(open_chat))
        .route("/chats/:id/messages", get(list_messages).post(send_message))
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read", post(mark_notifications_read))
        .route("/ai/generate-paragraph", post(generate_paragraph))
        .route("/ai/summarize", post(summarize))
        .route("/events", get(events))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(state.config.max_image_size + 64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── DTOs ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
}

#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct AuthResponse {
    token: String,
    user: UserProfile,
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Deserialize)]
struct RespondRequest {
    requester: UserId,
    action: FollowAction,
}

#[derive(Deserialize)]
struct OpenChatRequest {
    user_id: UserId,
}

#[derive(Deserialize)]
struct TextBody {
    text: String,
}

#[derive(Deserialize)]
struct TitleBody {
    title: String,
}

#[derive(Deserialize)]
struct ContentBody {
    content: String,
}

#[derive(Serialize)]
struct ParagraphResponse {
    paragraph: String,
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

#[derive(Serialize)]
struct ReactionResponse {
    active: bool,
}

// ─── Helpers ───

fn parse_user_id(raw: &str) -> Result<UserId, ServerError> {
    UserId::parse(raw).map_err(|_| ServerError::BadRequest(format!("Invalid user id: {raw}")))
}

fn parse_post_id(raw: &str) -> Result<PostId, ServerError> {
    PostId::parse(raw).map_err(|_| ServerError::BadRequest(format!("Invalid post id: {raw}")))
}

/// The single visibility gate used by every content-read handler.
fn viewer_can_see(viewer: Option<&UserProfile>, post: &Post) -> bool {
    match viewer {
        Some(v) => can_view(
            Some(&v.uid),
            post.author_account_type,
            &post.author_id,
            &v.following,
        ),
        None => can_view(None, post.author_account_type, &post.author_id, &IdSet::new()),
    }
}

/// Text fields and at most one image collected from a multipart form.
#[derive(Default)]
struct FormFields {
    text: HashMap<String, String>,
    image: Option<(String, Vec<u8>)>,
}

async fn collect_form(mut multipart: Multipart) -> Result<FormFields, ServerError> {
    let mut fields = FormFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("image").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
            if !data.is_empty() {
                fields.image = Some((file_name, data.to_vec()));
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
            fields.text.insert(name, value);
        }
    }

    Ok(fields)
}

// ─── Health & info ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
    })
}

// ─── Auth ───

async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("Registration is closed".into()));
    }

    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ServerError::BadRequest("Invalid email address".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ServerError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let salt = auth::generate_salt();
    let hash = auth::hash_password(&req.password, &salt);
    let token = auth::generate_token();

    let db = state.db.lock().await;
    let user = db.create_user(&email, &email, &hex::encode(hash), &hex::encode(salt))?;
    db.create_session(&user.uid, &token)?;

    info!(uid = %user.uid, "registered user");
    Ok(Json(AuthResponse { token, user }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let email = req.email.trim().to_lowercase();
    let invalid = || ServerError::Unauthorized("Invalid email or password".into());

    let db = state.db.lock().await;
    let record = db.get_auth_record(&email).map_err(|_| invalid())?;

    if !auth::verify_password(&req.password, &record.password_salt, &record.password_hash) {
        return Err(invalid());
    }

    let token = auth::generate_token();
    db.create_session(&record.uid, &token)?;
    let user = db.get_user(&record.uid)?;

    info!(uid = %user.uid, "user signed in");
    Ok(Json(AuthResponse { token, user }))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    if let Some(token) = auth::bearer_token(&headers) {
        state.db.lock().await.delete_session(token)?;
    }
    Ok(Json(serde_json::json!({ "signed_out": true })))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    Ok(Json(user))
}

/// Update display name, bio, avatar, and account type.
///
/// An account-type change runs the fan-out that refreshes the denormalized
/// `author_account_type` on every one of the user's posts.
async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UserProfile>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let form = collect_form(multipart).await?;

    let display_name = form
        .text
        .get("display_name")
        .cloned()
        .unwrap_or_else(|| user.display_name.clone());
    let bio = form.text.get("bio").cloned().unwrap_or_else(|| user.bio.clone());
    let account_type = match form.text.get("account_type").map(String::as_str) {
        Some("private") => AccountType::Private,
        Some(_) => AccountType::Public,
        None => user.account_type,
    };

    let mut photo_url = user.photo_url.clone();
    let mut replaced_photo = None;
    if let Some((file_name, data)) = form.image {
        let url = state
            .blobs
            .store_image(ImageCategory::Avatars, &file_name, &data)
            .await?;
        replaced_photo = photo_url.replace(url);
    }

    {
        let mut db = state.db.lock().await;
        db.update_profile(&user.uid, &display_name, &bio, photo_url.as_deref())?;
        if account_type != user.account_type {
            db.update_account_type(&user.uid, account_type)?;
        }
    }

    // The previous avatar is unreachable now; removal is best-effort.
    if let Some(old) = replaced_photo {
        let _ = state.blobs.delete_by_url(&old).await;
    }

    let updated = state.db.lock().await.get_user(&user.uid)?;
    Ok(Json(updated))
}

// ─── Users & follow graph ───

async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserProfile>>, ServerError> {
    let query = params.q.unwrap_or_default();
    let results = state.db.lock().await.search_users(&query)?;
    Ok(Json(results))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, ServerError> {
    let uid = parse_user_id(&id)?;
    let profile = state.db.lock().await.get_user(&uid)?;
    Ok(Json(profile))
}

async fn list_user_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let uid = parse_user_id(&id)?;
    let viewer = optional_user(&state.db, &headers).await;

    let posts = state.db.lock().await.list_posts_by_author(&uid)?;
    let visible = posts
        .into_iter()
        .filter(|p| viewer_can_see(viewer.as_ref(), p))
        .collect();
    Ok(Json(visible))
}

async fn list_followers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserProfile>>, ServerError> {
    let uid = parse_user_id(&id)?;
    let db = state.db.lock().await;
    let profile = db.get_user(&uid)?;
    let ids: Vec<UserId> = profile.followers.iter().copied().collect();
    Ok(Json(db.get_profiles(&ids)?))
}

async fn list_following(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<UserProfile>>, ServerError> {
    let uid = parse_user_id(&id)?;
    let db = state.db.lock().await;
    let profile = db.get_user(&uid)?;
    let ids: Vec<UserId> = profile.following.iter().copied().collect();
    Ok(Json(db.get_profiles(&ids)?))
}

async fn follow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let target = parse_user_id(&id)?;

    state.db.lock().await.send_follow_request(&user.uid, &target)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn unfollow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let target = parse_user_id(&id)?;

    state.db.lock().await.unfollow(&user.uid, &target)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn cancel_follow_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let target = parse_user_id(&id)?;

    state.db.lock().await.cancel_follow_request(&user.uid, &target)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn respond_to_follow_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RespondRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = require_user(&state.db, &headers).await?;

    state
        .db
        .lock()
        .await
        .respond_to_follow_request(&user.uid, &req.requester, req.action)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ─── Posts ───

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<Post>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let form = collect_form(multipart).await?;

    let title = form.text.get("title").cloned().unwrap_or_default();
    let content = form.text.get("content").cloned().unwrap_or_default();

    let mut image_url = None;
    if let Some((file_name, data)) = &form.image {
        image_url = Some(
            state
                .blobs
                .store_image(ImageCategory::Posts, file_name, data)
                .await?,
        );
    }

    let created = state
        .db
        .lock()
        .await
        .create_post(&user.uid, &title, &content, image_url.clone());

    match created {
        Ok(post) => Ok(Json(post)),
        Err(e) => {
            // Don't leave an orphaned image behind a failed insert.
            if let Some(url) = image_url {
                let _ = state.blobs.delete_by_url(&url).await;
            }
            Err(e.into())
        }
    }
}

async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Post>>, ServerError> {
    let viewer = optional_user(&state.db, &headers).await;

    let posts = state.db.lock().await.list_posts()?;
    let visible = posts
        .into_iter()
        .filter(|p| viewer_can_see(viewer.as_ref(), p))
        .collect();
    Ok(Json(visible))
}

async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Post>, ServerError> {
    let post_id = parse_post_id(&id)?;
    let viewer = optional_user(&state.db, &headers).await;

    let post = state.db.lock().await.get_post(&post_id)?;
    if !viewer_can_see(viewer.as_ref(), &post) {
        return Err(ServerError::Forbidden("This account is private".into()));
    }
    Ok(Json(post))
}

async fn update_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Post>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let post_id = parse_post_id(&id)?;
    let form = collect_form(multipart).await?;

    let title = form.text.get("title").cloned().unwrap_or_default();
    let content = form.text.get("content").cloned().unwrap_or_default();

    let previous = state.db.lock().await.get_post(&post_id)?;

    let mut new_image_url = None;
    if let Some((file_name, data)) = &form.image {
        new_image_url = Some(
            state
                .blobs
                .store_image(ImageCategory::Posts, file_name, data)
                .await?,
        );
    }

    let updated = state.db.lock().await.update_post(
        &post_id,
        &user.uid,
        &title,
        &content,
        new_image_url.clone(),
    );

    match updated {
        Ok(post) => {
            if new_image_url.is_some() {
                if let Some(old) = previous.image_url {
                    let _ = state.blobs.delete_by_url(&old).await;
                }
            }
            Ok(Json(post))
        }
        Err(e) => {
            if let Some(url) = new_image_url {
                let _ = state.blobs.delete_by_url(&url).await;
            }
            Err(e.into())
        }
    }
}

async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let post_id = parse_post_id(&id)?;

    let deleted = state.db.lock().await.delete_post(&post_id, &user.uid)?;
    if let Some(url) = deleted.image_url {
        let _ = state.blobs.delete_by_url(&url).await;
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn toggle_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ReactionResponse>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let post_id = parse_post_id(&id)?;

    let active = state.db.lock().await.toggle_like(&post_id, &user.uid)?;
    Ok(Json(ReactionResponse { active }))
}

async fn toggle_dislike(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ReactionResponse>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let post_id = parse_post_id(&id)?;

    let active = state.db.lock().await.toggle_dislike(&post_id, &user.uid)?;
    Ok(Json(ReactionResponse { active }))
}

// ─── Comments ───

async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, ServerError> {
    let post_id = parse_post_id(&id)?;
    let viewer = optional_user(&state.db, &headers).await;

    let db = state.db.lock().await;
    let post = db.get_post(&post_id)?;
    if !viewer_can_see(viewer.as_ref(), &post) {
        return Err(ServerError::Forbidden("This account is private".into()));
    }
    Ok(Json(db.list_comments(&post_id)?))
}

async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<TextBody>,
) -> Result<Json<Comment>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let post_id = parse_post_id(&id)?;

    let mut db = state.db.lock().await;
    let post = db.get_post(&post_id)?;
    if !viewer_can_see(Some(&user), &post) {
        return Err(ServerError::Forbidden("This account is private".into()));
    }

    let comment = db.add_comment(&post_id, &user.uid, &req.text)?;
    Ok(Json(comment))
}

// ─── Chats ───

async fn open_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OpenChatRequest>,
) -> Result<Json<Chat>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let chat = state.db.lock().await.open_chat(&user.uid, &req.user_id)?;
    Ok(Json(chat))
}

async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Chat>>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let chats = state.db.lock().await.list_chats(&user.uid)?;
    Ok(Json(chats))
}

/// Only chat members may read or write a conversation.
fn require_member(chat: &Chat, uid: &UserId) -> Result<(), ServerError> {
    if chat.members.iter().any(|m| m.uid == *uid) {
        Ok(())
    } else {
        Err(ServerError::Forbidden("Not a member of this chat".into()))
    }
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let chat_id = ChatId(id);

    let db = state.db.lock().await;
    let chat = db.get_chat(&chat_id)?;
    require_member(&chat, &user.uid)?;
    Ok(Json(db.list_messages(&chat_id, None)?))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<TextBody>,
) -> Result<Json<Message>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let chat_id = ChatId(id);

    let mut db = state.db.lock().await;
    let chat = db.get_chat(&chat_id)?;
    require_member(&chat, &user.uid)?;

    let message = db.send_message(&chat_id, &user.uid, &req.text)?;
    Ok(Json(message))
}

// ─── Notifications ───

async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let notifications = state.db.lock().await.list_notifications(&user.uid)?;
    Ok(Json(notifications))
}

async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let count = state.db.lock().await.unread_notification_count(&user.uid)?;
    Ok(Json(serde_json::json!({ "unread": count })))
}

async fn mark_notifications_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user = require_user(&state.db, &headers).await?;
    let updated = state.db.lock().await.mark_notifications_read(&user.uid)?;
    Ok(Json(serde_json::json!({ "marked_read": updated })))
}

// ─── AI assistance ───

async fn generate_paragraph(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TitleBody>,
) -> Result<Json<ParagraphResponse>, ServerError> {
    require_user(&state.db, &headers).await?;
    let paragraph = state.textgen.generate_paragraph(&req.title).await?;
    Ok(Json(ParagraphResponse { paragraph }))
}

async fn summarize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ContentBody>,
) -> Result<Json<SummaryResponse>, ServerError> {
    require_user(&state.db, &headers).await?;
    let summary = state.textgen.summarize(&req.content).await?;
    Ok(Json(SummaryResponse { summary }))
}

// ─── Events (SSE) ───

/// Stream the store change feed as server-sent events.
async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.db.lock().await.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(ev) => match Event::default().event(ev.name()).json_data(&ev) {
                    Ok(event) => {
                        return Some((Ok::<_, std::convert::Infallible>(event), rx));
                    }
                    // An unserializable event is dropped, not fatal.
                    Err(_) => continue,
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ─── Serve ───

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazette_shared::IdSet;

    fn sample_post(account_type: AccountType, author: UserId) -> Post {
        Post {
            id: PostId::new(),
            title: "t".into(),
            content: "c".into(),
            image_url: None,
            author_id: author,
            author_name: "author".into(),
            author_photo_url: None,
            author_account_type: account_type,
            likes: IdSet::new(),
            dislikes: IdSet::new(),
            created_at: chrono::Utc::now(),
        }
    }

    fn sample_profile(uid: UserId, following: IdSet) -> UserProfile {
        UserProfile {
            uid,
            email: "v@example.org".into(),
            display_name: "v".into(),
            photo_url: None,
            bio: String::new(),
            account_type: AccountType::Public,
            followers: IdSet::new(),
            following,
            follow_requests: IdSet::new(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn anonymous_viewer_sees_only_public_posts() {
        let author = UserId::new();
        assert!(viewer_can_see(None, &sample_post(AccountType::Public, author)));
        assert!(!viewer_can_see(None, &sample_post(AccountType::Private, author)));
    }

    #[test]
    fn follower_sees_private_posts() {
        let author = UserId::new();
        let follower = sample_profile(UserId::new(), IdSet::from_iter([author]));
        let stranger = sample_profile(UserId::new(), IdSet::new());

        let post = sample_post(AccountType::Private, author);
        assert!(viewer_can_see(Some(&follower), &post));
        assert!(!viewer_can_see(Some(&stranger), &post));
    }
}
