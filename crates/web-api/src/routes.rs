use axum::{
    extract::{ws::WebSocketUpgrade, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{
    services::{CreateRoomRequest, SendMessageRequest},
    storage::UploadRequest,
    MessageDto, RoomDto, RoomSummaryDto, UnreadSnapshot,
};
use application::ConversationSummaryDto;
use domain::FileAttachment;

use crate::{error::ApiError, state::AppState, ws_connection};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessagePayload {
    /// 客户端生成的幂等键
    id: String,
    #[serde(default)]
    text: String,
    file_url: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomPayload {
    freelancer_id: Uuid,
    name: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/unread-counts", get(unread_counts))
        .route("/chat/active-chats", get(active_chats))
        .route("/chat/{receiver_id}/send", post(send_message))
        .route("/chat/{receiver_id}/upload", post(upload_and_send))
        .route("/chat/{user_a}/{user_b}/messages", get(conversation))
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn send_message(
    State(state): State<AppState>,
    Path(receiver_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<SendMessagePayload>,
) -> Result<Json<MessageDto>, ApiError> {
    let sender_id = state.jwt_service.extract_user_from_headers(&headers)?;

    let attachment = payload.file_url.map(|url| FileAttachment {
        url,
        name: payload.file_name.unwrap_or_default(),
        mime_type: payload.file_type.unwrap_or_default(),
    });

    let stored = state
        .chat_service
        .send_message(SendMessageRequest {
            message_id: payload.id,
            sender_id,
            receiver_id,
            text: payload.text,
            attachment,
        })
        .await?;

    Ok(Json(MessageDto::from(&stored)))
}

/// 文件消息：先把二进制内容转存到外部对象存储，再走普通发送路径。
async fn upload_and_send(
    State(state): State<AppState>,
    Path(receiver_id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<MessageDto>, ApiError> {
    let sender_id = state.jwt_service.extract_user_from_headers(&headers)?;

    let mut upload: Option<UploadRequest> = None;
    let mut message_id: Option<String> = None;
    let mut text = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("file").to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("failed to read file: {err}")))?;
                upload = Some(UploadRequest {
                    bytes: bytes.to_vec(),
                    file_name,
                    content_type,
                });
            }
            Some("id") => {
                message_id = field.text().await.ok().filter(|id| !id.trim().is_empty());
            }
            Some("text") => {
                text = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("missing file field"))?;

    let attachment = state
        .file_storage
        .store(upload)
        .await
        .map_err(application::ApplicationError::from)?;

    let stored = state
        .chat_service
        .send_message(SendMessageRequest {
            message_id: message_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            sender_id,
            receiver_id,
            text,
            attachment: Some(attachment),
        })
        .await?;

    Ok(Json(MessageDto::from(&stored)))
}

async fn conversation(
    State(state): State<AppState>,
    Path((user_a, user_b)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let caller = state.jwt_service.extract_user_from_headers(&headers)?;
    if caller != user_a && caller != user_b {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "caller is not a participant of this conversation",
        ));
    }

    let messages = state.chat_service.conversation(user_a, user_b).await?;
    Ok(Json(messages))
}

async fn unread_counts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UnreadSnapshot>, ApiError> {
    let caller = state.jwt_service.extract_user_from_headers(&headers)?;
    Ok(Json(state.chat_service.unread_snapshot(caller).await))
}

async fn active_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummaryDto>>, ApiError> {
    let caller = state.jwt_service.extract_user_from_headers(&headers)?;
    let chats = state.chat_service.active_chats(caller).await?;
    Ok(Json(chats))
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<RoomDto>), ApiError> {
    let employer_id = state.jwt_service.extract_user_from_headers(&headers)?;

    let dto = state
        .room_service
        .create_room(CreateRoomRequest {
            employer_id,
            freelancer_id: payload.freelancer_id,
            name: payload.name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoomSummaryDto>>, ApiError> {
    let caller = state.jwt_service.extract_user_from_headers(&headers)?;
    let rooms = state.room_service.rooms_for_freelancer(caller).await?;
    Ok(Json(rooms))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket 升级。身份来自 `?token=` 查询参数或 Authorization 头。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = match query.token {
        Some(token) => state.jwt_service.verify_token(&token)?.sub,
        None => state.jwt_service.extract_user_from_headers(&headers)?,
    };

    Ok(ws.on_upgrade(move |socket| ws_connection::serve(socket, state, user_id)))
}
