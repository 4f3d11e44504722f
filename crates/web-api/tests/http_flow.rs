//! HTTP 接口流程测试：内存仓储 + tower oneshot 驱动路由。

use std::sync::Arc;
use std::time::Duration;

use application::repository::memory::{
    MemoryMessageRepository, MemoryParticipantRepository, MemoryRoomRepository,
};
use application::storage::{FileStorage, StorageError, UploadRequest};
use application::{
    ChatService, ChatServiceDependencies, ConnectionRegistry, PresenceTracker, RoomService,
    RoomServiceDependencies, SystemClock, UnreadCounts,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use config::{JwtConfig, RealtimeConfig};
use domain::{FileAttachment, Participant, ParticipantRole, UserId};
use tower::ServiceExt;
use uuid::Uuid;
use web_api::{AppState, JwtService};

struct NullStorage;

#[async_trait]
impl FileStorage for NullStorage {
    async fn store(&self, upload: UploadRequest) -> Result<FileAttachment, StorageError> {
        Ok(FileAttachment {
            url: format!("https://files.example.com/{}", upload.file_name),
            name: upload.file_name,
            mime_type: upload.content_type,
        })
    }
}

struct TestApp {
    router: Router,
    jwt: JwtService,
    employer: Participant,
    freelancer: Participant,
}

fn participant(role: ParticipantRole, username: &str) -> Participant {
    Participant {
        id: UserId::from(Uuid::new_v4()),
        username: username.to_owned(),
        avatar_url: None,
        role,
    }
}

async fn test_app() -> TestApp {
    let participants = Arc::new(MemoryParticipantRepository::new());
    let employer = participant(ParticipantRole::Employer, "acme");
    let freelancer = participant(ParticipantRole::Freelancer, "dev");
    participants.add(employer.clone()).await;
    participants.add(freelancer.clone()).await;

    let registry = Arc::new(ConnectionRegistry::new(16));
    let unread = Arc::new(UnreadCounts::new());
    let clock = Arc::new(SystemClock);
    let operation_timeout = Duration::from_secs(1);

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        participants: participants.clone(),
        messages: Arc::new(MemoryMessageRepository::new()),
        registry: registry.clone(),
        unread: unread.clone(),
        clock: clock.clone(),
        operation_timeout,
    }));
    let room_service = Arc::new(RoomService::new(RoomServiceDependencies {
        rooms: Arc::new(MemoryRoomRepository::new()),
        participants,
        unread,
        clock,
        operation_timeout,
    }));

    let jwt = JwtService::new(JwtConfig {
        secret: "test-secret".into(),
        expiration_hours: 1,
    });

    let state = AppState {
        chat_service,
        room_service,
        presence: Arc::new(PresenceTracker::new(registry.clone())),
        registry,
        file_storage: Arc::new(NullStorage),
        jwt_service: Arc::new(jwt.clone()),
        realtime: RealtimeConfig {
            send_queue_capacity: 16,
            heartbeat_timeout_secs: 60,
            operation_timeout_ms: 1_000,
        },
    };

    TestApp {
        router: web_api::router(state),
        jwt,
        employer,
        freelancer,
    }
}

impl TestApp {
    fn token_for(&self, user: &Participant) -> String {
        self.jwt
            .generate_token(Uuid::from(user.id))
            .expect("token")
    }

    fn request(&self, method: &str, uri: &str, user: Option<&Participant>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token_for(user)),
            );
        }
        builder.body(Body::empty()).expect("request")
    }

    fn json_request(
        &self,
        method: &str,
        uri: &str,
        user: &Participant,
        body: serde_json::Value,
    ) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token_for(user)),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_check_is_open() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(app.request("GET", "/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_requires_a_bearer_token() {
    let app = test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(app.request("GET", "/api/v1/chat/unread-counts", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn send_message_persists_and_reports_unread() {
    let app = test_app().await;
    let freelancer_id = Uuid::from(app.freelancer.id);

    let response = app
        .router
        .clone()
        .oneshot(app.json_request(
            "POST",
            &format!("/api/v1/chat/{freelancer_id}/send"),
            &app.employer,
            serde_json::json!({"id": "m1", "text": "Hi"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], "m1");
    assert_eq!(body["isRead"], false);

    let response = app
        .router
        .clone()
        .oneshot(app.request(
            "GET",
            "/api/v1/chat/unread-counts",
            Some(&app.freelancer),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let counts = body_json(response).await;
    assert_eq!(counts[Uuid::from(app.employer.id).to_string()], 1);
}

#[tokio::test]
async fn self_addressed_message_is_a_bad_request() {
    let app = test_app().await;
    let employer_id = Uuid::from(app.employer.id);

    let response = app
        .router
        .clone()
        .oneshot(app.json_request(
            "POST",
            &format!("/api/v1/chat/{employer_id}/send"),
            &app.employer,
            serde_json::json!({"id": "m1", "text": "Hi"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_MESSAGE");
}

#[tokio::test]
async fn conversation_is_limited_to_its_participants() {
    let app = test_app().await;
    let employer_id = Uuid::from(app.employer.id);
    let outsider = Uuid::new_v4();

    let response = app
        .router
        .clone()
        .oneshot(app.request(
            "GET",
            &format!("/api/v1/chat/{employer_id}/{outsider}/messages"),
            Some(&app.freelancer),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn room_creation_is_employer_only() {
    let app = test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(app.json_request(
            "POST",
            "/api/v1/rooms",
            &app.freelancer,
            serde_json::json!({
                "freelancerId": Uuid::from(app.employer.id),
                "name": "Reverse"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn employer_creates_room_then_freelancer_lists_it() {
    let app = test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(app.json_request(
            "POST",
            "/api/v1/rooms",
            &app.employer,
            serde_json::json!({
                "freelancerId": Uuid::from(app.freelancer.id),
                "name": "Logo redesign"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .router
        .clone()
        .oneshot(app.request("GET", "/api/v1/rooms", Some(&app.freelancer)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rooms = body_json(response).await;
    assert_eq!(rooms.as_array().map(|r| r.len()), Some(1));
    assert_eq!(rooms[0]["employerName"], "acme");
}
