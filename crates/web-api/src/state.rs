use std::sync::Arc;

use application::{
    ChatService, ConnectionRegistry, FileStorage, PresenceTracker, RoomService,
};
use config::RealtimeConfig;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub room_service: Arc<RoomService>,
    pub registry: Arc<ConnectionRegistry>,
    pub presence: Arc<PresenceTracker>,
    pub file_storage: Arc<dyn FileStorage>,
    pub jwt_service: Arc<JwtService>,
    pub realtime: RealtimeConfig,
}
