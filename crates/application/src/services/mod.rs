mod chat_service;
mod room_service;

#[cfg(test)]
mod room_service_tests;

pub use chat_service::{ChatService, ChatServiceDependencies, SendMessageRequest};
pub use room_service::{CreateRoomRequest, RoomService, RoomServiceDependencies};
