//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，以及实时消息引擎的核心组件：
//! 连接注册表、在线状态跟踪、未读计数表和消息分发管道。
//! 对外部适配器（消息存储、账号查询、文件存储）只依赖抽象接口。

pub mod clock;
pub mod dto;
pub mod error;
pub mod events;
pub mod presence;
pub mod registry;
pub mod repository;
pub mod services;
pub mod storage;
pub mod unread;

pub use clock::{Clock, SystemClock};
pub use dto::{ConversationSummaryDto, MessageDto, RoomDto, RoomSummaryDto, UnreadSnapshot};
pub use error::{ApplicationError, ApplicationResult};
pub use events::{ClientEvent, ServerEvent};
pub use presence::PresenceTracker;
pub use registry::{
    ConnectionHandle, ConnectionRegistry, PresenceTransition, RegisteredConnection,
};
pub use repository::{
    InsertOutcome, MessageRepository, ParticipantRepository, RoomRepository, UnreadRow,
};
pub use services::{
    ChatService, ChatServiceDependencies, CreateRoomRequest, RoomService, RoomServiceDependencies,
    SendMessageRequest,
};
pub use storage::{FileStorage, StorageError, UploadRequest};
pub use unread::UnreadCounts;
