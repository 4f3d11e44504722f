//! 领域模型层。
//!
//! 定义双方私聊系统的核心实体与值对象：参与者（雇主/自由职业者）、
//! 私信消息、会话房间，以及各层共享的错误类型。不包含任何 IO。

pub mod errors;
pub mod message;
pub mod participant;
pub mod room;
pub mod value_objects;

pub use errors::{DomainError, RepositoryError};
pub use message::{DirectMessage, FileAttachment};
pub use participant::{Participant, ParticipantRole};
pub use room::Room;
pub use value_objects::{MessageId, RoomId, Timestamp, UserId};
