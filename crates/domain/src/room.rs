use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{RoomId, Timestamp, UserId};

/// 雇主与自由职业者之间的固定会话绑定。
///
/// 每对 (employer, freelancer) 最多对应一个房间；首次联系时由
/// 雇主一方创建，正常运行中不会删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub employer_id: UserId,
    pub freelancer_id: UserId,
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        employer_id: UserId,
        freelancer_id: UserId,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        if employer_id == freelancer_id {
            return Err(DomainError::invalid_argument(
                "freelancer_id",
                "room requires two distinct participants",
            ));
        }
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(DomainError::invalid_argument("name", "cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            employer_id,
            freelancer_id,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn rejects_room_with_single_participant() {
        let user = UserId::from(Uuid::new_v4());
        let result = Room::new(
            RoomId::from(Uuid::new_v4()),
            "project",
            user,
            user,
            chrono::Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_blank_name() {
        let result = Room::new(
            RoomId::from(Uuid::new_v4()),
            "  ",
            UserId::from(Uuid::new_v4()),
            UserId::from(Uuid::new_v4()),
            chrono::Utc::now(),
        );
        assert!(result.is_err());
    }
}
