//! 在线状态跟踪。
//!
//! 纯投影：在线与否完全由连接注册表的占用情况推导，没有独立
//! 持久化状态。连接可以通过 `requestOnlineUsers` 订阅后续的
//! 上下线推送，同时拿到一份当前快照，覆盖连接与订阅之间的竞态。

use std::sync::Arc;

use domain::UserId;
use uuid::Uuid;

use crate::events::ServerEvent;
use crate::registry::{ConnectionHandle, ConnectionRegistry, PresenceTransition};

pub struct PresenceTracker {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceTracker {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 处理注册表返回的在线状态变化，向订阅者广播上/下线事件。
    pub async fn handle_transition(&self, user_id: UserId, transition: PresenceTransition) {
        let event = match transition {
            PresenceTransition::WentOnline => ServerEvent::UserOnline {
                user_id: Uuid::from(user_id),
            },
            PresenceTransition::WentOffline => ServerEvent::UserOffline {
                user_id: Uuid::from(user_id),
            },
            PresenceTransition::Unchanged => return,
        };

        tracing::debug!(user_id = %user_id, transition = ?transition, "广播在线状态变化");
        self.registry.broadcast_presence(event, user_id).await;
    }

    /// 订阅上下线推送并返回当前在线快照，供错过此前推送的客户端
    /// 一次性补齐状态。
    pub async fn subscribe(&self, connection: &ConnectionHandle) -> ServerEvent {
        connection.subscribe_presence();
        ServerEvent::OnlineUsers {
            user_ids: self.current_online_set().await,
        }
    }

    /// 拉取查询：当前至少有一条连接的参与者集合。
    pub async fn current_online_set(&self) -> Vec<Uuid> {
        self.registry
            .online_users()
            .await
            .into_iter()
            .map(Uuid::from)
            .collect()
    }
}
