//! 连接注册表。
//!
//! 维护参与者身份 → 当前打开的实时连接集合的映射（同一用户允许
//! 多个连接，例如多个浏览器标签页）。锁按身份划分：外层读写锁只
//! 保护映射结构，每个身份的连接集合持有独立互斥锁，同一身份的
//! 注册/注销互相串行，不同身份之间互不阻塞。
//!
//! 推送路径完全非阻塞：每个连接带一条有界发送队列，队列写满的
//! 连接会被标记关闭并走统一的注销路径，绝不拖慢其他接收方。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use domain::{Timestamp, UserId};
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use uuid::Uuid;

use crate::events::ServerEvent;

/// 向单个连接推送事件时的失败原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// 连接已关闭
    Closed,
    /// 发送队列已满，连接被标记关闭
    QueueFull,
}

/// 注册/注销引起的在线状态变化。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    /// 该身份的第一个连接建立，用户上线
    WentOnline,
    /// 该身份的最后一个连接断开，用户下线
    WentOffline,
    /// 在线状态不变
    Unchanged,
}

/// 一条活跃的实时连接。
///
/// 由注册表在连接存续期间持有；断开（网络中断、显式关闭或进程
/// 退出）后销毁，从不持久化。
pub struct ConnectionHandle {
    id: Uuid,
    user_id: UserId,
    opened_at: Timestamp,
    sender: mpsc::Sender<ServerEvent>,
    wants_presence: AtomicBool,
    closed: AtomicBool,
    shutdown: Notify,
}

impl ConnectionHandle {
    fn new(user_id: UserId, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            opened_at: chrono::Utc::now(),
            sender,
            wants_presence: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    /// 订阅上下线推送。
    pub fn subscribe_presence(&self) {
        self.wants_presence.store(true, Ordering::Release);
    }

    pub fn wants_presence(&self) -> bool {
        self.wants_presence.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 标记连接关闭并唤醒等待者。实际注销由连接任务的统一清理
    /// 路径完成，这里只发信号。
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.shutdown.notify_waiters();
    }

    /// 等待连接被标记关闭（心跳超时、队列写满或进程停机）。
    pub async fn wait_closed(&self) {
        loop {
            let notified = self.shutdown.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    /// 非阻塞推送一条事件。队列写满视为该连接拥塞，标记关闭，
    /// 不会等待慢客户端。
    pub fn push(&self, event: ServerEvent) -> Result<(), PushError> {
        if self.is_closed() {
            return Err(PushError::Closed);
        }
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    user_id = %self.user_id,
                    "发送队列已满，断开拥塞连接"
                );
                self.close();
                Err(PushError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.close();
                Err(PushError::Closed)
            }
        }
    }
}

/// `register` 的返回值：连接句柄、事件接收端和在线状态变化。
pub struct RegisteredConnection {
    pub handle: Arc<ConnectionHandle>,
    pub events: mpsc::Receiver<ServerEvent>,
    pub transition: PresenceTransition,
}

type Entry = Arc<Mutex<Vec<Arc<ConnectionHandle>>>>;

/// 连接注册表。进程启动时为空，进程停机时强制关闭所有连接。
pub struct ConnectionRegistry {
    entries: RwLock<HashMap<UserId, Entry>>,
    send_queue_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(send_queue_capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            send_queue_capacity,
        }
    }

    /// 取出某身份的连接集合；不存在时创建空集合。
    /// 空集合保留在映射中，避免移除与并发注册之间的竞态。
    async fn entry_for(&self, user_id: UserId) -> Entry {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&user_id) {
                return entry.clone();
            }
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    /// 在指定身份下登记一条新连接。从不失败；若这是该身份的第一条
    /// 连接，返回 `WentOnline` 供在线状态跟踪器广播。
    pub async fn register(&self, user_id: UserId) -> RegisteredConnection {
        let (sender, events) = mpsc::channel(self.send_queue_capacity);
        let handle = Arc::new(ConnectionHandle::new(user_id, sender));

        let entry = self.entry_for(user_id).await;
        let mut connections = entry.lock().await;
        connections.push(handle.clone());
        let transition = if connections.len() == 1 {
            PresenceTransition::WentOnline
        } else {
            PresenceTransition::Unchanged
        };
        let open_connections = connections.len();
        drop(connections);

        tracing::debug!(
            connection_id = %handle.id(),
            user_id = %user_id,
            open_connections,
            "连接已注册"
        );

        RegisteredConnection {
            handle,
            events,
            transition,
        }
    }

    /// 注销一条连接。按连接 ID 幂等：重复注销返回 `Unchanged`，
    /// 保证快速重连/断开循环下最多一次下线通知。
    pub async fn unregister(&self, handle: &ConnectionHandle) -> PresenceTransition {
        let entry = {
            let entries = self.entries.read().await;
            match entries.get(&handle.user_id()) {
                Some(entry) => entry.clone(),
                None => return PresenceTransition::Unchanged,
            }
        };

        let mut connections = entry.lock().await;
        let before = connections.len();
        connections.retain(|candidate| candidate.id() != handle.id());
        if connections.len() == before {
            return PresenceTransition::Unchanged;
        }
        let now_empty = connections.is_empty();
        drop(connections);

        handle.close();
        tracing::debug!(
            connection_id = %handle.id(),
            user_id = %handle.user_id(),
            "连接已注销"
        );

        if now_empty {
            PresenceTransition::WentOffline
        } else {
            PresenceTransition::Unchanged
        }
    }

    /// 某身份当前打开的全部连接；不存在时返回空集合。
    pub async fn connections_for(&self, user_id: UserId) -> Vec<Arc<ConnectionHandle>> {
        let entry = {
            let entries = self.entries.read().await;
            match entries.get(&user_id) {
                Some(entry) => entry.clone(),
                None => return Vec::new(),
            }
        };
        let connections = entry.lock().await;
        connections.clone()
    }

    /// 向某身份的所有连接推送事件，返回实际送达的连接数。
    /// 单个拥塞连接被丢弃并记录，不影响其余连接。
    pub async fn send_to_user(&self, user_id: UserId, event: ServerEvent) -> usize {
        let handles = self.connections_for(user_id).await;
        let mut delivered = 0;
        for handle in handles {
            match handle.push(event.clone()) {
                Ok(()) => delivered += 1,
                Err(PushError::QueueFull) | Err(PushError::Closed) => {
                    tracing::warn!(
                        connection_id = %handle.id(),
                        user_id = %user_id,
                        "连接不可达，跳过推送"
                    );
                }
            }
        }
        delivered
    }

    /// 向所有订阅了上下线推送的连接广播（事件主体自身的连接除外）。
    pub async fn broadcast_presence(&self, event: ServerEvent, about: UserId) {
        let entries: Vec<Entry> = {
            let entries = self.entries.read().await;
            entries.values().cloned().collect()
        };

        for entry in entries {
            let handles = entry.lock().await.clone();
            for handle in handles {
                if handle.user_id() == about || !handle.wants_presence() {
                    continue;
                }
                let _ = handle.push(event.clone());
            }
        }
    }

    /// 当前在线用户集合：连接集合非空的身份。
    pub async fn online_users(&self) -> Vec<UserId> {
        let entries: Vec<(UserId, Entry)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .map(|(user_id, entry)| (*user_id, entry.clone()))
                .collect()
        };

        let mut online = Vec::new();
        for (user_id, entry) in entries {
            if !entry.lock().await.is_empty() {
                online.push(user_id);
            }
        }
        online
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(&user_id).cloned()
        };
        match entry {
            Some(entry) => !entry.lock().await.is_empty(),
            None => false,
        }
    }

    /// 进程停机：标记所有连接关闭，各连接任务随后走统一注销路径。
    pub async fn close_all(&self) {
        let entries: Vec<Entry> = {
            let entries = self.entries.read().await;
            entries.values().cloned().collect()
        };
        for entry in entries {
            for handle in entry.lock().await.iter() {
                handle.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::from(Uuid::new_v4())
    }

    fn probe_event() -> ServerEvent {
        ServerEvent::UserOnline {
            user_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn first_connection_goes_online_last_goes_offline() {
        let registry = ConnectionRegistry::new(8);
        let user_id = user();

        let first = registry.register(user_id).await;
        assert_eq!(first.transition, PresenceTransition::WentOnline);

        let second = registry.register(user_id).await;
        assert_eq!(second.transition, PresenceTransition::Unchanged);

        assert_eq!(
            registry.unregister(&second.handle).await,
            PresenceTransition::Unchanged
        );
        assert_eq!(
            registry.unregister(&first.handle).await,
            PresenceTransition::WentOffline
        );
        assert!(!registry.is_online(user_id).await);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new(8);
        let conn = registry.register(user()).await;

        assert_eq!(
            registry.unregister(&conn.handle).await,
            PresenceTransition::WentOffline
        );
        // 第二次注销不得再次报告下线
        assert_eq!(
            registry.unregister(&conn.handle).await,
            PresenceTransition::Unchanged
        );
    }

    #[tokio::test]
    async fn rapid_reconnect_cycles_emit_exactly_one_offline_each() {
        let registry = ConnectionRegistry::new(8);
        let user_id = user();

        for _ in 0..10 {
            let conn = registry.register(user_id).await;
            assert_eq!(conn.transition, PresenceTransition::WentOnline);
            assert_eq!(
                registry.unregister(&conn.handle).await,
                PresenceTransition::WentOffline
            );
        }
    }

    #[tokio::test]
    async fn fan_out_reaches_every_open_connection() {
        let registry = ConnectionRegistry::new(8);
        let user_id = user();

        let mut tab_a = registry.register(user_id).await;
        let mut tab_b = registry.register(user_id).await;

        let delivered = registry.send_to_user(user_id, probe_event()).await;
        assert_eq!(delivered, 2);
        assert!(tab_a.events.recv().await.is_some());
        assert!(tab_b.events.recv().await.is_some());
    }

    #[tokio::test]
    async fn full_queue_drops_only_the_congested_connection() {
        let registry = ConnectionRegistry::new(1);
        let user_id = user();

        let congested = registry.register(user_id).await;
        let mut healthy = registry.register(user_id).await;

        // 两条队列各收下一条，拥塞连接从此不再消费
        assert_eq!(registry.send_to_user(user_id, probe_event()).await, 2);
        assert!(healthy.events.recv().await.is_some());

        // 第二轮推送：拥塞连接溢出被关闭，健康连接不受影响
        let delivered = registry.send_to_user(user_id, probe_event()).await;
        assert_eq!(delivered, 1);
        assert!(congested.handle.is_closed());
        assert!(!healthy.handle.is_closed());
        assert!(healthy.events.recv().await.is_some());
    }

    #[tokio::test]
    async fn closed_handle_wakes_waiters() {
        let registry = ConnectionRegistry::new(4);
        let conn = registry.register(user()).await;
        let handle = conn.handle.clone();

        let waiter = tokio::spawn(async move { handle.wait_closed().await });
        conn.handle.close();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn online_set_tracks_registry_occupancy() {
        let registry = ConnectionRegistry::new(4);
        let alice = user();
        let bob = user();

        let alice_conn = registry.register(alice).await;
        let _bob_conn = registry.register(bob).await;

        let mut online = registry.online_users().await;
        online.sort_by_key(|id| Uuid::from(*id));
        assert_eq!(online.len(), 2);

        registry.unregister(&alice_conn.handle).await;
        let online = registry.online_users().await;
        assert_eq!(online, vec![bob]);
    }
}
