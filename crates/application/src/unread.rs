//! 未读计数表。
//!
//! 每个接收方维护 对端 → 未读条数 的映射。进程启动时从持久化
//! 消息里重建（扫描未读行），之后只允许两处增量修改：消息分发
//! 管道递增（每次投递 +1），阅读回执协调器清零。锁按接收方身份
//! 划分，发送与已读在同一 (receiver, peer) 上的竞争被串行化，
//! 不会丢失更新。

use std::collections::HashMap;
use std::sync::Arc;

use domain::UserId;
use tokio::sync::{Mutex, RwLock};

use crate::repository::UnreadRow;

type Entry = Arc<Mutex<HashMap<UserId, u64>>>;

#[derive(Default)]
pub struct UnreadCounts {
    entries: RwLock<HashMap<UserId, Entry>>,
}

impl UnreadCounts {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry_for(&self, receiver: UserId) -> Entry {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&receiver) {
                return entry.clone();
            }
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(receiver)
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .clone()
    }

    /// 启动时从持久化状态重建。
    pub async fn seed(&self, rows: Vec<UnreadRow>) {
        for row in rows {
            let entry = self.entry_for(row.receiver_id).await;
            let mut counts = entry.lock().await;
            counts.insert(row.sender_id, row.count);
        }
    }

    /// 投递一条新消息后递增，返回新的未读数。
    pub async fn increment(&self, receiver: UserId, peer: UserId) -> u64 {
        let entry = self.entry_for(receiver).await;
        let mut counts = entry.lock().await;
        let count = counts.entry(peer).or_insert(0);
        *count += 1;
        *count
    }

    /// 阅读回执处理后清零，返回清零前的值。
    pub async fn reset(&self, receiver: UserId, peer: UserId) -> u64 {
        let entry = self.entry_for(receiver).await;
        let mut counts = entry.lock().await;
        counts.remove(&peer).unwrap_or(0)
    }

    pub async fn count(&self, receiver: UserId, peer: UserId) -> u64 {
        let entry = self.entry_for(receiver).await;
        let counts = entry.lock().await;
        counts.get(&peer).copied().unwrap_or(0)
    }

    /// 接收方的完整快照，用于客户端初始水合（页面加载时）。
    pub async fn snapshot(&self, receiver: UserId) -> HashMap<UserId, u64> {
        let entry = self.entry_for(receiver).await;
        let counts = entry.lock().await;
        counts.clone()
    }
}
