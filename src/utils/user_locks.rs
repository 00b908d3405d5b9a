use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 按 Telegram 用户串行化 "读历史 -> 选卡 -> 写历史"
///
/// 交互式抽卡与每日推送共用同一个实例。
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, tg_id: i64) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(tg_id).or_default().clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
