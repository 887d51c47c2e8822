//! 分析结果存储
//!
//! 进程内的 id → 结果映射，没有持久化。每条记录只在自己的键下修改，
//! 终态记录在 TTL 到期后被清理；容量满时优先淘汰最早结束的终态记录，
//! 进行中的记录永不淘汰。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::analysis::{AnalysisRequest, AnalysisResult};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("result store is full ({0} in-flight analyses)")]
    Full(usize),

    #[error("analysis {0} not found")]
    NotFound(String),

    #[error("analysis {0} is already finished")]
    Finished(String),
}

/// 结果存储
pub struct ResultStore {
    entries: DashMap<String, AnalysisResult>,
    ttl: chrono::Duration,
    capacity: usize,
    /// 串行化“检查容量 + 插入”
    admission: Mutex<()>,
}

impl ResultStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100)),
            capacity: capacity.max(1),
            admission: Mutex::new(()),
        }
    }

    /// 登记一个新请求，返回新分配的 id
    pub fn insert_pending(&self, request: AnalysisRequest) -> Result<String, StoreError> {
        let _guard = self.admission.lock();

        if self.entries.len() >= self.capacity {
            self.evict_expired_at(Utc::now());
        }
        if self.entries.len() >= self.capacity && !self.evict_oldest_finished() {
            return Err(StoreError::Full(self.entries.len()));
        }

        let id = Uuid::new_v4().to_string();
        self.entries
            .insert(id.clone(), AnalysisResult::pending(id.clone(), request));
        debug!("Registered analysis {}", id);
        Ok(id)
    }

    /// 当前快照
    pub fn get(&self, id: &str) -> Option<AnalysisResult> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// 修改一条未结束的记录
    ///
    /// 闭包在该条目的锁内执行，应保持简短。
    pub fn update<F, T>(&self, id: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut AnalysisResult) -> T,
    {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if entry.status.is_terminal() {
            return Err(StoreError::Finished(id.to_string()));
        }
        Ok(f(entry.value_mut()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清理已过期的终态记录，返回清理数量
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, result| match result.completed_at {
            Some(done) if result.status.is_terminal() => now.signed_duration_since(done) < self.ttl,
            _ => true,
        });
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            info!("Evicted {} expired analysis results", evicted);
        }
        evicted
    }

    fn evict_oldest_finished(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .filter(|entry| entry.status.is_terminal())
            .filter_map(|entry| entry.completed_at.map(|done| (done, entry.key().clone())))
            .min();

        match oldest {
            Some((_, id)) => {
                debug!("Evicting oldest finished analysis {}", id);
                self.entries.remove(&id).is_some()
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::models::analysis::AnalysisStatus;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("/tmp/project")
    }

    fn finish(store: &ResultStore, id: &str) {
        store
            .update(id, |r| {
                r.transition(AnalysisStatus::Running).unwrap();
                r.complete().unwrap();
            })
            .unwrap();
    }

    #[test]
    fn test_insert_and_get() {
        let store = ResultStore::new(Duration::from_secs(60), 4);
        let id = store.insert_pending(request()).unwrap();
        let result = store.get(&id).unwrap();
        assert_eq!(result.id, id);
        assert_eq!(result.status, AnalysisStatus::Pending);
        assert!(store.get("unknown").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let store = ResultStore::new(Duration::from_secs(60), 16);
        let a = store.insert_pending(request()).unwrap();
        let b = store.insert_pending(request()).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_terminal_records_are_frozen() {
        let store = ResultStore::new(Duration::from_secs(60), 4);
        let id = store.insert_pending(request()).unwrap();
        finish(&store, &id);

        let err = store
            .update(&id, |r| r.fail(&AnalysisError::Internal("late".to_string())))
            .unwrap_err();
        assert_eq!(err, StoreError::Finished(id.clone()));
        assert_eq!(store.get(&id).unwrap().status, AnalysisStatus::Completed);
    }

    #[test]
    fn test_update_unknown_id() {
        let store = ResultStore::new(Duration::from_secs(60), 4);
        let err = store.update("missing", |_| ()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_full_store_evicts_finished_before_rejecting() {
        let store = ResultStore::new(Duration::from_secs(3600), 2);
        let first = store.insert_pending(request()).unwrap();
        let second = store.insert_pending(request()).unwrap();

        // 全部进行中：拒绝
        assert!(matches!(store.insert_pending(request()), Err(StoreError::Full(2))));

        finish(&store, &first);
        let third = store.insert_pending(request()).unwrap();
        assert!(store.get(&first).is_none());
        assert!(store.get(&second).is_some());
        assert!(store.get(&third).is_some());
    }

    #[test]
    fn test_expired_results_are_evicted() {
        let store = ResultStore::new(Duration::from_secs(60), 8);
        let done = store.insert_pending(request()).unwrap();
        let running = store.insert_pending(request()).unwrap();
        finish(&store, &done);

        assert_eq!(store.evict_expired_at(Utc::now()), 0);
        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(store.evict_expired_at(later), 1);
        assert!(store.get(&done).is_none());
        assert!(store.get(&running).is_some());
    }
}
