//! 两级翻译缓存
//!
//! - 易失层：按 `(节点标识, 上下文标识)` 存储，进程内快速查询
//! - 持久层：按 `trans:{上下文标识}:{内容哈希}` 存储在会话存储中，
//!   节点被替换或页面重新加载后仍可命中
//!
//! 缓存从不主动淘汰条目。持久层写入先排队，在当前工作单元结束后统一执行，
//! 写入失败只记录日志。

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use blake3::Hasher;

use crate::translation::config::constants;
use crate::translation::pipeline::fragment::{NodeKey, TextFragment};
use crate::translation::storage::context::{ContextId, TranslationContext};
use crate::translation::storage::session::SessionStore;

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub lookups: u64,
    pub volatile_hits: u64,
    pub persistent_hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub persistent_writes: u64,
    pub persistence_failures: u64,
}

impl CacheStats {
    /// 命中率
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            (self.volatile_hits + self.persistent_hits) as f64 / self.lookups as f64
        }
    }
}

/// 计算规范化文本的内容哈希
pub fn content_hash(normalized: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(normalized.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// 持久层键
pub fn persistent_key(normalized: &str, context: &TranslationContext) -> String {
    format!(
        "{}:{}:{}",
        constants::PERSISTENT_KEY_PREFIX,
        context.id(),
        content_hash(normalized)
    )
}

/// 翻译缓存
pub struct TranslationCache {
    volatile: HashMap<(NodeKey, ContextId), String>,
    store: Option<Rc<dyn SessionStore>>,
    persistent_enabled: bool,
    pending: Vec<(String, String)>,
    stats: CacheStats,
}

impl TranslationCache {
    /// 只有易失层的缓存
    pub fn new() -> Self {
        Self {
            volatile: HashMap::new(),
            store: None,
            persistent_enabled: false,
            pending: Vec::new(),
            stats: CacheStats::default(),
        }
    }

    /// 带会话存储的缓存
    pub fn with_store(store: Rc<dyn SessionStore>, persistent_enabled: bool) -> Self {
        Self {
            store: Some(store),
            persistent_enabled,
            ..Self::new()
        }
    }

    /// 持久层是否可用
    pub fn persistence_active(&self) -> bool {
        self.persistent_enabled && self.store.is_some()
    }

    pub fn set_persistent_enabled(&mut self, enabled: bool) {
        self.persistent_enabled = enabled;
    }

    /// 查询译文：先查易失层，未命中再查持久层并提升到易失层
    pub fn lookup(&mut self, fragment: &TextFragment, context: &TranslationContext) -> Option<String> {
        self.stats.lookups += 1;

        let volatile_key = (fragment.key(), context.id().clone());
        if let Some(translation) = self.volatile.get(&volatile_key) {
            self.stats.volatile_hits += 1;
            return Some(translation.clone());
        }

        if let Some(translation) = self.lookup_persistent(fragment.normalized(), context) {
            self.stats.persistent_hits += 1;
            self.volatile.insert(volatile_key, translation.clone());
            return Some(translation);
        }

        self.stats.misses += 1;
        None
    }

    /// 只查易失层，不影响统计
    pub fn peek(&self, fragment: &TextFragment, context: &TranslationContext) -> Option<&str> {
        self.volatile
            .get(&(fragment.key(), context.id().clone()))
            .map(String::as_str)
    }

    fn lookup_persistent(&self, normalized: &str, context: &TranslationContext) -> Option<String> {
        if !self.persistence_active() {
            return None;
        }

        let key = persistent_key(normalized, context);

        // 尚未写入的排队值也可见
        if let Some((_, value)) = self.pending.iter().rev().find(|(k, _)| *k == key) {
            return Some(value.clone());
        }

        self.store.as_ref().and_then(|store| store.get(&key))
    }

    /// 写入译文：易失层立即写入，持久层排队
    pub fn store(&mut self, fragment: &TextFragment, context: &TranslationContext, translation: &str) {
        self.stats.stores += 1;
        self.volatile.insert(
            (fragment.key(), context.id().clone()),
            translation.to_string(),
        );

        if self.persistence_active() {
            self.pending.push((
                persistent_key(fragment.normalized(), context),
                translation.to_string(),
            ));
        }
    }

    /// 执行排队的持久层写入，返回成功写入的数量
    ///
    /// 写入失败只记录日志并计数，不会向外传播。
    pub fn flush_persistent(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let Some(store) = self.store.as_ref() else {
            return 0;
        };

        let mut written = 0;
        for (key, value) in pending {
            match store.set(&key, &value) {
                Ok(()) => {
                    written += 1;
                    self.stats.persistent_writes += 1;
                }
                Err(e) => {
                    self.stats.persistence_failures += 1;
                    tracing::warn!("持久化缓存写入失败 {}: {}", key, e);
                }
            }
        }

        if written > 0 {
            tracing::debug!("持久化缓存写入 {} 条", written);
        }
        written
    }

    /// 丢弃节点的易失层条目
    pub fn forget_nodes(&mut self, keys: &[NodeKey]) {
        if keys.is_empty() {
            return;
        }
        let keys: HashSet<NodeKey> = keys.iter().copied().collect();
        self.volatile.retain(|(key, _), _| !keys.contains(key));
    }

    /// 清空易失层
    pub fn clear_volatile(&mut self) {
        self.volatile.clear();
    }

    pub fn volatile_len(&self) -> usize {
        self.volatile.len()
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new()
    }
}
