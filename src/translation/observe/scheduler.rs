//! 防抖调度器
//!
//! 每个触发事件把片段标记为脏并重置截止时间；截止时间到达后，
//! 积累的脏片段集合被整体取出一次，用于执行单次翻译过程。

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::translation::pipeline::fragment::{FragmentRef, NodeKey};

/// 尾沿防抖的翻译过程调度器
#[derive(Debug)]
pub struct PassScheduler {
    debounce: Duration,
    dirty: Vec<FragmentRef>,
    dirty_keys: HashSet<NodeKey>,
    deadline: Option<Instant>,
}

impl PassScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            dirty: Vec::new(),
            dirty_keys: HashSet::new(),
            deadline: None,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    /// 标记片段为脏，并把截止时间推迟到 `now + debounce`
    ///
    /// 空输入不算触发。
    pub fn mark_dirty<I>(&mut self, fragments: I, now: Instant)
    where
        I: IntoIterator<Item = FragmentRef>,
    {
        let mut triggered = false;
        for fragment in fragments {
            triggered = true;
            if self.dirty_keys.insert(fragment.key()) {
                self.dirty.push(fragment);
            }
        }

        if triggered {
            self.deadline = Some(now + self.debounce);
        }
    }

    /// 从脏集合中移除片段（例如节点已被移除）
    pub fn discard(&mut self, keys: &[NodeKey]) {
        if keys.is_empty() {
            return;
        }
        for key in keys {
            self.dirty_keys.remove(key);
        }
        let dirty_keys = &self.dirty_keys;
        self.dirty.retain(|fragment| dirty_keys.contains(&fragment.key()));
        if self.dirty.is_empty() {
            self.deadline = None;
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }

    /// 截止时间已到时取出脏集合（恰好一次）
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<FragmentRef>> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.take_all())
    }

    /// 不论截止时间，立即取出脏集合
    pub fn take_all(&mut self) -> Vec<FragmentRef> {
        self.deadline = None;
        self.dirty_keys.clear();
        std::mem::take(&mut self.dirty)
    }

    pub fn pending(&self) -> usize {
        self.dirty.len()
    }

    pub fn clear(&mut self) {
        self.take_all();
    }
}
