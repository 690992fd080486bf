//! 可见性监听（节省流量模式）
//!
//! 宿主通过 [`VisibilitySource`] 提供“区域接近视口时一次性通知”的能力。
//! 监听以父分组为单位：分组第一次接近视口时返回其片段，随后不再观察该分组。

use std::collections::{HashMap, HashSet};

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::translation::config::constants;
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::fragment::{FragmentRef, FragmentRegistry, NodeKey, ParentGroup};

/// 预加载边距：可见区域之外再扩展多少个视口高度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub viewport_ratio: f64,
}

impl Default for RootMargin {
    fn default() -> Self {
        Self {
            viewport_ratio: constants::DEFAULT_VISIBILITY_MARGIN,
        }
    }
}

/// 接近视口通知能力
pub trait VisibilitySource {
    /// 开始向 `sender` 推送接近视口的元素
    fn connect(
        &mut self,
        margin: RootMargin,
        sender: UnboundedSender<Vec<Handle>>,
    ) -> TranslationResult<()>;

    fn observe(&mut self, element: &Handle);

    fn unobserve(&mut self, element: &Handle);

    /// 停止所有观察；未连接时什么也不做
    fn disconnect(&mut self);
}

/// 可见性监听器
pub struct VisibilityWatcher {
    source: Box<dyn VisibilitySource>,
    margin: RootMargin,
    receiver: Option<UnboundedReceiver<Vec<Handle>>>,
    observed: HashMap<NodeKey, ParentGroup>,
    /// 分组持有元素的弱引用，条目存在期间标识不会被新元素复用
    visible: HashMap<NodeKey, ParentGroup>,
}

impl VisibilityWatcher {
    pub fn new(source: Box<dyn VisibilitySource>, margin: RootMargin) -> Self {
        Self {
            source,
            margin,
            receiver: None,
            observed: HashMap::new(),
            visible: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn set_margin(&mut self, margin: RootMargin) {
        self.margin = margin;
    }

    /// 连接通知源；已连接时什么也不做
    pub fn start(&mut self) -> TranslationResult<()> {
        if self.is_active() {
            return Ok(());
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        self.source.connect(self.margin, sender)?;
        self.receiver = Some(receiver);
        tracing::debug!("可见性监听已启动 (边距 {} 个视口)", self.margin.viewport_ratio);
        Ok(())
    }

    /// 观察片段所属的分组
    ///
    /// 每个分组只观察一次。返回所属分组已经可见的片段，调用方应直接翻译它们。
    pub fn watch(&mut self, fragments: &[FragmentRef]) -> Vec<FragmentRef> {
        let mut already_visible = Vec::new();

        for fragment in fragments {
            let group = fragment.group();
            let key = group.key();

            if self.visible.contains_key(&key) {
                already_visible.push(fragment.clone());
                continue;
            }

            if self.observed.contains_key(&key) {
                continue;
            }

            if let Some(element) = group.element() {
                self.source.observe(&element);
                self.observed.insert(key, group.clone());
            }
        }

        already_visible
    }

    /// 处理一批接近视口的元素，返回这些分组的片段（文档顺序）
    ///
    /// 每个分组只触发一次，触发后立即停止观察。
    pub fn process(&mut self, elements: Vec<Handle>, registry: &FragmentRegistry) -> Vec<FragmentRef> {
        let mut fragments = Vec::new();

        for element in elements {
            let key = NodeKey::of(&element);
            let Some(group) = self.observed.remove(&key) else {
                continue;
            };

            self.source.unobserve(&element);
            fragments.extend(registry.in_group(&group));
            self.visible.insert(key, group);
        }

        if !fragments.is_empty() {
            tracing::debug!("{} 个片段进入可见范围", fragments.len());
        }
        fragments
    }

    /// 分组是否已经可见过
    pub fn is_visible(&self, group: &ParentGroup) -> bool {
        self.visible.contains_key(&group.key())
    }

    /// 注册表中所属分组已经可见的片段
    pub fn visible_fragments(&self, registry: &FragmentRegistry) -> Vec<FragmentRef> {
        registry
            .all()
            .into_iter()
            .filter(|fragment| self.visible.contains_key(&fragment.group().key()))
            .collect()
    }

    /// 清理已经没有片段的分组：停止观察，并丢弃其可见记录
    ///
    /// 在注册表处理完移除通知之后调用，返回清理的分组数。
    pub fn forget(&mut self, removed: &[FragmentRef], registry: &FragmentRegistry) -> usize {
        let mut seen = HashSet::new();
        let mut forgotten = 0;

        for fragment in removed {
            let group = fragment.group();
            let key = group.key();
            if !seen.insert(key) || !registry.in_group(group).is_empty() {
                continue;
            }

            if let Some(observed) = self.observed.remove(&key) {
                if let Some(element) = observed.element() {
                    self.source.unobserve(&element);
                }
                forgotten += 1;
            } else if self.visible.remove(&key).is_some() {
                forgotten += 1;
            }
        }

        if forgotten > 0 {
            tracing::debug!("清理 {} 个已移除的分组", forgotten);
        }
        forgotten
    }

    pub fn visible_groups(&self) -> usize {
        self.visible.len()
    }

    pub fn observed_groups(&self) -> usize {
        self.observed.len()
    }

    /// 非阻塞地取出一批通知
    pub fn try_next(&mut self) -> Option<Vec<Handle>> {
        self.receiver.as_mut()?.try_recv().ok()
    }

    /// 等待下一批通知；未连接时永不返回
    pub async fn next(&mut self) -> Option<Vec<Handle>> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => std::future::pending().await,
        }
    }

    /// 停止所有观察并清空状态；空闲时什么也不做
    pub fn unwatch(&mut self) {
        if !self.is_active() && self.observed.is_empty() && self.visible.is_empty() {
            return;
        }

        for group in self.observed.values() {
            if let Some(element) = group.element() {
                self.source.unobserve(&element);
            }
        }
        self.observed.clear();
        self.visible.clear();

        if self.receiver.take().is_some() {
            self.source.disconnect();
        }
        tracing::debug!("可见性监听已停止");
    }
}

impl Drop for VisibilityWatcher {
    fn drop(&mut self) {
        self.unwatch();
    }
}
