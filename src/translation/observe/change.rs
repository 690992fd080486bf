//! 结构变化监听
//!
//! 宿主通过 [`ChangeSource`] 提供“批量的增删通知”能力，
//! [`ChangeWatcher`] 把通知转换为新片段的注册和已移除片段的清理。

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::parsers::html::dom::is_attached;
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::collector::TextCollector;
use crate::translation::pipeline::fragment::{FragmentRef, FragmentRegistry};

/// 一条结构变化记录
#[derive(Debug, Clone, Default)]
pub struct MutationRecord {
    pub added: Vec<Handle>,
    pub removed: Vec<Handle>,
}

impl MutationRecord {
    pub fn added(node: &Handle) -> Self {
        Self {
            added: vec![node.clone()],
            removed: Vec::new(),
        }
    }

    pub fn removed(node: &Handle) -> Self {
        Self {
            added: Vec::new(),
            removed: vec![node.clone()],
        }
    }
}

/// 结构变化通知能力
pub trait ChangeSource {
    /// 开始向 `sender` 推送 `root` 下的批量变化
    fn connect(
        &mut self,
        root: &Handle,
        sender: UnboundedSender<Vec<MutationRecord>>,
    ) -> TranslationResult<()>;

    /// 停止推送；未连接时什么也不做
    fn disconnect(&mut self);
}

/// 一批变化的处理结果
#[derive(Debug, Default)]
pub struct ChangeOutcome {
    /// 新注册的片段
    pub added: Vec<FragmentRef>,
    /// 随子树移除而注销的片段
    pub removed: Vec<FragmentRef>,
}

impl ChangeOutcome {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// 结构变化监听器
pub struct ChangeWatcher {
    source: Box<dyn ChangeSource>,
    receiver: Option<UnboundedReceiver<Vec<MutationRecord>>>,
    collector: TextCollector,
}

impl ChangeWatcher {
    pub fn new(source: Box<dyn ChangeSource>) -> Self {
        Self {
            source,
            receiver: None,
            collector: TextCollector::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// 订阅根节点的结构变化；已在监听时什么也不做
    pub fn start(&mut self, root: &Handle) -> TranslationResult<()> {
        if self.is_active() {
            return Ok(());
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        self.source.connect(root, sender)?;
        self.receiver = Some(receiver);
        tracing::debug!("结构变化监听已启动");
        Ok(())
    }

    /// 取消订阅，可重复调用
    pub fn stop(&mut self) {
        if self.receiver.take().is_some() {
            self.source.disconnect();
            tracing::debug!("结构变化监听已停止");
        }
    }

    /// 非阻塞地取出一批变化
    pub fn try_next(&mut self) -> Option<Vec<MutationRecord>> {
        self.receiver.as_mut()?.try_recv().ok()
    }

    /// 等待下一批变化；未监听时永不返回
    pub async fn next(&mut self) -> Option<Vec<MutationRecord>> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => std::future::pending().await,
        }
    }

    /// 处理一批变化
    ///
    /// 先注销被移除子树中的片段，再注册插入节点中的新片段。
    /// 已知节点不会重复注册；处理时已不在文档中的插入节点被忽略。
    pub fn process(
        &mut self,
        records: Vec<MutationRecord>,
        registry: &mut FragmentRegistry,
    ) -> ChangeOutcome {
        let mut outcome = ChangeOutcome::default();

        for record in records {
            for node in &record.removed {
                outcome.removed.extend(registry.forget_subtree(node));
            }

            for node in &record.added {
                if !is_attached(node) {
                    continue;
                }
                let fragments = self.collector.collect_node(node);
                outcome.added.extend(registry.register_all(fragments));
            }
        }

        // 同一批中先插入后移除的节点不应留在新增列表里
        if !outcome.removed.is_empty() {
            outcome.added.retain(|fragment| registry.contains(fragment.key()));
        }

        if !outcome.is_empty() {
            tracing::debug!(
                "结构变化: 新增 {} 个片段，移除 {} 个片段",
                outcome.added.len(),
                outcome.removed.len()
            );
        }

        outcome
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
