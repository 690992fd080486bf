//! 手动驱动的通知源
//!
//! 没有真实渲染环境的宿主（服务端渲染、测试）用它们手动推送结构变化和可见性事件。
//! 句柄可以克隆，克隆体与交给监听器的实例共享同一个连接。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc::UnboundedSender;

use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::observe::change::{ChangeSource, MutationRecord};
use crate::translation::observe::visibility::{RootMargin, VisibilitySource};
use crate::translation::pipeline::fragment::NodeKey;

/// 手动结构变化源
#[derive(Clone, Default)]
pub struct ManualChangeSource {
    sender: Rc<RefCell<Option<UnboundedSender<Vec<MutationRecord>>>>>,
    fail_connect: Rc<Cell<bool>>,
    connects: Rc<Cell<usize>>,
}

impl ManualChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接总是失败的变化源
    pub fn failing() -> Self {
        let source = Self::default();
        source.fail_connect.set(true);
        source
    }

    /// 推送一批变化，未连接时返回 false
    pub fn emit(&self, records: Vec<MutationRecord>) -> bool {
        match self.sender.borrow().as_ref() {
            Some(sender) => sender.send(records).is_ok(),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// 累计连接次数
    pub fn connect_count(&self) -> usize {
        self.connects.get()
    }
}

impl ChangeSource for ManualChangeSource {
    fn connect(
        &mut self,
        _root: &Handle,
        sender: UnboundedSender<Vec<MutationRecord>>,
    ) -> TranslationResult<()> {
        if self.fail_connect.get() {
            return Err(TranslationError::Collection("无法订阅结构变化".to_string()));
        }
        self.connects.set(self.connects.get() + 1);
        *self.sender.borrow_mut() = Some(sender);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.sender.borrow_mut().take();
    }
}

/// 手动可见性源
#[derive(Clone, Default)]
pub struct ManualVisibilitySource {
    sender: Rc<RefCell<Option<UnboundedSender<Vec<Handle>>>>>,
    observed: Rc<RefCell<HashMap<NodeKey, Handle>>>,
    margin: Rc<Cell<Option<RootMargin>>>,
    fail_connect: Rc<Cell<bool>>,
}

impl ManualVisibilitySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接总是失败的可见性源
    pub fn failing() -> Self {
        let source = Self::default();
        source.fail_connect.set(true);
        source
    }

    /// 报告元素接近视口；元素未被观察或未连接时返回 false
    pub fn reveal(&self, element: &Handle) -> bool {
        if !self.observed.borrow().contains_key(&NodeKey::of(element)) {
            return false;
        }
        match self.sender.borrow().as_ref() {
            Some(sender) => sender.send(vec![element.clone()]).is_ok(),
            None => false,
        }
    }

    /// 报告所有被观察的元素接近视口，返回报告数量
    pub fn reveal_all(&self) -> usize {
        let elements: Vec<Handle> = self.observed.borrow().values().cloned().collect();
        let count = elements.len();
        match self.sender.borrow().as_ref() {
            Some(sender) if count > 0 && sender.send(elements).is_ok() => count,
            _ => 0,
        }
    }

    pub fn is_observing(&self, element: &Handle) -> bool {
        self.observed.borrow().contains_key(&NodeKey::of(element))
    }

    pub fn observed_count(&self) -> usize {
        self.observed.borrow().len()
    }

    pub fn is_connected(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// 最近一次连接使用的边距
    pub fn margin(&self) -> Option<RootMargin> {
        self.margin.get()
    }
}

impl VisibilitySource for ManualVisibilitySource {
    fn connect(&mut self, margin: RootMargin, sender: UnboundedSender<Vec<Handle>>) -> TranslationResult<()> {
        if self.fail_connect.get() {
            return Err(TranslationError::Collection("无法订阅可见性变化".to_string()));
        }
        self.margin.set(Some(margin));
        *self.sender.borrow_mut() = Some(sender);
        Ok(())
    }

    fn observe(&mut self, element: &Handle) {
        self.observed
            .borrow_mut()
            .insert(NodeKey::of(element), element.clone());
    }

    fn unobserve(&mut self, element: &Handle) {
        self.observed.borrow_mut().remove(&NodeKey::of(element));
    }

    fn disconnect(&mut self) {
        self.observed.borrow_mut().clear();
        self.sender.borrow_mut().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{append_child, create_element, create_text, detach, find_nodes, html_to_dom};
    use crate::translation::observe::change::ChangeWatcher;
    use crate::translation::observe::visibility::VisibilityWatcher;
    use crate::translation::pipeline::collector::TextCollector;
    use crate::translation::pipeline::fragment::FragmentRegistry;

    #[test]
    fn test_change_watcher_registers_inserted_nodes_once() {
        let dom = html_to_dom(b"<body><div id=main><p>Hello</p></div></body>", "utf-8").unwrap();
        let main = find_nodes(&dom.document, &["div"]).remove(0);

        let mut registry = FragmentRegistry::new();
        registry.register_all(TextCollector::new().collect(&dom.document).unwrap());

        let source = ManualChangeSource::new();
        let mut watcher = ChangeWatcher::new(Box::new(source.clone()));
        watcher.start(&dom.document).unwrap();

        let section = create_element("section", &[]);
        append_child(&section, &create_text("Fresh text"));
        append_child(&main, &section);

        let text = create_text("Loose words");
        append_child(&main, &text);

        assert!(source.emit(vec![
            MutationRecord::added(&section),
            MutationRecord::added(&text),
            // 重复通知不应重复注册
            MutationRecord::added(&text),
        ]));

        let batch = watcher.try_next().unwrap();
        let outcome = watcher.process(batch, &mut registry);
        let added: Vec<&str> = outcome.added.iter().map(|f| f.normalized()).collect();
        assert_eq!(added, vec!["Fresh text", "Loose words"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_change_watcher_prunes_removed_subtrees() {
        let dom = html_to_dom(b"<body><div><p>One</p><p>Two</p></div></body>", "utf-8").unwrap();
        let first = find_nodes(&dom.document, &["p"]).remove(0);

        let mut registry = FragmentRegistry::new();
        registry.register_all(TextCollector::new().collect(&dom.document).unwrap());

        let source = ManualChangeSource::new();
        let mut watcher = ChangeWatcher::new(Box::new(source.clone()));
        watcher.start(&dom.document).unwrap();

        detach(&first);
        source.emit(vec![MutationRecord::removed(&first)]);

        let batch = watcher.try_next().unwrap();
        let outcome = watcher.process(batch, &mut registry);
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].normalized(), "One");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_change_watcher_stop_is_idempotent() {
        let dom = html_to_dom(b"<p>Hi</p>", "utf-8").unwrap();
        let source = ManualChangeSource::new();
        let mut watcher = ChangeWatcher::new(Box::new(source.clone()));

        watcher.start(&dom.document).unwrap();
        assert!(source.is_connected());

        watcher.stop();
        watcher.stop();
        assert!(!source.is_connected());
        assert!(!source.emit(vec![MutationRecord::default()]));
        assert!(watcher.try_next().is_none());
    }

    #[test]
    fn test_visibility_is_one_shot_per_group() {
        let dom = html_to_dom(b"<body><p>A <b>bold</b> line</p><p>Other</p></body>", "utf-8").unwrap();
        let paragraphs = find_nodes(&dom.document, &["p"]);

        let mut registry = FragmentRegistry::new();
        let fragments = registry.register_all(TextCollector::new().collect(&dom.document).unwrap());

        let source = ManualVisibilitySource::new();
        let mut watcher = VisibilityWatcher::new(Box::new(source.clone()), RootMargin::default());
        watcher.start().unwrap();
        assert!(watcher.watch(&fragments).is_empty());
        assert_eq!(source.observed_count(), 2);
        assert_eq!(source.margin(), Some(RootMargin { viewport_ratio: 0.5 }));

        assert!(source.reveal(&paragraphs[0]));
        let elements = watcher.try_next().unwrap();
        let visible = watcher.process(elements, &registry);
        let texts: Vec<&str> = visible.iter().map(|f| f.normalized()).collect();
        assert_eq!(texts, vec!["A", "bold", "line"]);

        // 已触发的分组不再被观察
        assert!(!source.is_observing(&paragraphs[0]));
        assert!(!source.reveal(&paragraphs[0]));
        assert!(watcher.is_visible(visible[0].group()));
    }

    #[test]
    fn test_forget_drops_removed_groups() {
        let dom = html_to_dom(b"<body><p>Seen</p><p>Hidden</p><p>A <b>bold</b> word</p></body>", "utf-8").unwrap();
        let paragraphs = find_nodes(&dom.document, &["p"]);

        let mut registry = FragmentRegistry::new();
        let fragments = registry.register_all(TextCollector::new().collect(&dom.document).unwrap());

        let source = ManualVisibilitySource::new();
        let mut watcher = VisibilityWatcher::new(Box::new(source.clone()), RootMargin::default());
        watcher.start().unwrap();
        watcher.watch(&fragments);
        source.reveal(&paragraphs[0]);
        let elements = watcher.try_next().unwrap();
        watcher.process(elements, &registry);
        assert_eq!(watcher.visible_groups(), 1);
        assert_eq!(watcher.observed_groups(), 2);

        // 分组内还有片段时保留
        let bold = find_nodes(&dom.document, &["b"]).remove(0);
        detach(&bold);
        let removed = registry.forget_subtree(&bold);
        assert_eq!(watcher.forget(&removed, &registry), 0);

        let mut removed = Vec::new();
        for p in &paragraphs[..2] {
            detach(p);
            removed.extend(registry.forget_subtree(p));
        }
        assert_eq!(watcher.forget(&removed, &registry), 2);
        assert_eq!(watcher.visible_groups(), 0);
        assert_eq!(watcher.observed_groups(), 1);
        assert!(!source.is_observing(&paragraphs[1]));
        assert!(source.is_observing(&paragraphs[2]));
    }

    #[test]
    fn test_unwatch_is_noop_when_idle() {
        let source = ManualVisibilitySource::new();
        let mut watcher = VisibilityWatcher::new(Box::new(source.clone()), RootMargin::default());
        watcher.unwatch();
        assert!(!source.is_connected());

        watcher.start().unwrap();
        watcher.unwatch();
        watcher.unwatch();
        assert!(!source.is_connected());
        assert_eq!(source.observed_count(), 0);
    }
}
