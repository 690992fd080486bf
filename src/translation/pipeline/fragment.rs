//! 文本片段与片段注册表
//!
//! 片段只通过弱引用关联到文档节点，节点离开文档后片段自然失效；
//! 注册表按节点标识保存片段，并在收到移除通知时显式清理。

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node, NodeData};

use crate::parsers::html::dom::{get_node_name, is_attached, parent_of, walk_tree};
use crate::translation::config::constants;
use crate::translation::pipeline::filters::{detect_language_hint, LanguageHint};

/// 节点标识
///
/// 注册表持有节点的弱引用，节点内存在条目存在期间不会被复用，标识因此保持唯一。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn of(node: &Handle) -> Self {
        NodeKey(Rc::as_ptr(node) as usize)
    }
}

/// 父分组：聚合同一容器下的文本片段
#[derive(Debug, Clone)]
pub struct ParentGroup {
    key: NodeKey,
    element: Weak<Node>,
}

impl PartialEq for ParentGroup {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ParentGroup {}

impl ParentGroup {
    /// 文本节点所属的分组
    ///
    /// 取最近的非行内元素祖先；若祖先全是行内元素则取最近的元素；
    /// 没有元素祖先时（如模板片段的直接子文本）取父节点本身。
    pub fn of_text(node: &Handle) -> Option<Self> {
        let parent = parent_of(node)?;

        let mut first_element: Option<Handle> = None;
        let mut current = Some(parent.clone());
        while let Some(candidate) = current {
            if let Some(tag) = get_node_name(&candidate) {
                if !constants::INLINE_TAGS.contains(&tag.to_ascii_lowercase().as_str()) {
                    return Some(Self::from_handle(&candidate));
                }
                if first_element.is_none() {
                    first_element = Some(candidate.clone());
                }
            }
            current = parent_of(&candidate);
        }

        Some(Self::from_handle(first_element.as_ref().unwrap_or(&parent)))
    }

    pub fn from_handle(element: &Handle) -> Self {
        Self {
            key: NodeKey::of(element),
            element: Rc::downgrade(element),
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// 分组元素（已被回收时返回 None）
    pub fn element(&self) -> Option<Handle> {
        self.element.upgrade()
    }
}

/// 文本片段：一个可翻译的文本节点
#[derive(Debug)]
pub struct TextFragment {
    key: NodeKey,
    node: Weak<Node>,
    raw_content: String,
    normalized: String,
    leading_whitespace: String,
    trailing_whitespace: String,
    group: ParentGroup,
    detected_language: OnceCell<LanguageHint>,
}

pub type FragmentRef = Rc<TextFragment>;

impl TextFragment {
    /// 捕获文本节点当前的内容
    ///
    /// 非文本节点或没有父节点的文本节点返回 None。
    pub fn capture(node: &Handle) -> Option<Self> {
        let NodeData::Text { contents } = &node.data else {
            return None;
        };
        let group = ParentGroup::of_text(node)?;

        let raw_content = contents.borrow().to_string();
        let trimmed_start = raw_content.trim_start();
        let leading_len = raw_content.len() - trimmed_start.len();
        let normalized = trimmed_start.trim_end();
        let trailing_start = leading_len + normalized.len();

        Some(Self {
            key: NodeKey::of(node),
            node: Rc::downgrade(node),
            leading_whitespace: raw_content[..leading_len].to_string(),
            trailing_whitespace: raw_content[trailing_start..].to_string(),
            normalized: normalized.to_string(),
            raw_content,
            group,
            detected_language: OnceCell::new(),
        })
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// 底层文本节点（已被回收时返回 None）
    pub fn node(&self) -> Option<Handle> {
        self.node.upgrade()
    }

    /// 节点是否仍在文档中
    pub fn is_attached(&self) -> bool {
        self.node().map(|node| is_attached(&node)).unwrap_or(false)
    }

    pub fn raw_content(&self) -> &str {
        &self.raw_content
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn leading_whitespace(&self) -> &str {
        &self.leading_whitespace
    }

    pub fn trailing_whitespace(&self) -> &str {
        &self.trailing_whitespace
    }

    pub fn group(&self) -> &ParentGroup {
        &self.group
    }

    /// 规范化文本的码点长度
    pub fn char_len(&self) -> usize {
        self.normalized.chars().count()
    }

    /// 语言提示（首次访问时计算）
    pub fn detected_language(&self) -> LanguageHint {
        *self
            .detected_language
            .get_or_init(|| detect_language_hint(&self.normalized))
    }

    /// 译文的显示文本：原样保留首尾空白
    pub fn display_text(&self, translation: &str) -> String {
        format!(
            "{}{}{}",
            self.leading_whitespace, translation, self.trailing_whitespace
        )
    }
}

/// 片段注册表
#[derive(Debug, Default)]
pub struct FragmentRegistry {
    entries: HashMap<NodeKey, (u64, FragmentRef)>,
    next_seq: u64,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册片段；节点已知时不重复注册并返回 None
    pub fn register(&mut self, fragment: TextFragment) -> Option<FragmentRef> {
        if self.entries.contains_key(&fragment.key) {
            return None;
        }

        let fragment = Rc::new(fragment);
        self.entries
            .insert(fragment.key, (self.next_seq, fragment.clone()));
        self.next_seq += 1;
        Some(fragment)
    }

    /// 批量注册，返回新加入的片段
    pub fn register_all<I>(&mut self, fragments: I) -> Vec<FragmentRef>
    where
        I: IntoIterator<Item = TextFragment>,
    {
        fragments
            .into_iter()
            .filter_map(|fragment| self.register(fragment))
            .collect()
    }

    pub fn get(&self, key: NodeKey) -> Option<FragmentRef> {
        self.entries.get(&key).map(|(_, fragment)| fragment.clone())
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有片段，按发现顺序
    pub fn all(&self) -> Vec<FragmentRef> {
        let mut entries: Vec<&(u64, FragmentRef)> = self.entries.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, fragment)| fragment.clone()).collect()
    }

    /// 分组内的片段，按文档顺序
    pub fn in_group(&self, group: &ParentGroup) -> Vec<FragmentRef> {
        let Some(element) = group.element() else {
            return self
                .all()
                .into_iter()
                .filter(|fragment| fragment.group() == group)
                .collect();
        };

        let mut found = Vec::new();
        walk_tree(&element, &mut |node| {
            if let Some((_, fragment)) = self.entries.get(&NodeKey::of(node)) {
                if fragment.group() == group {
                    found.push(fragment.clone());
                }
            }
        });
        found
    }

    /// 移除子树中的所有片段，返回被移除的片段
    pub fn forget_subtree(&mut self, root: &Handle) -> Vec<FragmentRef> {
        let mut keys = Vec::new();
        walk_tree(root, &mut |node| keys.push(NodeKey::of(node)));

        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .map(|(_, fragment)| fragment)
            .collect()
    }

    /// 移除指定的片段
    pub fn forget(&mut self, keys: &[NodeKey]) -> usize {
        keys.iter()
            .filter(|key| self.entries.remove(key).is_some())
            .count()
    }

    /// 清理已经离开文档的片段，返回被移除的片段
    pub fn prune_detached(&mut self) -> Vec<FragmentRef> {
        let detached: Vec<NodeKey> = self
            .entries
            .iter()
            .filter(|(_, (_, fragment))| !fragment.is_attached())
            .map(|(key, _)| *key)
            .collect();

        detached
            .into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .map(|(_, fragment)| fragment)
            .collect()
    }

    /// 去重后的分组，按首个片段的发现顺序
    pub fn groups(&self) -> Vec<ParentGroup> {
        let mut seen = HashSet::new();
        self.all()
            .into_iter()
            .filter(|fragment| seen.insert(fragment.group().key()))
            .map(|fragment| fragment.group().clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{append_child, create_element, create_text, detach, find_nodes, html_to_dom};

    fn text_child(element: &Handle, index: usize) -> Handle {
        element.children.borrow()[index].clone()
    }

    #[test]
    fn test_capture_splits_whitespace() {
        let p = create_element("p", &[]);
        let text = create_text("  Hello world \n");
        append_child(&p, &text);

        let fragment = TextFragment::capture(&text).unwrap();
        assert_eq!(fragment.raw_content(), "  Hello world \n");
        assert_eq!(fragment.normalized(), "Hello world");
        assert_eq!(fragment.leading_whitespace(), "  ");
        assert_eq!(fragment.trailing_whitespace(), " \n");
        assert_eq!(fragment.display_text("Bonjour"), "  Bonjour \n");
    }

    #[test]
    fn test_char_len_counts_code_points() {
        let p = create_element("p", &[]);
        let text = create_text("hi😀");
        append_child(&p, &text);

        let fragment = TextFragment::capture(&text).unwrap();
        assert_eq!(fragment.char_len(), 3);
    }

    #[test]
    fn test_group_skips_inline_elements() {
        let dom = html_to_dom(b"<div><p>Hello <b><i>bold</i></b></p></div>", "utf-8").unwrap();
        let p = find_nodes(&dom.document, &["p"]).remove(0);
        let i = find_nodes(&dom.document, &["i"]).remove(0);

        let plain = TextFragment::capture(&text_child(&p, 0)).unwrap();
        let nested = TextFragment::capture(&text_child(&i, 0)).unwrap();
        assert_eq!(plain.group().key(), NodeKey::of(&p));
        assert_eq!(nested.group().key(), NodeKey::of(&p));
    }

    #[test]
    fn test_group_falls_back_to_inline_parent() {
        let span = create_element("span", &[]);
        let text = create_text("Loose");
        append_child(&span, &text);

        let fragment = TextFragment::capture(&text).unwrap();
        assert_eq!(fragment.group().key(), NodeKey::of(&span));
    }

    #[test]
    fn test_register_is_idempotent() {
        let p = create_element("p", &[]);
        let text = create_text("Hello");
        append_child(&p, &text);

        let mut registry = FragmentRegistry::new();
        assert!(registry.register(TextFragment::capture(&text).unwrap()).is_some());
        assert!(registry.register(TextFragment::capture(&text).unwrap()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_in_group_uses_document_order() {
        let p = create_element("p", &[]);
        let first = create_text("First");
        let second = create_text("Second");
        append_child(&p, &first);
        append_child(&p, &second);

        let mut registry = FragmentRegistry::new();
        // 逆序注册
        registry.register(TextFragment::capture(&second).unwrap());
        registry.register(TextFragment::capture(&first).unwrap());

        let group = ParentGroup::from_handle(&p);
        let texts: Vec<String> = registry
            .in_group(&group)
            .iter()
            .map(|f| f.normalized().to_string())
            .collect();
        assert_eq!(texts, vec!["First", "Second"]);
    }

    #[test]
    fn test_forget_subtree_and_prune() {
        let dom = html_to_dom(b"<div><p>One</p><p>Two</p></div>", "utf-8").unwrap();
        let paragraphs = find_nodes(&dom.document, &["p"]);

        let mut registry = FragmentRegistry::new();
        for p in &paragraphs {
            registry.register(TextFragment::capture(&text_child(p, 0)).unwrap());
        }

        let removed = registry.forget_subtree(&paragraphs[0]);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].key(), NodeKey::of(&text_child(&paragraphs[0], 0)));
        assert_eq!(registry.len(), 1);

        detach(&paragraphs[1]);
        let pruned = registry.prune_detached();
        assert_eq!(pruned.len(), 1);
        assert!(registry.is_empty());
    }
}
