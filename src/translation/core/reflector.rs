//! 译文回写
//!
//! 把缓存中的译文写回文档（行内替换文本、在分组元素上写悬停注释），
//! 并记录足够的信息以便完整还原。

use std::collections::{HashMap, HashSet};

use crate::parsers::html::dom::{get_node_attr, set_node_attr, set_text};
use crate::translation::config::{constants, DisplayOptions};
use crate::translation::pipeline::fragment::{FragmentRef, FragmentRegistry, NodeKey, ParentGroup};
use crate::translation::storage::cache::TranslationCache;
use crate::translation::storage::context::TranslationContext;

/// 已写入悬停注释的分组
#[derive(Debug)]
struct Annotation {
    group: ParentGroup,
    /// 写入前属性的原值
    previous: Option<String>,
}

/// DOM 回写器
#[derive(Debug, Default)]
pub struct DomReflector {
    applied: HashMap<NodeKey, (FragmentRef, String)>,
    annotated: HashMap<NodeKey, Annotation>,
}

impl DomReflector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 回写有译文的片段，返回回写的片段数
    ///
    /// 没有缓存译文的片段保持原样。开启悬停显示时，
    /// 按文档顺序拼接分组内所有片段的文本，写到分组元素上。
    pub fn apply(
        &mut self,
        fragments: &[FragmentRef],
        registry: &FragmentRegistry,
        cache: &TranslationCache,
        context: &TranslationContext,
        display: DisplayOptions,
    ) -> usize {
        let mut count = 0;
        let mut touched: Vec<ParentGroup> = Vec::new();
        let mut touched_keys = HashSet::new();

        for fragment in fragments {
            let Some(translation) = cache.peek(fragment, context) else {
                continue;
            };
            let Some(node) = fragment.node() else {
                continue;
            };

            if display.inline {
                set_text(&node, &fragment.display_text(translation));
            }

            self.applied
                .insert(fragment.key(), (fragment.clone(), translation.to_string()));
            count += 1;

            if touched_keys.insert(fragment.group().key()) {
                touched.push(fragment.group().clone());
            }
        }

        if display.has_hover() {
            for group in &touched {
                self.annotate(group, registry, display);
            }
        }

        if count > 0 {
            tracing::debug!("回写 {} 个片段，涉及 {} 个分组", count, touched.len());
        }
        count
    }

    fn annotate(&mut self, group: &ParentGroup, registry: &FragmentRegistry, display: DisplayOptions) {
        let Some(element) = group.element() else {
            return;
        };

        let members = registry.in_group(group);
        if members.is_empty() {
            return;
        }

        let originals: Vec<&str> = members.iter().map(|f| f.normalized()).collect();
        let translated: Vec<&str> = members
            .iter()
            .map(|f| {
                self.applied
                    .get(&f.key())
                    .map(|(_, translation)| translation.as_str())
                    .unwrap_or_else(|| f.normalized())
            })
            .collect();

        let hover = match (display.original_on_hover, display.translation_on_hover) {
            (true, true) => format!("{}\n{}", originals.join(" "), translated.join(" ")),
            (true, false) => originals.join(" "),
            (false, true) => translated.join(" "),
            (false, false) => return,
        };

        self.annotated
            .entry(group.key())
            .or_insert_with(|| Annotation {
                group: group.clone(),
                previous: get_node_attr(&element, constants::HOVER_ATTR),
            });
        set_node_attr(&element, constants::HOVER_ATTR, Some(hover));
    }

    /// 还原片段的原文并清除所属分组的悬停注释
    ///
    /// 可重复调用；从未回写过的片段和已经被回收的节点都是空操作。
    pub fn restore(&mut self, fragments: &[FragmentRef]) -> usize {
        let mut count = 0;
        let mut groups = HashSet::new();

        for fragment in fragments {
            if self.applied.remove(&fragment.key()).is_none() {
                continue;
            }
            if let Some(node) = fragment.node() {
                set_text(&node, fragment.raw_content());
            }
            groups.insert(fragment.group().key());
            count += 1;
        }

        for key in groups {
            if let Some(annotation) = self.annotated.remove(&key) {
                clear_annotation(annotation);
            }
        }

        if count > 0 {
            tracing::debug!("还原 {} 个片段", count);
        }
        count
    }

    /// 还原所有回写过的内容
    pub fn restore_all(&mut self) -> usize {
        let fragments: Vec<FragmentRef> = self
            .applied
            .values()
            .map(|(fragment, _)| fragment.clone())
            .collect();
        let count = self.restore(&fragments);

        for (_, annotation) in self.annotated.drain() {
            clear_annotation(annotation);
        }
        count
    }

    /// 当前回写的片段（任意顺序）
    pub fn applied_fragments(&self) -> Vec<FragmentRef> {
        self.applied
            .values()
            .map(|(fragment, _)| fragment.clone())
            .collect()
    }

    pub fn is_applied(&self, key: NodeKey) -> bool {
        self.applied.contains_key(&key)
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn annotated_count(&self) -> usize {
        self.annotated.len()
    }
}

fn clear_annotation(annotation: Annotation) {
    if let Some(element) = annotation.group.element() {
        set_node_attr(&element, constants::HOVER_ATTR, annotation.previous);
    }
}
