//! 文本收集器模块
//!
//! 深度优先、按文档顺序收集可翻译的文本节点，包括模板内容片段中的文本。
//! 收集器不修改文档也不注册片段，注册由调用方完成。

use std::time::Instant;

use markup5ever_rcdom::{Handle, NodeData};

use crate::parsers::html::dom::template_contents;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::filters::{FilterStats, TextFilter};
use crate::translation::pipeline::fragment::TextFragment;

/// DOM文本收集器
pub struct TextCollector {
    filter: TextFilter,
    stats: CollectionStats,
}

/// 收集统计
#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    pub nodes_visited: usize,
    pub text_nodes_found: usize,
    pub template_fragments: usize,
    pub filter: FilterStats,
    pub collection_time_ms: u64,
}

impl CollectionStats {
    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 收集到的片段数
    pub fn collected(&self) -> usize {
        self.filter.collected
    }
}

impl TextCollector {
    pub fn new() -> Self {
        Self::with_filter(TextFilter::new())
    }

    /// 使用指定过滤器创建收集器
    pub fn with_filter(filter: TextFilter) -> Self {
        Self {
            filter,
            stats: CollectionStats::default(),
        }
    }

    /// 收集根节点下所有可翻译的文本片段
    ///
    /// 根节点必须是文档、元素或模板内容片段。
    pub fn collect(&mut self, root: &Handle) -> TranslationResult<Vec<TextFragment>> {
        match root.data {
            NodeData::Document | NodeData::Element { .. } => {}
            _ => {
                return Err(TranslationError::Collection(
                    "收集根节点必须是文档或元素".to_string(),
                ))
            }
        }

        let started = Instant::now();
        self.stats.reset();

        let mut fragments = Vec::new();
        self.collect_recursive(root, &mut fragments);

        self.stats.collection_time_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            "收集完成: 访问 {} 个节点，{} 个文本节点，{} 个可翻译片段",
            self.stats.nodes_visited,
            self.stats.text_nodes_found,
            fragments.len()
        );

        Ok(fragments)
    }

    /// 收集单个（新插入的）节点
    ///
    /// 文本节点本身可翻译时返回它自己；容器节点则收集其整个子树。
    pub fn collect_node(&mut self, node: &Handle) -> Vec<TextFragment> {
        let mut fragments = Vec::new();
        self.collect_recursive(node, &mut fragments);
        fragments
    }

    fn collect_recursive(&mut self, node: &Handle, fragments: &mut Vec<TextFragment>) {
        self.stats.nodes_visited += 1;

        match node.data {
            NodeData::Text { .. } => {
                self.stats.text_nodes_found += 1;

                let result = self.filter.check(node);
                self.stats.filter.record(result);

                if result.is_ok() {
                    if let Some(fragment) = TextFragment::capture(node) {
                        fragments.push(fragment);
                    }
                }
            }
            NodeData::Element { .. } | NodeData::Document => {
                if let Some(contents) = template_contents(node) {
                    self.stats.template_fragments += 1;
                    self.collect_recursive(&contents, fragments);
                }

                let children: Vec<Handle> = node.children.borrow().clone();
                for child in children.iter() {
                    self.collect_recursive(child, fragments);
                }
            }
            _ => {}
        }
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// 重置统计信息
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}

impl Default for TextCollector {
    fn default() -> Self {
        Self::new()
    }
}
