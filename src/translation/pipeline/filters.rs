//! 文本过滤器模块
//!
//! 判断文本节点是否可翻译，并提供轻量的语言提示

use std::collections::{HashMap, HashSet};

use markup5ever_rcdom::{Handle, NodeData};

use crate::parsers::html::dom::{get_node_name, nearest_element, parent_of};
use crate::translation::config::constants;

/// 文本过滤器
pub struct TextFilter {
    excluded_tags: HashSet<&'static str>,
}

/// 过滤原因
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum FilterReason {
    NotText,
    Detached,
    ExcludedTag,
    Whitespace,
    NoAlphabetic,
}

impl TextFilter {
    pub fn new() -> Self {
        Self::with_excluded_tags(constants::EXCLUDED_TAGS)
    }

    /// 使用自定义的排除标签集合
    pub fn with_excluded_tags(tags: &[&'static str]) -> Self {
        Self {
            excluded_tags: tags.iter().copied().collect(),
        }
    }

    /// 判断节点是否为可翻译的文本节点
    pub fn should_collect(&self, node: &Handle) -> bool {
        self.check(node).is_ok()
    }

    /// 检查节点，不可翻译时返回原因
    pub fn check(&self, node: &Handle) -> Result<(), FilterReason> {
        let NodeData::Text { contents } = &node.data else {
            return Err(FilterReason::NotText);
        };

        let parent = parent_of(node).ok_or(FilterReason::Detached)?;

        // 只看最近的元素祖先
        if let Some(element) = nearest_element(&parent) {
            if self.is_excluded_element(&element) {
                return Err(FilterReason::ExcludedTag);
            }
        }

        Self::check_text(&contents.borrow())
    }

    /// 元素标签是否在排除集合中
    pub fn is_excluded_element(&self, element: &Handle) -> bool {
        get_node_name(element)
            .map(|tag| self.excluded_tags.contains(tag.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// 文本内容检查：去除空白后非空，且至少包含一个字母
    pub fn check_text(text: &str) -> Result<(), FilterReason> {
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return Err(FilterReason::Whitespace);
        }

        if !trimmed.chars().any(char::is_alphabetic) {
            return Err(FilterReason::NoAlphabetic);
        }

        Ok(())
    }
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// 语言提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageHint {
    Chinese,
    Japanese,
    Korean,
    Latin,
    Mixed,
    Unknown,
}

impl LanguageHint {
    /// 提示是否能确定为给定的语言标签（只比较主语言子标签）
    pub fn matches_lang(&self, lang: &str) -> bool {
        let primary = lang
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        matches!(
            (self, primary.as_str()),
            (LanguageHint::Chinese, "zh") | (LanguageHint::Japanese, "ja") | (LanguageHint::Korean, "ko")
        )
    }
}

/// 检测语言提示
pub fn detect_language_hint(text: &str) -> LanguageHint {
    let total_chars = text.chars().filter(|c| !c.is_whitespace()).count();
    if total_chars == 0 {
        return LanguageHint::Unknown;
    }

    let count = |pred: fn(char) -> bool| text.chars().filter(|&c| pred(c)).count();

    let chinese_chars = count(|c| ('\u{4e00}'..='\u{9fff}').contains(&c));
    let japanese_chars =
        count(|c| ('\u{3040}'..='\u{309f}').contains(&c) || ('\u{30a0}'..='\u{30ff}').contains(&c));
    let korean_chars = count(|c| ('\u{ac00}'..='\u{d7af}').contains(&c));
    let latin_chars = count(|c| c.is_ascii_alphabetic());

    let ratio = |n: usize| n as f32 / total_chars as f32;

    // 假名优先于汉字判断，日文里常混有汉字
    if ratio(japanese_chars) > 0.1 {
        LanguageHint::Japanese
    } else if ratio(chinese_chars) > 0.3 {
        LanguageHint::Chinese
    } else if ratio(korean_chars) > 0.3 {
        LanguageHint::Korean
    } else if ratio(latin_chars) > 0.5 {
        LanguageHint::Latin
    } else {
        LanguageHint::Mixed
    }
}

/// 文本过滤统计
#[derive(Debug, Clone, Default)]
pub struct FilterStats {
    pub total_nodes: usize,
    pub collected: usize,
    pub filtered_out: usize,
    pub by_reason: HashMap<FilterReason, usize>,
}

impl FilterStats {
    /// 记录过滤结果
    pub fn record(&mut self, result: Result<(), FilterReason>) {
        self.total_nodes += 1;

        match result {
            Ok(()) => self.collected += 1,
            Err(reason) => {
                self.filtered_out += 1;
                *self.by_reason.entry(reason).or_insert(0) += 1;
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_text() {
        assert_eq!(TextFilter::check_text("Hello"), Ok(()));
        assert_eq!(TextFilter::check_text("  \n "), Err(FilterReason::Whitespace));
        assert_eq!(TextFilter::check_text("42"), Err(FilterReason::NoAlphabetic));
        assert_eq!(TextFilter::check_text("!?…"), Err(FilterReason::NoAlphabetic));
        assert_eq!(TextFilter::check_text("Ünïcödé"), Ok(()));
        assert_eq!(TextFilter::check_text("你好"), Ok(()));
    }

    #[test]
    fn test_language_hint() {
        assert_eq!(detect_language_hint("你好世界"), LanguageHint::Chinese);
        assert_eq!(detect_language_hint("こんにちは"), LanguageHint::Japanese);
        assert_eq!(detect_language_hint("안녕하세요"), LanguageHint::Korean);
        assert_eq!(detect_language_hint("Hello world"), LanguageHint::Latin);
        assert_eq!(detect_language_hint("   "), LanguageHint::Unknown);
    }

    #[test]
    fn test_hint_matches_primary_subtag() {
        assert!(LanguageHint::Chinese.matches_lang("zh-CN"));
        assert!(LanguageHint::Chinese.matches_lang("zh_TW"));
        assert!(!LanguageHint::Chinese.matches_lang("ja"));
        // 拉丁字母无法确定具体语言
        assert!(!LanguageHint::Latin.matches_lang("en"));
    }

    #[test]
    fn test_filter_stats() {
        let mut stats = FilterStats::default();
        stats.record(Ok(()));
        stats.record(Err(FilterReason::ExcludedTag));
        stats.record(Err(FilterReason::ExcludedTag));

        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.collected, 1);
        assert_eq!(stats.by_reason.get(&FilterReason::ExcludedTag), Some(&2));
    }
}
