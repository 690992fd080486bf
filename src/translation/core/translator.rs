//! 翻译服务抽象
//!
//! 引擎只依赖 [`Translator`] 约定：一次调用翻译一组有序文本，
//! 返回与输入一一对应、长度相同的译文；调用整体成功或整体失败。

use async_trait::async_trait;

use crate::translation::error::TranslationResult;
use crate::translation::storage::context::TranslationContext;

/// 一次批量翻译请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateRequest {
    pub from: String,
    pub to: String,
    pub texts: Vec<String>,
}

impl TranslateRequest {
    pub fn new(context: &TranslationContext, texts: Vec<String>) -> Self {
        Self {
            from: context.source_lang.clone(),
            to: context.target_lang.clone(),
            texts,
        }
    }

    /// 请求中的码点总数
    pub fn char_count(&self) -> usize {
        self.texts.iter().map(|text| text.chars().count()).sum()
    }
}

/// 翻译服务提供方
///
/// 实现只在页面所在的单线程上被调用，因此不要求 `Send`。
#[async_trait(?Send)]
pub trait Translator {
    /// 翻译一组文本
    ///
    /// 返回值必须与 `request.texts` 按位置一一对应且长度相同，
    /// 否则整次调用按失败处理。
    async fn translate_many(&self, request: &TranslateRequest) -> TranslationResult<Vec<String>>;

    /// 提供方名称，用于日志
    fn provider_name(&self) -> &str;
}
