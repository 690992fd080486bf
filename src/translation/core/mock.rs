//! 模拟翻译服务
//!
//! 确定性的、不访问网络的 [`Translator`] 实现，供没有真实服务的宿主和测试使用。
//! 所有请求都记录在调用日志中，克隆体共享同一份日志。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use crate::translation::core::translator::{TranslateRequest, Translator};
use crate::translation::error::{TranslationError, TranslationResult};

/// 模拟模式
#[derive(Debug, Clone)]
pub enum MockMode {
    /// 追加目标语言后缀："Hello" → "Hello_fr"
    Suffix,
    /// 按映射表翻译，未命中时退回后缀模式
    Mappings(HashMap<String, String>),
    /// 每次调用都失败
    Error(String),
    /// 请求中有文本包含该子串时整次调用失败
    FailOn(String),
    /// 原样返回
    NoOp,
}

/// 模拟翻译服务
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    delay: Duration,
    calls: Rc<RefCell<Vec<TranslateRequest>>>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// 每次调用前模拟网络延迟
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            ..Self::new(mode)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// 所有请求，按调用顺序
    pub fn calls(&self) -> Vec<TranslateRequest> {
        self.calls.borrow().clone()
    }

    /// 所有请求中发送过的文本
    pub fn sent_texts(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .flat_map(|request| request.texts.iter().cloned())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn translate_one(&self, text: &str, to: &str) -> String {
        match &self.mode {
            MockMode::Mappings(map) => map
                .get(text)
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, to)),
            MockMode::NoOp => text.to_string(),
            _ => format!("{}_{}", text, to),
        }
    }
}

#[async_trait(?Send)]
impl Translator for MockTranslator {
    async fn translate_many(&self, request: &TranslateRequest) -> TranslationResult<Vec<String>> {
        self.calls.borrow_mut().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.mode {
            MockMode::Error(message) => {
                return Err(TranslationError::TranslationRequest(message.clone()))
            }
            MockMode::FailOn(needle) => {
                if request.texts.iter().any(|text| text.contains(needle.as_str())) {
                    return Err(TranslationError::TranslationRequest(format!(
                        "模拟失败: 请求包含 \"{}\"",
                        needle
                    )));
                }
            }
            _ => {}
        }

        Ok(request
            .texts
            .iter()
            .map(|text| self.translate_one(text, &request.to))
            .collect())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
