//! 翻译引擎核心实现
//!
//! 负责单次翻译过程：给定一组片段和当前上下文，查询缓存、
//! 把未命中的文本打包成批次发送给翻译服务，写入缓存并回写到文档。
//!
//! ## 工作流程
//! 1. 跳过已离开文档的片段，以及语言提示已是目标语言的片段
//! 2. 查询缓存（易失层 → 持久层）
//! 3. 未命中的片段按规范化文本去重，再按字符上限打包
//! 4. 以有限并发发送批次，可选指数退避重试
//! 5. 成功批次写入缓存；失败批次的片段保持原文
//! 6. 回写所有有译文的片段，让出执行权后再写持久层
//!
//! 任何批次失败时，整个过程在回写成功批次之后返回
//! [`TranslationError::BatchFailures`]。

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::time::{sleep, Duration};

use crate::translation::config::{constants, DisplayOptions, TranslationConfig};
use crate::translation::core::reflector::DomReflector;
use crate::translation::core::translator::{TranslateRequest, Translator};
use crate::translation::error::{ErrorStats, TranslationError, TranslationResult};
use crate::translation::pipeline::batch::{char_len, Batch, Batcher};
use crate::translation::pipeline::fragment::{FragmentRef, FragmentRegistry};
use crate::translation::storage::cache::TranslationCache;
use crate::translation::storage::context::TranslationContext;

/// 翻译引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 每个批次的码点上限
    pub max_chars_per_batch: usize,
    /// 同时进行的翻译请求数
    pub max_concurrent_requests: usize,
    /// 失败的批次是否重试
    pub retry_enabled: bool,
    /// 最大尝试次数（含首次）
    pub max_retry_attempts: usize,
    /// 重试的基础延迟，实际延迟 = retry_delay_ms * 2^attempt
    pub retry_delay_ms: u64,
}

impl EngineConfig {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_chars_per_batch: config.max_chars_per_batch,
            max_concurrent_requests: config.max_concurrent_requests,
            retry_enabled: config.retry_enabled,
            max_retry_attempts: config.max_retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        }
    }

    fn attempts(&self) -> usize {
        if self.retry_enabled {
            self.max_retry_attempts.max(1)
        } else {
            1
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&TranslationConfig::default())
    }
}

/// 单次翻译过程的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// 传入的片段数
    pub fragments: usize,
    /// 已离开文档而跳过的片段
    pub skipped_detached: usize,
    /// 语言已是目标语言而跳过的片段
    pub skipped_same_language: usize,
    /// 缓存命中的片段
    pub cache_hits: usize,
    /// 去重后发送的文本数
    pub texts_requested: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// 回写的片段数
    pub applied: usize,
    /// 成功写入持久层的条目
    pub persisted: usize,
}

/// 引擎累计统计
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub passes: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
    pub retries: usize,
    pub characters_sent: usize,
    pub characters_received: usize,
    pub fragments_applied: usize,
    /// 总处理时间（微秒）
    pub total_processing_time: u64,
    pub errors: ErrorStats,
}

impl EngineStats {
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 回写相关的可变状态，由编排器持有
pub struct PassTarget<'a> {
    pub registry: &'a FragmentRegistry,
    pub cache: &'a mut TranslationCache,
    pub reflector: &'a mut DomReflector,
    pub display: DisplayOptions,
}

/// 翻译引擎
pub struct TranslationEngine {
    translator: Rc<dyn Translator>,
    batcher: Batcher,
    config: EngineConfig,
    stats: EngineStats,
}

struct BatchOutcome {
    id: usize,
    result: TranslationResult<Vec<String>>,
    retries: usize,
}

impl TranslationEngine {
    pub fn new(translator: Rc<dyn Translator>, config: EngineConfig) -> Self {
        Self {
            translator,
            batcher: Batcher::new(config.max_chars_per_batch),
            config,
            stats: EngineStats::default(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.translator.provider_name()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.batcher = Batcher::new(config.max_chars_per_batch);
        self.config = config;
    }

    /// 执行一次翻译过程
    pub async fn run_pass(
        &mut self,
        fragments: &[FragmentRef],
        context: &TranslationContext,
        target: PassTarget<'_>,
    ) -> TranslationResult<PassSummary> {
        let started = Instant::now();
        let PassTarget {
            registry,
            cache,
            reflector,
            display,
        } = target;

        let mut summary = PassSummary {
            fragments: fragments.len(),
            ..Default::default()
        };

        // 1. 筛选并查询缓存
        let mut eligible = Vec::with_capacity(fragments.len());
        let mut misses: Vec<(String, Vec<FragmentRef>)> = Vec::new();
        let mut miss_index: HashMap<String, usize> = HashMap::new();

        for fragment in fragments {
            if !fragment.is_attached() || !registry.contains(fragment.key()) {
                summary.skipped_detached += 1;
                continue;
            }
            if fragment.detected_language().matches_lang(&context.target_lang) {
                summary.skipped_same_language += 1;
                continue;
            }

            eligible.push(fragment.clone());
            if cache.lookup(fragment, context).is_some() {
                summary.cache_hits += 1;
                continue;
            }

            match miss_index.get(fragment.normalized()) {
                Some(&index) => misses[index].1.push(fragment.clone()),
                None => {
                    miss_index.insert(fragment.normalized().to_string(), misses.len());
                    misses.push((fragment.normalized().to_string(), vec![fragment.clone()]));
                }
            }
        }

        summary.texts_requested = misses.len();

        // 2. 打包并发送
        let batches = self.batcher.pack_items(misses, |(text, _)| char_len(text));
        summary.batches = batches.len();

        let mut errors = Vec::new();
        if !batches.is_empty() {
            tracing::debug!(
                "翻译过程: {} 个片段，缓存命中 {}，{} 条文本分为 {} 个批次 ({})",
                summary.fragments,
                summary.cache_hits,
                summary.texts_requested,
                batches.len(),
                context
            );

            let outcomes = self.send_batches(&batches, context).await;
            for outcome in outcomes {
                self.stats.retries += outcome.retries;
                let batch = &batches[outcome.id];
                match outcome.result {
                    Ok(translations) => {
                        self.stats.characters_received +=
                            translations.iter().map(|t| char_len(t)).sum::<usize>();
                        for ((_, members), translation) in batch.items.iter().zip(&translations) {
                            for fragment in members {
                                cache.store(fragment, context, translation);
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!("{} 翻译失败，片段保持原文: {}", batch.summary(), error);
                        self.stats.errors.record_error(&error);
                        summary.failed_batches += 1;
                        errors.push(error.with_context(batch.summary()).to_string());
                    }
                }
            }
            self.stats.batches_sent += batches.len();
            self.stats.batches_failed += summary.failed_batches;
        }

        // 3. 回写
        summary.applied = reflector.apply(&eligible, registry, cache, context, display);
        self.stats.fragments_applied += summary.applied;

        // 4. 让出执行权后再写持久层
        tokio::task::yield_now().await;
        summary.persisted = cache.flush_persistent();

        self.stats.passes += 1;
        self.stats.total_processing_time += started.elapsed().as_micros() as u64;

        if summary.failed_batches > 0 {
            return Err(TranslationError::BatchFailures {
                failed: summary.failed_batches,
                total: summary.batches,
                errors,
            });
        }

        tracing::debug!(
            "翻译过程完成: 回写 {} 个片段，持久化 {} 条",
            summary.applied,
            summary.persisted
        );
        Ok(summary)
    }

    async fn send_batches(
        &mut self,
        batches: &[Batch<(String, Vec<FragmentRef>)>],
        context: &TranslationContext,
    ) -> Vec<BatchOutcome> {
        let requests: Vec<(usize, TranslateRequest)> = batches
            .iter()
            .map(|batch| {
                let texts = batch.items.iter().map(|(text, _)| text.clone()).collect();
                (batch.id, TranslateRequest::new(context, texts))
            })
            .collect();

        self.stats.characters_sent += requests.iter().map(|(_, r)| r.char_count()).sum::<usize>();

        let translator = self.translator.as_ref();
        let config = &self.config;
        stream::iter(requests)
            .map(move |(id, request)| async move {
                let (result, retries) = request_with_retry(translator, &request, config).await;
                BatchOutcome { id, result, retries }
            })
            .buffer_unordered(self.config.max_concurrent_requests.max(1))
            .collect()
            .await
    }

    pub fn get_stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}

/// 发送单个批次，按配置重试；返回结果和重试次数
async fn request_with_retry(
    translator: &dyn Translator,
    request: &TranslateRequest,
    config: &EngineConfig,
) -> (TranslationResult<Vec<String>>, usize) {
    let max_attempts = config.attempts();
    let mut attempt = 0;

    loop {
        let result = match translator.translate_many(request).await {
            Ok(translations) if translations.len() == request.texts.len() => Ok(translations),
            Ok(translations) => Err(TranslationError::TranslationRequest(format!(
                "译文数量不匹配: 期望 {}，得到 {}",
                request.texts.len(),
                translations.len()
            ))),
            Err(e) => Err(e),
        };

        match result {
            Ok(translations) => return (Ok(translations), attempt),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts || !e.is_retryable() {
                    return (Err(e), attempt - 1);
                }

                let delay = backoff_delay(config.retry_delay_ms, attempt);
                tracing::warn!(
                    "翻译失败，{}ms后重试 (尝试 {}/{}): {}",
                    delay.as_millis(),
                    attempt + 1,
                    max_attempts,
                    e
                );
                sleep(delay).await;
            }
        }
    }
}

/// 第 `attempt` 次重试前的等待时间：`base_ms * 2^attempt`，不超过上限
fn backoff_delay(base_ms: u64, attempt: usize) -> Duration {
    let factor = u32::try_from(attempt)
        .ok()
        .and_then(|shift| 1u64.checked_shl(shift))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(constants::MAX_RETRY_DELAY_MS))
}
