//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//!
//! 传播规则：
//! - 收集错误、翻译请求错误会传递给编排器的调用方
//! - 持久化错误只记录日志，永不向外传播
//! - 恢复一个已经离开文档树的节点不是错误

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 文本收集或观察器初始化失败
    #[error("文本收集错误: {0}")]
    Collection(String),

    /// 单个批次的翻译服务调用失败
    #[error("翻译请求错误: {0}")]
    TranslationRequest(String),

    /// 一次翻译过程中有批次失败（其他批次已正常应用）
    #[error("{failed}/{total} 个批次翻译失败: {}", .errors.join("; "))]
    BatchFailures {
        failed: usize,
        total: usize,
        errors: Vec<String>,
    },

    /// 持久化缓存写入失败
    #[error("持久化错误: {0}")]
    Persistence(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::TranslationRequest(_) => true,
            TranslationError::Persistence(_) => true,
            TranslationError::BatchFailures { .. } => true,
            TranslationError::Collection(_) => false,
            TranslationError::Config(_) => false,
            TranslationError::Parse(_) => false,
            TranslationError::Serialization(_) => false,
            TranslationError::Internal(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::Collection(_) => ErrorSeverity::Critical,
            TranslationError::TranslationRequest(_) => ErrorSeverity::Error,
            TranslationError::BatchFailures { .. } => ErrorSeverity::Error,
            TranslationError::Persistence(_) => ErrorSeverity::Warning,
            TranslationError::Config(_) => ErrorSeverity::Critical,
            TranslationError::Parse(_) => ErrorSeverity::Error,
            TranslationError::Serialization(_) => ErrorSeverity::Error,
            TranslationError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::Collection(_) => ErrorCategory::Collection,
            TranslationError::TranslationRequest(_) => ErrorCategory::Service,
            TranslationError::BatchFailures { .. } => ErrorCategory::Service,
            TranslationError::Persistence(_) => ErrorCategory::Persistence,
            TranslationError::Config(_) => ErrorCategory::Configuration,
            TranslationError::Parse(_) => ErrorCategory::Parsing,
            TranslationError::Serialization(_) => ErrorCategory::Serialization,
            TranslationError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let new_msg = |msg: String| format!("{} (上下文: {})", msg, context);

        match self {
            TranslationError::Collection(msg) => TranslationError::Collection(new_msg(msg)),
            TranslationError::TranslationRequest(msg) => {
                TranslationError::TranslationRequest(new_msg(msg))
            }
            TranslationError::Persistence(msg) => TranslationError::Persistence(new_msg(msg)),
            TranslationError::Config(msg) => TranslationError::Config(new_msg(msg)),
            TranslationError::Parse(msg) => TranslationError::Parse(new_msg(msg)),
            TranslationError::Serialization(msg) => TranslationError::Serialization(new_msg(msg)),
            TranslationError::Internal(msg) => TranslationError::Internal(new_msg(msg)),
            other @ TranslationError::BatchFailures { .. } => other,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Collection,
    Service,
    Persistence,
    Configuration,
    Parsing,
    Serialization,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Persistence(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Parse(format!("TOML解析错误: {}", error))
    }
}

impl From<url::ParseError> for TranslationError {
    fn from(error: url::ParseError) -> Self {
        TranslationError::Parse(format!("URL解析错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误统计信息
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: std::collections::HashMap<ErrorCategory, usize>,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &TranslationError) {
        self.total_errors += 1;

        *self.by_category.entry(error.category()).or_insert(0) += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = TranslationError::Persistence("disk full".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.category(), ErrorCategory::Persistence);

        let err = TranslationError::Collection("bad root".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let err = TranslationError::TranslationRequest("timeout".to_string()).with_context("batch 2");
        match err {
            TranslationError::TranslationRequest(msg) => {
                assert!(msg.contains("timeout"));
                assert!(msg.contains("batch 2"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_batch_failures_message() {
        let err = TranslationError::BatchFailures {
            failed: 1,
            total: 2,
            errors: vec!["boom".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("1/2"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_error_stats() {
        let mut stats = ErrorStats::default();
        stats.record_error(&TranslationError::TranslationRequest("x".to_string()));
        stats.record_error(&TranslationError::Internal("y".to_string()));

        assert_eq!(stats.total_errors, 2);
        assert_eq!(stats.retryable_errors, 1);
        assert_eq!(stats.critical_errors, 1);
        assert_eq!(stats.by_category.get(&ErrorCategory::Service), Some(&1));
    }
}
