//! 翻译模块
//!
//! 对运行中的文档做增量、可还原的翻译：
//! - **pipeline**: 片段模型、文本收集、过滤和批次打包
//! - **observe**: 结构变化和可见性监听、防抖调度
//! - **storage**: 翻译上下文、两级缓存和会话存储
//! - **core**: 翻译引擎、译文回写和自动翻译编排器
//! - **config**: 配置管理和自动翻译站点白名单
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use live_translate::parsers::html::dom::html_to_dom;
//! use live_translate::translation::{
//!     ManualChangeSource, ManualVisibilitySource, MockMode, MockTranslator, Orchestrator,
//!     TranslationConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dom = html_to_dom(b"<p>Hello</p>", "utf-8")?;
//! let config = TranslationConfig::default_with_lang("fr", Some("en"));
//! let mut orchestrator = Orchestrator::new(
//!     dom.document.clone(),
//!     config,
//!     Rc::new(MockTranslator::new(MockMode::Suffix)),
//!     Box::new(ManualChangeSource::new()),
//!     Box::new(ManualVisibilitySource::new()),
//! )?;
//!
//! orchestrator.start_auto_translation().await?;
//! orchestrator.stop_auto_translation();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 核心模块 - 编排器、翻译引擎和回写器
pub mod core;

/// 错误处理模块
pub mod error;

/// 观察模块 - 结构变化、可见性和调度
pub mod observe;

/// 文本处理管道模块
pub mod pipeline;

/// 存储模块 - 上下文、缓存和会话存储
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use core::{
    ControlCommand, ControlHandle, DomReflector, EngineState, MockMode, MockTranslator,
    Orchestrator, PassSummary, TranslateRequest, TranslationEngine, Translator,
};

pub use config::{
    constants, normalize_origin, AutoTranslateUpdate, ConfigManager, DisplayOptions,
    OriginAllowlist, TranslationConfig,
};

pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};

// ============================================================================
// 高级API导出 - 供宿主适配器和扩展使用
// ============================================================================

pub use observe::{
    ChangeSource, ChangeWatcher, ManualChangeSource, ManualVisibilitySource, MutationRecord,
    PassScheduler, RootMargin, VisibilitySource, VisibilityWatcher,
};

pub use pipeline::{
    Batch, Batcher, FragmentRef, FragmentRegistry, LanguageHint, NodeKey, ParentGroup,
    TextCollector, TextFilter, TextFragment,
};

pub use storage::{
    CacheStats, ContextId, FileSessionStore, MemorySessionStore, SessionStore, TranslationCache,
    TranslationContext,
};

/// 检查翻译配置文件是否存在
pub fn config_file_exists() -> bool {
    config::config_file_exists()
}

/// 加载翻译配置（配置文件 + 环境变量），失败时回退到默认配置
pub fn load_translation_config() -> TranslationConfig {
    config::load_translation_config()
}
