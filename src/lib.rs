//! # live-translate
//!
//! 对运行中的 HTML 文档做增量翻译：收集可翻译的文本节点，按批次调用翻译服务，
//! 两级缓存译文，并以可完整还原的方式写回文档。
//!
//! ## 模块组织
//!
//! - `translation` - 收集、观察、缓存、回写和自动翻译编排
//! - `parsers` - HTML 解析、DOM 操作和序列化
//! - `env` - 类型安全的环境变量
//! - `logging` - 默认日志订阅器

pub mod env;
pub mod logging;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use logging::init_logging;
pub use parsers::html::{html_to_dom, serialize_document};
pub use translation::{Orchestrator, TranslationConfig, TranslationError, TranslationResult};
