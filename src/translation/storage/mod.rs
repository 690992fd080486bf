//! 存储模块
//!
//! 翻译上下文、两级翻译缓存和会话存储适配器。

pub mod cache;
pub mod context;
pub mod session;

pub use cache::{content_hash, persistent_key, CacheStats, TranslationCache};
pub use context::{ContextId, TranslationContext};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
