//! 翻译系统核心模块
//!
//! ## 架构
//!
//! ```text
//! Orchestrator (orchestrator.rs)
//!     ├── TextCollector / FragmentRegistry (pipeline)
//!     ├── ChangeWatcher / VisibilityWatcher / PassScheduler (observe)
//!     ├── TranslationCache (storage)
//!     ├── DomReflector (reflector.rs)
//!     └── TranslationEngine (engine.rs)
//!             └── dyn Translator (translator.rs)
//! ```
//!
//! - **编排层** (`orchestrator.rs`): 生命周期、通知处理、防抖调度、上下文切换
//! - **引擎层** (`engine.rs`): 单次翻译过程：缓存查询、打包、并发请求、回写
//! - **回写层** (`reflector.rs`): 可完整还原的文本替换和悬停注释

pub mod engine;
pub mod mock;
pub mod orchestrator;
pub mod reflector;
pub mod translator;

pub use engine::{EngineConfig, EngineStats, PassSummary, PassTarget, TranslationEngine};
pub use mock::{MockMode, MockTranslator};
pub use orchestrator::{ControlCommand, ControlHandle, EngineState, Orchestrator};
pub use reflector::DomReflector;
pub use translator::{TranslateRequest, Translator};
