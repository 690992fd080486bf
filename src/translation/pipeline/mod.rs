//! 文本处理管道模块
//!
//! 片段模型、文本收集、过滤和批次打包

pub mod batch;
pub mod collector;
pub mod filters;
pub mod fragment;

pub use batch::{pack_by, Batch, BatchStats, BatchType, Batcher};
pub use collector::{CollectionStats, TextCollector};
pub use filters::{detect_language_hint, FilterReason, FilterStats, LanguageHint, TextFilter};
pub use fragment::{FragmentRef, FragmentRegistry, NodeKey, ParentGroup, TextFragment};
