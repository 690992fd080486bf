//! 观察模块
//!
//! 把宿主推送的结构变化和可见性事件转换为需要翻译的片段，并对翻译过程做防抖调度。

pub mod change;
pub mod manual;
pub mod scheduler;
pub mod visibility;

pub use change::{ChangeOutcome, ChangeSource, ChangeWatcher, MutationRecord};
pub use manual::{ManualChangeSource, ManualVisibilitySource};
pub use scheduler::PassScheduler;
pub use visibility::{RootMargin, VisibilitySource, VisibilityWatcher};
