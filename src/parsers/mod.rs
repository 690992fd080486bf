//! # 解析器模块
//!
//! 文档以 html5ever 的 `markup5ever_rcdom` 树表示：
//!
//! - `html` - HTML文档解析、DOM操作、序列化

pub mod html;

pub use html::{html_to_dom, serialize_document};
