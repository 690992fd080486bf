//! HTML解析和处理模块
//!
//! - `dom`: DOM 解析、遍历和修改
//! - `serializer`: 序列化功能

pub mod dom;
pub mod serializer;

pub use dom::{
    append_child, create_element, create_text, detach, find_nodes, get_node_attr, get_node_name,
    html_to_dom, is_attached, nearest_element, parent_of, set_node_attr, set_text,
    template_contents, text_of, walk_tree,
};
pub use serializer::serialize_document;
