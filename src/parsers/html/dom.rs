use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> io::Result<RcDom> {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => {
            let (string, _, _) = encoding.decode(data);
            string.to_string()
        }
        None => String::from_utf8_lossy(data).to_string(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let Some((node_name, rest)) = node_names.split_first() else {
        return found_nodes;
    };

    let matches = matches!(node.data, NodeData::Element { ref name, .. } if &*name.local == *node_name);

    if matches && rest.is_empty() {
        found_nodes.push(node.clone());
    }

    if matches && !rest.is_empty() {
        found_nodes.append(&mut find_nodes(node, rest));
    } else {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names));
        }
    }

    found_nodes
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点（不会破坏父节点链接）
pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

/// 从节点自身开始向上查找最近的元素
pub fn nearest_element(node: &Handle) -> Option<Handle> {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if matches!(candidate.data, NodeData::Element { .. }) {
            return Some(candidate);
        }
        current = parent_of(&candidate);
    }
    None
}

/// 节点是否仍然挂在某个文档（或模板内容片段）之下
pub fn is_attached(node: &Handle) -> bool {
    let mut current = node.clone();
    while let Some(parent) = parent_of(&current) {
        current = parent;
    }
    matches!(current.data, NodeData::Document)
}

/// 读取文本节点内容
pub fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 替换文本节点内容，非文本节点返回 false
pub fn set_text(node: &Handle, text: &str) -> bool {
    match &node.data {
        NodeData::Text { contents } => {
            *contents.borrow_mut() = StrTendril::from(text);
            true
        }
        _ => false,
    }
}

/// 模板元素的内容片段
pub fn template_contents(node: &Handle) -> Option<Handle> {
    match &node.data {
        NodeData::Element {
            template_contents, ..
        } => template_contents.borrow().clone(),
        _ => None,
    }
}

/// 按文档顺序深度优先遍历子树（包含模板内容片段）
pub fn walk_tree<F: FnMut(&Handle)>(node: &Handle, visit: &mut F) {
    visit(node);

    if let Some(contents) = template_contents(node) {
        walk_tree(&contents, visit);
    }

    // 先复制子节点列表，visit 中可能修改树
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in children.iter() {
        walk_tree(child, visit);
    }
}

/// 创建一个游离的元素节点
pub fn create_element(tag: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: format_tendril!("{}", value),
        })
        .collect();

    let template_contents = if tag == "template" {
        Some(Node::new(NodeData::Document))
    } else {
        None
    };

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(template_contents),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建一个游离的文本节点
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

/// 将节点追加为最后一个子节点（会先从原父节点移除）
pub fn append_child(parent: &Handle, child: &Handle) {
    detach(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 将节点从父节点中移除
pub fn detach(node: &Handle) {
    if let Some(parent) = parent_of(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let existing = attrs_mut
            .iter()
            .position(|attr| &*attr.name.local == attr_name);

        match (existing, attr_value) {
            (Some(i), Some(value)) => {
                attrs_mut[i].value.clear();
                attrs_mut[i].value.push_slice(value.as_str());
            }
            // Remove attr completely if attr_value is not defined
            (Some(i), None) => {
                attrs_mut.remove(i);
            }
            (None, Some(value)) => {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", value),
                });
            }
            (None, None) => {}
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_of_is_not_destructive() {
        let dom = html_to_dom(b"<p>Hello</p>", "utf-8").unwrap();
        let p = find_nodes(&dom.document, &["p"]).remove(0);
        let text = p.children.borrow()[0].clone();

        assert!(parent_of(&text).is_some());
        assert!(parent_of(&text).is_some());
        assert!(is_attached(&text));
    }

    #[test]
    fn test_attr_roundtrip() {
        let div = create_element("div", &[("title", "old")]);
        assert_eq!(get_node_attr(&div, "title").as_deref(), Some("old"));

        set_node_attr(&div, "title", Some("new".to_string()));
        assert_eq!(get_node_attr(&div, "title").as_deref(), Some("new"));

        set_node_attr(&div, "title", None);
        assert_eq!(get_node_attr(&div, "title"), None);
    }

    #[test]
    fn test_append_and_detach() {
        let div = create_element("div", &[]);
        let text = create_text("Hi");
        append_child(&div, &text);
        assert_eq!(div.children.borrow().len(), 1);
        assert!(!is_attached(&text));

        detach(&text);
        assert!(div.children.borrow().is_empty());
        assert!(parent_of(&text).is_none());
    }

    #[test]
    fn test_set_text() {
        let text = create_text("Hi");
        assert!(set_text(&text, "Salut"));
        assert_eq!(text_of(&text).as_deref(), Some("Salut"));
        assert!(!set_text(&create_element("p", &[]), "x"));
    }
}
