use std::sync::OnceLock;

use regex::Regex;

use crate::app::models::{Bounds, UiNode};
use crate::app::workflow::model::SelectorKind;
use crate::app::workflow::resolver::{Relation, Selector};

/// Parsed `uiautomator dump` snapshot with parent/child links.
#[derive(Debug, Clone, Default)]
pub struct UiTree {
    nodes: Vec<UiNode>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl UiTree {
    pub fn nodes(&self) -> &[UiNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bounds of the outermost node, i.e. the screen area the dump covers.
    pub fn screen_bounds(&self) -> Option<Bounds> {
        self.nodes
            .iter()
            .filter(|node| node.depth == 0)
            .filter_map(|node| node.bounds)
            .find(|bounds| !bounds.is_empty())
    }

    pub fn find_all(&self, selector: &Selector) -> Vec<&UiNode> {
        (0..self.nodes.len())
            .filter(|index| self.matches(*index, selector))
            .map(|index| &self.nodes[index])
            .collect()
    }

    fn matches(&self, index: usize, selector: &Selector) -> bool {
        let node = &self.nodes[index];
        if !matches_primary(node, selector.kind, &selector.value) {
            return false;
        }
        if selector.clickable.is_some_and(|flag| node.clickable != flag) {
            return false;
        }
        if selector.scrollable.is_some_and(|flag| node.scrollable != flag) {
            return false;
        }
        if let Some(relation) = &selector.ancestor {
            if !self.has_ancestor(index, relation) {
                return false;
            }
        }
        if let Some(relation) = &selector.descendant {
            if !self.has_descendant(index, relation) {
                return false;
            }
        }
        true
    }

    fn has_ancestor(&self, index: usize, relation: &Relation) -> bool {
        let mut current = self.parents[index];
        let mut distance = 1;
        while let Some(parent) = current {
            if distance > relation.max_depth {
                return false;
            }
            if self.matches(parent, &relation.selector) {
                return true;
            }
            current = self.parents[parent];
            distance += 1;
        }
        false
    }

    fn has_descendant(&self, index: usize, relation: &Relation) -> bool {
        let mut frontier = self.children[index].clone();
        let mut distance = 1;
        while !frontier.is_empty() && distance <= relation.max_depth {
            if frontier
                .iter()
                .any(|child| self.matches(*child, &relation.selector))
            {
                return true;
            }
            frontier = frontier
                .iter()
                .flat_map(|child| self.children[*child].iter().copied())
                .collect();
            distance += 1;
        }
        false
    }
}

fn matches_primary(node: &UiNode, kind: SelectorKind, value: &str) -> bool {
    match kind {
        SelectorKind::ResourceId => {
            node.resource_id == value
                || (!value.contains(":id/") && node.resource_id.ends_with(&format!(":id/{value}")))
        }
        SelectorKind::Text => node.text == value,
        SelectorKind::TextContains => node.text.contains(value),
        SelectorKind::Description => node.content_desc == value,
        SelectorKind::Class => node.class == value,
        SelectorKind::Package => node.package == value,
    }
}

fn bounds_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]$").ok())
        .as_ref()
}

/// Parses `[left,top][right,bottom]`.
pub fn parse_bounds(value: &str) -> Option<Bounds> {
    let caps = bounds_regex()?.captures(value.trim())?;
    Some(Bounds {
        left: caps[1].parse().ok()?,
        top: caps[2].parse().ok()?,
        right: caps[3].parse().ok()?,
        bottom: caps[4].parse().ok()?,
    })
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut decoded = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        decoded.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..end];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match replacement {
            Some(ch) => {
                decoded.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn find_attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(attr_name, _)| attr_name == name)
        .map(|(_, value)| value.as_str())
}

fn build_node(attrs: &[(String, String)], index: usize, depth: usize) -> UiNode {
    let text = |name: &str| find_attr(attrs, name).map(decode_entities).unwrap_or_default();
    let flag = |name: &str| find_attr(attrs, name) == Some("true");
    UiNode {
        index,
        depth,
        class: text("class"),
        package: text("package"),
        resource_id: text("resource-id"),
        text: text("text"),
        content_desc: text("content-desc"),
        clickable: flag("clickable"),
        long_clickable: flag("long-clickable"),
        scrollable: flag("scrollable"),
        enabled: find_attr(attrs, "enabled") != Some("false"),
        bounds: find_attr(attrs, "bounds").and_then(parse_bounds),
    }
}

/// Builds a [`UiTree`] from a hierarchy dump. Only `<node>` elements become
/// nodes; anything outside tags (such as the trailing "dumped to" notice) is
/// ignored.
pub fn parse_ui_hierarchy(xml: &str) -> Result<UiTree, String> {
    let bytes = xml.as_bytes();
    let mut index: usize = 0;
    let mut tree = UiTree::default();
    // One frame per open element; `Some` for `<node>` elements.
    let mut stack: Vec<Option<usize>> = Vec::new();

    while index < bytes.len() {
        if bytes[index] != b'<' {
            index += 1;
            continue;
        }
        if index + 1 >= bytes.len() {
            break;
        }
        match bytes[index + 1] {
            b'/' => {
                index += 2;
                while index < bytes.len() && bytes[index] != b'>' {
                    index += 1;
                }
                if index < bytes.len() {
                    index += 1;
                }
                stack.pop();
            }
            b'!' => {
                index += 2;
                while index + 2 < bytes.len()
                    && !(bytes[index] == b'-' && bytes[index + 1] == b'-' && bytes[index + 2] == b'>')
                {
                    index += 1;
                }
                index = (index + 3).min(bytes.len());
            }
            b'?' => {
                index += 2;
                while index + 1 < bytes.len() && !(bytes[index] == b'?' && bytes[index + 1] == b'>') {
                    index += 1;
                }
                index = (index + 2).min(bytes.len());
            }
            _ => {
                let start = index + 1;
                let mut cursor = start;
                while cursor < bytes.len() {
                    let ch = bytes[cursor];
                    if ch == b'/' || ch == b'>' || ch.is_ascii_whitespace() {
                        break;
                    }
                    cursor += 1;
                }
                let tag_name = &xml[start..cursor];
                let (attrs, self_closing, next) = parse_attributes(xml, cursor)?;
                index = next;

                let frame = if tag_name == "node" {
                    let parent = stack.iter().rev().find_map(|frame| *frame);
                    let depth = stack.iter().filter(|frame| frame.is_some()).count();
                    let node_index = tree.nodes.len();
                    tree.nodes.push(build_node(&attrs, node_index, depth));
                    tree.parents.push(parent);
                    tree.children.push(Vec::new());
                    if let Some(parent) = parent {
                        tree.children[parent].push(node_index);
                    }
                    Some(node_index)
                } else {
                    None
                };

                if !self_closing {
                    stack.push(frame);
                }
            }
        }
    }

    Ok(tree)
}

fn parse_attributes(
    xml: &str,
    mut cursor: usize,
) -> Result<(Vec<(String, String)>, bool, usize), String> {
    let bytes = xml.as_bytes();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;
    while cursor < bytes.len() {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            break;
        }
        let ch = bytes[cursor];
        if ch == b'>' {
            cursor += 1;
            break;
        }
        if ch == b'/' {
            self_closing = true;
            cursor += 1;
            if cursor < bytes.len() && bytes[cursor] == b'>' {
                cursor += 1;
            }
            break;
        }

        let name_start = cursor;
        while cursor < bytes.len() && bytes[cursor] != b'=' && !bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err("Malformed attribute".into());
        }
        let name_end = cursor;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] != b'=' {
            return Err("Malformed attribute assignment".into());
        }
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err("Missing attribute value".into());
        }
        let quote = bytes[cursor];
        if quote != b'"' && quote != b'\'' {
            return Err("Attribute value must be quoted".into());
        }
        cursor += 1;
        let value_start = cursor;
        while cursor < bytes.len() && bytes[cursor] != quote {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            return Err("Unterminated attribute value".into());
        }
        let value_end = cursor;
        cursor += 1;
        attrs.push((
            xml[name_start..name_end].to_string(),
            xml[value_start..value_end].to_string(),
        ));
    }
    Ok((attrs, self_closing, cursor))
}
