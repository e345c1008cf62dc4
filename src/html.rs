//! Minimal owned HTML tree.
//!
//! Nodes live in an arena and reference each other by index. The builder
//! applies just enough implied-end-tag rules (`p`, `li`, table parts) for
//! pasted office markup to come out properly nested, and serialising a tree
//! then parsing it again yields the same tree.

mod tokenizer;

use tokenizer::{Token, tokenize};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Root,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// Largest `colspan` or `span` honoured.
pub const MAX_COLSPAN: u32 = 1000;
/// Largest `rowspan` honoured.
pub const MAX_ROWSPAN: u32 = 65534;

const CLOSES_PARAGRAPH: &[&str] = &[
    "p", "div", "ul", "ol", "table", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
    "hr",
];

/// Elements that stop the search for an element to implicitly close.
const SCOPE_BOUNDARY: &[&str] = &["td", "th", "table", "li", "ul", "ol", "div", "blockquote"];

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn parse(html: &str) -> Self {
        let mut doc = Document::new();
        let mut stack: Vec<NodeId> = vec![Self::ROOT];

        for token in tokenize(html) {
            match token {
                Token::Text(text) => {
                    let parent = stack.last().copied().unwrap_or(Self::ROOT);
                    doc.append_text(parent, &text);
                }
                Token::StartTag {
                    name,
                    attrs,
                    self_closing,
                } => {
                    doc.close_implied(&mut stack, &name);
                    let parent = stack.last().copied().unwrap_or(Self::ROOT);
                    let void = VOID_ELEMENTS.contains(&name.as_str());
                    let id = doc.append_element(parent, &name, attrs);
                    if !void && !self_closing {
                        stack.push(id);
                    }
                }
                Token::EndTag { name } => {
                    if let Some(pos) = stack.iter().rposition(|&id| doc.name(id) == Some(&name)) {
                        stack.truncate(pos);
                    }
                }
            }
        }
        doc
    }

    fn close_implied(&self, stack: &mut Vec<NodeId>, opening: &str) {
        let (targets, boundary): (&[&str], &[&str]) = match opening {
            n if CLOSES_PARAGRAPH.contains(&n) => (&["p"], SCOPE_BOUNDARY),
            "li" => (&["li"], &["ul", "ol", "table"]),
            "td" | "th" => (&["td", "th"], &["tr", "table"]),
            "tr" => (&["tr"], &["table", "thead", "tbody", "tfoot"]),
            "thead" | "tbody" | "tfoot" => (&["thead", "tbody", "tfoot"], &["table"]),
            _ => return,
        };
        for pos in (1..stack.len()).rev() {
            let Some(name) = self.name(stack[pos]) else {
                continue;
            };
            if targets.contains(&name) {
                stack.truncate(pos);
                return;
            }
            if boundary.contains(&name) {
                return;
            }
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// Element name, or `None` for text and the root.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id].data {
            match attrs.iter_mut().find(|(k, _)| k == key) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((key.to_string(), value.to_string())),
            }
        }
    }

    pub fn retain_attrs(&mut self, id: NodeId, mut keep: impl FnMut(&str) -> bool) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id].data {
            attrs.retain(|(k, _)| keep(k));
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) {
        self.retain_attrs(id, |k| k != key);
    }

    pub fn set_text(&mut self, id: NodeId, text: String) {
        if let NodeData::Text(t) = &mut self.nodes[id].data {
            *t = text;
        }
    }

    /// Positive integer attribute (`colspan`, `rowspan`, `span`), defaulting
    /// to 1 and clamped to [`MAX_ROWSPAN`] for rows, [`MAX_COLSPAN`] otherwise.
    pub fn span_attr(&self, id: NodeId, key: &str) -> u32 {
        let max = if key == "rowspan" { MAX_ROWSPAN } else { MAX_COLSPAN };
        self.attr(id, key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&v| v >= 1)
            .map_or(1, |v| v.min(u64::from(max)) as u32)
    }

    pub fn append_element(&mut self, parent: NodeId, name: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push_node(
            parent,
            NodeData::Element {
                name: name.to_string(),
                attrs,
            },
        )
    }

    /// Append text, merging with a trailing text sibling.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent].children.last()
            && let NodeData::Text(t) = &mut self.nodes[last].data
        {
            t.push_str(text);
            return;
        }
        self.push_node(parent, NodeData::Text(text.to_string()));
    }

    fn push_node(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Remove a node (and its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    /// Replace an element by its children.
    pub fn unwrap_node(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id].parent else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id].children);
        for &c in &children {
            self.nodes[c].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent].children;
        if let Some(pos) = siblings.iter().position(|&c| c == id) {
            siblings.splice(pos..=pos, children);
        }
        self.nodes[id].parent = None;
    }

    pub fn clear_children(&mut self, id: NodeId) {
        for c in std::mem::take(&mut self.nodes[id].children) {
            self.nodes[c].parent = None;
        }
    }

    /// Merge adjacent text siblings below `id`.
    pub fn merge_text_nodes(&mut self, id: NodeId) {
        let children = self.nodes[id].children.clone();
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
        for c in children {
            if let NodeData::Text(t) = &self.nodes[c].data
                && let Some(&prev) = kept.last()
                && matches!(self.nodes[prev].data, NodeData::Text(_))
            {
                let t = t.clone();
                if let NodeData::Text(p) = &mut self.nodes[prev].data {
                    p.push_str(&t);
                }
                self.nodes[c].parent = None;
                continue;
            }
            kept.push(c);
        }
        self.nodes[id].children = kept.clone();
        for c in kept {
            self.merge_text_nodes(c);
        }
    }

    /// Pre-order descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n].children.iter().rev());
        }
        out
    }

    pub fn element_children<'a>(&'a self, id: NodeId) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|&c| self.name(c).is_some())
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(t) = self.text(id) {
            out.push_str(t);
        }
        for d in self.descendants(id) {
            if let Some(t) = self.text(d) {
                out.push_str(t);
            }
        }
        out
    }

    /// Rows of a table, looking through `thead`/`tbody`/`tfoot` but not into
    /// nested tables.
    pub fn table_rows(&self, table: NodeId) -> Vec<NodeId> {
        let mut rows = Vec::new();
        for c in self.element_children(table) {
            match self.name(c) {
                Some("tr") => rows.push(c),
                Some("thead" | "tbody" | "tfoot") => {
                    rows.extend(self.element_children(c).filter(|&r| self.is_element(r, "tr")));
                }
                _ => {}
            }
        }
        rows
    }

    pub fn row_cells(&self, row: NodeId) -> Vec<NodeId> {
        self.element_children(row)
            .filter(|&c| matches!(self.name(c), Some("td" | "th")))
            .collect()
    }

    pub fn serialize(&self) -> String {
        self.inner_html(Self::ROOT)
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &c in &self.nodes[id].children {
            self.write_node(c, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].data {
            NodeData::Root => {
                for &c in &self.nodes[id].children {
                    self.write_node(c, out);
                }
            }
            NodeData::Text(t) => out.push_str(&escape_text(t)),
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(v));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    return;
                }
                for &c in &self.nodes[id].children {
                    self.write_node(c, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// Parse an inline `style` attribute into lowercase `(property, value)` pairs.
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim().to_ascii_lowercase();
            let v = v.split_whitespace().collect::<Vec<_>>().join(" ");
            if k.is_empty() || v.is_empty() {
                None
            } else {
                Some((k, v))
            }
        })
        .collect()
}

pub fn format_style(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join(";")
}

pub fn style_value<'a>(decls: &'a [(String, String)], key: &str) -> Option<&'a str> {
    decls
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implied_paragraph_close() {
        let doc = Document::parse("<p>one<p>two<table><tr><td>x</table>");
        assert_eq!(
            doc.serialize(),
            "<p>one</p><p>two</p><table><tr><td>x</td></tr></table>"
        );
    }

    #[test]
    fn sibling_cells_and_items() {
        let doc = Document::parse("<ul><li>a<li>b</ul><table><tr><td>1<td>2<tr><td>3</table>");
        assert_eq!(
            doc.serialize(),
            "<ul><li>a</li><li>b</li></ul><table><tr><td>1</td><td>2</td></tr><tr><td>3</td></tr></table>"
        );
    }

    #[test]
    fn serialization_reparses_identically() {
        let src = "<div><p style=\"a:b\">x &amp; y&nbsp;</p><br><span>z</span></div>";
        let once = Document::parse(src).serialize();
        assert_eq!(Document::parse(&once).serialize(), once);
    }

    #[test]
    fn unwrap_keeps_children_in_place() {
        let mut doc = Document::parse("<p>a<o:p>b</o:p>c</p>");
        let op = doc
            .descendants(Document::ROOT)
            .into_iter()
            .find(|&n| doc.is_element(n, "o:p"))
            .unwrap();
        doc.unwrap_node(op);
        let p = doc.children(Document::ROOT)[0];
        doc.merge_text_nodes(p);
        assert_eq!(doc.serialize(), "<p>abc</p>");
        assert_eq!(doc.children(p).len(), 1);
    }

    #[test]
    fn nested_table_rows_are_not_outer_rows() {
        let doc = Document::parse(
            "<table><tbody><tr><td><table><tr><td>in</td></tr></table></td></tr></tbody></table>",
        );
        let outer = doc.children(Document::ROOT)[0];
        assert_eq!(doc.table_rows(outer).len(), 1);
    }

    #[test]
    fn spans_are_clamped() {
        let doc = Document::parse(
            "<table><tr><td colspan=\"4294967295\" rowspan=\"99999999999\">a</td><td colspan=\"0\">b</td><td colspan=\"x\">c</td></tr></table>",
        );
        let cells: Vec<NodeId> = doc
            .descendants(Document::ROOT)
            .into_iter()
            .filter(|&n| doc.is_element(n, "td"))
            .collect();
        assert_eq!(doc.span_attr(cells[0], "colspan"), MAX_COLSPAN);
        assert_eq!(doc.span_attr(cells[0], "rowspan"), MAX_ROWSPAN);
        assert_eq!(doc.span_attr(cells[1], "colspan"), 1);
        assert_eq!(doc.span_attr(cells[2], "colspan"), 1);
    }

    #[test]
    fn style_parsing() {
        let decls = parse_style(" Text-Align : center ;; color:red; font-family: Times   New Roman");
        assert_eq!(style_value(&decls, "text-align"), Some("center"));
        assert_eq!(style_value(&decls, "font-family"), Some("Times New Roman"));
        assert_eq!(format_style(&decls[..1]), "text-align:center");
    }
}
