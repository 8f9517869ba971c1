use core::fmt;

// -----------------------------------------------------------------------------
// Attr

/// One named attribute of a [`Node`].
///
/// Attributes are plain name/text pairs. Their order on a node is the order
/// in which they were set and is preserved by iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attr {
    name: String,
    value: String,
}

impl Attr {
    /// Creates an attribute from a name and a text value.
    #[inline]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the attribute name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attribute text.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }
}

// -----------------------------------------------------------------------------
// Node

/// One element of a tree-structured document.
///
/// A node has a name, an ordered attribute list, an ordered child list and
/// a text payload. This is the whole contract the binding engine relies on;
/// any DOM-like structure can be converted to and from this shape.
///
/// # Examples
///
/// ```
/// use graft_doc::Node;
///
/// let mut point = Node::new("Point");
/// point.push_child(Node::with_text("x", "1.5"));
/// point.push_child(Node::with_text("y", "-2"));
///
/// assert_eq!(point.children().len(), 2);
/// assert_eq!(point.child("y").unwrap().text(), "-2");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Node {
    name: String,
    attrs: Vec<Attr>,
    children: Vec<Node>,
    text: String,
}

impl Node {
    /// Creates an empty node with the given name.
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Creates a node with the given name and text payload.
    #[inline]
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(name);
        node.text = text.into();
        node
    }

    /// Returns the node name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the node.
    #[inline]
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the text payload, which may be empty.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text payload.
    #[inline]
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Returns the ordered attribute list.
    #[inline]
    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    /// Returns the text of the attribute with the given name, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name() == name)
            .map(Attr::value)
    }

    /// Sets an attribute, replacing the value in place if the name already
    /// exists. First occurrence keeps its position.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value.into(),
            None => self.attrs.push(Attr::new(name, value)),
        }
    }

    /// Returns the ordered child list.
    #[inline]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Appends a child node, preserving document order.
    #[inline]
    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Returns the first child with the given name, if any.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns an iterator over the children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns `true` if the node has no attributes, no children and no
    /// text.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.children.is_empty() && self.text.is_empty()
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            f.write_str("  ")?;
        }
        write!(f, "<{}", self.name)?;
        for attr in &self.attrs {
            write!(f, " {}=\"{}\"", attr.name, attr.value)?;
        }
        if self.children.is_empty() && self.text.is_empty() {
            return writeln!(f, "/>");
        }
        if self.children.is_empty() {
            return writeln!(f, ">{}</{}>", self.text, self.name);
        }
        writeln!(f, ">{}", self.text)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        for _ in 0..depth {
            f.write_str("  ")?;
        }
        writeln!(f, "</{}>", self.name)
    }
}

impl fmt::Display for Node {
    /// Renders an XML-like layout for debugging. Not a wire format: text is
    /// not escaped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::Node;

    #[test]
    fn attr_replace_keeps_position() {
        let mut node = Node::new("n");
        node.set_attr("a", "1");
        node.set_attr("b", "2");
        node.set_attr("a", "3");

        assert_eq!(node.attrs().len(), 2);
        assert_eq!(node.attrs()[0].name(), "a");
        assert_eq!(node.attrs()[0].value(), "3");
    }

    #[test]
    fn child_lookup_is_first_match() {
        let mut node = Node::new("n");
        node.push_child(Node::with_text("li", "first"));
        node.push_child(Node::with_text("li", "second"));

        assert_eq!(node.child("li").unwrap().text(), "first");
        assert_eq!(node.children_named("li").count(), 2);
    }

    #[test]
    fn display_is_nested() {
        let mut node = Node::new("outer");
        node.push_child(Node::with_text("inner", "7"));
        let rendered = node.to_string();

        assert!(rendered.contains("<outer>"));
        assert!(rendered.contains("<inner>7</inner>"));
    }

    #[test]
    fn empty_node() {
        let mut node = Node::new("n");
        assert!(node.is_empty());
        node.set_attr("a", "1");
        assert!(!node.is_empty());
    }
}
