// -----------------------------------------------------------------------------
// Markers

/// Reserved node and attribute names used by the built-in strategies.
///
/// All of them are configurable per [`Domain`](crate::Domain); the defaults
/// match the common compact convention: `li` items, `Key`/`Value` pair
/// children, an `lb` attribute for non-zero array lower bounds.
#[derive(Clone, Debug)]
pub struct Markers {
    /// Child-element name for generic sequence items.
    pub item: String,
    /// Child-element name for the key half of a map entry.
    pub key: String,
    /// Child-element name for the value half of a map entry.
    pub value: String,
    /// Attribute carrying a non-zero array lower bound.
    pub lower_bound: String,
    /// Attribute carrying the identity of a shared value's defining node.
    pub id: String,
    /// Attribute referencing a shared value defined elsewhere.
    pub reference: String,
    /// Attribute marking an absent optional value.
    pub null: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            item: "li".into(),
            key: "Key".into(),
            value: "Value".into(),
            lower_bound: "lb".into(),
            id: "id".into(),
            reference: "ref".into(),
            null: "null".into(),
        }
    }
}
