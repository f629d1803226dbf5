//! Owned element tree for a single entry
//!
//! The extractor builds one [`Element`] per `<entry>` while the entry's
//! events stream past, runs its field queries against it and drops it before
//! yielding. Nothing outside the current entry is ever materialised.

/// An element with its attributes, direct text and child elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Local (namespace-stripped) tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Character data directly inside this element, outer whitespace trimmed
    ///
    /// Segments split by a comment or processing instruction are joined as
    /// they appear, inner whitespace included.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter()
    }

    /// `./name`
    pub fn children_named<'a, 'k>(&'a self, name: &'k str) -> impl Iterator<Item = &'a Element> + 'k
    where
        'a: 'k,
    {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First `./name`
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// `./name[@key='value']`
    pub fn children_where<'a, 'k>(
        &'a self,
        name: &'k str,
        key: &'k str,
        value: &'k str,
    ) -> impl Iterator<Item = &'a Element> + 'k
    where
        'a: 'k,
    {
        self.children_named(name)
            .filter(move |c| c.attr(key) == Some(value))
    }

    /// First `./name[@key='value']`
    pub fn child_where(&self, name: &str, key: &str, value: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name == name && c.attr(key) == Some(value))
    }

    /// `./a/b/c`, in document order
    pub fn descend(&self, path: &[&str]) -> Vec<&Element> {
        let mut current = vec![self];
        for step in path {
            current = current
                .into_iter()
                .flat_map(|e| e.children.iter().filter(move |c| c.name == *step))
                .collect();
        }
        current
    }
}

/// Assembles an [`Element`] from start/text/end events
#[derive(Debug, Default)]
pub struct TreeBuilder {
    stack: Vec<Element>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open elements, including the root
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn open(&mut self, name: impl Into<String>, attributes: Vec<(String, String)>) {
        self.stack.push(Element::new(name, attributes));
    }

    pub fn text(&mut self, text: &str) {
        if let Some(top) = self.stack.last_mut() {
            top.text.push_str(text);
        }
    }

    /// Close the innermost open element
    ///
    /// Returns the root once it has been closed.
    pub fn close(&mut self) -> Option<Element> {
        let finished = self.stack.pop()?;
        match self.stack.last_mut() {
            Some(parent) => {
                parent.children.push(finished);
                None
            }
            None => Some(finished),
        }
    }
}
