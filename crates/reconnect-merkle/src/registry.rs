//! Classes whose nodes root custom view subtrees.

use std::collections::HashSet;

use reconnect_protocol::ClassId;

/// The set of node classes that are synchronized as separate subtrees.
///
/// Both peers must agree on this set. Only internal nodes can be custom
/// roots; they are containers without payload of their own.
#[derive(Debug, Clone, Default)]
pub struct CustomRootRegistry {
    classes: HashSet<ClassId>,
}

impl CustomRootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_class(mut self, class: ClassId) -> Self {
        self.register(class);
        self
    }

    pub fn register(&mut self, class: ClassId) {
        self.classes.insert(class);
    }

    pub fn is_custom(&self, class: ClassId) -> bool {
        self.classes.contains(&class)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
