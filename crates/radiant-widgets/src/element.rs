#![forbid(unsafe_code)]

//! Headless container nodes.
//!
//! [`Element`] stands in for a DOM element: a tag, classes, attributes, text
//! and children. Widgets build and update elements; a renderer (out of scope
//! here) mirrors them into a real document.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

struct ElementInner {
    tag: String,
    classes: RefCell<Vec<String>>,
    attributes: RefCell<BTreeMap<String, String>>,
    text: RefCell<String>,
    children: RefCell<Vec<Element>>,
}

/// Shared handle to a node. Cloning shares the node.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.inner.tag)
            .field("classes", &*self.inner.classes.borrow())
            .field("text", &*self.inner.text.borrow())
            .field("children", &self.inner.children.borrow().len())
            .finish()
    }
}

impl Element {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                tag: tag.to_owned(),
                classes: RefCell::new(Vec::new()),
                attributes: RefCell::new(BTreeMap::new()),
                text: RefCell::new(String::new()),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// New element carrying one class.
    #[must_use]
    pub fn with_class(tag: &str, class: &str) -> Self {
        let element = Self::new(tag);
        element.add_class(class);
        element
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn add_class(&self, class: &str) {
        let mut classes = self.inner.classes.borrow_mut();
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_owned());
        }
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.inner.classes.borrow().iter().any(|c| c == class)
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.inner.text.borrow().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.inner.text.borrow_mut() = text.into();
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.borrow().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        self.inner
            .attributes
            .borrow_mut()
            .insert(name.to_owned(), value.into());
    }

    pub fn append_child(&self, child: Element) {
        self.inner.children.borrow_mut().push(child);
    }

    /// Remove every child after the first `keep`.
    pub fn truncate_children(&self, keep: usize) {
        self.inner.children.borrow_mut().truncate(keep);
    }

    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        self.inner.children.borrow().clone()
    }

    /// Descendants (self excluded) carrying `class`, in document order.
    #[must_use]
    pub fn query_class(&self, class: &str) -> Vec<Element> {
        let mut found = Vec::new();
        self.collect_class(class, &mut found);
        found
    }

    fn collect_class(&self, class: &str, found: &mut Vec<Element>) {
        for child in self.inner.children.borrow().iter() {
            if child.has_class(class) {
                found.push(child.clone());
            }
            child.collect_class(class, found);
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_class_is_document_order() {
        let root = Element::new("div");
        let a = Element::with_class("span", "digit");
        let wrapper = Element::new("div");
        let b = Element::with_class("span", "digit");
        wrapper.append_child(b.clone());
        root.append_child(a.clone());
        root.append_child(wrapper);

        let found = root.query_class("digit");
        assert_eq!(found.len(), 2);
        assert!(found[0].ptr_eq(&a));
        assert!(found[1].ptr_eq(&b));
    }

    #[test]
    fn classes_are_a_set() {
        let e = Element::new("div");
        e.add_class("x");
        e.add_class("x");
        assert!(e.has_class("x"));
        assert!(!e.has_class("y"));
    }

    #[test]
    fn truncate_keeps_prefix() {
        let e = Element::new("div");
        for _ in 0..3 {
            e.append_child(Element::new("span"));
        }
        e.truncate_children(1);
        assert_eq!(e.children().len(), 1);
    }
}
