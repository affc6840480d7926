//! In-memory page used by the offline preview and by tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use scanlog_core::{DisplayElement, PageQuery};
use serde::{Deserialize, Serialize};

/// Observable state of one element.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ElementState {
    pub classes: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// How a page fixture describes an element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementSpec {
    /// Space separated class list, as in markup.
    pub class: String,
    #[serde(default)]
    pub text: String,
}

/// Shared handle to an element; clones point at the same node.
#[derive(Debug, Clone, Default)]
pub struct MemoryElement(Rc<RefCell<ElementState>>);

impl MemoryElement {
    pub fn new(classes: &[&str], text: &str) -> Self {
        Self(Rc::new(RefCell::new(ElementState {
            classes: classes.iter().map(|class| class.to_string()).collect(),
            text: text.to_string(),
            ..ElementState::default()
        })))
    }

    pub fn state(&self) -> ElementState {
        self.0.borrow().clone()
    }

    pub fn classes(&self) -> Vec<String> {
        self.0.borrow().classes.clone()
    }

    pub fn markup(&self) -> Option<String> {
        self.0.borrow().markup.clone()
    }
}

impl DisplayElement for MemoryElement {
    fn text(&self) -> String {
        self.0.borrow().text.clone()
    }

    fn set_text(&self, text: &str) {
        let mut state = self.0.borrow_mut();
        state.text = text.to_string();
        state.markup = None;
    }

    fn set_markup(&self, markup: &str) {
        let mut state = self.0.borrow_mut();
        state.text.clear();
        state.markup = Some(markup.to_string());
    }

    fn add_class(&self, class: &str) {
        let mut state = self.0.borrow_mut();
        if !state.classes.iter().any(|existing| existing == class) {
            state.classes.push(class.to_string());
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.0.borrow().classes.iter().any(|existing| existing == class)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.borrow().attributes.get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
    }
}

/// Ordered collection of elements standing in for a rendered page.
#[derive(Debug, Default)]
pub struct MemoryPage {
    elements: RefCell<Vec<MemoryElement>>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a page from fixture entries, preserving their order.
    pub fn from_specs(specs: &[ElementSpec]) -> Self {
        let page = Self::new();
        for spec in specs {
            let classes: Vec<&str> = spec.class.split_whitespace().collect();
            page.push(&classes, &spec.text);
        }
        page
    }

    /// Append an element; allowed while a pass is running.
    pub fn push(&self, classes: &[&str], text: &str) -> MemoryElement {
        let element = MemoryElement::new(classes, text);
        self.elements.borrow_mut().push(element.clone());
        element
    }

    pub fn elements(&self) -> Vec<MemoryElement> {
        self.elements.borrow().clone()
    }

    pub fn snapshot(&self) -> Vec<ElementState> {
        self.elements
            .borrow()
            .iter()
            .map(MemoryElement::state)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.borrow().is_empty()
    }
}

impl PageQuery for MemoryPage {
    type Element = MemoryElement;

    fn elements_by_class(&self, class: &str) -> Vec<MemoryElement> {
        self.elements
            .borrow()
            .iter()
            .filter(|element| element.has_class(class))
            .cloned()
            .collect()
    }
}
