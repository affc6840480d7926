#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{JsCast, JsValue};
#[cfg(target_arch = "wasm32")]
use web_sys::{Document, Node};

#[cfg(target_arch = "wasm32")]
const STYLE_TAG_SELECTOR: &str = "style[data-scanlog]";
const STYLE_VERSION_ATTRIBUTE: &str = "data-scanlog";

/// Bump together with `DEFAULT_STYLES`.
pub const STYLE_VERSION: &str = "2";

/// Default CSS for the status tags and the built-in JSON tree.
pub const DEFAULT_STYLES: &str = r#"
:root {
  --scanlog-allowed: #067647;
  --scanlog-allowed-bg: rgba(6, 118, 71, 0.12);
  --scanlog-rejected: #b42318;
  --scanlog-rejected-bg: rgba(180, 35, 24, 0.1);
  --scanlog-warn: #b54708;
  --scanlog-warn-bg: rgba(220, 104, 3, 0.16);
  --scanlog-tree-key: #3f4c5a;
  --scanlog-tree-string: #047857;
  --scanlog-tree-number: #0b5394;
  --scanlog-tree-literal: #8b3700;
}

.review-status {
  border-radius: 999px;
  padding: 2px 10px;
  font-weight: 600;
}

.review-status.allowed {
  color: var(--scanlog-allowed);
  background: var(--scanlog-allowed-bg);
}

.review-status.rejected {
  color: var(--scanlog-rejected);
  background: var(--scanlog-rejected-bg);
}

.review-status.warn {
  color: var(--scanlog-warn);
  background: var(--scanlog-warn-bg);
}

.json-tree {
  font-family: ui-monospace, SFMono-Regular, Menlo, monospace;
  font-size: 0.85rem;
}

.json-tree ul {
  list-style: none;
  margin: 0;
  padding-left: 18px;
}

.json-tree summary {
  cursor: pointer;
}

.json-tree__count {
  color: var(--scanlog-tree-key);
  font-size: 0.75rem;
  margin: 0 4px;
}

.json-tree details[open] > summary > .json-tree__count {
  display: none;
}

.json-tree__key {
  color: var(--scanlog-tree-key);
}

.json-tree__value--string {
  color: var(--scanlog-tree-string);
}

.json-tree__value--number {
  color: var(--scanlog-tree-number);
}

.json-tree__value--boolean,
.json-tree__value--null {
  color: var(--scanlog-tree-literal);
}
"#;

/// What to do with the `<style data-scanlog>` tag already in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleAction {
    Insert,
    Keep,
    /// A sheet from another build is present; its rules are swapped in place.
    Replace,
}

pub fn style_action(existing_version: Option<Option<&str>>) -> StyleAction {
    match existing_version {
        None => StyleAction::Insert,
        Some(Some(version)) if version == STYLE_VERSION => StyleAction::Keep,
        Some(_) => StyleAction::Replace,
    }
}

/// Inject the default stylesheet, refreshing one left by an older build.
#[cfg(target_arch = "wasm32")]
pub fn ensure_styles(document: &Document) -> Result<(), JsValue> {
    let existing = document.query_selector(STYLE_TAG_SELECTOR)?;
    let version = existing
        .as_ref()
        .map(|tag| tag.get_attribute(STYLE_VERSION_ATTRIBUTE));

    match (style_action(version.as_ref().map(Option::as_deref)), existing) {
        (StyleAction::Keep, _) => Ok(()),
        (StyleAction::Replace, Some(tag)) => {
            tag.set_text_content(Some(DEFAULT_STYLES));
            tag.set_attribute(STYLE_VERSION_ATTRIBUTE, STYLE_VERSION)
        }
        _ => {
            let head = document
                .head()
                .ok_or_else(|| JsValue::from_str("Document không có thẻ <head>"))?;
            let tag = document.create_element("style")?;
            tag.set_attribute(STYLE_VERSION_ATTRIBUTE, STYLE_VERSION)?;
            tag.set_text_content(Some(DEFAULT_STYLES));
            head.append_child(&tag.dyn_into::<Node>()?)?;
            Ok(())
        }
    }
}
