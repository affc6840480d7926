//! Built-in JSON tree renderer producing collapsible `<details>` markup.

use scanlog_core::{DisplayElement, JsonTreeRenderer, ScanLogError};
use serde_json::{Map, Value};

/// Renders a JSON value as nested `<details>`/`<summary>` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlJsonTree {
    /// Containers at a depth lower than this start expanded.
    pub open_depth: usize,
}

impl Default for HtmlJsonTree {
    fn default() -> Self {
        Self { open_depth: 1 }
    }
}

impl HtmlJsonTree {
    pub fn new(open_depth: usize) -> Self {
        Self { open_depth }
    }

    /// Markup for `value`, wrapped in the `json-tree` root.
    pub fn render_markup(&self, value: &Value) -> String {
        let mut out = String::from("<div class=\"json-tree\">");
        self.render_node(&mut out, None, value, 0);
        out.push_str("</div>");
        out
    }

    fn render_node(&self, out: &mut String, key: Option<&str>, value: &Value, depth: usize) {
        match value {
            Value::Object(map) => self.render_object(out, key, map, depth),
            Value::Array(items) => self.render_array(out, key, items, depth),
            scalar => {
                out.push_str("<div class=\"json-tree__leaf\">");
                push_key(out, key);
                push_scalar(out, scalar);
                out.push_str("</div>");
            }
        }
    }

    fn render_object(
        &self,
        out: &mut String,
        key: Option<&str>,
        map: &Map<String, Value>,
        depth: usize,
    ) {
        self.open_container(out, key, "object", '{', map.len(), depth);
        for (child_key, child) in map {
            out.push_str("<li>");
            self.render_node(out, Some(&format!("\"{child_key}\"")), child, depth + 1);
            out.push_str("</li>");
        }
        close_container(out, '}');
    }

    fn render_array(&self, out: &mut String, key: Option<&str>, items: &[Value], depth: usize) {
        self.open_container(out, key, "array", '[', items.len(), depth);
        for (index, child) in items.iter().enumerate() {
            out.push_str("<li>");
            self.render_node(out, Some(&index.to_string()), child, depth + 1);
            out.push_str("</li>");
        }
        close_container(out, ']');
    }

    fn open_container(
        &self,
        out: &mut String,
        key: Option<&str>,
        kind: &str,
        bracket: char,
        len: usize,
        depth: usize,
    ) {
        let open = if depth < self.open_depth { " open" } else { "" };
        out.push_str(&format!(
            "<details class=\"json-tree__node json-tree__node--{kind}\"{open}><summary>"
        ));
        push_key(out, key);
        out.push(bracket);
        out.push_str(&format!(
            "<span class=\"json-tree__count\">{len}</span></summary><ul>"
        ));
    }
}

fn close_container(out: &mut String, bracket: char) {
    out.push_str("</ul><span class=\"json-tree__close\">");
    out.push(bracket);
    out.push_str("</span></details>");
}

fn push_key(out: &mut String, key: Option<&str>) {
    if let Some(key) = key {
        out.push_str("<span class=\"json-tree__key\">");
        out.push_str(&escape_html(key));
        out.push_str("</span>: ");
    }
}

fn push_scalar(out: &mut String, value: &Value) {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "container",
    };
    out.push_str(&format!(
        "<span class=\"json-tree__value json-tree__value--{kind}\">{}</span>",
        escape_html(&value.to_string())
    ));
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

impl<E: DisplayElement> JsonTreeRenderer<E> for HtmlJsonTree {
    fn render(&self, value: &Value, mount: &E) -> Result<(), ScanLogError> {
        mount.set_markup(&self.render_markup(value));
        Ok(())
    }
}
