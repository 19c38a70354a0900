//! Minimal HTML view engine for the home pages.

use std::collections::HashMap;

use mvcapi::{View, ViewEngine};
use serde_json::Value;

const LAYOUT: &str = "<!DOCTYPE html><html><head><title>{{title}}</title></head><body>{{body}}</body></html>";

/// Templates keyed by name, with `{{field}}` placeholders filled from the model.
pub struct TemplateEngine {
    templates: HashMap<&'static str, &'static str>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        let templates = HashMap::from([
            ("Home/Index", "<h1>{{message}}</h1>"),
            (
                "Home/Contact",
                "<h1>Contact</h1><p>Email: {{email}}</p><p>Phone: {{phone}}</p>",
            ),
            (
                "Home/Register",
                "<h1>Register</h1><p>{{status}}</p><form method=\"post\"><input name=\"email\"/></form>",
            ),
        ]);
        Self { templates }
    }
}

fn placeholder_value(model: &Value, key: &str) -> String {
    match model.get(key) {
        Some(Value::String(s)) => escape(s),
        Some(Value::Null) | None => String::new(),
        Some(other) => escape(&other.to_string()),
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn fill(template: &str, mut lookup: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                out.push_str(&lookup(after[..end].trim()));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl ViewEngine for TemplateEngine {
    fn render(&self, view: &View) -> anyhow::Result<String> {
        let Some(template) = self.templates.get(view.template.as_str()) else {
            anyhow::bail!("view '{}' was not found", view.template);
        };
        let body = fill(template, |key| placeholder_value(&view.model, key));
        Ok(fill(LAYOUT, |key| match key {
            "title" => escape(&view.template),
            "body" => body.clone(),
            _ => String::new(),
        }))
    }
}
