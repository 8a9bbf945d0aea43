//! Action synthesis
//!
//! Turns a page's interactive elements into executable action handles
//! with stable ids. The selector computed for each element is plain CSS
//! text that a browser-side executor accepts as-is. Ids hash the action
//! kind, selector, and (for navigation) the resolved href, so two
//! extractions of identical HTML yield identical ids in the same order.

use crate::ids::sha256_16;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use url::Url;

use crate::extract::normalize_whitespace;

/// At most this many candidate elements are scanned, in document order.
const MAX_CANDIDATES: usize = 150;
/// At most this many actions are kept per page.
const MAX_ACTIONS: usize = 80;
/// Labels longer than this are cut to keep pages compact.
const MAX_LABEL_CHARS: usize = 120;

/// The kind of interaction an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Fill,
    Select,
    Submit,
    Navigate,
}

impl ActionKind {
    /// Short prefix used in the action id hash.
    fn id_prefix(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Select => "select",
            Self::Submit => "submit",
            Self::Navigate => "nav",
        }
    }
}

/// An executable handle synthesized from one page element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub label: String,
    pub selector: String,
    /// JSON-schema-shaped parameter description, always `type: object`.
    pub params: Value,
}

/// Scans the document and synthesizes the page's action list.
pub fn synthesize_actions(doc: &Html, base: Option<&Url>) -> Vec<PageAction> {
    let candidate_sel =
        Selector::parse("a[href], button, form, input, textarea, select").expect("static selector");

    let mut actions = Vec::new();
    let mut seen = HashSet::new();

    for el in doc.select(&candidate_sel).take(MAX_CANDIDATES) {
        let Some(selector) = css_selector_for(&el) else {
            continue;
        };
        let Some(action) = synthesize_one(&el, selector, base) else {
            continue;
        };
        if seen.insert(action.id.clone()) {
            actions.push(action);
            if actions.len() >= MAX_ACTIONS {
                break;
            }
        }
    }

    actions
}

fn synthesize_one(el: &ElementRef, selector: String, base: Option<&Url>) -> Option<PageAction> {
    let tag = el.value().name();
    match tag {
        "a" => {
            let href = el.value().attr("href")?;
            let resolved = resolve_href(href, base)?;
            let text = element_label(el);
            let label = if text.is_empty() { resolved.clone() } else { text };
            Some(PageAction {
                id: sha256_16(&format!("nav:{}:{}", selector, resolved)),
                kind: ActionKind::Navigate,
                label,
                selector,
                params: empty_params(),
            })
        }
        "form" | "button" => Some(submit_action(el, selector)),
        "input" => {
            let input_type = el.value().attr("type").unwrap_or("text").to_lowercase();
            if input_type == "submit" {
                Some(submit_action(el, selector))
            } else {
                Some(value_action(el, selector, ActionKind::Fill))
            }
        }
        "textarea" => Some(value_action(el, selector, ActionKind::Fill)),
        "select" => Some(value_action(el, selector, ActionKind::Select)),
        _ => None,
    }
}

fn submit_action(el: &ElementRef, selector: String) -> PageAction {
    let text = el
        .value()
        .attr("value")
        .map(|v| normalize_whitespace(v))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| element_label(el));
    let label = if text.is_empty() {
        "Submit".to_string()
    } else {
        text
    };
    PageAction {
        id: sha256_16(&format!("submit:{}", selector)),
        kind: ActionKind::Submit,
        label,
        selector,
        params: empty_params(),
    }
}

fn value_action(el: &ElementRef, selector: String, kind: ActionKind) -> PageAction {
    let required = el.value().attr("required").is_some();
    let label = {
        let text = element_label(el);
        if !text.is_empty() {
            text
        } else if let Some(aria) = el.value().attr("aria-label") {
            normalize_whitespace(aria)
        } else if let Some(name) = el.value().attr("name") {
            name.to_string()
        } else {
            el.value().name().to_string()
        }
    };
    PageAction {
        id: sha256_16(&format!("{}:{}", kind.id_prefix(), selector)),
        kind,
        label,
        selector,
        params: value_params(required),
    }
}

fn empty_params() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn value_params(required: bool) -> Value {
    let required_fields: Vec<&str> = if required { vec!["value"] } else { vec![] };
    json!({
        "type": "object",
        "properties": { "value": { "type": "string" } },
        "required": required_fields,
    })
}

/// Visible text of an element, whitespace-collapsed and length-capped.
fn element_label(el: &ElementRef) -> String {
    let mut text = normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "));
    if text.len() > MAX_LABEL_CHARS {
        let mut cut = MAX_LABEL_CHARS;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

fn resolve_href(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if let Ok(abs) = Url::parse(href) {
        return match abs.scheme() {
            "http" | "https" => Some(abs.to_string()),
            _ => None,
        };
    }
    let resolved = base?.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Computes a strict CSS selector for an element
///
/// Priority: `#id`, then `tag[name="…"]`, then `tag[aria-label="…"]`,
/// then the first two classes, then `tag:nth-of-type(n)`.
pub fn css_selector_for(el: &ElementRef) -> Option<String> {
    let v = el.value();
    let tag = v.name();

    if let Some(id) = v.attr("id").filter(|s| !s.trim().is_empty()) {
        return Some(format!("#{}", escape_identifier(id)));
    }
    if let Some(name) = v.attr("name").filter(|s| !s.trim().is_empty()) {
        return Some(format!("{}[name=\"{}\"]", tag, escape_attribute(name)));
    }
    if let Some(aria) = v.attr("aria-label").filter(|s| !s.trim().is_empty()) {
        return Some(format!("{}[aria-label=\"{}\"]", tag, escape_attribute(aria)));
    }

    let classes: Vec<String> = v.classes().take(2).map(escape_identifier).collect();
    if !classes.is_empty() {
        return Some(format!("{}.{}", tag, classes.join(".")));
    }

    Some(format!("{}:nth-of-type({})", tag, nth_of_type(el).max(1)))
}

/// 1-based position of the element among same-tag siblings.
fn nth_of_type(el: &ElementRef) -> usize {
    let name = el.value().name();
    let mut index = 1;
    for sibling in el.prev_siblings() {
        if let Some(sib) = ElementRef::wrap(sibling) {
            if sib.value().name() == name {
                index += 1;
            }
        }
    }
    index
}

/// Backslash-escapes characters outside `[A-Za-z0-9_-]`.
fn escape_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Escapes backslashes and double quotes for attribute-value selectors.
fn escape_attribute(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
