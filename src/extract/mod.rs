//! HTML to structured page extraction
//!
//! The extractor is a pure function from `{url, html, mode, source}` to a
//! [`Page`]: title, canonical URL, key paragraphs, headings, links, forms,
//! and synthesized actions, all with deterministic, content-addressed
//! identifiers. Everything except `fetched_at` (and the page id derived
//! from it) is a deterministic function of the input.

mod actions;
mod readability;

pub use actions::{css_selector_for, synthesize_actions, ActionKind, PageAction};
pub use readability::{extract_article, Article};

use crate::config::PageMode;
use crate::ids::sha256_16;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Version tag stamped on every extracted page.
pub const EXTRACTOR_VERSION: &str = "v1";

/// How the HTML handed to the extractor was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSource {
    Static,
    Playwright,
}

impl PageSource {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Playwright => "playwright",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "static" => Some(Self::Static),
            "playwright" => Some(Self::Playwright),
            _ => None,
        }
    }
}

/// A link extracted from a page, in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLink {
    pub url: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    pub is_internal: bool,
}

/// One field of an HTML form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A form extracted from a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageForm {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub method: String,
    pub fields: Vec<FormField>,
}

/// A structured snapshot of a URL at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    pub title: String,
    pub fetched_at: String,
    pub content_hash: String,
    pub extractor_version: String,
    pub mode: PageMode,
    pub source: PageSource,
    pub headings: Vec<String>,
    pub key_paragraphs: Vec<String>,
    pub links: Vec<PageLink>,
    pub forms: Vec<PageForm>,
    pub actions: Vec<PageAction>,
}

/// Input to [`extract_page_from_html`].
#[derive(Debug, Clone, Copy)]
pub struct ExtractInput<'a> {
    pub url: &'a str,
    pub html: &'a str,
    pub mode: PageMode,
    pub source: PageSource,
}

const LINK_TEXT_MAX_CHARS: usize = 160;

fn heading_cap(mode: PageMode) -> usize {
    match mode {
        PageMode::Compact => 12,
        PageMode::Full => 40,
    }
}

fn link_cap(mode: PageMode) -> usize {
    match mode {
        PageMode::Compact => 25,
        PageMode::Full => 80,
    }
}

fn paragraph_cap(mode: PageMode) -> usize {
    match mode {
        PageMode::Compact => 10,
        PageMode::Full => 35,
    }
}

/// Replaces whitespace runs with single spaces and trims.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts a structured [`Page`] from raw HTML
///
/// Pure with respect to I/O; the only non-deterministic outputs are
/// `fetched_at` and the page id that incorporates it. The content hash
/// depends only on the title and key paragraphs, which is what makes
/// unchanged-page detection work across fetches.
pub fn extract_page_from_html(input: ExtractInput) -> Page {
    let doc = Html::parse_document(input.html);
    let base = Url::parse(input.url).ok();

    let canonical_url = extract_canonical(&doc, base.as_ref());
    let article = extract_article(&doc);

    let headings = extract_headings(&doc, heading_cap(input.mode));
    let links = extract_links(&doc, base.as_ref(), link_cap(input.mode));
    let forms = extract_forms(&doc, base.as_ref());
    let actions = synthesize_actions(&doc, base.as_ref());

    let title = article
        .title
        .clone()
        .or_else(|| extract_title_tag(&doc))
        .unwrap_or_default();

    let mut key_paragraphs = article.paragraphs;
    key_paragraphs.truncate(paragraph_cap(input.mode));

    let content_hash = sha256_16(&format!("{}\n{}", title, key_paragraphs.join("\n")));
    let fetched_at = Utc::now().to_rfc3339();
    let id = sha256_16(&format!("{}:{}:{}", input.url, content_hash, fetched_at));

    Page {
        id,
        url: input.url.to_string(),
        canonical_url,
        title,
        fetched_at,
        content_hash,
        extractor_version: EXTRACTOR_VERSION.to_string(),
        mode: input.mode,
        source: input.source,
        headings,
        key_paragraphs,
        links,
        forms,
        actions,
    }
}

fn extract_canonical(doc: &Html, base: Option<&Url>) -> Option<String> {
    let sel = Selector::parse(r#"link[rel="canonical"]"#).expect("static selector");
    let href = doc.select(&sel).next()?.value().attr("href")?;
    resolve(href, base)
}

fn extract_title_tag(doc: &Html) -> Option<String> {
    let sel = Selector::parse("title").expect("static selector");
    doc.select(&sel)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn extract_headings(doc: &Html, cap: usize) -> Vec<String> {
    let sel = Selector::parse("h1, h2, h3").expect("static selector");
    doc.select(&sel)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .take(cap)
        .collect()
}

fn extract_links(doc: &Html, base: Option<&Url>, cap: usize) -> Vec<PageLink> {
    let sel = Selector::parse("a[href]").expect("static selector");
    let base_host = base.and_then(|b| b.host_str()).map(|h| h.to_lowercase());

    let mut links = Vec::new();
    for el in doc.select(&sel) {
        if links.len() >= cap {
            break;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve(href, base) else {
            continue;
        };
        let mut text = normalize_whitespace(&el.text().collect::<String>());
        if text.is_empty() {
            continue;
        }
        if text.len() > LINK_TEXT_MAX_CHARS {
            let mut cut = LINK_TEXT_MAX_CHARS;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }

        let link_host = Url::parse(&resolved)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()));
        let is_internal = match (&base_host, &link_host) {
            (Some(b), Some(l)) => b == l,
            _ => false,
        };

        links.push(PageLink {
            url: resolved,
            text,
            rel: el.value().attr("rel").map(|r| r.to_string()),
            is_internal,
        });
    }
    links
}

fn extract_forms(doc: &Html, base: Option<&Url>) -> Vec<PageForm> {
    let form_sel = Selector::parse("form").expect("static selector");
    let field_sel = Selector::parse("input, textarea, select").expect("static selector");
    let label_texts = collect_label_texts(doc);

    let mut forms = Vec::new();
    for (index, form) in doc.select(&form_sel).enumerate() {
        let id = form
            .value()
            .attr("id")
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("form_{}", index + 1));

        let action = form
            .value()
            .attr("action")
            .and_then(|href| resolve(href, base));
        let method = form
            .value()
            .attr("method")
            .unwrap_or("get")
            .to_lowercase();

        let fields = form
            .select(&field_sel)
            .map(|field| extract_field(&field, &label_texts))
            .collect();

        forms.push(PageForm {
            id,
            action,
            method,
            fields,
        });
    }
    forms
}

fn extract_field(field: &ElementRef, label_texts: &HashMap<String, String>) -> FormField {
    let v = field.value();
    let field_type = v
        .attr("type")
        .map(|t| t.to_lowercase())
        .unwrap_or_else(|| v.name().to_string());

    // aria-label wins over an associated <label for=…>.
    let label = v
        .attr("aria-label")
        .map(|l| normalize_whitespace(l))
        .filter(|l| !l.is_empty())
        .or_else(|| {
            v.attr("id")
                .and_then(|id| label_texts.get(id))
                .cloned()
        });

    FormField {
        name: v.attr("name").map(|n| n.to_string()),
        field_type,
        required: v.attr("required").is_some(),
        placeholder: v.attr("placeholder").map(|p| p.to_string()),
        label,
    }
}

fn collect_label_texts(doc: &Html) -> HashMap<String, String> {
    let sel = Selector::parse("label[for]").expect("static selector");
    doc.select(&sel)
        .filter_map(|el| {
            let target = el.value().attr("for")?.to_string();
            let text = normalize_whitespace(&el.text().collect::<String>());
            if text.is_empty() {
                None
            } else {
                Some((target, text))
            }
        })
        .collect()
}

fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
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
