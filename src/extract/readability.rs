//! Boilerplate-removing article extraction
//!
//! A lightweight readability pass: paragraph-bearing containers are scored
//! by tag weight, accumulated text length, and negative class/id
//! indicators, and the best container's paragraphs become the page's key
//! paragraphs. Only the output shape matters to callers; the scoring
//! itself is a heuristic.

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

use crate::extract::normalize_whitespace;

/// Minimum length for a paragraph to count toward container scoring.
const SCORING_MIN_CHARS: usize = 25;
/// Paragraphs at or below this length are dropped from the result.
const PARAGRAPH_MIN_CHARS: usize = 40;
/// At most this many paragraphs are collected from the article content.
const PARAGRAPH_CAP: usize = 20;

/// Class/id fragments that mark a container as page chrome.
const NEGATIVE_INDICATORS: &[&str] = &[
    "comment", "footer", "sidebar", "menu", "nav", "banner", "advert", "promo", "share", "social",
];

/// The readability result: an article title and its key paragraphs.
#[derive(Debug, Clone, Default)]
pub struct Article {
    pub title: Option<String>,
    pub paragraphs: Vec<String>,
}

/// Runs the readability pass over a parsed document.
pub fn extract_article(doc: &Html) -> Article {
    let p_sel = Selector::parse("p").expect("static selector");

    // Score every paragraph's ancestors; the best-scoring container is the
    // article body.
    let mut scores: HashMap<NodeId, f64> = HashMap::new();

    for p in doc.select(&p_sel) {
        let text = normalize_whitespace(&p.text().collect::<String>());
        if text.len() < SCORING_MIN_CHARS {
            continue;
        }
        let points = 1.0 + (text.len() as f64 / 100.0).min(3.0);

        let mut weight = 1.0;
        for ancestor in p.ancestors() {
            let Some(el) = ElementRef::wrap(ancestor) else {
                continue;
            };
            let entry = scores.entry(ancestor.id()).or_insert_with(|| base_score(&el));
            *entry += points * weight;
            // Only the parent and grandparent accumulate meaningfully.
            weight /= 2.0;
            if weight < 0.25 {
                break;
            }
        }
    }

    // Pick the winner in document order so equal scores resolve the same
    // way on every extraction.
    let mut best: Option<(NodeId, f64)> = None;
    for node in doc.tree.nodes() {
        if let Some(score) = scores.get(&node.id()) {
            if best.map_or(true, |(_, s)| *score > s) {
                best = Some((node.id(), *score));
            }
        }
    }
    let best = best.map(|(id, _)| id);

    let paragraphs = match best.and_then(|id| doc.tree.get(id)).and_then(ElementRef::wrap) {
        Some(container) => collect_paragraphs(container.select(&p_sel)),
        // No scoring candidate: fall back to every paragraph in the document.
        None => collect_paragraphs(doc.select(&p_sel)),
    };

    Article {
        title: first_heading(doc),
        paragraphs,
    }
}

fn collect_paragraphs<'a>(iter: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    iter.map(|p| normalize_whitespace(&p.text().collect::<String>()))
        .filter(|text| text.len() > PARAGRAPH_MIN_CHARS)
        .take(PARAGRAPH_CAP)
        .collect()
}

fn first_heading(doc: &Html) -> Option<String> {
    let h1_sel = Selector::parse("h1").expect("static selector");
    doc.select(&h1_sel)
        .map(|h| normalize_whitespace(&h.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// Base score for a container from its tag and class/id hints.
fn base_score(el: &ElementRef) -> f64 {
    let mut score = match el.value().name() {
        "article" | "main" => 8.0,
        "section" | "div" => 5.0,
        "body" => 0.0,
        _ => 0.0,
    };

    let hints = format!(
        "{} {}",
        el.value().attr("class").unwrap_or(""),
        el.value().attr("id").unwrap_or("")
    )
    .to_lowercase();
    if NEGATIVE_INDICATORS.iter().any(|ind| hints.contains(ind)) {
        score -= 25.0;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(html: &str) -> Article {
        extract_article(&Html::parse_document(html))
    }

    const LONG_A: &str = "This paragraph carries enough body text to clear the length filter easily.";
    const LONG_B: &str = "Another substantial paragraph that also clears the minimum length filter.";

    #[test]
    fn test_prefers_content_over_chrome() {
        let html = format!(
            r#"<html><body>
                <div class="sidebar"><p>{}</p></div>
                <article><h1>Real Title</h1><p>{}</p><p>{}</p></article>
            </body></html>"#,
            LONG_A, LONG_A, LONG_B
        );
        let art = article(&html);
        assert_eq!(art.paragraphs.len(), 2);
        assert_eq!(art.title.as_deref(), Some("Real Title"));
    }

    #[test]
    fn test_drops_short_paragraphs() {
        let html = format!(
            "<html><body><article><p>short</p><p>{}</p></article></body></html>",
            LONG_A
        );
        let art = article(&html);
        assert_eq!(art.paragraphs, vec![LONG_A.to_string()]);
    }

    #[test]
    fn test_whitespace_normalized() {
        let padded = LONG_A.replace(' ', "\n   ");
        let html = format!("<html><body><article><p>{}</p></article></body></html>", padded);
        let art = article(&html);
        assert_eq!(art.paragraphs, vec![LONG_A.to_string()]);
    }

    #[test]
    fn test_caps_at_twenty_paragraphs() {
        let many: String = (0..30)
            .map(|i| format!("<p>Paragraph number {} with plenty of text to pass the length filter.</p>", i))
            .collect();
        let html = format!("<html><body><article>{}</article></body></html>", many);
        let art = article(&html);
        assert_eq!(art.paragraphs.len(), 20);
    }

    #[test]
    fn test_empty_document() {
        let art = article("<html><body></body></html>");
        assert!(art.paragraphs.is_empty());
        assert!(art.title.is_none());
    }

    #[test]
    fn test_title_from_first_nonempty_h1() {
        let html = "<html><body><h1>  </h1><h1>The Title</h1></body></html>";
        assert_eq!(article(html).title.as_deref(), Some("The Title"));
    }

    #[test]
    fn test_paragraphs_preserve_document_order() {
        let html = format!(
            "<html><body><article><p>First: {}</p><p>Second: {}</p></article></body></html>",
            LONG_A, LONG_B
        );
        let art = article(&html);
        assert!(art.paragraphs[0].starts_with("First:"));
        assert!(art.paragraphs[1].starts_with("Second:"));
    }
}
