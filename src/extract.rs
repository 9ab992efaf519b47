//! Article text extraction from arbitrary HTML.
//!
//! Search results point at every kind of page layout, so extraction works in
//! three passes and stops at the first one that yields text:
//!
//! 1. **Container**: the largest element matching a known article container
//!    (`[itemprop=articleBody]`, `article`, `main`, ...) with enough text
//! 2. **Paragraphs**: every `<p>` outside boilerplate regions
//! 3. **Document**: all remaining text of the document
//!
//! Every pass skips non-content elements (`script`, `style`, `nav`, `footer`,
//! ...) and elements carrying a whole `class` or `id` token from a fixed list
//! of boilerplate names (`sidebar`, `social-share`, `cookie-banner`, ...).
//! Substrings never count: `ast-no-sidebar` or `tag-social-media` keep their
//! content. `<html>` and `<body>` are never boilerplate by class or id, since
//! themes put page-wide state there.
//!
//! The output is a pair of texts: `raw_text` keeps case and line breaks for
//! snippets and query building, `normalized_text` has whitespace collapsed and
//! case folded per [`CasePolicy`] for scoring. Extraction never fails; markup
//! that yields nothing produces empty strings.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Elements that never contain article text.
const SKIP_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "iframe", "form", "nav", "header",
    "footer", "aside", "button", "select", "object", "canvas",
];

/// Whole `class`/`id` tokens that mark boilerplate regions.
const BOILERPLATE_TOKENS: &[&str] = &[
    "ad", "ads", "adsbygoogle", "advert", "advertisement", "breadcrumb", "breadcrumbs", "comment",
    "comments", "comment-list", "consent", "cookie-banner", "cookie-consent", "cookie-notice",
    "cookie_banner", "main-menu", "menu", "modal", "nav", "navbar", "navigation", "newsletter",
    "popup", "promo", "related", "related-articles", "related-posts", "share", "share-buttons",
    "sharedaddy", "sharing", "sidebar", "social", "social-links", "social-share", "subscribe",
    "widget-area",
];

/// Elements that break lines in the raw text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "td", "th", "tr", "ul",
];

static CONTAINER_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "[itemprop=articleBody]",
        "article",
        "main",
        "[role=main]",
        ".article-body",
        ".article-content",
        ".entry-content",
        ".post-content",
        ".story-body",
        "#content",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("static container selector"))
    .collect()
});

static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("static paragraph selector"));

/// How `normalized_text` treats letter case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CasePolicy {
    #[default]
    Lower,
    Preserve,
}

/// Text extracted from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// Case-preserving text, one block element per line.
    pub raw_text: String,
    /// Whitespace-collapsed text for comparison.
    pub normalized_text: String,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.normalized_text.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ContentExtractor {
    case_policy: CasePolicy,
    /// Minimum characters a container needs before it is trusted as the article.
    min_container_chars: usize,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(CasePolicy::default())
    }
}

impl ContentExtractor {
    pub fn new(case_policy: CasePolicy) -> Self {
        Self {
            case_policy,
            min_container_chars: 200,
        }
    }

    /// Extract comparable article text from an HTML document.
    #[instrument(level = "debug", skip_all, fields(html_bytes = html.len()))]
    pub fn extract(&self, html: &str) -> Extracted {
        let document = Html::parse_document(html);

        let raw = self
            .from_container(&document)
            .or_else(|| from_paragraphs(&document))
            .unwrap_or_else(|| {
                debug!("No container or paragraphs; falling back to whole document");
                clean_lines(&element_text(document.root_element()))
            });

        Extracted {
            normalized_text: self.normalize(&raw),
            raw_text: raw,
        }
    }

    /// Collapse whitespace and apply the case policy.
    pub fn normalize(&self, text: &str) -> String {
        let collapsed = text.split_whitespace().join(" ");
        match self.case_policy {
            CasePolicy::Lower => collapsed.to_lowercase(),
            CasePolicy::Preserve => collapsed,
        }
    }

    fn from_container(&self, document: &Html) -> Option<String> {
        for selector in CONTAINER_SELECTORS.iter() {
            let best = document
                .select(selector)
                .filter(|el| !SKIP_TAGS.contains(&el.value().name()) && !inside_boilerplate(*el))
                .map(|el| clean_lines(&element_text(el)))
                .max_by(|a, b| a.chars().count().cmp(&b.chars().count()).then(b.cmp(a)));

            if let Some(text) = best {
                if text.chars().count() >= self.min_container_chars {
                    debug!(chars = text.len(), "Extracted article container");
                    return Some(text);
                }
            }
        }
        None
    }
}

fn from_paragraphs(document: &Html) -> Option<String> {
    let text = document
        .select(&PARAGRAPH_SELECTOR)
        .filter(|p| !is_boilerplate(*p) && !inside_boilerplate(*p))
        .map(|p| clean_lines(&element_text(p)))
        .filter(|t| !t.is_empty())
        .join("\n");
    (!text.is_empty()).then_some(text)
}

/// Collect the text below `element`, skipping boilerplate subtrees and
/// breaking lines around block elements.
fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if is_boilerplate(child_el) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&child_el.value().name());
            if block {
                out.push('\n');
            }
            collect_text(child_el, out);
            if block {
                out.push('\n');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(&text.replace(|c: char| c == '\n' || c == '\r', " "));
        }
    }
}

fn is_boilerplate(element: ElementRef<'_>) -> bool {
    let el = element.value();
    if SKIP_TAGS.contains(&el.name()) {
        return true;
    }
    if matches!(el.name(), "html" | "body") {
        return false;
    }
    el.classes().any(is_boilerplate_token) || el.id().is_some_and(is_boilerplate_token)
}

fn is_boilerplate_token(token: &str) -> bool {
    BOILERPLATE_TOKENS.contains(&token.to_ascii_lowercase().as_str())
}

/// Whether any ancestor of `element` is boilerplate. The element's own
/// markup is not considered.
fn inside_boilerplate(element: ElementRef<'_>) -> bool {
    element.ancestors().filter_map(ElementRef::wrap).any(is_boilerplate)
}

/// Collapse whitespace within lines and drop empty lines.
fn clean_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().join(" "))
        .filter(|line| !line.is_empty())
        .join("\n")
}
