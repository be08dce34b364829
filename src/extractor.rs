//! Boilerplate removal: raw page → plain text blocks.
//!
//! Parsing goes through `scraper`'s HTML5 tree builder, which recovers from
//! any markup, so extraction is best effort and never fails hard.

use lazy_static::lazy_static;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

use crate::models::{CleanedText, RawDocument};

/// A page counts as extracted once one block reaches this many characters.
pub const MIN_BLOCK_CHARS: usize = 20;

/// Subtrees never read.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "iframe", "svg", "form",
    "template", "head", "button", "select",
];

/// Elements that start and end a text block.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "h1", "h2",
    "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table", "tbody",
    "td", "th", "thead", "tr", "ul",
];

/// id/class tokens marking chrome rather than content.
const BOILERPLATE_HINTS: &[&str] = &[
    "nav", "navbar", "menu", "footer", "sidebar", "cookie", "cookies", "consent", "advert",
    "advertisement", "ads", "ad", "popup", "modal", "breadcrumb", "breadcrumbs",
];

lazy_static! {
    static ref MAIN_SELECTOR: Selector =
        Selector::parse("main, article, [role='main']").unwrap();
    static ref BODY_SELECTOR: Selector = Selector::parse("body").unwrap();
    static ref TITLE_SELECTOR: Selector = Selector::parse("title").unwrap();
    static ref DESCRIPTION_SELECTOR: Selector =
        Selector::parse("meta[name='description'], meta[property='og:description']").unwrap();
}

/// Converts a fetched page into cleaned text.
///
/// Non-success documents short-circuit to an empty, failed result.
pub fn extract(doc: &RawDocument) -> CleanedText {
    if !doc.is_success() {
        tracing::debug!("Skipping extraction for {}: fetch did not succeed", doc.vendor);
        return CleanedText::failed();
    }

    let cleaned = if is_plain_text(doc) {
        extract_plain(&doc.body)
    } else {
        extract_html(&doc.body)
    };

    if cleaned.extraction_succeeded {
        tracing::info!(
            "✓ Extracted {} chars of text for {}",
            cleaned.text.len(),
            doc.vendor
        );
    } else {
        tracing::warn!("No usable text recovered for {}", doc.vendor);
    }

    cleaned
}

fn is_plain_text(doc: &RawDocument) -> bool {
    doc.content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().starts_with("text/plain"))
        .unwrap_or(false)
}

fn extract_plain(body: &str) -> CleanedText {
    let blocks: Vec<String> = body.lines().filter_map(collapse_whitespace).collect();
    finish(blocks, None, None)
}

fn extract_html(body: &str) -> CleanedText {
    let document = Html::parse_document(body);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .and_then(|el| collapse_whitespace(&el.text().collect::<String>()));

    let description = document
        .select(&DESCRIPTION_SELECTOR)
        .filter_map(|el| el.value().attr("content"))
        .find_map(collapse_whitespace);

    // Prefer explicit content regions, but only when they hold real text.
    // Nested regions are already covered by their outermost one.
    let mut blocks = Vec::new();
    for region in document
        .select(&MAIN_SELECTOR)
        .filter(|region| !is_inside_region(*region))
    {
        blocks.extend(element_blocks(region));
    }
    if !has_substantial_block(&blocks) {
        blocks = match document.select(&BODY_SELECTOR).next() {
            Some(body) => element_blocks(body),
            None => element_blocks(document.root_element()),
        };
    }

    finish(blocks, title, description)
}

fn is_inside_region(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| MAIN_SELECTOR.matches(&ancestor))
}

fn finish(blocks: Vec<String>, title: Option<String>, description: Option<String>) -> CleanedText {
    if !has_substantial_block(&blocks) {
        return CleanedText {
            title,
            description,
            ..CleanedText::failed()
        };
    }

    CleanedText {
        text: blocks.join("\n"),
        title,
        description,
        extraction_succeeded: true,
    }
}

fn has_substantial_block(blocks: &[String]) -> bool {
    blocks
        .iter()
        .any(|block| block.chars().count() >= MIN_BLOCK_CHARS)
}

fn element_blocks(root: ElementRef<'_>) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    collect_blocks(root, &mut current, &mut blocks);
    flush(&mut current, &mut blocks);
    blocks
}

fn collect_blocks(element: ElementRef<'_>, current: &mut String, blocks: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(el) => {
                if is_boilerplate(el) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let is_block = BLOCK_ELEMENTS.contains(&el.name());
                if is_block {
                    flush(current, blocks);
                }
                collect_blocks(child_ref, current, blocks);
                if is_block {
                    flush(current, blocks);
                }
            }
            _ => {}
        }
    }
}

fn is_boilerplate(el: &Element) -> bool {
    if SKIPPED_ELEMENTS.contains(&el.name()) {
        return true;
    }
    if matches!(
        el.attr("role"),
        Some("navigation") | Some("banner") | Some("contentinfo")
    ) {
        return true;
    }
    if el.attr("aria-hidden") == Some("true") {
        return true;
    }
    el.id().map(is_boilerplate_token).unwrap_or(false) || el.classes().any(is_boilerplate_token)
}

/// `cookie-banner` and `site_footer` count; `headline` does not.
fn is_boilerplate_token(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    token
        .split(|c: char| c == '-' || c == '_')
        .any(|part| BOILERPLATE_HINTS.contains(&part))
}

fn flush(current: &mut String, blocks: &mut Vec<String>) {
    if let Some(block) = collapse_whitespace(current) {
        blocks.push(block);
    }
    current.clear();
}

fn collapse_whitespace(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VendorQuery;

    fn html_doc(body: &str) -> RawDocument {
        RawDocument::success(
            "Acme",
            "https://acme.test/pricing",
            200,
            Some("text/html; charset=utf-8".to_string()),
            body.to_string(),
            1,
        )
    }

    #[test]
    fn test_failed_fetch_short_circuits() {
        let doc = RawDocument::not_found(&VendorQuery::new("UnknownCo").unwrap());
        let cleaned = extract(&doc);

        assert!(!cleaned.extraction_succeeded);
        assert!(cleaned.text.is_empty());
        assert!(cleaned.usable_text().is_none());
    }

    #[test]
    fn test_strips_boilerplate() {
        let doc = html_doc(
            r#"<html><head><title>Acme Pricing</title>
            <meta name="description" content="Plans for every team">
            <script>var price = "$1/month";</script><style>.x{}</style></head>
            <body>
              <nav>Home Pricing Login with a long navigation label</nav>
              <div class="cookie-banner">We use cookies to improve your experience here</div>
              <div class="content"><p>Starting at   $25/user/month   for small teams.</p></div>
              <footer>Copyright Acme Corporation all rights reserved</footer>
            </body></html>"#,
        );
        let cleaned = extract(&doc);

        assert!(cleaned.extraction_succeeded);
        assert_eq!(cleaned.text, "Starting at $25/user/month for small teams.");
        assert_eq!(cleaned.title.as_deref(), Some("Acme Pricing"));
        assert_eq!(cleaned.description.as_deref(), Some("Plans for every team"));
    }

    #[test]
    fn test_prefers_main_region() {
        let doc = html_doc(
            r#"<body><div>Sidebar text that is long enough to count as a block</div>
            <main><h2>Professional</h2><p>Everything your sales team needs to grow.</p></main></body>"#,
        );
        let cleaned = extract(&doc);

        assert_eq!(
            cleaned.text,
            "Professional\nEverything your sales team needs to grow."
        );
    }

    #[test]
    fn test_nested_regions_are_read_once() {
        let doc = html_doc(
            r#"<body><main><article><p>Starting at $25/user/month for growing teams</p></article>
            <section role="main"><p>Enterprise plans include a dedicated manager</p></section></main></body>"#,
        );
        let cleaned = extract(&doc);

        assert_eq!(
            cleaned.text,
            "Starting at $25/user/month for growing teams\nEnterprise plans include a dedicated manager"
        );
    }

    #[test]
    fn test_sibling_regions_are_all_read() {
        let doc = html_doc(
            r#"<body><article><p>Starter plan for small teams getting going</p></article>
            <article><p>Business plan with advanced forecasting</p></article></body>"#,
        );
        let cleaned = extract(&doc);

        assert_eq!(
            cleaned.text,
            "Starter plan for small teams getting going\nBusiness plan with advanced forecasting"
        );
    }

    #[test]
    fn test_inline_elements_stay_in_one_block() {
        let doc = html_doc(
            "<body><p>Plans from <strong>$25</strong>/user/month billed annually</p></body>",
        );
        let cleaned = extract(&doc);

        assert_eq!(cleaned.text, "Plans from $25/user/month billed annually");
    }

    #[test]
    fn test_trivial_text_is_not_success() {
        let doc = html_doc("<body><p>Hi</p><p>Menu</p></body>");
        let cleaned = extract(&doc);

        assert!(!cleaned.extraction_succeeded);
        assert!(cleaned.text.is_empty());
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let doc = html_doc(
            "<div><p>Unclosed paragraph about pipeline management<div><span>more text here</td></table>",
        );
        let cleaned = extract(&doc);

        assert!(cleaned.extraction_succeeded);
        assert!(cleaned.text.contains("Unclosed paragraph about pipeline management"));
    }

    #[test]
    fn test_plain_text_payload() {
        let doc = RawDocument::success(
            "Acme",
            "https://acme.test/pricing.txt",
            200,
            Some("text/plain".to_string()),
            "Acme CRM pricing overview\n\n   Pro plan: $49 per user per month  \n".to_string(),
            1,
        );
        let cleaned = extract(&doc);

        assert_eq!(
            cleaned.text,
            "Acme CRM pricing overview\nPro plan: $49 per user per month"
        );
    }

    #[test]
    fn test_boilerplate_tokens() {
        assert!(is_boilerplate_token("site-footer"));
        assert!(is_boilerplate_token("cookie_consent"));
        assert!(!is_boilerplate_token("headline"));
        assert!(!is_boilerplate_token("card-header"));
        assert!(!is_boilerplate_token("pricing-card"));
    }
}
