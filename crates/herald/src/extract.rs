//! Readable text out of an html page or fragment

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static REDUNDANT_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static CONTENT_ROOT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article, main, [role=main]").expect("valid selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static BLOCKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("p, h1, h2, h3, h4, h5, h6, li, pre, blockquote").expect("valid selector")
});

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Collapse every run of three or more newlines into a single one
pub fn clean_text(text: &str) -> String {
    REDUNDANT_NEWLINES.replace_all(text, "\n").into_owned()
}

/// Extract the main text of `html`
///
/// Looks for the content area (`article`, `main`, `[role=main]`, else `body`)
/// and returns its block elements as paragraphs separated by a blank line. If
/// there are no block elements, all visible text of the area is used. Never
/// fails; garbage in gives (possibly empty) text out.
pub fn readable_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document
        .select(&CONTENT_ROOT)
        .next()
        .or_else(|| document.select(&BODY).next())
        .unwrap_or_else(|| document.root_element());

    let mut paragraphs = vec![];
    for block in root.select(&BLOCKS) {
        if is_nested_block(block, root) {
            continue;
        }
        let text = visible_text(block);
        let text = if block.value().name() == "pre" {
            text.trim().to_owned()
        } else {
            collapse_whitespace(&text)
        };
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }

    let text = if paragraphs.is_empty() {
        collapse_whitespace(&visible_text(root))
    } else {
        paragraphs.join("\n\n")
    };

    clean_text(&text)
}

/// Is `block` inside another block element below `root`
fn is_nested_block(block: ElementRef<'_>, root: ElementRef<'_>) -> bool {
    for ancestor in block.ancestors() {
        if ancestor.id() == root.id() {
            return false;
        }
        if ElementRef::wrap(ancestor).is_some_and(|el| BLOCKS.matches(&el)) {
            return true;
        }
    }
    false
}

fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
