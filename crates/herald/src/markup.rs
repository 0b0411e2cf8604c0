//! Telegram MarkdownV2 message formatting

use herald_core::Article;

/// Characters that have to be backslash-escaped in MarkdownV2 text
const SPECIAL_CHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Escape `text` so it renders literally
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        if SPECIAL_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Bold title, then the summary if there is one, then the link
pub fn format_article_message(article: &Article, summary: &str) -> String {
    let mut msg = format!("*{}*", escape_markdown_v2(&article.title));
    if !summary.is_empty() {
        msg.push_str("\n\n");
        msg.push_str(&escape_markdown_v2(summary));
    }
    msg.push_str("\n\n");
    msg.push_str(&escape_markdown_v2(&article.link));
    msg
}
