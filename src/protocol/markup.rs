//! Trusted inline markup
//!
//! Bot replies carry a small markup vocabulary: `**bold**` spans, markdown
//! links and bare parenthesized URLs. Parsing happens here, once, in the
//! dispatcher; renderers only ever see [`Span`] values and never sniff raw
//! content.

use crate::transcript::Span;
use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^\s)]+)\)").unwrap());
static PLAIN_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((https?://[^\s)]+)\)").unwrap());

/// Parse a bot reply into inline spans.
pub fn parse_markup(text: &str) -> Vec<Span> {
    let mut spans = vec![Span::Text(text.to_string())];
    spans = split_pass(spans, &BOLD, |caps| Span::Bold(caps[1].to_string()));
    spans = split_pass(spans, &MD_LINK, |caps| Span::Link {
        // Pipes break downstream rendering of link labels
        label: caps[1].replace('|', " - "),
        url: caps[2].to_string(),
    });
    spans = split_pass(spans, &PLAIN_URL, |caps| Span::Link {
        label: caps[1].to_string(),
        url: caps[1].to_string(),
    });
    spans.retain(|s| !matches!(s, Span::Text(t) if t.is_empty()));
    spans
}

/// Re-split every still-plain span on `re`, mapping matches through `make`.
fn split_pass(
    spans: Vec<Span>,
    re: &Regex,
    make: impl Fn(&regex::Captures<'_>) -> Span,
) -> Vec<Span> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let text = match span {
            Span::Text(t) => t,
            other => {
                out.push(other);
                continue;
            }
        };
        let mut last = 0;
        for caps in re.captures_iter(&text) {
            let whole = caps.get(0).unwrap();
            if whole.start() > last {
                out.push(Span::Text(text[last..whole.start()].to_string()));
            }
            out.push(make(&caps));
            last = whole.end();
        }
        if last < text.len() {
            out.push(Span::Text(text[last..].to_string()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        let spans = parse_markup("مرحبا بك");
        assert_eq!(spans, vec![Span::Text("مرحبا بك".to_string())]);
    }

    #[test]
    fn test_bold_spans() {
        let spans = parse_markup("جرّب **الكشري** اليوم");
        assert_eq!(
            spans,
            vec![
                Span::Text("جرّب ".to_string()),
                Span::Bold("الكشري".to_string()),
                Span::Text(" اليوم".to_string()),
            ]
        );
    }

    #[test]
    fn test_markdown_link_with_pipe_label() {
        let spans = parse_markup("[Koshary|Street Food](https://example.com/k)");
        assert_eq!(
            spans,
            vec![Span::Link {
                label: "Koshary - Street Food".to_string(),
                url: "https://example.com/k".to_string(),
            }]
        );
    }

    #[test]
    fn test_plain_parenthesized_url() {
        let spans = parse_markup("المصدر (https://example.com/src) هنا");
        assert_eq!(
            spans,
            vec![
                Span::Text("المصدر ".to_string()),
                Span::Link {
                    label: "https://example.com/src".to_string(),
                    url: "https://example.com/src".to_string(),
                },
                Span::Text(" هنا".to_string()),
            ]
        );
    }

    #[test]
    fn test_markdown_link_not_reparsed_as_plain_url() {
        let spans = parse_markup("**وصفة**: [فيديو](https://youtu.be/x)");
        assert_eq!(
            spans,
            vec![
                Span::Bold("وصفة".to_string()),
                Span::Text(": ".to_string()),
                Span::Link {
                    label: "فيديو".to_string(),
                    url: "https://youtu.be/x".to_string(),
                },
            ]
        );
    }
}
