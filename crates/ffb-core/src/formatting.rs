//! Telegram HTML helpers.
//!
//! Telegram HTML supports only a small subset: `<b>`, `<i>`, `<code>`, `<pre>`, `<a href="...">`.

/// Escape text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn link(href: &str, label: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_html(href), escape_html(label))
}

pub fn pre(text: &str) -> String {
    format!("<pre>{}</pre>", escape_html(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn link_escapes_href_and_label() {
        assert_eq!(
            link("https://ff.example/a?b=1&c=2", "<ok>"),
            "<a href=\"https://ff.example/a?b=1&amp;c=2\">&lt;ok&gt;</a>"
        );
    }

    #[test]
    fn pre_wraps_escaped_text() {
        assert_eq!(pre("{\"a\": 1}"), "<pre>{&quot;a&quot;: 1}</pre>");
    }
}
