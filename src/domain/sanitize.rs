//! Sanitization of inbound message fields.
//!
//! Runs in the POST handler before the broker constructs the immutable
//! [`Message`](super::Message): HTML-unsafe characters are escaped and a
//! blank username is replaced with "Anonymous".

/// Username used when a client submits a blank or whitespace-only name.
pub const ANONYMOUS: &str = "Anonymous";

/// Sanitize a raw `{username, message}` pair from the wire.
pub fn sanitize_incoming(username: &str, message: &str) -> (String, String) {
    let username = if username.trim().is_empty() {
        ANONYMOUS.to_string()
    } else {
        escape_html(username)
    };
    (username, escape_html(message))
}

/// Escape the characters that would let submitted text inject markup when
/// rendered into a page.
fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        let (username, message) = sanitize_incoming("bob", "hello world");

        assert_eq!(username, "bob");
        assert_eq!(message, "hello world");
    }

    #[test]
    fn test_markup_is_escaped() {
        let (username, message) =
            sanitize_incoming("<b>bob</b>", r#"<script>alert("hi")</script>"#);

        assert_eq!(username, "&lt;b&gt;bob&lt;/b&gt;");
        assert_eq!(
            message,
            "&lt;script&gt;alert(&quot;hi&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_ampersand_is_escaped_first() {
        let (_, message) = sanitize_incoming("bob", "&lt;");

        assert_eq!(message, "&amp;lt;");
    }

    #[test]
    fn test_empty_username_becomes_anonymous() {
        let (username, _) = sanitize_incoming("", "hi");

        assert_eq!(username, ANONYMOUS);
    }

    #[test]
    fn test_whitespace_username_becomes_anonymous() {
        let (username, _) = sanitize_incoming(" \t\n ", "hi");

        assert_eq!(username, ANONYMOUS);
    }
}
