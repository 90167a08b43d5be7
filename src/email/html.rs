use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));

/// Renders a plain-text announcement as the HTML part of an email.
///
/// Markdown bold (`**text**`) becomes `<strong>` and line breaks become `<br>`.
/// Everything else is escaped and passed through as is.
pub fn render_html(body: &str) -> String {
    let escaped = body
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    let bolded = BOLD.replace_all(&escaped, "<strong>$1</strong>");

    let lines = bolded.replace("\r\n", "\n").replace('\n', "<br>");

    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif;line-height:1.5">
<div>{lines}</div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_become_line_breaks() {
        let html = render_html("first\nsecond\r\nthird");

        assert!(html.contains("first<br>second<br>third"));
    }

    #[test]
    fn bold_markdown_becomes_strong() {
        let html = render_html("**Meeting** moved to **Room 4**");

        assert!(html.contains("<strong>Meeting</strong> moved to <strong>Room 4</strong>"));
    }

    #[test]
    fn unmatched_asterisks_are_left_alone() {
        let html = render_html("5 ** 2");

        assert!(html.contains("5 ** 2"));
    }

    #[test]
    fn markup_in_the_body_is_escaped() {
        let html = render_html("<script>alert(1)</script> & co");

        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; co"));
        assert!(!html.contains("<script>"));
    }
}
