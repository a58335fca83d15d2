//! Error page served to navigations that fail.
//!
//! The page subscribes to the event stream so that it reloads once the
//! offending file is fixed.

use super::EVENTS_PATH;

/// Render the error page. `message` is escaped.
pub fn render(status: u16, reason: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{status} {reason}</title>
<style>
  body {{ margin: 0; background: #1e1e1e; color: #e8e8e8; font: 14px/1.5 ui-monospace, monospace; }}
  main {{ padding: 32px; }}
  h1 {{ color: #ff6b6b; font-size: 18px; margin: 0 0 16px; }}
  pre {{ white-space: pre-wrap; background: #2a2a2a; padding: 16px; border-left: 3px solid #ff6b6b; }}
</style>
</head>
<body>
<main>
<h1>{status} {reason}</h1>
<pre>{message}</pre>
</main>
<script type="module">
  new EventSource("{EVENTS_PATH}").addEventListener("message", (e) => {{
    if (JSON.parse(e.data).type === "reload") location.reload();
  }});
</script>
</body>
</html>
"#,
        reason = html_escape(reason),
        message = html_escape(message),
    )
}

pub fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(
            html_escape(r#"<x attr="v" & 'y'>"#),
            "&lt;x attr=&quot;v&quot; &amp; &#x27;y&#x27;&gt;"
        );
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn test_render_escapes_message() {
        let html = render(500, "parse error", "Unexpected token <script>");
        assert!(html.contains("<title>500 parse error</title>"));
        assert!(html.contains("Unexpected token &lt;script&gt;"));
        assert!(!html.contains("token <script>"));
        assert!(html.contains(EVENTS_PATH));
    }
}
