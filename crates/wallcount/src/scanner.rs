//! Locate the inline script that carries the occupancy literal.
//!
//! The page is parsed with `scraper` and walked depth-first in document order.
//! The first text node containing [`DATA_MARKER`] wins.

use scraper::{Html, Node};

/// Substring identifying the script text that declares the occupancy data.
pub const DATA_MARKER: &str = "var data = ";

/// Return the payload of the first text node containing [`DATA_MARKER`].
///
/// Traversal is pre-order with siblings visited left to right, so an earlier
/// script always shadows a later one.
pub fn find_marker_text(document: &Html) -> Option<String> {
    document
        .tree
        .root()
        .descendants()
        .find_map(|node| match node.value() {
            Node::Text(text) if text.contains(DATA_MARKER) => Some(text.to_string()),
            _ => None,
        })
}

/// Parse raw HTML and scan it for the marker text.
pub fn scan_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    find_marker_text(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_inline_script() {
        let html = r#"<!DOCTYPE html>
<html>
<head><title>Test Page</title></head>
<body>
    <div>Some content here</div>
    <script>
        var data = { 'SBG' : { 'count' : 8 } };
    </script>
</body>
</html>"#;

        let text = scan_html(html).expect("marker should be found");
        assert!(text.contains("var data = {"));
        assert!(text.contains("'SBG'"));
    }

    #[test]
    fn test_first_match_wins() {
        let html = r#"<html><body>
<div><script>var data = {'FIRST':{}};</script></div>
<script>var data = {'SECOND':{}};</script>
</body></html>"#;

        let text = scan_html(html).unwrap();
        assert!(text.contains("FIRST"));
        assert!(!text.contains("SECOND"));
    }

    #[test]
    fn test_marker_in_plain_text_node() {
        let html = "<html><body><p>var data = {'P':{}};</p></body></html>";
        assert!(scan_html(html).unwrap().contains("'P'"));
    }

    #[test]
    fn test_no_marker() {
        let html = "<html><body><script>var other = 1;</script></body></html>";
        assert!(scan_html(html).is_none());
    }

    #[test]
    fn test_marker_requires_exact_spacing() {
        let html = "<html><body><script>var data={'A':{}};</script></body></html>";
        assert!(scan_html(html).is_none());
    }

    #[test]
    fn test_empty_document() {
        assert!(scan_html("").is_none());
    }
}
