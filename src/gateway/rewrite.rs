//! Text-level HTML patching for proxied documents.
//!
//! Two rewrites, each applied exactly once per response: a `<base href>`
//! marker right after the opening `<head>` tag so page-relative URLs resolve
//! under the namespace prefix, and the combined configuration-plus-script
//! block immediately before `</head>`, falling back to before `</body>`,
//! then appending at the end. Patching is deliberately textual, not a full
//! HTML parse; the insertion rules here are the whole contract.

use crate::config::ReconnectConfig;
use crate::gateway::assets;

/// Marker that makes page-relative URLs resolve under the prefix.
pub fn base_href_marker(prefix: &str) -> String {
    format!("<base href=\"{}/\">", prefix)
}

/// The combined `<script>` element: configuration assignment first, then the
/// reconnect script, inlined so the page needs no extra round trip.
pub fn injection_block(config: &ReconnectConfig) -> String {
    format!(
        "<script>\n{}\n{}</script>",
        assets::config_assignment(config),
        assets::RECONNECT_SCRIPT
    )
}

/// Apply both rewrites to a proxied HTML document.
pub fn rewrite_document(html: &str, prefix: &str, config: &ReconnectConfig) -> String {
    let with_base = insert_base_href(html, prefix);
    insert_script_block(&with_base, &injection_block(config))
}

/// Insert the base-href marker immediately after the opening `<head>` tag.
/// Documents without a head tag are left alone.
fn insert_base_href(html: &str, prefix: &str) -> String {
    match head_open_end(html) {
        Some(idx) => {
            let marker = base_href_marker(prefix);
            let mut out = String::with_capacity(html.len() + marker.len());
            out.push_str(&html[..idx]);
            out.push_str(&marker);
            out.push_str(&html[idx..]);
            out
        }
        None => html.to_string(),
    }
}

/// Byte offset just past the `>` of the opening `<head>` tag, if any.
fn head_open_end(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find("<head") {
        let start = from + pos;
        let after = start + "<head".len();
        match lower.as_bytes().get(after) {
            Some(b'>') => return Some(after + 1),
            // Attribute-bearing head tag: skip to its closing '>'
            Some(c) if c.is_ascii_whitespace() => {
                return lower[after..].find('>').map(|gt| after + gt + 1);
            }
            // `<header>` and friends are not the head tag
            _ => from = after,
        }
    }
    None
}

/// Insert the script block before `</head>`, else before `</body>`, else
/// append at the end.
fn insert_script_block(html: &str, block: &str) -> String {
    let lower = html.to_ascii_lowercase();
    for close in ["</head>", "</body>"] {
        if let Some(idx) = lower.find(close) {
            let mut out = String::with_capacity(html.len() + block.len());
            out.push_str(&html[..idx]);
            out.push_str(block);
            out.push_str(&html[idx..]);
            return out;
        }
    }
    let mut out = String::with_capacity(html.len() + block.len());
    out.push_str(html);
    out.push_str(block);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/better-gateway";

    fn rewrite(html: &str) -> String {
        rewrite_document(html, PREFIX, &ReconnectConfig::default())
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_full_document_gets_both_insertions_exactly_once() {
        let html = "<html><head><title>ui</title></head><body>hi</body></html>";
        let out = rewrite(html);

        assert_eq!(count(&out, "<base href=\"/better-gateway/\">"), 1);
        assert_eq!(count(&out, "window.__betterGatewayConfig = {"), 1);

        // Base marker sits right after the opening head tag, the script block
        // right before the closing one
        assert!(out.starts_with("<html><head><base href=\"/better-gateway/\"><title>"));
        let script_at = out.find("<script>").unwrap();
        let head_close_at = out.find("</head>").unwrap();
        assert!(script_at < head_close_at);
    }

    #[test]
    fn test_head_tag_with_attributes() {
        let html = r#"<html><head lang="en" data-x="1"><title>t</title></head></html>"#;
        let out = rewrite(html);
        assert!(out.contains(r#"<head lang="en" data-x="1"><base href="/better-gateway/">"#));
    }

    #[test]
    fn test_tag_matching_is_case_insensitive() {
        let html = "<HTML><HEAD></HEAD><BODY></BODY></HTML>";
        let out = rewrite(html);
        assert_eq!(count(&out, "<base href="), 1);
        // Inserted before the uppercase closing head tag
        let script_at = out.find("<script>").unwrap();
        assert!(script_at < out.find("</HEAD>").unwrap());
    }

    #[test]
    fn test_header_element_is_not_the_head_tag() {
        let html = "<html><body><header>nav</header>text</body></html>";
        let out = rewrite(html);
        assert_eq!(count(&out, "<base href="), 0);
        // Script block falls back to before the closing body tag
        assert!(out.contains("</script></body>"));
        assert_eq!(count(&out, "window.__betterGatewayConfig = {"), 1);
    }

    #[test]
    fn test_no_head_falls_back_to_body_close() {
        let html = "<html><body>bare</body></html>";
        let out = rewrite(html);
        assert!(out.contains("</script></body></html>"));
        assert_eq!(count(&out, "<base href="), 0);
    }

    #[test]
    fn test_no_head_no_body_appends_at_end() {
        let html = "<p>fragment only</p>";
        let out = rewrite(html);
        assert!(out.starts_with("<p>fragment only</p><script>"));
        assert!(out.ends_with("</script>"));
        assert_eq!(count(&out, "window.__betterGatewayConfig = {"), 1);
    }

    #[test]
    fn test_script_block_carries_configured_values() {
        let config = ReconnectConfig {
            reconnect_interval_ms: 1234,
            max_reconnect_attempts: 7,
        };
        let out = rewrite_document("<html><head></head></html>", PREFIX, &config);
        assert!(out.contains(r#"{"reconnectIntervalMs":1234,"maxReconnectAttempts":7}"#));
    }
}
