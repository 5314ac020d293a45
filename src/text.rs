// src/text.rs
//
// Shared text cleanup for upstream article fields: HTML entity decode, tag
// strip, smart-quote normalization, whitespace collapse.

use once_cell::sync::OnceCell;
use regex::Regex;

pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_entities_and_strips_tags() {
        let s = "  <b>Senate&nbsp;vote</b> passes&amp;counts  ";
        assert_eq!(normalize_text(s), "Senate vote passes&counts");
    }

    #[test]
    fn collapses_whitespace_and_quotes() {
        let s = "“Quoted”\n\theadline   here";
        assert_eq!(normalize_text(s), "\"Quoted\" headline here");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(normalize_text("   "), "");
    }
}
