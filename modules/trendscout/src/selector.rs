//! Resolve build-hashed CSS class names from rendered markup.
//!
//! The dashboard's class names change on every deploy (`CardPc_titleText__RYOWo`
//! becomes `CardPc_titleText__x8Qe2`), but each one embeds a stable semantic
//! fragment. Scanning the markup for class attributes containing that fragment
//! yields the current names.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Matches `class` attribute assignments, double- or single-quoted.
/// The leading whitespace keeps `data-class=` and `subclass=` out.
static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)class\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

/// A concrete selector bound to a semantic fragment for the current page load.
/// Invalid after navigation or reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorDiscovery {
    pub fragment: String,
    pub selector: String,
}

/// Class attribute values containing `fragment`, in document order.
fn matching_values<'a>(markup: &'a str, fragment: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    CLASS_ATTR_RE
        .captures_iter(markup)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str())
        .filter(move |value| !fragment.is_empty() && value.contains(fragment))
}

/// Distinct full class attribute values that contain `fragment`.
pub fn class_values(markup: &str, fragment: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    matching_values(markup, fragment)
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}

/// Distinct class tokens from every attribute value containing `fragment`,
/// in first-seen order. Empty when the fragment is absent.
pub fn resolve(markup: &str, fragment: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for value in class_values(markup, fragment) {
        for token in value.split_whitespace() {
            if seen.insert(token.to_string()) {
                tokens.push(token.to_string());
            }
        }
    }

    tokens
}

/// Compound selector (`.a.b.c`) matching elements that carry every class in
/// `class_value`. `None` for a blank value.
pub fn compound_selector(class_value: &str) -> Option<String> {
    let selector: String = class_value
        .split_whitespace()
        .map(|token| format!(".{}", escape_class(token)))
        .collect();
    (!selector.is_empty()).then_some(selector)
}

/// Selector built from the first class attribute containing `fragment`.
/// `None` means the page has not rendered those elements yet.
pub fn discover(markup: &str, fragment: &str) -> Option<SelectorDiscovery> {
    class_values(markup, fragment)
        .iter()
        .find_map(|value| compound_selector(value))
        .map(|selector| SelectorDiscovery {
            fragment: fragment.to_string(),
            selector,
        })
}

/// All-or-nothing discovery over several fragments, in the given order.
pub fn discover_all(markup: &str, fragments: &[&str]) -> Option<Vec<SelectorDiscovery>> {
    fragments.iter().map(|f| discover(markup, f)).collect()
}

/// Backslash-escape characters that are not valid in a bare CSS identifier.
fn escape_class(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for (i, c) in token.chars().enumerate() {
        if i == 0 && c.is_ascii_digit() {
            // A leading digit needs a hex escape; `\2` alone would start one.
            out.push_str(&format!("\\{:x} ", u32::from(c)));
            continue;
        }
        let plain = c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii();
        if !plain {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_attributes_yield_one_token() {
        let html = r#"<span class="abc_titleText_x1">#a</span><span class="abc_titleText_x1">#b</span>"#;
        assert_eq!(resolve(html, "titleText"), vec!["abc_titleText_x1"]);
    }

    #[test]
    fn absent_fragment_is_empty_not_error() {
        let html = r#"<div class="CardPc_other__aa">x</div>"#;
        assert!(resolve(html, "titleText").is_empty());
        assert!(class_values(html, "titleText").is_empty());
        assert_eq!(discover(html, "titleText"), None);
    }

    #[test]
    fn tokens_are_split_and_order_stable() {
        let html = r#"
            <p class="CardPc_titleText__RYOWo index-mobile_title__1">a</p>
            <p class="CardPc_titleText__RYOWo CardPc_bold__z">b</p>
        "#;
        assert_eq!(
            resolve(html, "CardPc_titleText"),
            vec![
                "CardPc_titleText__RYOWo",
                "index-mobile_title__1",
                "CardPc_bold__z"
            ]
        );
    }

    #[test]
    fn class_values_keep_whole_attributes() {
        let html = r#"
            <p class="a_titleText_1 b">x</p>
            <p class="a_titleText_1 b">y</p>
            <p class="a_titleText_1 c">z</p>
        "#;
        assert_eq!(
            class_values(html, "titleText"),
            vec!["a_titleText_1 b", "a_titleText_1 c"]
        );
    }

    #[test]
    fn single_quoted_attributes_match() {
        let html = "<div class='ItemCard_musicName__2znhM'>Song</div>";
        assert_eq!(resolve(html, "ItemCard_musicName"), vec!["ItemCard_musicName__2znhM"]);
    }

    #[test]
    fn data_class_attributes_are_ignored() {
        let html = r#"<div data-class="x_titleText_1" subclass="y_titleText_2">z</div>"#;
        assert!(resolve(html, "titleText").is_empty());
    }

    #[test]
    fn empty_fragment_matches_nothing() {
        let html = r#"<div class="anything">z</div>"#;
        assert!(resolve(html, "").is_empty());
    }

    #[test]
    fn discover_uses_first_combination() {
        let html = r#"
            <div class="ItemCard_echartWrap__Kq1 wrap">a</div>
            <div class="ItemCard_echartWrap__Kq1 wrap--active">b</div>
        "#;
        let found = discover(html, "ItemCard_echartWrap").unwrap();
        assert_eq!(found.selector, ".ItemCard_echartWrap__Kq1.wrap");
        assert_eq!(found.fragment, "ItemCard_echartWrap");
    }

    #[test]
    fn discover_all_requires_every_fragment() {
        let html = r#"
            <span class="ItemCard_musicName__a">t</span>
            <span class="ItemCard_autherName__b">a</span>
        "#;
        let fragments = ["ItemCard_musicName", "ItemCard_autherName", "ItemCard_echartWrap"];
        assert!(discover_all(html, &fragments).is_none());

        let found = discover_all(html, &fragments[..2]).unwrap();
        assert_eq!(found[0].selector, ".ItemCard_musicName__a");
        assert_eq!(found[1].selector, ".ItemCard_autherName__b");
    }

    #[test]
    fn special_characters_are_escaped() {
        assert_eq!(compound_selector("md:flex w-1/2").unwrap(), ".md\\:flex.w-1\\/2");
        assert_eq!(compound_selector("2col").unwrap(), ".\\32 col");
        assert_eq!(compound_selector("   "), None);
    }
}
