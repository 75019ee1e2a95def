//! Search query sniffing and node matchers
//!
//! The query string is never rejected. Markup-looking input (`<div>`, `<di`,
//! `iv>`) searches tag names, a small subset of selector syntax (`#id`,
//! `.class`, `[attr]`) is recognized, and anything else is free text that
//! is tried against ids, classes, tag names, attribute values and text.

use dom::DomNode;

/// A single test run against every node of a search root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Element whose tag name equals the query, ASCII case-insensitive
    ExactTagName(String),
    TagNamePrefix(String),
    TagNameContains(String),
    ExactId(String),
    /// Element carrying the class token
    ExactClassName(String),
    /// Element carrying the attribute, whatever its value
    AttributeName(String),
    AttributeValueContains(String),
    /// Text or comment node containing the query
    PlainText(String),
}

impl Matcher {
    pub fn matches(&self, node: &DomNode) -> bool {
        match self {
            Matcher::PlainText(needle) => {
                node.is_character_data() && contains_ignore_case(&node.node_value, needle)
            }
            _ if !node.is_element() => false,
            Matcher::ExactTagName(name) => node.node_name.eq_ignore_ascii_case(name),
            Matcher::TagNamePrefix(prefix) => node
                .node_name
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            Matcher::TagNameContains(needle) => contains_ignore_case(&node.node_name, needle),
            Matcher::ExactId(id) => node.attr("id") == Some(id.as_str()),
            Matcher::ExactClassName(class) => node.class_names().any(|c| c == class),
            Matcher::AttributeName(name) => {
                node.attributes.keys().any(|k| k.eq_ignore_ascii_case(name))
            }
            Matcher::AttributeValueContains(needle) => node
                .attributes
                .values()
                .any(|value| contains_ignore_case(value, needle)),
        }
    }
}

/// A parsed, non-empty query and the matchers it expands to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
    matchers: Vec<Matcher>,
}

impl SearchQuery {
    /// Parse a raw query. Returns `None` when it is blank.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        let matchers = markup_matchers(text)
            .or_else(|| match_everything(text))
            .or_else(|| selector_matchers(text))
            .unwrap_or_else(|| free_text_matchers(text));

        Some(Self {
            text: text.to_string(),
            matchers,
        })
    }

    /// The trimmed query
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Matchers in the order their jobs run
    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }
}

fn markup_matchers(text: &str) -> Option<Vec<Matcher>> {
    let starts = text.starts_with('<');
    let ends = text.ends_with('>');
    if !starts && !ends {
        return None;
    }

    let begin = usize::from(starts);
    let end = if ends { text.len() - 1 } else { text.len() };
    let Some(tag) = text.get(begin..end).filter(|tag| is_valid_name(tag)) else {
        syntax_ignored("markup", text);
        return None;
    };

    let tag_matcher = match (starts, ends) {
        (true, true) => Matcher::ExactTagName(tag.to_string()),
        (true, false) => Matcher::TagNamePrefix(tag.to_string()),
        _ => Matcher::TagNameContains(tag.to_lowercase()),
    };
    Some(vec![tag_matcher, Matcher::PlainText(text.to_lowercase())])
}

/// `*` and `//*` would match every element; only look at values and text
fn match_everything(text: &str) -> Option<Vec<Matcher>> {
    if text != "*" && text != "//*" {
        return None;
    }
    let needle = text.to_lowercase();
    Some(vec![
        Matcher::AttributeValueContains(needle.clone()),
        Matcher::PlainText(needle),
    ])
}

fn selector_matchers(text: &str) -> Option<Vec<Matcher>> {
    let matcher = if let Some(id) = text.strip_prefix('#') {
        is_valid_name(id).then(|| Matcher::ExactId(id.to_string()))
    } else if let Some(class) = text.strip_prefix('.') {
        is_valid_name(class).then(|| Matcher::ExactClassName(class.to_string()))
    } else if let Some(inner) = text.strip_prefix('[') {
        inner
            .strip_suffix(']')
            .filter(|name| is_valid_name(name))
            .map(|name| Matcher::AttributeName(name.to_string()))
    } else {
        return None;
    };

    if matcher.is_none() {
        syntax_ignored("selector", text);
    }
    matcher.map(|m| vec![m])
}

fn syntax_ignored(kind: &str, text: &str) {
    tracing::debug!("unsupported {} syntax in {:?}, searching as text", kind, text);
}

fn free_text_matchers(text: &str) -> Vec<Matcher> {
    let needle = text.to_lowercase();
    let mut matchers = vec![
        Matcher::ExactId(text.to_string()),
        Matcher::ExactClassName(text.to_string()),
    ];
    if is_valid_name(text) {
        matchers.push(Matcher::ExactTagName(text.to_string()));
    }
    matchers.push(Matcher::AttributeValueContains(needle.clone()));
    matchers.push(Matcher::PlainText(needle));
    matchers
}

/// Loose XML name check: tag and attribute names, ids and class tokens
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// `needle` must already be lowercase
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::NodeType;
    use std::sync::{Arc, Mutex};

    fn element(tag: &str, attributes: &[(&str, &str)]) -> DomNode {
        let mut node = DomNode::new(1, NodeType::Element, tag.to_uppercase());
        for (k, v) in attributes {
            node.attributes.insert(k.to_string(), v.to_string());
        }
        node
    }

    fn text(value: &str) -> DomNode {
        let mut node = DomNode::new(2, NodeType::Text, "#text");
        node.node_value = value.to_string();
        node
    }

    #[test]
    fn test_blank_query() {
        assert_eq!(SearchQuery::parse("   "), None);
        assert_eq!(SearchQuery::parse(""), None);
    }

    #[test]
    fn test_markup_queries() {
        let exact = SearchQuery::parse(" <span> ").unwrap();
        assert_eq!(exact.text(), "<span>");
        assert_eq!(
            exact.matchers(),
            &[
                Matcher::ExactTagName("span".into()),
                Matcher::PlainText("<span>".into())
            ]
        );

        let prefix = SearchQuery::parse("<sp").unwrap();
        assert_eq!(prefix.matchers()[0], Matcher::TagNamePrefix("sp".into()));

        let suffix = SearchQuery::parse("AN>").unwrap();
        assert_eq!(suffix.matchers()[0], Matcher::TagNameContains("an".into()));
    }

    #[test]
    fn test_invalid_markup_is_free_text() {
        let query = SearchQuery::parse("<a href>").unwrap();
        assert_eq!(query.matchers()[0], Matcher::ExactId("<a href>".into()));
        assert_eq!(query.matchers().len(), 4);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_ignored_syntax_is_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            SearchQuery::parse("<a href>");
            SearchQuery::parse("#not an id");
            SearchQuery::parse("<span>");
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(r#"unsupported markup syntax in "<a href>""#), "{}", output);
        assert!(output.contains(r##"unsupported selector syntax in "#not an id""##), "{}", output);
        assert!(!output.contains("<span>"), "{}", output);
    }

    #[test]
    fn test_match_everything_queries() {
        for raw in ["*", "//*"] {
            let query = SearchQuery::parse(raw).unwrap();
            assert!(matches!(
                query.matchers(),
                [Matcher::AttributeValueContains(_), Matcher::PlainText(_)]
            ));
        }
    }

    #[test]
    fn test_selector_queries() {
        assert_eq!(
            SearchQuery::parse("#main").unwrap().matchers(),
            &[Matcher::ExactId("main".into())]
        );
        assert_eq!(
            SearchQuery::parse(".note").unwrap().matchers(),
            &[Matcher::ExactClassName("note".into())]
        );
        assert_eq!(
            SearchQuery::parse("[data-x]").unwrap().matchers(),
            &[Matcher::AttributeName("data-x".into())]
        );
    }

    #[test]
    fn test_malformed_selector_falls_back() {
        let query = SearchQuery::parse("[oops").unwrap();
        assert_eq!(
            query.matchers(),
            &[
                Matcher::ExactId("[oops".into()),
                Matcher::ExactClassName("[oops".into()),
                Matcher::AttributeValueContains("[oops".into()),
                Matcher::PlainText("[oops".into()),
            ]
        );
    }

    #[test]
    fn test_free_text_includes_tag_name_when_valid() {
        let query = SearchQuery::parse("Span").unwrap();
        assert!(query
            .matchers()
            .contains(&Matcher::ExactTagName("Span".into())));

        let sentence = SearchQuery::parse("hello world").unwrap();
        assert!(!sentence
            .matchers()
            .iter()
            .any(|m| matches!(m, Matcher::ExactTagName(_))));
    }

    #[test]
    fn test_matchers() {
        let div = element("div", &[("id", "a"), ("class", "x  big"), ("title", "Hello There")]);

        assert!(Matcher::ExactTagName("div".into()).matches(&div));
        assert!(Matcher::TagNamePrefix("d".into()).matches(&div));
        assert!(!Matcher::TagNamePrefix("divider".into()).matches(&div));
        assert!(Matcher::TagNameContains("iv".into()).matches(&div));
        assert!(Matcher::ExactId("a".into()).matches(&div));
        assert!(!Matcher::ExactId("A".into()).matches(&div));
        assert!(Matcher::ExactClassName("big".into()).matches(&div));
        assert!(!Matcher::ExactClassName("bi".into()).matches(&div));
        assert!(Matcher::AttributeName("TITLE".into()).matches(&div));
        assert!(Matcher::AttributeValueContains("there".into()).matches(&div));
        assert!(!Matcher::PlainText("hello".into()).matches(&div));

        let hello = text("Say Hello");
        assert!(Matcher::PlainText("hello".into()).matches(&hello));
        assert!(!Matcher::ExactTagName("#text".into()).matches(&hello));
    }
}
