//! Structural lookups over rendered markup.
//!
//! Everything here walks the element tree by tag, attribute or class; no
//! free-text search. Absence is an `Option`, never an error.

use scraper::{ElementRef, Html};

pub struct Document(Html);

impl Document {
    pub fn parse(markup: &str) -> Self {
        Self(Html::parse_document(markup))
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.0.root_element()
    }
}

pub trait NodeExt<'a>: Sized {
    /// Descendant elements in document order, excluding `self`.
    fn elements(self) -> impl Iterator<Item = ElementRef<'a>>;

    fn find_by_tag(self, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
        self.elements().filter(move |e| e.value().name() == tag)
    }

    fn first_by_tag(self, tag: &'a str) -> Option<ElementRef<'a>> {
        self.find_by_tag(tag).next()
    }

    fn last_by_tag(self, tag: &'a str) -> Option<ElementRef<'a>> {
        self.find_by_tag(tag).last()
    }

    /// Elements carrying `name`, optionally with exactly `value`.
    fn find_by_attribute(
        self,
        name: &'a str,
        value: Option<&'a str>,
    ) -> impl Iterator<Item = ElementRef<'a>> {
        self.elements().filter(move |e| match (e.attr(name), value) {
            (Some(_), None) => true,
            (Some(v), Some(want)) => v == want,
            (None, _) => false,
        })
    }

    fn find_by_class(self, tag: &'a str, class: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
        self.find_by_tag(tag).filter(move |e| has_class(*e, class))
    }
}

impl<'a> NodeExt<'a> for ElementRef<'a> {
    fn elements(self) -> impl Iterator<Item = ElementRef<'a>> {
        self.descendants().skip(1).filter_map(ElementRef::wrap)
    }
}

pub fn attributes_of<'a>(element: ElementRef<'a>) -> impl Iterator<Item = (&'a str, &'a str)> {
    element.value().attrs()
}

pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

pub fn first_class<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    attributes_of(element)
        .find(|(k, _)| *k == "class")
        .and_then(|(_, v)| v.split_ascii_whitespace().next())
}

/// Concatenated text of all descendant text nodes.
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Text with every space and newline removed.
pub fn squeezed_text(element: ElementRef<'_>) -> String {
    text_of(element).replace(['\n', ' '], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKUP: &str = r#"<html><body>
        <div class="a b" id="outer">
            <span data-time="10">one</span>
            <p class="b">two <a class="x">three</a></p>
            <span data-time="20" class="last">four</span>
        </div>
    </body></html>"#;

    #[test]
    fn lookups() {
        let doc = Document::parse(MARKUP);
        let root = doc.root();

        let spans: Vec<_> = root.find_by_tag("span").map(text_of).collect();
        assert_eq!(spans, ["one", "four"]);
        assert_eq!(root.last_by_tag("span").map(text_of).as_deref(), Some("four"));

        let times: Vec<_> = root
            .find_by_attribute("data-time", None)
            .filter_map(|e| e.attr("data-time"))
            .collect();
        assert_eq!(times, ["10", "20"]);
        assert_eq!(root.find_by_attribute("data-time", Some("20")).count(), 1);

        let outer = root.first_by_tag("div").unwrap();
        assert_eq!(first_class(outer), Some("a"));
        assert!(has_class(outer, "b"));
        assert!(attributes_of(outer).any(|(k, v)| k == "id" && v == "outer"));
        assert_eq!(root.find_by_class("p", "b").count(), 1);
        assert_eq!(text_of(root.first_by_tag("p").unwrap()), "two three");
        assert_eq!(squeezed_text(root.first_by_tag("p").unwrap()), "twothree");
    }

    #[test]
    fn elements_skip_self() {
        let doc = Document::parse(MARKUP);
        let outer = doc.root().first_by_tag("div").unwrap();
        assert!(outer.find_by_tag("div").next().is_none());
    }
}
