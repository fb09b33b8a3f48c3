use regex::Regex;

use crate::document::Document;

/// Criteria for `Shelf::search`.
///
/// Three independent dimensions, each optional: a name list, a regex
/// spanning name/unique name/disk/path, and a tag set. A document matches
/// if it satisfies every dimension that's set (logical AND across
/// dimensions); within a dimension any one value matching is enough
/// (logical OR). An empty `Search` matches every document on the shelf.
#[derive(Debug, Clone, Default)]
pub struct Search {
    names: Vec<String>,
    pattern: Option<Regex>,
    tags: Vec<String>,
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        if !self.names.is_empty() && !self.names.iter().any(|name| name == document.name()) {
            return false;
        }
        if let Some(pattern) = &self.pattern {
            let fields = [document.name(), document.unique_name().unwrap_or(""), document.disk(), document.path()];
            if !fields.iter().any(|field| pattern.is_match(field)) {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| document.has_tag(tag)) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;

    fn doc(name: &str) -> Document {
        Document::new(DocumentId::new(), name, "docs", "k/".to_string() + name, 10)
    }

    #[test]
    fn empty_search_matches_everything() {
        assert!(Search::new().matches(&doc("anything.txt")));
    }

    #[test]
    fn name_list_matches_any_listed_name() {
        let search = Search::new().with_names(["a.txt", "b.txt"]);
        assert!(search.matches(&doc("a.txt")));
        assert!(search.matches(&doc("b.txt")));
        assert!(!search.matches(&doc("c.txt")));
    }

    #[test]
    fn pattern_matches_across_name_unique_name_disk_and_path() {
        let mut invoice = doc("report.pdf");
        invoice.set_unique_name(Some("Q1-2026".to_string()));
        let search = Search::new().with_pattern(r"^Q1-\d+$").unwrap();
        assert!(search.matches(&invoice));
        assert!(!search.matches(&doc("report.pdf")));

        let search = Search::new().with_pattern(r"^docs$").unwrap();
        assert!(search.matches(&doc("report.pdf")));
    }

    #[test]
    fn tag_set_matches_any_listed_tag() {
        let mut d = doc("a.txt");
        d.add_tag("finance".to_string());
        let search = Search::new().with_tags(["legal", "finance"]);
        assert!(search.matches(&d));
        assert!(!Search::new().with_tags(["legal"]).matches(&d));
    }

    #[test]
    fn dimensions_combine_with_and() {
        let mut d = doc("report.pdf");
        d.add_tag("finance".to_string());
        let search = Search::new().with_names(["report.pdf"]).with_tags(["legal"]);
        assert!(!search.matches(&d));
    }
}
