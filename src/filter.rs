// src/filter.rs
//! Case-insensitive keyword matching over post text.

/// Keyword list fixed at startup. Keywords are stored case-folded.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn matches(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.keywords.iter().any(|k| folded.contains(k.as_str()))
    }

    /// Keywords found in `text`, in configured order.
    pub fn matched<'a>(&'a self, text: &str) -> Vec<&'a str> {
        let folded = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| folded.contains(k.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Free-function form: true iff any keyword is a substring of `text`, ignoring case.
pub fn matches<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    KeywordFilter::new(keywords).matches(text)
}
