use herald_core::RawEntry;

/// Decides which fetched entries are dropped before they reach the store
///
/// An entry is skipped if one of its categories equals a keyword exactly, or
/// if its title contains a keyword, ignoring case.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
    /// Lowercased copies of `keywords`, for title matching
    title_needles: Vec<String>,
}

impl KeywordFilter {
    /// Keywords are trimmed; empty ones are ignored
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_owned())
            .filter(|k| !k.is_empty())
            .collect();
        let title_needles = keywords.iter().map(|k| k.to_lowercase()).collect();

        Self {
            keywords,
            title_needles,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// The first keyword causing `entry` to be skipped, if any
    pub fn matching_keyword(&self, entry: &RawEntry) -> Option<&str> {
        if let Some(keyword) = self
            .keywords
            .iter()
            .find(|k| entry.categories.iter().any(|c| c == *k))
        {
            return Some(keyword.as_str());
        }

        let title = entry.title.to_lowercase();
        self.keywords
            .iter()
            .zip(&self.title_needles)
            .find(|(_, needle)| title.contains(needle.as_str()))
            .map(|(keyword, _)| keyword.as_str())
    }

    pub fn should_skip(&self, entry: &RawEntry) -> bool {
        self.matching_keyword(entry).is_some()
    }
}
