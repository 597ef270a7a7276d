//! Directory selection policy: decides whether a given directory
//! participates in sorting at all (§4.7 "Selection filter").

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    NoMatch,
    /// An entry in the list is a strict prefix of the candidate path —
    /// used by the `*_recursive` lists to also cover subdirectories.
    SubMatch,
    ExactMatch,
}

fn matches_string_list(list: &[String], path: &str) -> MatchKind {
    let mut kind = MatchKind::NoMatch;
    for entry in list {
        if path.starts_with(entry.as_str()) {
            kind = MatchKind::SubMatch;
        }
        if entry == path {
            return MatchKind::ExactMatch;
        }
    }
    kind
}

/// Normalizes a directory path the way the source's path-list matching
/// expects: rooted at `/`, with a leading and trailing separator.
pub fn normalize_dir_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 2);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(path);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

#[derive(Debug, Clone, Default)]
pub struct PathLists {
    pub include: Vec<String>,
    pub include_recursive: Vec<String>,
    pub exclude: Vec<String>,
    pub exclude_recursive: Vec<String>,
}

impl PathLists {
    fn matches(&self, path: &str) -> bool {
        let incl = matches_string_list(&self.include, path);
        let incl_rec = matches_string_list(&self.include_recursive, path);
        let excl = matches_string_list(&self.exclude, path);
        let excl_rec = matches_string_list(&self.exclude_recursive, path);

        let no_includes_configured = self.include.is_empty() && self.include_recursive.is_empty();

        if no_includes_configured {
            excl != MatchKind::ExactMatch && excl_rec == MatchKind::NoMatch
        } else {
            (incl == MatchKind::ExactMatch || incl_rec != MatchKind::NoMatch)
                && excl != MatchKind::ExactMatch
                && excl_rec == MatchKind::NoMatch
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegexLists {
    pub include: Vec<Regex>,
    pub exclude: Vec<Regex>,
}

impl RegexLists {
    fn matches(&self, path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|r| r.is_match(path));
        let excluded = self.exclude.iter().any(|r| r.is_match(path));
        included && !excluded
    }
}

/// A directory's selection policy; the two concrete modes are mutually
/// exclusive at construction time (enforced by the CLI layer, surfaced to
/// the engine as `EngineError::Unsupported` if both are ever combined).
#[derive(Debug, Clone)]
pub enum Selection {
    All,
    PathLists(PathLists),
    Regex(RegexLists),
}

impl Default for Selection {
    fn default() -> Self {
        Selection::All
    }
}

impl Selection {
    pub fn matches(&self, path: &str) -> bool {
        let normalized = normalize_dir_path(path);
        match self {
            Selection::All => true,
            Selection::PathLists(lists) => lists.matches(&normalized),
            Selection::Regex(lists) => lists.matches(&normalized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_all_except_exclusion() {
        let lists = PathLists {
            exclude: vec!["/music/".to_string()],
            ..Default::default()
        };
        let sel = Selection::PathLists(lists);
        assert!(sel.matches("/podcasts"));
        assert!(!sel.matches("/music"));
    }

    #[test]
    fn recursive_exclusion_covers_subdirs() {
        let lists = PathLists {
            exclude_recursive: vec!["/music/".to_string()],
            ..Default::default()
        };
        let sel = Selection::PathLists(lists);
        assert!(!sel.matches("/music/rock"));
    }

    #[test]
    fn includes_restrict_to_listed_paths() {
        let lists = PathLists {
            include: vec!["/music/".to_string()],
            ..Default::default()
        };
        let sel = Selection::PathLists(lists);
        assert!(sel.matches("/music"));
        assert!(!sel.matches("/podcasts"));
    }

    #[test]
    fn regex_include_and_exclude() {
        let lists = RegexLists {
            include: vec![Regex::new("^/music").unwrap()],
            exclude: vec![Regex::new("live").unwrap()],
        };
        let sel = Selection::Regex(lists);
        assert!(sel.matches("/music/studio"));
        assert!(!sel.matches("/music/live"));
        assert!(!sel.matches("/podcasts"));
    }
}
