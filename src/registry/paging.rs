//! Pagination guard shared by the listing backends
//!
//! Every backend loops until the registry stops announcing a next page. A registry that keeps
//! announcing pages, or hands out the same cursor twice, would otherwise loop forever.

use std::collections::HashSet;

/// Why pagination stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStop {
    /// More pages than the configured ceiling
    Ceiling(usize),
    /// A cursor that was already followed
    RepeatedCursor(String),
}

impl std::fmt::Display for PageStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageStop::Ceiling(max) => write!(f, "page ceiling of {} reached", max),
            PageStop::RepeatedCursor(cursor) => write!(f, "cursor repeated: {}", cursor),
        }
    }
}

#[derive(Debug)]
pub struct PageGuard {
    max_pages: usize,
    fetched: usize,
    seen: HashSet<String>,
}

impl PageGuard {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages,
            fetched: 0,
            seen: HashSet::new(),
        }
    }

    /// Admit the page identified by `cursor` (URL or page number) before fetching it
    pub fn admit(&mut self, cursor: &str) -> Result<(), PageStop> {
        if self.fetched >= self.max_pages {
            return Err(PageStop::Ceiling(self.max_pages));
        }
        if !self.seen.insert(cursor.to_string()) {
            return Err(PageStop::RepeatedCursor(cursor.to_string()));
        }
        self.fetched += 1;
        Ok(())
    }

    pub fn fetched(&self) -> usize {
        self.fetched
    }
}

/// Extract the target of a `rel="next"` entry from an RFC 5988 `Link` header
pub fn parse_link_next(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params.split(';').any(|p| {
            let p = p.trim().replace(' ', "");
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        (!target.is_empty()).then(|| target.to_string())
    })
}

/// Resolve a possibly relative `next` target against the registry base URL
pub fn resolve_next(base_url: &str, next: &str) -> String {
    if next.starts_with("http://") || next.starts_with("https://") {
        next.to_string()
    } else if next.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), next)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), next)
    }
}
