use crate::SetFilter;

/// An immutable, route-derived filter criterion.
///
/// Resolved once at load; merged (by union) into every outgoing query's
/// same-named set field, never removable through user-facing clear actions,
/// never itself mutated.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PageFilter {
    pub kind: SetFilter,
    pub slug: String,
}

impl PageFilter {
    /// Unions this context's slug into `values`, deduplicated, preserving the
    /// user-chosen order with the slug first.
    pub fn union_into(&self, values: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(values.len() + 1);
        out.push(self.slug.clone());
        for v in values {
            if *v != self.slug {
                out.push(v.clone());
            }
        }
        out
    }
}

/// One route pattern, e.g. `/region/{slug}`.
///
/// Literal segments must match exactly; exactly one `{slug}` segment captures
/// the identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePattern {
    kind: SetFilter,
    segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slug,
}

impl RoutePattern {
    pub fn new(kind: SetFilter, pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "{slug}" {
                    Segment::Slug
                } else {
                    Segment::Literal(s.to_owned())
                }
            })
            .collect();
        Self { kind, segments }
    }

    fn matches(&self, path_segments: &[&str]) -> Option<PageFilter> {
        if path_segments.len() != self.segments.len() {
            return None;
        }
        let mut slug = None;
        for (seg, part) in self.segments.iter().zip(path_segments) {
            match seg {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Slug => {
                    let decoded = urlencoding::decode(part).ok()?;
                    if decoded.is_empty() {
                        return None;
                    }
                    slug = Some(decoded.into_owned());
                }
            }
        }
        slug.map(|slug| PageFilter {
            kind: self.kind,
            slug,
        })
    }
}

/// Derives the immutable page filter context from the route, once at load.
#[derive(Clone, Debug)]
pub struct PageFilterResolver {
    patterns: Vec<RoutePattern>,
}

impl PageFilterResolver {
    /// The patterns are tried in order; list the most specific first.
    pub fn new(patterns: Vec<RoutePattern>) -> Self {
        Self { patterns }
    }

    /// One pattern per set-valued field: `/topic/{slug}`, `/region/{slug}`,
    /// `/locality/{slug}`, `/territory/{slug}`, `/reporter/{slug}`.
    pub fn default_patterns() -> Vec<RoutePattern> {
        SetFilter::ALL
            .into_iter()
            .map(|f| RoutePattern::new(f, &format!("/{}/{{slug}}", f.param())))
            .collect()
    }

    /// Matches `path` against the pattern list; first match wins, no match
    /// yields `None`. Query strings and trailing slashes are ignored.
    pub fn detect(&self, path: &str) -> Option<PageFilter> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let found = self.patterns.iter().find_map(|p| p.matches(&segments));
        if found.is_some() {
            lsdebug!(path, "PageFilterResolver: route matched");
        }
        found
    }
}

impl Default for PageFilterResolver {
    fn default() -> Self {
        Self::new(Self::default_patterns())
    }
}
