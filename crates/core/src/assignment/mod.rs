use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// A route pattern with optional `*` wildcards, each matching any run of
/// characters. Matching is case-insensitive after trimming.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub pattern: String,
    pub user_id: UserId,
}

impl RouteRule {
    pub fn is_exact(&self) -> bool {
        !self.pattern.contains('*')
    }

    pub fn matches(&self, route: &str) -> bool {
        wildcard_match(&normalize_key(&self.pattern), &normalize_key(route))
    }

    /// Wildcard character count; fewer wildcards means a more specific
    /// pattern when several match the same route.
    fn wildcard_len(&self) -> usize {
        self.pattern.chars().filter(|ch| *ch == '*').count()
    }
}

/// In-memory view of one organization's assignment tables. Brand lookup is
/// exact; route lookup prefers an exact pattern, then the most specific
/// wildcard pattern.
#[derive(Clone, Debug, Default)]
pub struct AssignmentBook {
    brands: HashMap<String, UserId>,
    routes: Vec<RouteRule>,
}

impl AssignmentBook {
    pub fn new(brands: Vec<(String, UserId)>, mut routes: Vec<RouteRule>) -> Self {
        let brands = brands
            .into_iter()
            .map(|(brand, user_id)| (normalize_key(&brand), user_id))
            .collect();

        // Fewest wildcards first, then longer pattern, then
        // lexicographically so resolution is deterministic.
        routes.sort_by(|left, right| {
            left.wildcard_len()
                .cmp(&right.wildcard_len())
                .then_with(|| right.pattern.len().cmp(&left.pattern.len()))
                .then_with(|| left.pattern.cmp(&right.pattern))
        });

        Self { brands, routes }
    }

    pub fn resolve_brand(&self, brand: &str) -> Option<&UserId> {
        self.brands.get(&normalize_key(brand))
    }

    pub fn resolve_route(&self, route: &str) -> Option<&RouteRule> {
        if route.trim().is_empty() {
            return None;
        }

        let exact = normalize_key(route);
        if let Some(rule) = self
            .routes
            .iter()
            .find(|rule| rule.is_exact() && normalize_key(&rule.pattern) == exact)
        {
            return Some(rule);
        }

        self.routes.iter().filter(|rule| !rule.is_exact()).find(|rule| rule.matches(route))
    }
}

pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Anchored glob over `*` only: the first segment must sit at the start, the
/// last at the end, and the middle segments must appear in order.
fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == candidate;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let first = segments[0];
    let last = segments[segments.len() - 1];

    if !candidate.starts_with(first) {
        return false;
    }
    let mut rest = &candidate[first.len()..];

    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(index) => rest = &rest[index + segment.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::{AssignmentBook, RouteRule};
    use crate::domain::UserId;

    fn user(id: &str) -> UserId {
        UserId(id.to_string())
    }

    fn rule(pattern: &str, user_id: &str) -> RouteRule {
        RouteRule { pattern: pattern.to_string(), user_id: user(user_id) }
    }

    #[test]
    fn brand_lookup_is_exact_and_normalized() {
        let book = AssignmentBook::new(
            vec![("  Siemens ".to_string(), user("u-anna")), ("ABB".to_string(), user("u-boris"))],
            Vec::new(),
        );

        assert_eq!(book.resolve_brand("siemens"), Some(&user("u-anna")));
        assert_eq!(book.resolve_brand("ABB "), Some(&user("u-boris")));
        assert_eq!(book.resolve_brand("Schneider"), None);
    }

    #[test]
    fn exact_route_beats_any_wildcard() {
        let book = AssignmentBook::new(
            Vec::new(),
            vec![
                rule("Shanghai-*", "u-wildcard"),
                rule("Shanghai-Moscow", "u-exact"),
                rule("*", "u-fallback"),
            ],
        );

        let rule = book.resolve_route("Shanghai-Moscow").expect("route resolves");
        assert_eq!(rule.user_id, user("u-exact"));
    }

    #[test]
    fn most_specific_wildcard_wins() {
        let book = AssignmentBook::new(
            Vec::new(),
            vec![
                rule("*", "u-anyone"),
                rule("Shanghai-*", "u-shanghai"),
                rule("Shanghai-Mos*", "u-moscow-corridor"),
            ],
        );

        let rule = book.resolve_route("Shanghai-Moscow").expect("route resolves");
        assert_eq!(rule.user_id, user("u-moscow-corridor"));

        let rule = book.resolve_route("Shanghai-Tallinn").expect("route resolves");
        assert_eq!(rule.user_id, user("u-shanghai"));

        let rule = book.resolve_route("Ningbo-Riga").expect("fallback matches");
        assert_eq!(rule.user_id, user("u-anyone"));
    }

    #[test]
    fn wildcard_matches_are_anchored() {
        let book = AssignmentBook::new(Vec::new(), vec![rule("Hamburg-*", "u-hamburg")]);

        assert!(book.resolve_route("Hamburg-Riga").is_some());
        assert!(book.resolve_route("Rotterdam-Hamburg-Riga").is_none());
    }

    #[test]
    fn interior_wildcards_require_segments_in_order() {
        let book = AssignmentBook::new(Vec::new(), vec![rule("*via Suez*", "u-suez")]);

        assert!(book.resolve_route("Shanghai via Suez to Riga").is_some());
        assert!(book.resolve_route("Shanghai via Panama to Riga").is_none());
    }

    #[test]
    fn matching_ignores_case_and_padding() {
        let book = AssignmentBook::new(Vec::new(), vec![rule("shanghai-*", "u-shanghai")]);
        assert!(book.resolve_route("  SHANGHAI-Moscow ").is_some());
    }

    #[test]
    fn unmatched_or_empty_route_resolves_to_nobody() {
        let book = AssignmentBook::new(Vec::new(), vec![rule("Shanghai-*", "u-shanghai")]);
        assert!(book.resolve_route("Busan-Gdansk").is_none());
        assert!(book.resolve_route("   ").is_none());
    }

    #[test]
    fn fewer_wildcards_beat_more_literals() {
        // "ab*cd*e*" has more literal characters but three wildcards;
        // "abcd*" is more specific for a route both patterns match.
        let book = AssignmentBook::new(
            Vec::new(),
            vec![rule("ab*cd*e*", "u-scattered"), rule("abcd*", "u-prefix")],
        );

        assert_eq!(book.resolve_route("abcdxe").expect("match").user_id, user("u-prefix"));
    }

    #[test]
    fn equal_specificity_ties_break_deterministically() {
        let first = AssignmentBook::new(
            Vec::new(),
            vec![rule("AA*", "u-one"), rule("AB*", "u-two")],
        );
        let second = AssignmentBook::new(
            Vec::new(),
            vec![rule("AB*", "u-two"), rule("AA*", "u-one")],
        );

        // "AA*" sorts before "AB*" regardless of insertion order.
        assert_eq!(first.resolve_route("AAX").expect("match").user_id, user("u-one"));
        assert_eq!(second.resolve_route("AAX").expect("match").user_id, user("u-one"));
    }
}
