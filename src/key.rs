//! Cache key composition for recipe queries.
//!
//! A [`QueryKey`] is the sole cache-addressing mechanism: two keys are equal
//! iff scope and normalized params are equal. Keys render as `prefix:params`
//! strings in log lines.

use std::fmt;

/// Logical scope of a query against the recipe API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryScope {
    /// The recipe list, optionally filtered by a search string.
    ListRecipes,
    /// A single recipe addressed by id.
    RecipeDetail,
}

impl QueryScope {
    /// Key prefix used when rendering the key for logs.
    pub fn prefix(&self) -> &'static str {
        match self {
            QueryScope::ListRecipes => "recipes",
            QueryScope::RecipeDetail => "recipe",
        }
    }
}

/// Ordered, immutable `(scope, params)` tuple addressing one cache entry.
///
/// Params are normalized at construction: search text is trimmed and
/// lower-cased, and the empty string collapses to the canonical unfiltered
/// sentinel. The unfiltered list and a filtered list are the SAME logical
/// scope differing only by parameter, so clearing the search box reuses the
/// cached unfiltered entry instead of refetching.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    scope: QueryScope,
    params: String,
}

impl QueryKey {
    /// Compose the key for a recipe-list query.
    ///
    /// `list("")`, `list("   ")`, and the initial unfiltered load all produce
    /// the identical key.
    pub fn list(raw_query: &str) -> Self {
        QueryKey {
            scope: QueryScope::ListRecipes,
            params: raw_query.trim().to_lowercase(),
        }
    }

    /// Compose the key for a recipe-detail query.
    pub fn detail(id: &str) -> Self {
        QueryKey {
            scope: QueryScope::RecipeDetail,
            params: id.trim().to_string(),
        }
    }

    pub fn scope(&self) -> QueryScope {
        self.scope
    }

    /// Normalized params: lower-cased search text, a recipe id, or the empty
    /// string for the unfiltered list.
    pub fn params(&self) -> &str {
        &self.params
    }

    /// True for the canonical "all recipes" key.
    ///
    /// The empty string is the sentinel: no trimmed search text can collide
    /// with it, so a user literally searching for "all" still gets a
    /// distinct key.
    pub fn is_unfiltered(&self) -> bool {
        self.scope == QueryScope::ListRecipes && self.params.is_empty()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unfiltered() {
            write!(f, "{}:*", self.scope.prefix())
        } else {
            write!(f, "{}:{}", self.scope.prefix(), self.params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_queries_share_the_unfiltered_key() {
        let initial = QueryKey::list("");
        assert_eq!(QueryKey::list(""), initial);
        assert_eq!(QueryKey::list("   "), initial);
        assert_eq!(QueryKey::list("\t\n"), initial);
        assert!(initial.is_unfiltered());
    }

    #[test]
    fn test_list_key_normalization() {
        assert_eq!(QueryKey::list("  Soup "), QueryKey::list("soup"));
        assert_eq!(QueryKey::list("SOUP"), QueryKey::list("soup"));
        assert_ne!(QueryKey::list("soup"), QueryKey::list("stew"));
    }

    #[test]
    fn test_literal_all_is_a_distinct_key() {
        assert_ne!(QueryKey::list("all"), QueryKey::list(""));
        assert!(!QueryKey::list("all").is_unfiltered());
    }

    #[test]
    fn test_scopes_never_collide() {
        assert_ne!(QueryKey::list("42"), QueryKey::detail("42"));
    }

    #[test]
    fn test_detail_key_trims_but_preserves_case() {
        assert_eq!(QueryKey::detail(" aBc1 "), QueryKey::detail("aBc1"));
        assert_eq!(QueryKey::detail("aBc1").params(), "aBc1");
    }

    #[test]
    fn test_display_format() {
        assert_eq!(QueryKey::list("").to_string(), "recipes:*");
        assert_eq!(QueryKey::list("soup").to_string(), "recipes:soup");
        assert_eq!(QueryKey::detail("42").to_string(), "recipe:42");
    }
}
