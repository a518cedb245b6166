//! URL slug helpers shared by posts, pages and docs

/// Generate a URL-friendly slug from a title.
///
/// Lowercases, keeps ASCII alphanumerics and non-ASCII letters, and collapses
/// every run of other characters into a single hyphen. An empty result
/// becomes `untitled`.
pub fn slugify(title: &str) -> String {
    let mut result = String::new();
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        let keep = c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric());
        if keep {
            if pending_hyphen && !result.is_empty() {
                result.push('-');
            }
            result.push(c);
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }

    if result.is_empty() {
        "untitled".to_string()
    } else {
        result
    }
}

/// Check that a user-supplied slug is already in canonical form
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

/// Find the first free slug: `base`, then `base-2`, `base-3`, ...
///
/// `exists` is queried for each candidate until it returns `false`.
pub async fn unique_slug<F, Fut, E>(base: &str, mut exists: F) -> Result<String, E>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<bool, E>>,
{
    if !exists(base.to_string()).await? {
        return Ok(base.to_string());
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_slugify_simple() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("Hello   World"), "hello-world");
        assert_eq!(slugify("hello_world"), "hello-world");
        assert_eq!(slugify("  --Trim me--  "), "trim-me");
    }

    #[test]
    fn test_slugify_keeps_non_ascii_letters() {
        assert_eq!(slugify("Café Société"), "café-société");
        assert_eq!(slugify("Tech 技术"), "tech-技术");
    }

    #[test]
    fn test_slugify_empty_becomes_untitled() {
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("!!! ???"), "untitled");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("hello-world"));
        assert!(!is_valid_slug("Hello World"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug(""));
    }

    #[tokio::test]
    async fn test_unique_slug_appends_counter() {
        let taken: HashSet<String> = ["post", "post-2"].iter().map(|s| s.to_string()).collect();
        let slug = unique_slug("post", |candidate| {
            let hit = taken.contains(&candidate);
            async move { Ok::<_, ()>(hit) }
        })
        .await
        .unwrap();
        assert_eq!(slug, "post-3");

        let slug = unique_slug("fresh", |_| async { Ok::<_, ()>(false) }).await.unwrap();
        assert_eq!(slug, "fresh");
    }

    proptest! {
        #[test]
        fn slugify_is_idempotent(title in "[a-zA-Zà-ÿ0-9 _.,!-]{0,40}") {
            let once = slugify(&title);
            prop_assert_eq!(slugify(&once), once.clone());
        }

        #[test]
        fn slugify_has_no_edge_or_double_hyphens(title in "[ a-zA-Z0-9_!?.,-]{0,40}") {
            let slug = slugify(&title);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }
}
