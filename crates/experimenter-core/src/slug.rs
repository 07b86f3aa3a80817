//! URL-safe slug generation for experiment and variant names.

/// Lowercase `value`, keep ASCII alphanumerics, underscores and hyphens,
/// and collapse whitespace and hyphen runs into a single hyphen.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn strips_punctuation() {
        assert_eq!(slugify("A new experiment!"), "a-new-experiment");
    }

    #[test]
    fn collapses_separators() {
        assert_eq!(slugify("  Pref -- Flip   Study "), "pref-flip-study");
    }

    #[test]
    fn keeps_underscores() {
        assert_eq!(slugify("my_pref test"), "my_pref-test");
    }

    #[test]
    fn empty_for_symbols_only() {
        assert_eq!(slugify("!!!"), "");
    }
}
