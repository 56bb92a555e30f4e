//! Text cleanup for user-supplied strings.

/// Trim, drop control characters (newlines and tabs survive) and angle
/// brackets.
#[must_use]
pub fn sanitize_text(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}

/// Like [`sanitize_text`], mapping blank results to `None`.
#[must_use]
pub fn sanitize_optional(input: Option<&str>) -> Option<String> {
    input.map(sanitize_text).filter(|s| !s.is_empty())
}

/// URL slug: lowercase ASCII alphanumerics separated by single hyphens.
///
/// ```
/// use wellspring_core::text::slugify;
///
/// assert_eq!(slugify("  Alpine Spring 1.5L! "), "alpine-spring-1-5l");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_markup_and_controls() {
        assert_eq!(
            sanitize_text("  <b>Fresh</b>\u{0007} water\n "),
            "bFresh/b water"
        );
        assert_eq!(sanitize_text("line one\nline two"), "line one\nline two");
    }

    #[test]
    fn test_sanitize_optional() {
        assert_eq!(sanitize_optional(Some("   ")), None);
        assert_eq!(sanitize_optional(None), None);
        assert_eq!(sanitize_optional(Some(" hi ")), Some("hi".to_owned()));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Crystal Peak"), "crystal-peak");
        assert_eq!(slugify("--Déjà  Vu--"), "d-j-vu");
        assert_eq!(slugify("!!!"), "");
    }
}
