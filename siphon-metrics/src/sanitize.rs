/// Maximum length of a sanitized measurement name or source.
pub const MAX_NAME_LENGTH: usize = 255;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

/// Maps an arbitrary string onto the character set accepted for names and sources.
///
/// Every maximal run of characters outside `[A-Za-z0-9_.:-]` is collapsed into a single `_`,
/// then the result is truncated to [`MAX_NAME_LENGTH`] characters. Sanitizing is idempotent.
///
/// ```
/// assert_eq!(siphon_metrics::sanitize("a b/c"), "a_b_c");
/// assert_eq!(siphon_metrics::sanitize("foo!!!bar"), "foo_bar");
/// ```
pub fn sanitize(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len().min(MAX_NAME_LENGTH));
    let mut in_run = false;

    for c in name.chars() {
        if is_name_char(c) {
            sanitized.push(c);
            in_run = false;
        } else if !in_run {
            sanitized.push('_');
            in_run = true;
        }

        // The output is ASCII only, so bytes equal characters.
        if sanitized.len() == MAX_NAME_LENGTH {
            break;
        }
    }

    sanitized
}
