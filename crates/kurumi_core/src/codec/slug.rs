//! File-name slugs.

/// Slug used when a title produces no usable characters.
pub const UNTITLED_SLUG: &str = "untitled";

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Turn a title into a file-name slug.
///
/// Lower-cases, keeps ASCII word characters, turns whitespace and `-` runs
/// into a single `-`, drops everything else and trims `-` from both ends.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        let mapped = if is_word(c) {
            c
        } else if c.is_whitespace() || c == '-' {
            '-'
        } else {
            continue;
        };
        if mapped == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(mapped);
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        UNTITLED_SLUG.to_string()
    } else {
        slug
    }
}

/// Readable title from a slug: `-` becomes a space and each word is capitalized.
pub fn title_from_slug(slug: &str) -> String {
    let mut title = String::with_capacity(slug.len());
    let mut previous_is_word = false;
    for c in slug.chars() {
        let c = if c == '-' { ' ' } else { c };
        if is_word(c) && !previous_is_word {
            title.extend(c.to_uppercase());
        } else {
            title.push(c);
        }
        previous_is_word = is_word(c);
    }
    title
}
