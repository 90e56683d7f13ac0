//! Post text construction
//!
//! Titles arrive from the CMS with inline markup and HTML entities. Bluesky
//! posts are plain text, so everything that is not visible text is removed
//! before the permalink is appended.

/// Strip all markup from `input`, returning plain text.
///
/// Tags are removed, the bodies of `<script>` and `<style>` elements are
/// dropped, entities are decoded and whitespace runs collapse to a single
/// space. A `<` that cannot begin a tag, as in `5 < 10`, is kept as text.
pub fn strip_markup(input: &str) -> String {
    let mut visible = String::with_capacity(input.len());
    let mut rest = input;
    let mut skip_until: Option<&'static str> = None;

    while let Some(start) = rest.find('<') {
        let tag_and_after = &rest[start..];
        if !starts_tag(&tag_and_after[1..]) {
            // A bare '<' is text
            if skip_until.is_none() {
                visible.push_str(&rest[..=start]);
            }
            rest = &tag_and_after[1..];
            continue;
        }

        if skip_until.is_none() {
            visible.push_str(&rest[..start]);
        }

        let Some(end) = tag_and_after.find('>') else {
            // Unterminated tag: the remainder is markup, not text
            rest = "";
            break;
        };

        let tag = tag_and_after[1..end].trim().to_ascii_lowercase();
        match skip_until {
            Some(closing) if opens(closing, &tag) => skip_until = None,
            Some(_) => {}
            None if opens("script", &tag) => skip_until = Some("/script"),
            None if opens("style", &tag) => skip_until = Some("/style"),
            None => {}
        }

        rest = &tag_and_after[end + 1..];
    }

    if skip_until.is_none() {
        visible.push_str(rest);
    }

    collapse_whitespace(&decode_entities(&visible))
}

/// Markup starts with a letter, `/`, `!` or `?` right after the `<`
fn starts_tag(after_lt: &str) -> bool {
    after_lt
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
}

fn opens(name: &str, tag: &str) -> bool {
    tag.strip_prefix(name)
        .is_some_and(|after| after.is_empty() || after.starts_with(|c: char| c.is_whitespace() || c == '/'))
}

/// Decode named and numeric HTML entities.
///
/// Unknown entities are left untouched.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];

        match candidate.find(';').filter(|&semi| semi <= 10) {
            Some(semi) => match decode_entity(&candidate[1..semi]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &candidate[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = &candidate[1..];
                }
            },
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the text of the mirrored post: the plain title, a newline, then
/// the permalink.
pub fn compose_post_text(title: &str, permalink: &str) -> String {
    format!("{}\n{}", strip_markup(title), permalink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_inline_markup() {
        assert_eq!(strip_markup("<b>Hello</b> & <i>World</i>"), "Hello & World");
    }

    #[test]
    fn test_strip_plain_text_unchanged() {
        assert_eq!(strip_markup("Release notes for 2.0"), "Release notes for 2.0");
    }

    #[test]
    fn test_strip_decodes_entities() {
        assert_eq!(
            strip_markup("Tom &amp; Jerry&#8217;s &lt;3 &#x41;"),
            "Tom & Jerry\u{2019}s <3 A"
        );
    }

    #[test]
    fn test_strip_leaves_unknown_entities() {
        assert_eq!(strip_markup("fish &chips; & more"), "fish &chips; & more");
    }

    #[test]
    fn test_strip_drops_script_and_style_bodies() {
        let title = "Before<script type=\"text/javascript\">alert('x')</script> after<style>b{}</style>!";
        assert_eq!(strip_markup(title), "Before after!");
    }

    #[test]
    fn test_strip_does_not_confuse_similar_tags() {
        assert_eq!(strip_markup("<strong>Bold</strong> <scripted>text</scripted>"), "Bold text");
    }

    #[test]
    fn test_strip_collapses_whitespace() {
        assert_eq!(strip_markup("  Hello<br/>\n\tWorld&nbsp; "), "Hello World");
        assert_eq!(strip_markup("Line<br>break"), "Linebreak");
    }

    #[test]
    fn test_strip_unterminated_tag() {
        assert_eq!(strip_markup("Title <span class=\"x\""), "Title");
    }

    #[test]
    fn test_strip_keeps_bare_less_than() {
        assert_eq!(strip_markup("5 < 10 reasons to use Rust"), "5 < 10 reasons to use Rust");
        assert_eq!(strip_markup("a < b and b > c"), "a < b and b > c");
        assert_eq!(strip_markup("I <3 Rust"), "I <3 Rust");
        assert_eq!(strip_markup("<b>x</b> <= y"), "x <= y");
    }

    #[test]
    fn test_strip_ignores_bare_less_than_inside_script() {
        assert_eq!(strip_markup("A<script>if (a < b) {}</script> B"), "A B");
    }

    #[test]
    fn test_strip_script_body_ends_only_at_closing_script() {
        assert_eq!(strip_markup("<script>x</scripted>y</script>z"), "z");
        assert_eq!(strip_markup("<style>a</styles>b</style >c"), "c");
    }

    #[test]
    fn test_compose_post_text_keeps_comparison() {
        let text = compose_post_text("5 < 10 reasons", "https://example.com/five");
        assert_eq!(text, "5 < 10 reasons\nhttps://example.com/five");
    }

    #[test]
    fn test_compose_post_text() {
        let text = compose_post_text("<b>Hello</b> & <i>World</i>", "https://example.com/hello-world");
        assert_eq!(text, "Hello & World\nhttps://example.com/hello-world");
    }
}
