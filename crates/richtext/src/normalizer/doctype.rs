//! Injects legacy named-entity declarations into documents without a doctype.
//!
//! Stored content predating the secure parser uses HTML entity names such as
//! `&nbsp;` and `&hellip;`. The parser only honours entities declared in the
//! internal subset, so documents of the configured root element get a
//! doctype mapping every legacy name to a numeric character reference.

use std::fmt::Write;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use super::Normalizer;
use crate::settings::NormalizerSettings;

/// Built-in legacy entities: Latin-1, typographic punctuation and symbols.
pub const LEGACY_ENTITIES: &[(&str, u32)] = &[
    ("nbsp", 160),
    ("iexcl", 161),
    ("cent", 162),
    ("pound", 163),
    ("curren", 164),
    ("yen", 165),
    ("brvbar", 166),
    ("sect", 167),
    ("uml", 168),
    ("copy", 169),
    ("ordf", 170),
    ("laquo", 171),
    ("not", 172),
    ("shy", 173),
    ("reg", 174),
    ("macr", 175),
    ("deg", 176),
    ("plusmn", 177),
    ("sup2", 178),
    ("sup3", 179),
    ("acute", 180),
    ("micro", 181),
    ("para", 182),
    ("middot", 183),
    ("cedil", 184),
    ("sup1", 185),
    ("ordm", 186),
    ("raquo", 187),
    ("frac14", 188),
    ("frac12", 189),
    ("frac34", 190),
    ("iquest", 191),
    ("Agrave", 192),
    ("Aacute", 193),
    ("Acirc", 194),
    ("Atilde", 195),
    ("Auml", 196),
    ("Aring", 197),
    ("AElig", 198),
    ("Ccedil", 199),
    ("Egrave", 200),
    ("Eacute", 201),
    ("Ecirc", 202),
    ("Euml", 203),
    ("Igrave", 204),
    ("Iacute", 205),
    ("Icirc", 206),
    ("Iuml", 207),
    ("ETH", 208),
    ("Ntilde", 209),
    ("Ograve", 210),
    ("Oacute", 211),
    ("Ocirc", 212),
    ("Otilde", 213),
    ("Ouml", 214),
    ("times", 215),
    ("Oslash", 216),
    ("Ugrave", 217),
    ("Uacute", 218),
    ("Ucirc", 219),
    ("Uuml", 220),
    ("Yacute", 221),
    ("THORN", 222),
    ("szlig", 223),
    ("agrave", 224),
    ("aacute", 225),
    ("acirc", 226),
    ("atilde", 227),
    ("auml", 228),
    ("aring", 229),
    ("aelig", 230),
    ("ccedil", 231),
    ("egrave", 232),
    ("eacute", 233),
    ("ecirc", 234),
    ("euml", 235),
    ("igrave", 236),
    ("iacute", 237),
    ("icirc", 238),
    ("iuml", 239),
    ("eth", 240),
    ("ntilde", 241),
    ("ograve", 242),
    ("oacute", 243),
    ("ocirc", 244),
    ("otilde", 245),
    ("ouml", 246),
    ("divide", 247),
    ("oslash", 248),
    ("ugrave", 249),
    ("uacute", 250),
    ("ucirc", 251),
    ("uuml", 252),
    ("yacute", 253),
    ("thorn", 254),
    ("yuml", 255),
    ("OElig", 338),
    ("oelig", 339),
    ("Scaron", 352),
    ("scaron", 353),
    ("Yuml", 376),
    ("fnof", 402),
    ("circ", 710),
    ("tilde", 732),
    ("ensp", 8194),
    ("emsp", 8195),
    ("thinsp", 8201),
    ("zwnj", 8204),
    ("zwj", 8205),
    ("lrm", 8206),
    ("rlm", 8207),
    ("ndash", 8211),
    ("mdash", 8212),
    ("lsquo", 8216),
    ("rsquo", 8217),
    ("sbquo", 8218),
    ("ldquo", 8220),
    ("rdquo", 8221),
    ("bdquo", 8222),
    ("dagger", 8224),
    ("Dagger", 8225),
    ("bull", 8226),
    ("hellip", 8230),
    ("permil", 8240),
    ("prime", 8242),
    ("Prime", 8243),
    ("lsaquo", 8249),
    ("rsaquo", 8250),
    ("euro", 8364),
    ("trade", 8482),
];

/// First start tag in the document.
#[allow(clippy::expect_used)]
static FIRST_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][\w.-]*(?::[A-Za-z_][\w.-]*)?)(\s[^>]*)?/?>").expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static XMLNS_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"xmlns(?::([\w.-]+))?\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static ANY_DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*!\s*DOCTYPE").expect("valid regex literal"));

/// Adds a doctype of legacy entity declarations to documents that lack one.
pub struct DocTypeNormalizer {
    root_element: String,
    namespace: String,
    entities: IndexMap<String, u32>,
}

impl DocTypeNormalizer {
    pub fn new(root_element: &str, namespace: &str) -> Self {
        Self {
            root_element: root_element.to_string(),
            namespace: namespace.to_string(),
            entities: LEGACY_ENTITIES
                .iter()
                .map(|(name, code)| ((*name).to_string(), *code))
                .collect(),
        }
    }

    pub fn from_settings(settings: &NormalizerSettings) -> Self {
        let mut normalizer = Self::new(&settings.root_element, &settings.namespace);
        for (name, code) in &settings.entities {
            normalizer.entities.insert(name.clone(), *code);
        }
        normalizer
    }

    /// The qualified root name and its byte offset, if the first element is
    /// the configured root in the configured namespace.
    fn matching_root<'a>(&self, input: &'a str) -> Option<(&'a str, usize)> {
        let caps = FIRST_TAG.captures(input)?;
        let whole = caps.get(0)?;
        let qualified = caps.get(1)?.as_str();
        let (prefix, local) = match qualified.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qualified),
        };
        if local != self.root_element {
            return None;
        }

        let attributes = caps.get(2).map_or("", |m| m.as_str());
        let declares_namespace = XMLNS_ATTRIBUTE.captures_iter(attributes).any(|decl| {
            let declared_prefix = decl.get(1).map(|m| m.as_str());
            let uri = decl.get(2).or_else(|| decl.get(3)).map_or("", |m| m.as_str());
            declared_prefix == prefix && uri == self.namespace
        });
        declares_namespace.then_some((qualified, whole.start()))
    }

    /// Single line, so parse diagnostics keep the author's line numbers.
    fn declaration(&self, root: &str) -> String {
        let mut out = format!("<!DOCTYPE {root} [");
        for (name, code) in &self.entities {
            let _ = write!(out, "<!ENTITY {name} \"&#{code};\">");
        }
        out.push_str("]>");
        out
    }
}

impl Normalizer for DocTypeNormalizer {
    fn name(&self) -> &str {
        "doctype"
    }

    fn accept(&self, input: &str) -> bool {
        !ANY_DOCTYPE.is_match(input) && self.matching_root(input).is_some()
    }

    fn normalize(&self, input: &str) -> String {
        let Some((root, offset)) = self.matching_root(input) else {
            return input.to_string();
        };
        let mut out = String::with_capacity(input.len() + 4096);
        out.push_str(&input[..offset]);
        out.push_str(&self.declaration(root));
        out.push_str(&input[offset..]);
        out
    }
}
