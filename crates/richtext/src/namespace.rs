//! Namespaces and element names of the rich text vocabulary.

use crate::dom::{Element, QName};

/// Core structural namespace (default namespace of stored documents).
pub const DOCBOOK: &str = "http://docbook.org/ns/docbook";

/// Resource-link namespace (`xlink:href`, `xlink:show`, `xlink:title`).
pub const XLINK: &str = "http://www.w3.org/1999/xlink";

/// Presentation attributes (`tvxhtml:class`, `tvxhtml:align`).
pub const XHTML_ATTR: &str = "http://trovato.dev/xmlns/richtext/xhtml";

/// Author-defined data attributes.
pub const CUSTOM_ATTR: &str = "http://trovato.dev/xmlns/richtext/custom";

/// Reserved `xml:` namespace (`xml:id`).
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Element local names used by the converters and extractors.
pub mod element {
    pub const SECTION: &str = "section";
    pub const LINK: &str = "link";
    pub const LITERAL_LAYOUT: &str = "literallayout";
    pub const EMBED: &str = "tvembed";
    pub const EMBED_INLINE: &str = "tvembedinline";
    pub const EMBED_LINK: &str = "tvlink";
    pub const CONFIG: &str = "tvconfig";
    pub const VALUE: &str = "tvvalue";
    pub const TEMPLATE: &str = "tvtemplate";
    pub const TEMPLATE_INLINE: &str = "tvtemplateinline";
    pub const CONTENT: &str = "tvcontent";
    pub const PAYLOAD: &str = "tvpayload";
}

/// Prefix conventionally bound to a namespace.
pub fn preferred_prefix(uri: &str) -> Option<&'static str> {
    match uri {
        XLINK => Some("xlink"),
        XHTML_ATTR => Some("tvxhtml"),
        CUSTOM_ATTR => Some("tvcustom"),
        XML => Some("xml"),
        _ => None,
    }
}

/// `xlink:<local>` attribute name.
pub fn xlink(local: &str) -> QName {
    QName::new(Some(XLINK), Some("xlink"), local)
}

/// Root element of a fresh document with the standard declarations.
pub fn section_root() -> Element {
    Element::new(QName::docbook(element::SECTION))
        .with_namespace(None, DOCBOOK)
        .with_namespace(Some("xlink"), XLINK)
        .with_namespace(Some("tvxhtml"), XHTML_ATTR)
        .with_namespace(Some("tvcustom"), CUSTOM_ATTR)
}
