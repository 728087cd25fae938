use xdra::directive::{ActionType, DirectiveKind, SourceType, is_flag_set};
use xdra::parser::Parser;
use xdra::{Element, QName};

fn parse(source: &str) -> Element {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

#[test]
fn namespaced_names_keep_their_prefix() {
    let root = parse(r#"<x:model xmlns:x="xdra"><x:literal>t</x:literal><plain /></x:model>"#);
    assert_eq!(root.name, QName::qualified("xdra", Some("x".to_string()), "model"));
    assert_eq!(root.name.to_string(), "x:model");
    assert_eq!(root.children[1].name, QName::local("plain"));
}

#[test]
fn directive_kind_depends_on_namespace_not_prefix() {
    let root = parse(
        r#"<a:model xmlns:a="xdra" xmlns:b="urn:other"><a:getnode /><b:getnode /><a:unknown /><getnode /></a:model>"#,
    );
    assert_eq!(DirectiveKind::of(&root), DirectiveKind::Model);
    let kinds: Vec<_> = root.children.iter().map(DirectiveKind::of).collect();
    assert_eq!(
        kinds,
        vec![
            DirectiveKind::GetNode,
            DirectiveKind::PassThrough,
            DirectiveKind::PassThrough,
            DirectiveKind::PassThrough,
        ]
    );
}

#[test]
fn default_namespace_declarations_apply() {
    let root = parse(r#"<model xmlns="xdra"><source /></model>"#);
    assert_eq!(DirectiveKind::of(&root), DirectiveKind::Model);
    assert_eq!(DirectiveKind::of(&root.children[0]), DirectiveKind::Source);
    assert_eq!(root.name.to_string(), "model");
}

#[test]
fn text_and_tails() {
    let root = parse("<a>one<b>two</b>three<!-- gone -->four<c /></a>");
    assert_eq!(root.text.as_deref(), Some("one"));
    assert_eq!(root.children[0].text.as_deref(), Some("two"));
    assert_eq!(root.children[0].tail.as_deref(), Some("threefour"));
    assert_eq!(root.children[1].tail, None);
}

#[test]
fn entities_and_cdata_are_resolved() {
    let root = parse("<a>&lt;x&gt; &amp; <![CDATA[<raw>]]></a>");
    assert_eq!(root.text.as_deref(), Some("<x> & <raw>"));
}

#[test]
fn serialization_escapes() {
    let mut el = Element::with_text("note", "a < b & c");
    el.set_attr("title", "say \"hi\"");
    assert_eq!(
        el.to_xml_string(),
        r#"<note title="say &quot;hi&quot;">a &lt; b &amp; c</note>"#
    );
}

#[test]
fn serialization_round_trips_markup() {
    let text = r#"<post id="1"><title>T</title>tail<empty /></post>"#;
    assert_eq!(parse(text).to_xml_string(), text);
    assert_eq!(parse(text).inner_xml(), "<title>T</title>tail<empty />");
}

#[test]
fn set_attr_replaces_in_place() {
    let mut el = parse(r#"<a x="1" y="2" />"#);
    el.set_attr("x", "3");
    el.set_attr("z", "4");
    assert_eq!(el.to_xml_string(), r#"<a x="3" y="2" z="4" />"#);
}

#[test]
fn find_helpers() {
    let root = parse("<blog><post><title>A</title></post><post><title /></post></blog>");
    assert_eq!(root.find_all("./post").expect("path").len(), 2);
    assert_eq!(root.find_text("./post/title").expect("path"), Some("A"));
    assert_eq!(root.find_text("./post[2]/title").expect("path"), Some(""));
    assert_eq!(root.find_text("./missing").expect("path"), None);
    assert!(root.find("/abs").is_err());
    assert_eq!(root.descendants().len(), 4);
}

#[test]
fn malformed_xml_reports_position() {
    let source = "<a>\n  <b>\n</a>";
    let err = Parser::new(source.to_string(), 3).parse().expect_err("expected parse error");
    assert_eq!(err.file_id, 3);
    assert!(err.message.starts_with("malformed XML"), "{}", err.message);
    assert!(err.span.start > 0 && err.span.start <= source.len());
}

#[test]
fn attribute_vocabularies() {
    assert_eq!(SourceType::parse("files"), Some(SourceType::Files));
    assert_eq!(SourceType::parse("url"), Some(SourceType::Url));
    assert_eq!(SourceType::parse("custom"), Some(SourceType::Custom));
    assert_eq!(SourceType::parse("Files"), None);

    assert_eq!(ActionType::parse("sort"), Some(ActionType::Sort));
    assert_eq!(ActionType::parse("reversesort"), Some(ActionType::ReverseSort));
    assert_eq!(ActionType::parse("custom"), Some(ActionType::Custom));
    assert_eq!(ActionType::parse("none"), None);
    assert_eq!(ActionType::default(), ActionType::None);

    assert!(is_flag_set(Some("1")));
    assert!(is_flag_set(Some("yes")));
    assert!(!is_flag_set(Some("true")));
    assert!(!is_flag_set(Some("0")));
    assert!(!is_flag_set(None));
}
