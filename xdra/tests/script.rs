use xdra::parser::Parser;
use xdra::script::{Command, Condition, Script};

fn compile(source: &str) -> Script {
    Parser::new(source.to_string(), 0)
        .parse_script()
        .expect("script failed to compile")
}

fn compile_err(source: &str) -> xdra::parser::ParseError {
    Parser::new(source.to_string(), 0)
        .parse_script()
        .expect_err("expected a compile error")
}

#[test]
fn blank_lines_and_comments_are_skipped() {
    let script = compile("\n  # header\n\n   reverse  \n# trailer\n");
    assert_eq!(script.statements.len(), 1);
    assert!(matches!(script.statements[0].command, Command::Reverse));
    assert_eq!(script.statements[0].span, 16..23);
    assert!(compile("  \n# only a comment\n").is_empty());
}

#[test]
fn statements() {
    let script = compile(
        r#"append <post id="9"><title>x</title></post>
sort title
reversesort date
keep ./title
drop ./title = "gone"
keep ./title contains "ne"
limit 3
skip 1
set title "New"
attr seen "yes"
remove date
emit "{count} records\n"
print ./title
assert ./title"#,
    );
    let commands: Vec<&Command> = script.statements.iter().map(|s| &s.command).collect();
    assert_eq!(commands.len(), 14);

    match commands[0] {
        Command::Append(el) => {
            assert_eq!(el.attr("id"), Some("9"));
            assert_eq!(el.find_text("./title").expect("path"), Some("x"));
        }
        other => panic!("expected append, got {:?}", other),
    }
    assert!(matches!(commands[1], Command::Sort { key, descending: false } if key == "title"));
    assert!(matches!(commands[2], Command::Sort { key, descending: true } if key == "date"));
    assert!(matches!(commands[3], Command::Keep(Condition::Exists(_))));
    assert!(matches!(commands[4], Command::Drop(Condition::Equals(_, v)) if v == "gone"));
    assert!(matches!(commands[5], Command::Keep(Condition::Contains(_, v)) if v == "ne"));
    assert!(matches!(commands[6], Command::Limit(3)));
    assert!(matches!(commands[7], Command::Skip(1)));
    assert!(matches!(commands[8], Command::SetText { tag, value } if tag == "title" && value == "New"));
    assert!(matches!(commands[9], Command::SetAttr { name, value } if name == "seen" && value == "yes"));
    assert!(matches!(commands[10], Command::Remove(tag) if tag == "date"));
    assert!(matches!(commands[11], Command::Emit(text) if text == "{count} records\n"));
    assert!(matches!(commands[12], Command::Print(path) if path.as_str() == "./title"));
    assert!(matches!(commands[13], Command::Assert(_)));
}

#[test]
fn string_escapes() {
    let script = compile(r#"emit "tab\tquote\"slash\\""#);
    assert!(matches!(&script.statements[0].command, Command::Emit(t) if t == "tab\tquote\"slash\\"));
}

#[test]
fn conditions_match_records() {
    let script = compile("keep ./title = \"One\"\ndrop ./title contains \"w\"\nkeep ./date");
    let record = Parser::new("<post><title>One</title></post>".to_string(), 0)
        .parse()
        .expect("parse failed");
    let holds: Vec<bool> = script
        .statements
        .iter()
        .map(|s| match &s.command {
            Command::Keep(c) | Command::Drop(c) => c.holds(&record),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(holds, vec![true, false, false]);
}

#[test]
fn unknown_statement() {
    let err = compile_err("reverse\n  shuffle now\n");
    assert_eq!(err.message, "unknown statement 'shuffle'");
    assert_eq!(err.span, 10..21);
}

#[test]
fn wrong_arguments_carry_usage() {
    let err = compile_err("limit");
    assert_eq!(err.message, "wrong arguments for 'limit'");
    assert_eq!(err.notes, vec!["usage: limit N".to_string()]);

    let err = compile_err("set title unquoted");
    assert_eq!(err.notes, vec!["usage: set TAG \"value\"".to_string()]);
}

#[test]
fn invalid_arguments() {
    assert!(compile_err("limit -1").message.contains("non-negative"));
    assert!(compile_err("emit \"open").message.contains("unterminated"));
    assert!(compile_err("emit \"\\q\"").message.contains("unknown escape"));
    assert!(compile_err("keep ./a ~ \"b\"").message.contains("expected PATH"));
    assert!(compile_err("print /abs").message.contains("absolute"));
    assert!(compile_err("sort a//").message.contains("missing step"));
}

#[test]
fn append_fragment_errors_point_into_the_fragment() {
    let err = compile_err("append <post>");
    assert!(err.message.starts_with("invalid append fragment"), "{}", err.message);
    assert!(err.span.start >= "append ".len());
    assert!(compile_err("append").message.contains("XML fragment"));
}
