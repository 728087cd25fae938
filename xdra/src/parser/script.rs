use std::ops::Range;

use crate::parser::error::ParseError;
use crate::parser::xml;
use crate::path::ElementPath;
use crate::script::{Command, Condition, Script, Statement};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
}

/// Parse extension script text into a Script.
///
/// Every statement is checked here, including `append` fragments and paths,
/// so a script that compiles can only fail at run time through `assert`.
pub fn parse_script(source: &str, file_id: usize) -> Result<Script, ParseError> {
    let mut statements = Vec::new();
    let mut offset = 0;

    for raw_line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += raw_line.len();

        let line = raw_line.trim_end_matches(['\n', '\r']);
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let start = line_start + (line.len() - trimmed.len());
        let trimmed = trimmed.trim_end();
        let span = start..start + trimmed.len();

        let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (trimmed, ""),
        };
        let rest_start = start + (trimmed.len() - rest.len());
        let command = parse_command(keyword, rest, rest_start, span.clone(), file_id)?;
        statements.push(Statement { command, span });
    }

    Ok(Script { statements })
}

fn parse_command(
    keyword: &str,
    rest: &str,
    rest_start: usize,
    span: Range<usize>,
    file_id: usize,
) -> Result<Command, ParseError> {
    let err = |message: String| ParseError::error(message, span.clone(), file_id);

    if keyword == "append" {
        if rest.is_empty() {
            return Err(err("append needs an XML fragment".into()));
        }
        return xml::parse_tree(rest, file_id)
            .map(Command::Append)
            .map_err(|e| {
                let at = rest_start + e.span.start;
                ParseError::error(format!("invalid append fragment: {}", e.message), at..at, file_id)
            });
    }

    let tokens = tokenize(rest).map_err(err)?;
    let args: Vec<&Token> = tokens.iter().collect();

    let command = match (keyword, args.as_slice()) {
        ("sort" | "reversesort", [Token::Word(key)]) => {
            ElementPath::descendant(key).map_err(|e| err(e.to_string()))?;
            Command::Sort {
                key: key.clone(),
                descending: keyword == "reversesort",
            }
        }
        ("reverse", []) => Command::Reverse,
        ("keep", cond) => Command::Keep(parse_condition(cond).map_err(err)?),
        ("drop", cond) => Command::Drop(parse_condition(cond).map_err(err)?),
        ("limit", [Token::Word(n)]) => Command::Limit(parse_count(n).map_err(err)?),
        ("skip", [Token::Word(n)]) => Command::Skip(parse_count(n).map_err(err)?),
        ("set", [Token::Word(tag), Token::Str(value)]) => Command::SetText {
            tag: tag.clone(),
            value: value.clone(),
        },
        ("attr", [Token::Word(name), Token::Str(value)]) => Command::SetAttr {
            name: name.clone(),
            value: value.clone(),
        },
        ("remove", [Token::Word(tag)]) => Command::Remove(tag.clone()),
        ("emit", [Token::Str(text)]) => Command::Emit(text.clone()),
        ("print", [Token::Word(path)]) => Command::Print(parse_path(path).map_err(err)?),
        ("assert", [Token::Word(path)]) => Command::Assert(parse_path(path).map_err(err)?),
        (
            "sort" | "reversesort" | "reverse" | "limit" | "skip" | "set" | "attr" | "remove"
            | "emit" | "print" | "assert",
            _,
        ) => {
            return Err(err(format!("wrong arguments for '{}'", keyword))
                .with_note(usage(keyword).to_string()));
        }
        _ => return Err(err(format!("unknown statement '{}'", keyword))),
    };
    Ok(command)
}

fn usage(keyword: &str) -> &'static str {
    match keyword {
        "sort" => "usage: sort KEY",
        "reversesort" => "usage: reversesort KEY",
        "reverse" => "usage: reverse",
        "limit" => "usage: limit N",
        "skip" => "usage: skip N",
        "set" => "usage: set TAG \"value\"",
        "attr" => "usage: attr NAME \"value\"",
        "remove" => "usage: remove TAG",
        "emit" => "usage: emit \"text\"",
        "print" => "usage: print PATH",
        "assert" => "usage: assert PATH",
        _ => "",
    }
}

fn parse_condition(args: &[&Token]) -> Result<Condition, String> {
    match args {
        [Token::Word(path)] => Ok(Condition::Exists(parse_path(path)?)),
        [Token::Word(path), Token::Word(op), Token::Str(value)] if op == "=" => {
            Ok(Condition::Equals(parse_path(path)?, value.clone()))
        }
        [Token::Word(path), Token::Word(op), Token::Str(value)] if op == "contains" => {
            Ok(Condition::Contains(parse_path(path)?, value.clone()))
        }
        _ => Err("expected PATH, PATH = \"value\" or PATH contains \"value\"".into()),
    }
}

fn parse_path(path: &str) -> Result<ElementPath, String> {
    ElementPath::parse(path).map_err(|e| e.to_string())
}

fn parse_count(text: &str) -> Result<usize, String> {
    text.parse::<usize>()
        .map_err(|_| format!("expected a non-negative number, found '{}'", text))
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(other) => return Err(format!("unknown escape '\\{}'", other)),
                        None => return Err("unterminated string literal".into()),
                    },
                    Some(other) => value.push(other),
                    None => return Err("unterminated string literal".into()),
                }
            }
            tokens.push(Token::Str(value));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    Ok(tokens)
}
