//! Element paths: the subset of ElementPath syntax used by directives and
//! scripts to locate records.
//!
//! Supported: `.`, `tag`, `*`, `{uri}tag`, `prefix:tag`, child steps (`a/b`),
//! descendant steps (`.//a`), and the predicates `[@attr]`, `[@attr='v']`,
//! `[tag]`, `[tag='v']`, `[N]`, `[last()]` and `[last()-N]`.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::document::{Element, QName};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("absolute paths are not supported: '{0}'")]
    Absolute(String),
    #[error("parent steps are not supported: '{0}'")]
    Parent(String),
    #[error("missing step after '//' in '{0}'")]
    MissingStep(String),
    #[error("unterminated predicate in '{0}'")]
    UnterminatedPredicate(String),
    #[error("invalid predicate '[{predicate}]' in '{path}'")]
    InvalidPredicate { path: String, predicate: String },
    #[error("invalid name test '{name}' in '{path}'")]
    InvalidName { path: String, name: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Axis {
    SelfNode,
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
enum NameTest {
    Any,
    Local(String),
    Namespaced { namespace: String, local: String },
}

impl NameTest {
    fn matches(&self, name: &QName) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Local(local) => name.local == *local,
            NameTest::Namespaced { namespace, local } => name.is(namespace, local),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    HasAttr(String),
    AttrEquals(String, String),
    HasChild(NameTest),
    ChildEquals(NameTest, String),
    /// 1-based position among the matches sharing a parent.
    Position(usize),
    /// `last()` minus an offset.
    FromLast(usize),
}

impl Predicate {
    fn holds(&self, element: &Element) -> bool {
        match self {
            Predicate::HasAttr(name) => element.attr(name).is_some(),
            Predicate::AttrEquals(name, value) => element.attr(name) == Some(value.as_str()),
            Predicate::HasChild(test) => element.children.iter().any(|c| test.matches(&c.name)),
            Predicate::ChildEquals(test, value) => element
                .children
                .iter()
                .any(|c| test.matches(&c.name) && c.text.as_deref().unwrap_or("") == value),
            Predicate::Position(_) | Predicate::FromLast(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

/// A compiled element path.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementPath {
    source: String,
    steps: Vec<Step>,
}

/// Candidate match paired with the number of its sibling group. Matches
/// sharing a parent share a group; positional predicates count within it.
type Candidate<'a> = (usize, &'a Element);

impl ElementPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        if trimmed.starts_with('/') {
            return Err(PathError::Absolute(path.to_string()));
        }
        let body = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let mut steps = Vec::new();
        let mut descendant = false;
        for segment in split_segments(body, path)? {
            if segment.is_empty() {
                if descendant {
                    return Err(PathError::MissingStep(path.to_string()));
                }
                descendant = true;
                continue;
            }
            let (name, predicates) = split_predicates(segment, path)?;
            let step = match name {
                "." if !descendant => Step {
                    axis: Axis::SelfNode,
                    test: NameTest::Any,
                    predicates,
                },
                ".." => return Err(PathError::Parent(path.to_string())),
                _ => Step {
                    axis: if descendant { Axis::Descendant } else { Axis::Child },
                    test: parse_name_test(name, path)?,
                    predicates,
                },
            };
            descendant = false;
            steps.push(step);
        }
        if descendant {
            return Err(PathError::MissingStep(path.to_string()));
        }

        Ok(ElementPath {
            source: path.to_string(),
            steps,
        })
    }

    /// `.//name`: every descendant called `name`.
    pub fn descendant(name: &str) -> Result<Self, PathError> {
        ElementPath::parse(&format!(".//{}", name))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// All matches below (or at) `root`, in document order.
    pub fn select<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let mut current: Vec<&'a Element> = vec![root];
        for step in &self.steps {
            let mut candidates: Vec<Candidate<'a>> = Vec::new();
            let mut groups = 0;
            for context in &current {
                match step.axis {
                    Axis::SelfNode => {
                        candidates.push((groups, *context));
                        groups += 1;
                    }
                    Axis::Child => {
                        collect_children(context, &step.test, groups, &mut candidates);
                        groups += 1;
                    }
                    Axis::Descendant => {
                        collect_matching(context, &step.test, &mut groups, &mut candidates)
                    }
                }
            }
            let mut candidates = dedup(candidates);
            for predicate in &step.predicates {
                candidates = filter(candidates, predicate);
            }
            current = candidates.into_iter().map(|(_, e)| e).collect();
        }
        current
    }

    pub fn first<'a>(&self, root: &'a Element) -> Option<&'a Element> {
        self.select(root).into_iter().next()
    }

    pub fn first_text<'a>(&self, root: &'a Element) -> Option<&'a str> {
        self.first(root).map(|e| e.text.as_deref().unwrap_or(""))
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn collect_children<'a>(parent: &'a Element, test: &NameTest, group: usize, out: &mut Vec<Candidate<'a>>) {
    for child in &parent.children {
        if test.matches(&child.name) {
            out.push((group, child));
        }
    }
}

/// Every matching descendant of `element`, each parent opening a new group.
fn collect_matching<'a>(element: &'a Element, test: &NameTest, groups: &mut usize, out: &mut Vec<Candidate<'a>>) {
    collect_children(element, test, *groups, out);
    *groups += 1;
    for child in &element.children {
        collect_matching(child, test, groups, out);
    }
}

/// Drop repeated matches, which nested descendant contexts can produce.
fn dedup(candidates: Vec<Candidate<'_>>) -> Vec<Candidate<'_>> {
    let mut kept: Vec<Candidate<'_>> = Vec::with_capacity(candidates.len());
    for (group, element) in candidates {
        if !kept.iter().any(|(_, seen)| std::ptr::eq(*seen, element)) {
            kept.push((group, element));
        }
    }
    kept
}

fn filter<'a>(candidates: Vec<Candidate<'a>>, predicate: &Predicate) -> Vec<Candidate<'a>> {
    match predicate {
        Predicate::Position(_) | Predicate::FromLast(_) => {
            let mut totals: HashMap<usize, usize> = HashMap::new();
            for (group, _) in &candidates {
                *totals.entry(*group).or_default() += 1;
            }
            let mut seen: HashMap<usize, usize> = HashMap::new();
            let mut kept = Vec::new();
            for (group, element) in candidates {
                let position = seen.entry(group).or_default();
                *position += 1;
                let total = totals[&group];
                let wanted = match predicate {
                    Predicate::Position(n) => *n,
                    Predicate::FromLast(offset) if *offset < total => total - offset,
                    _ => continue,
                };
                if *position == wanted {
                    kept.push((group, element));
                }
            }
            kept
        }
        _ => candidates
            .into_iter()
            .filter(|(_, e)| predicate.holds(e))
            .collect(),
    }
}

/// Split on `/` outside predicates, quotes and `{uri}` prefixes.
fn split_segments<'p>(body: &'p str, path: &str) -> Result<Vec<&'p str>, PathError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth > 0 => quote = Some(c),
            (None, '{') if depth == 0 => quote = Some('}'),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                segments.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth > 0 || quote.is_some() {
        return Err(PathError::UnterminatedPredicate(path.to_string()));
    }
    segments.push(&body[start..]);
    Ok(segments)
}

fn split_predicates<'s>(segment: &'s str, path: &str) -> Result<(&'s str, Vec<Predicate>), PathError> {
    let Some(open) = segment.find('[') else {
        return Ok((segment, Vec::new()));
    };
    let name = &segment[..open];
    let mut predicates = Vec::new();
    let mut rest = &segment[open..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(PathError::InvalidPredicate {
                path: path.to_string(),
                predicate: rest.to_string(),
            });
        }
        let close = find_close(rest).ok_or_else(|| PathError::UnterminatedPredicate(path.to_string()))?;
        predicates.push(parse_predicate(&rest[1..close], path)?);
        rest = &rest[close + 1..];
    }
    Ok((name, predicates))
}

fn find_close(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_predicate(inner: &str, path: &str) -> Result<Predicate, PathError> {
    let invalid = || PathError::InvalidPredicate {
        path: path.to_string(),
        predicate: inner.to_string(),
    };
    let inner = inner.trim();

    if let Some(attr) = inner.strip_prefix('@') {
        return match attr.split_once('=') {
            Some((name, value)) => Ok(Predicate::AttrEquals(
                name.trim().to_string(),
                unquote(value).ok_or_else(invalid)?,
            )),
            None if !attr.trim().is_empty() => Ok(Predicate::HasAttr(attr.trim().to_string())),
            None => Err(invalid()),
        };
    }

    if let Ok(position) = inner.parse::<usize>() {
        return if position == 0 {
            Err(invalid())
        } else {
            Ok(Predicate::Position(position))
        };
    }

    if let Some(rest) = inner.strip_prefix("last()") {
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(Predicate::FromLast(0));
        }
        let offset = rest
            .strip_prefix('-')
            .and_then(|n| n.trim().parse::<usize>().ok())
            .ok_or_else(invalid)?;
        return Ok(Predicate::FromLast(offset));
    }

    match inner.split_once('=') {
        Some((name, value)) => Ok(Predicate::ChildEquals(
            parse_name_test(name.trim(), path)?,
            unquote(value).ok_or_else(invalid)?,
        )),
        None if !inner.is_empty() => Ok(Predicate::HasChild(parse_name_test(inner, path)?)),
        None => Err(invalid()),
    }
}

fn unquote(value: &str) -> Option<String> {
    let value = value.trim();
    let quote = value.chars().next()?;
    if (quote == '\'' || quote == '"') && value.len() >= 2 && value.ends_with(quote) {
        Some(value[1..value.len() - 1].to_string())
    } else {
        None
    }
}

fn parse_name_test(name: &str, path: &str) -> Result<NameTest, PathError> {
    let invalid = || PathError::InvalidName {
        path: path.to_string(),
        name: name.to_string(),
    };
    if name == "*" {
        return Ok(NameTest::Any);
    }
    if let Some(rest) = name.strip_prefix('{') {
        let (namespace, local) = rest.split_once('}').ok_or_else(invalid)?;
        if !is_name(local) {
            return Err(invalid());
        }
        return Ok(NameTest::Namespaced {
            namespace: namespace.to_string(),
            local: local.to_string(),
        });
    }
    let local = match name.split_once(':') {
        Some((prefix, local)) if is_name(prefix) => local,
        Some(_) => return Err(invalid()),
        None => name,
    };
    if is_name(local) {
        Ok(NameTest::Local(local.to_string()))
    } else {
        Err(invalid())
    }
}

fn is_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !text.starts_with(['-', '.'])
}
