//! Lexer and S-expression reader.
//!
//! Source text is tokenized into parentheses and atoms (with `;` line
//! comments skipped and 1-based lines tracked), then folded into a tree of
//! [`SExpr`] nodes. The reader is re-entrant: later stages feed serialized
//! sub-expressions back through [`parse`] to recover their structure.

use crate::parsing::input::Input;
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// A leaf of the syntax tree: one atom and the line it starts on.
#[derive(Clone)]
pub struct SAtom {
    text: String,
    line: u32,
    source: Arc<Input>,
}

impl SAtom {
    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn invalid(&self, message: impl Into<String>) -> ErrLoc {
        ErrLoc::new(self.source.label(), self.line, message)
    }
}

impl Display for SAtom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[derive(Clone)]
pub struct SList {
    items: Vec<SExpr>,
    line: u32,
    source: Arc<Input>,
}

impl SList {
    pub fn iter(&self) -> ListIter<'_> {
        ListIter {
            items: self.items.as_slice(),
            line: self.line,
            source: &self.source,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

#[derive(Clone)]
pub enum SExpr {
    Atom(SAtom),
    List(SList),
}

impl SExpr {
    pub fn line(&self) -> u32 {
        match self {
            SExpr::Atom(a) => a.line,
            SExpr::List(l) => l.line,
        }
    }

    pub fn as_atom(&self) -> Option<&SAtom> {
        match self {
            SExpr::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&SList> {
        match self {
            SExpr::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_iter(&self) -> Option<ListIter<'_>> {
        self.as_list().map(SList::iter)
    }

    pub fn is_atom(&self, expected: &str) -> bool {
        self.as_atom().is_some_and(|a| a.as_str() == expected)
    }

    /// If this expression is a list whose head atom is `tag`, returns the
    /// remaining elements.
    pub fn as_application(&self, tag: &str) -> Option<&[SExpr]> {
        match self {
            SExpr::Atom(_) => None,
            SExpr::List(l) => match l.items.as_slice() {
                [head, rest @ ..] if head.is_atom(tag) => Some(rest),
                _ => None,
            },
        }
    }

    pub fn invalid(&self, message: impl Into<String>) -> ErrLoc {
        let source = match self {
            SExpr::Atom(a) => &a.source,
            SExpr::List(l) => &l.source,
        };
        ErrLoc::new(source.label(), self.line(), message)
    }
}

impl Display for SExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Atom(a) => write!(f, "{}", a.text),
            SExpr::List(l) => write!(f, "({})", l.items.iter().format(" ")),
        }
    }
}

impl Debug for SExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// A parse or build error located in its source: label, 1-based line, message
/// and a stack of context descriptions added on the way out.
pub struct ErrLoc {
    context: Vec<String>,
    message: String,
    label: String,
    line: u32,
}

impl ErrLoc {
    pub fn new(label: impl Into<String>, line: u32, message: impl Into<String>) -> ErrLoc {
        ErrLoc {
            context: Vec::new(),
            message: message.into(),
            label: label.into(),
            line,
        }
    }

    pub fn failed<T>(self) -> Result<T, ErrLoc> {
        Err(self)
    }
}

impl Display for ErrLoc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for context in self.context.iter().rev() {
            writeln!(f, "{context}")?;
        }
        write!(f, "{}:{}: {}", self.label, self.line, self.message)
    }
}

impl Debug for ErrLoc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for ErrLoc {}

/// Extension trait to push context onto a located error.
pub trait Ctx<T> {
    fn ctx(self, context: impl Display) -> Result<T, ErrLoc>;
}

impl<T> Ctx<T> for Result<T, ErrLoc> {
    fn ctx(self, context: impl Display) -> Result<T, ErrLoc> {
        self.map_err(|mut e| {
            e.context.push(context.to_string());
            e
        })
    }
}

/// Borrowing iterator over the elements of an [`SList`], with helpers that
/// turn "ran out of elements" and "wrong node kind" into located errors.
pub struct ListIter<'a> {
    items: &'a [SExpr],
    line: u32,
    source: &'a Arc<Input>,
}

impl<'a> ListIter<'a> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn peek(&self) -> Option<&'a SExpr> {
        self.items.first()
    }

    /// An error located at the opening parenthesis of the underlying list.
    pub fn invalid(&self, message: impl Into<String>) -> ErrLoc {
        ErrLoc::new(self.source.label(), self.line, message)
    }

    pub fn pop(&mut self) -> Result<&'a SExpr, ErrLoc> {
        self.next().ok_or_else(|| self.invalid("unexpected end of list"))
    }

    pub fn pop_atom(&mut self) -> Result<&'a SAtom, ErrLoc> {
        match self.next() {
            None => self.invalid("expected an atom but got the end of the list").failed(),
            Some(e) => e.as_atom().ok_or_else(|| e.invalid("expected an atom")),
        }
    }

    pub fn pop_list(&mut self) -> Result<&'a SList, ErrLoc> {
        match self.next() {
            None => self.invalid("expected a list but got the end of the list").failed(),
            Some(e) => e.as_list().ok_or_else(|| e.invalid("expected a list")),
        }
    }

    pub fn pop_known_atom(&mut self, expected: &str) -> Result<(), ErrLoc> {
        let atom = self
            .pop_atom()
            .ctx(format!("expected the atom `{expected}`"))?;
        if atom.as_str() == expected {
            Ok(())
        } else {
            atom.invalid(format!("expected the atom `{expected}`")).failed()
        }
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a SExpr;

    fn next(&mut self) -> Option<Self::Item> {
        let (head, tail) = self.items.split_first()?;
        self.items = tail;
        Some(head)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Open { line: u32 },
    Close { line: u32 },
    Atom { start: usize, end: usize, line: u32 },
}

/// Splits the input into tokens. Returns the tokens and the line reached at
/// the end of the input, used to locate end-of-file errors.
fn tokenize(text: &str) -> (Vec<Token>, u32) {
    let mut tokens = Vec::new();
    let mut line: u32 = 1;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            ';' => {
                // comment runs to the end of the line; the newline itself is
                // left for the outer loop so the count stays correct
                while chars.next_if(|&(_, c)| c != '\n').is_some() {}
            }
            '(' => tokens.push(Token::Open { line }),
            ')' => tokens.push(Token::Close { line }),
            _ => {
                // maximal run of characters that are neither whitespace nor
                // parentheses; a `;` inside the run stays part of the atom
                let mut end = i + c.len_utf8();
                while let Some(&(j, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    end = j + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Atom { start: i, end, line });
            }
        }
    }
    (tokens, line)
}

fn read(
    tokens: &mut std::iter::Peekable<std::slice::Iter<'_, Token>>,
    src: &Arc<Input>,
    eof_line: u32,
) -> Result<SExpr, ErrLoc> {
    match tokens.next() {
        None => ErrLoc::new(src.label(), eof_line, "unexpected end of file").failed(),
        Some(&Token::Close { line }) => ErrLoc::new(src.label(), line, "unexpected ')'").failed(),
        Some(&Token::Atom { start, end, line }) => Ok(SExpr::Atom(SAtom {
            text: src.text[start..end].to_string(),
            line,
            source: src.clone(),
        })),
        Some(&Token::Open { line }) => {
            let mut items = Vec::new();
            loop {
                match tokens.peek() {
                    None => {
                        return ErrLoc::new(src.label(), eof_line, "unclosed '('").failed();
                    }
                    Some(Token::Close { .. }) => {
                        tokens.next();
                        return Ok(SExpr::List(SList {
                            items,
                            line,
                            source: src.clone(),
                        }));
                    }
                    Some(_) => items.push(read(tokens, src, eof_line)?),
                }
            }
        }
    }
}

/// Reads one S-expression from the input. Content after the first complete
/// expression is ignored.
pub fn parse(input: impl Into<Input>) -> Result<SExpr, ErrLoc> {
    let src = Arc::new(input.into());
    let (tokens, eof_line) = tokenize(&src.text);
    let mut tokens = tokens.iter().peekable();
    read(&mut tokens, &src, eof_line)
}
