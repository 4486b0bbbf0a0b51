//! PDDL abstract syntax and the CST → AST builders.
//!
//! The builders recognize the tagged forms of the supported PDDL subset
//! (`define`, `domain`, `problem`, `:action`, `:init`, `:goal`, ...) and
//! produce [`Domain`] and [`Problem`] records. A predicate argument that is
//! itself a list (e.g. `(money ?a)` inside `(>= (money ?a) 10000)`) is
//! serialized back to source text and kept as an atomic [`Term`]; the
//! grounder and the effect applier re-parse such terms on demand.

use crate::classical::state::WorldState;
use crate::parsing::input::Input;
use crate::parsing::sexpr::{parse, Ctx, ErrLoc, SExpr};
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Argument list of a predicate. Most predicates take one or two arguments.
pub type Args = SmallVec<[Term; 2]>;

/// A variable (`?x`), a constant (`block-a`), or a serialized sub-expression
/// (`(money ?a)`) kept atomic for uniform handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub name: String,
    pub is_variable: bool,
}

impl Term {
    pub fn new(name: impl Into<String>) -> Term {
        let name = name.into();
        Term {
            is_variable: name.starts_with('?'),
            name,
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A predicate application such as `(on ?x ?y)` or `(>= (money ?a) 10000)`.
///
/// Besides ordinary symbols the name can be a comparison operator or carry
/// the `not:` prefix produced for negated preconditions and goals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub name: String,
    pub args: Args,
    /// Source line, for error reporting.
    pub line: u32,
}

impl Predicate {
    pub fn arg_names(&self) -> Vec<&str> {
        self.args.iter().map(|t| t.name.as_str()).collect()
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Increase,
    Decrease,
    Assign,
}

impl Display for NumericOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NumericOp::Increase => "increase",
            NumericOp::Decrease => "decrease",
            NumericOp::Assign => "assign",
        };
        write!(f, "{name}")
    }
}

/// One effect of an action, classified at build time.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Assert a ground fact.
    Add(Predicate),
    /// Delete all matching facts, from `(not (P ...))`.
    Delete(Predicate),
    /// Mutate a fluent: `(increase (money ?a) 100)` and friends. `target` is
    /// a serialized fluent reference, `amount` a literal or a serialized
    /// fluent reference.
    Numeric {
        op: NumericOp,
        target: Term,
        amount: Term,
    },
    /// `(when condition effect)`: apply `effect` only if `condition` holds in
    /// the in-progress state.
    When {
        condition: Predicate,
        effect: Box<Effect>,
    },
}

/// An action schema: parameters are variables to be substituted by objects.
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub cost: i64,
    pub parameters: Vec<Term>,
    pub preconditions: Vec<Predicate>,
    pub effects: Vec<Effect>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct Domain {
    pub name: String,
    /// Requirement flags, collected verbatim and not acted upon.
    pub requirements: Vec<String>,
    /// Declared predicate signatures, collected verbatim and not verified.
    pub predicates: Vec<Predicate>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    pub domain_name: String,
    pub objects: Vec<String>,
    /// Raw initial facts; `(= (f ...) N)` entries are turned into fluents by
    /// the grounder's initial-state construction.
    pub init: WorldState,
    pub goal: Vec<Predicate>,
}

pub fn parse_pddl_domain(input: impl Into<Input>) -> Result<Domain, ErrLoc> {
    let root = parse(input)?;
    read_domain(&root).ctx("invalid domain")
}

pub fn parse_pddl_problem(input: impl Into<Input>) -> Result<Problem, ErrLoc> {
    let root = parse(input)?;
    read_problem(&root).ctx("invalid problem")
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ErrLoc),
}

pub fn load_domain(path: impl AsRef<Path>) -> Result<Domain, LoadError> {
    let path = path.as_ref();
    let input = Input::from_file(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_pddl_domain(input)?)
}

pub fn load_problem(path: impl AsRef<Path>) -> Result<Problem, LoadError> {
    let path = path.as_ref();
    let input = Input::from_file(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_pddl_problem(input)?)
}

/// Recognizes an integer literal: an optional leading `-` followed by digits.
pub(crate) fn parse_integer(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Extracts `NAME` from a `(tag NAME)` header expression.
fn header_name(e: &SExpr, tag: &str) -> Result<String, ErrLoc> {
    e.as_application(tag)
        .and_then(|args| args.first())
        .and_then(SExpr::as_atom)
        .map(|a| a.as_str().to_string())
        .ok_or_else(|| e.invalid(format!("expected ({tag} NAME)")))
}

fn read_domain(root: &SExpr) -> Result<Domain, ErrLoc> {
    let body = root
        .as_application("define")
        .ok_or_else(|| root.invalid("expected (define ...)"))?;
    let header = body
        .first()
        .ok_or_else(|| root.invalid("expected (domain NAME)"))?;
    let mut domain = Domain {
        name: header_name(header, "domain")?,
        requirements: Vec::new(),
        predicates: Vec::new(),
        actions: Vec::new(),
    };

    for section in &body[1..] {
        let Some(mut items) = section.as_list_iter() else {
            continue;
        };
        let Some(tag) = items.next().and_then(SExpr::as_atom) else {
            continue;
        };
        match tag.as_str() {
            ":requirements" => {
                for flag in items {
                    domain.requirements.push(flag.to_string());
                }
            }
            ":predicates" => {
                for signature in items {
                    domain.predicates.push(parse_predicate(signature)?);
                }
            }
            ":action" => {
                let name = match items.pop_atom() {
                    Ok(name) => name.as_str().to_string(),
                    Err(_) => return section.invalid(":action too short").failed(),
                };
                let mut action = Action {
                    name,
                    cost: 1,
                    parameters: Vec::new(),
                    preconditions: Vec::new(),
                    effects: Vec::new(),
                    line: section.line(),
                };
                while !items.is_empty() {
                    let key = items.pop_atom()?;
                    let value = items
                        .pop()
                        .ctx(format!("missing value for `{}`", key.as_str()))?;
                    match key.as_str() {
                        ":parameters" => action.parameters = parse_parameters(value)?,
                        ":precondition" => action.preconditions = parse_conjunction(value)?,
                        ":effect" => action.effects = parse_effects(value)?,
                        ":cost" => {
                            action.cost = value
                                .as_atom()
                                .and_then(|a| parse_integer(a.as_str()))
                                .ok_or_else(|| value.invalid("expected an integer cost"))?;
                        }
                        // unrecognized keys are skipped
                        _ => {}
                    }
                }
                domain.actions.push(action);
            }
            // :types, :constants, :functions, :derived and anything else
            _ => {}
        }
    }
    Ok(domain)
}

fn read_problem(root: &SExpr) -> Result<Problem, ErrLoc> {
    let body = root
        .as_application("define")
        .ok_or_else(|| root.invalid("expected (define ...)"))?;
    let header = body
        .first()
        .ok_or_else(|| root.invalid("expected (problem NAME)"))?;
    let mut problem = Problem {
        name: header_name(header, "problem")?,
        domain_name: String::new(),
        objects: Vec::new(),
        init: WorldState::new(),
        goal: Vec::new(),
    };

    for section in &body[1..] {
        let Some(mut items) = section.as_list_iter() else {
            continue;
        };
        let Some(tag) = items.next().and_then(SExpr::as_atom) else {
            continue;
        };
        match tag.as_str() {
            ":domain" => problem.domain_name = items.pop_atom()?.as_str().to_string(),
            ":objects" => {
                while let Some(item) = items.next() {
                    if item.is_atom("-") {
                        // type annotation, discarded
                        items.next();
                        continue;
                    }
                    let object = item
                        .as_atom()
                        .ok_or_else(|| item.invalid("expected an object name"))?;
                    problem.objects.push(object.as_str().to_string());
                }
            }
            ":init" => {
                for fact in items {
                    problem.init.add(parse_predicate(fact)?);
                }
            }
            ":goal" => {
                if let Some(goal) = items.next() {
                    problem.goal = parse_conjunction(goal)?;
                }
            }
            _ => {}
        }
    }
    Ok(problem)
}

/// Parses a `:parameters` list, skipping `- type` annotations the same way
/// `:objects` does. [`Term::new`] flags the `?`-prefixed names as variables.
fn parse_parameters(e: &SExpr) -> Result<Vec<Term>, ErrLoc> {
    let mut items = e
        .as_list_iter()
        .ok_or_else(|| e.invalid("expected a parameter list"))?;
    let mut parameters = Vec::new();
    while let Some(item) = items.next() {
        if item.is_atom("-") {
            // type annotation, discarded
            items.next();
            continue;
        }
        let name = item
            .as_atom()
            .ok_or_else(|| item.invalid("expected a parameter name"))?;
        parameters.push(Term::new(name.as_str()));
    }
    Ok(parameters)
}

fn parse_term(e: &SExpr) -> Term {
    match e.as_atom() {
        Some(atom) => Term::new(atom.as_str()),
        // list argument: keep the serialized form as an atomic term
        None => Term {
            name: e.to_string(),
            is_variable: false,
        },
    }
}

fn parse_predicate(e: &SExpr) -> Result<Predicate, ErrLoc> {
    match e {
        SExpr::Atom(atom) => Ok(Predicate {
            name: atom.as_str().to_string(),
            args: Args::new(),
            line: atom.line(),
        }),
        SExpr::List(list) => {
            let mut items = list.iter();
            let head = items
                .pop()
                .map_err(|_| e.invalid("expected predicate list"))?;
            let name = match head.as_atom() {
                Some(atom) => atom.as_str().to_string(),
                None => head.to_string(),
            };
            Ok(Predicate {
                name,
                args: items.map(parse_term).collect(),
                line: list.line(),
            })
        }
    }
}

/// Parses one predicate, rewriting `(not (P ...))` to a predicate named
/// `not:P` with the same arguments.
fn parse_literal(e: &SExpr) -> Result<Predicate, ErrLoc> {
    if let Some(inner) = e.as_application("not") {
        let [pred] = inner else {
            return e.invalid("(not ...) expects exactly one predicate").failed();
        };
        let mut p = parse_predicate(pred)?;
        p.name = format!("not:{}", p.name);
        Ok(p)
    } else {
        parse_predicate(e)
    }
}

/// Parses `P`, `()` or `(and P1 P2 ...)` into a conjunction of predicates.
/// Used for preconditions, goals and `when` conditions.
fn parse_conjunction(e: &SExpr) -> Result<Vec<Predicate>, ErrLoc> {
    if let Some(conjuncts) = e.as_application("and") {
        conjuncts.iter().map(parse_literal).collect()
    } else if e.as_list().is_some_and(|l| l.is_empty()) {
        Ok(Vec::new())
    } else {
        Ok(vec![parse_literal(e)?])
    }
}

fn parse_effects(e: &SExpr) -> Result<Vec<Effect>, ErrLoc> {
    if let Some(effects) = e.as_application("and") {
        effects.iter().map(parse_effect).collect()
    } else if e.as_list().is_some_and(|l| l.is_empty()) {
        Ok(Vec::new())
    } else {
        Ok(vec![parse_effect(e)?])
    }
}

fn parse_effect(e: &SExpr) -> Result<Effect, ErrLoc> {
    if let Some(inner) = e.as_application("not") {
        let [pred] = inner else {
            return e.invalid("(not ...) expects exactly one predicate").failed();
        };
        Ok(Effect::Delete(parse_predicate(pred)?))
    } else if let Some(args) = e.as_application("increase") {
        numeric_effect(NumericOp::Increase, args, e)
    } else if let Some(args) = e.as_application("decrease") {
        numeric_effect(NumericOp::Decrease, args, e)
    } else if let Some(args) = e.as_application("assign") {
        numeric_effect(NumericOp::Assign, args, e)
    } else if let Some(args) = e.as_application("when") {
        let [condition, effect] = args else {
            return e
                .invalid("(when ...) expects a condition and an effect")
                .failed();
        };
        Ok(Effect::When {
            condition: parse_literal(condition)?,
            effect: Box::new(parse_effect(effect)?),
        })
    } else {
        Ok(Effect::Add(parse_predicate(e)?))
    }
}

fn numeric_effect(op: NumericOp, args: &[SExpr], e: &SExpr) -> Result<Effect, ErrLoc> {
    let [target, amount] = args else {
        return e
            .invalid(format!("({op} ...) expects a fluent and an amount"))
            .failed();
    };
    Ok(Effect::Numeric {
        op,
        target: parse_term(target),
        amount: parse_term(amount),
    })
}
