//! Hybrid world state: a set of ground facts plus integer fluents.
//!
//! Facts compare by predicate name and exact argument-name sequence. Fluents
//! are keyed by their canonical `name(arg1,arg2,...)` form and default to 0
//! when unset. The state also owns predicate evaluation (negation tag,
//! numeric comparisons, fact queries) and the canonical search key used to
//! de-duplicate the planner's frontier.

use crate::parsing::input::Input;
use crate::parsing::pddl::{parse_integer, Predicate};
use crate::parsing::sexpr::{self, SExpr};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Default)]
pub struct WorldState {
    facts: Vec<Predicate>,
    fluents: BTreeMap<String, i64>,
}

fn matches(fact: &Predicate, name: &str, args: &[&str]) -> bool {
    fact.name == name
        && fact.args.len() == args.len()
        && fact.args.iter().zip(args).all(|(term, arg)| term.name == *arg)
}

impl WorldState {
    pub fn new() -> WorldState {
        WorldState::default()
    }

    /// True if a fact with this name and exactly these argument names is set.
    pub fn holds(&self, name: &str, args: &[&str]) -> bool {
        self.facts.iter().any(|f| matches(f, name, args))
    }

    /// Adds a fact. No-op when an equal fact is already present.
    pub fn add(&mut self, fact: Predicate) {
        if !self.holds(&fact.name, &fact.arg_names()) {
            self.facts.push(fact);
        }
    }

    /// Removes all facts matching the name and argument names.
    pub fn remove(&mut self, name: &str, args: &[&str]) {
        self.facts.retain(|f| !matches(f, name, args));
    }

    pub fn facts(&self) -> &[Predicate] {
        &self.facts
    }

    /// Value of a fluent; unset keys read as 0.
    pub fn get_fluent(&self, key: &str) -> i64 {
        self.fluents.get(key).copied().unwrap_or(0)
    }

    pub fn set_fluent(&mut self, key: impl Into<String>, value: i64) {
        self.fluents.insert(key.into(), value);
    }

    pub fn has_fluent(&self, key: &str) -> bool {
        self.fluents.contains_key(key)
    }

    pub fn fluents(&self) -> &BTreeMap<String, i64> {
        &self.fluents
    }

    /// Evaluates one predicate against this state.
    ///
    /// A `not:` prefix inverts the evaluation of the stripped predicate, the
    /// comparison operators compare the numeric value of their two arguments
    /// (anything else than two arguments evaluates to false), every other
    /// name is a fact query.
    pub fn evaluates(&self, p: &Predicate) -> bool {
        if let Some(stripped) = p.name.strip_prefix("not:") {
            let inner = Predicate {
                name: stripped.to_string(),
                args: p.args.clone(),
                line: p.line,
            };
            return !self.evaluates(&inner);
        }
        match p.name.as_str() {
            "=" => self.compare(p, Ordering::is_eq),
            "<" => self.compare(p, Ordering::is_lt),
            "<=" => self.compare(p, Ordering::is_le),
            ">" => self.compare(p, Ordering::is_gt),
            ">=" => self.compare(p, Ordering::is_ge),
            _ => self.holds(&p.name, &p.arg_names()),
        }
    }

    fn compare(&self, p: &Predicate, test: impl Fn(Ordering) -> bool) -> bool {
        match p.args.as_slice() {
            [lhs, rhs] => test(self.eval_numeric(&lhs.name).cmp(&self.eval_numeric(&rhs.name))),
            _ => false,
        }
    }

    /// Tolerant numeric evaluation, used on the precondition side: an integer
    /// literal evaluates to itself, a serialized function call to the value
    /// of the corresponding fluent (0 when unset), anything else to 0.
    pub fn eval_numeric(&self, expr: &str) -> i64 {
        if let Some(value) = parse_integer(expr) {
            return value;
        }
        if expr.starts_with('(') {
            if let Ok(parsed) = sexpr::parse(Input::with_label(expr, "<eval>")) {
                if let Some(key) = fluent_key(&parsed) {
                    return self.get_fluent(&key);
                }
            }
        }
        0
    }

    pub fn is_goal_reached(&self, goals: &[Predicate]) -> bool {
        goals.iter().all(|g| self.evaluates(g))
    }

    /// Canonical string for frontier de-duplication: fluents in ascending key
    /// order as `key=value;` (integer-divided by `bucket_size` when it is
    /// positive), followed by the sorted facts as `name,arg1,...;`.
    ///
    /// Division truncates toward zero, so with a positive bucket size the
    /// slab containing zero spans `-(b-1)..=b-1`.
    pub fn key(&self, bucket_size: i64) -> String {
        let mut out = String::new();
        for (key, value) in &self.fluents {
            let bucketed = if bucket_size > 0 { value / bucket_size } else { *value };
            out.push_str(&format!("{key}={bucketed};"));
        }
        let mut facts: Vec<String> = self
            .facts
            .iter()
            .map(|f| {
                let mut s = f.name.clone();
                for arg in &f.args {
                    s.push(',');
                    s.push_str(&arg.name);
                }
                s
            })
            .collect();
        facts.sort_unstable();
        for fact in &facts {
            out.push_str(fact);
            out.push(';');
        }
        out
    }
}

impl PartialEq for WorldState {
    fn eq(&self, other: &Self) -> bool {
        // both fact lists are duplicate-free, so same size + inclusion is
        // set equality
        self.fluents == other.fluents
            && self.facts.len() == other.facts.len()
            && self
                .facts
                .iter()
                .all(|f| other.holds(&f.name, &f.arg_names()))
    }
}

impl Display for WorldState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "  Fluents:")?;
        for (key, value) in &self.fluents {
            write!(f, "\n    {key} = {value}")?;
        }
        write!(f, "\n  Facts:")?;
        for fact in &self.facts {
            write!(f, "\n    {fact}")?;
        }
        Ok(())
    }
}

/// Canonical fluent key of a parsed function call: `(money alice)` gives
/// `money(alice)`, `(x)` gives `x()`.
pub(crate) fn fluent_key(expr: &SExpr) -> Option<String> {
    let mut items = expr.as_list_iter()?;
    let head = items.next()?.as_atom()?;
    let args: Vec<String> = items
        .map(|e| match e.as_atom() {
            Some(atom) => atom.as_str().to_string(),
            None => e.to_string(),
        })
        .collect();
    Some(format!("{}({})", head.as_str(), args.join(",")))
}
