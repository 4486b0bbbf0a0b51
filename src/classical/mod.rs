//! Grounding and execution of action schemas.
//!
//! Schemas are instantiated against the problem's objects (one ground action
//! per parameter/object tuple), with variables substituted textually in a
//! token-aware way so that serialized sub-expressions like `(money ?a)` are
//! rewritten correctly. This module also owns initial-state construction and
//! sequential effect application.

use crate::classical::state::{fluent_key, WorldState};
use crate::parsing::input::Input;
use crate::parsing::pddl::{parse_integer, Domain, Effect, NumericOp, Predicate, Problem, Term};
use crate::parsing::sexpr;
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub mod heuristics;
pub mod search;
pub mod state;

/// An instantiated, variable-free action.
#[derive(Debug, Clone)]
pub struct GroundAction {
    /// Display name, `schema(obj1,obj2,...)`.
    pub name: String,
    pub cost: i64,
    pub preconditions: Vec<Predicate>,
    pub effects: Vec<Effect>,
}

impl Display for GroundAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Hard failure while applying an effect. Unknown expressions on the
/// precondition side are tolerated (they read as 0); on the effect side they
/// indicate a malformed domain and abort.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("cannot evaluate numeric expression `{0}`")]
    UnknownExpression(String),
    #[error("`{0}` is not a fluent reference")]
    InvalidFluent(String),
}

/// Builds the search state from the problem's raw initial facts: every fact
/// `(= (func a ...) N)` with an integer `N` becomes the fluent
/// `func(a,...) = N`, everything else is kept as a symbolic fact.
pub fn build_initial_state(problem: &Problem) -> WorldState {
    let mut state = WorldState::new();
    for fact in problem.init.facts() {
        match fluent_assignment(fact) {
            Some((key, value)) => state.set_fluent(key, value),
            None => state.add(fact.clone()),
        }
    }
    state
}

fn fluent_assignment(fact: &Predicate) -> Option<(String, i64)> {
    if fact.name != "=" || fact.args.len() != 2 {
        return None;
    }
    let value = parse_integer(&fact.args[1].name)?;
    let expr = fact.args[0].name.as_str();
    if !expr.starts_with('(') {
        return None;
    }
    let parsed = sexpr::parse(Input::with_label(expr, "<init>")).ok()?;
    Some((fluent_key(&parsed)?, value))
}

/// Enumerates all ground actions of the domain over the problem's objects.
pub fn instantiate_actions(domain: &Domain, problem: &Problem) -> Vec<GroundAction> {
    let mut actions = Vec::new();
    for schema in &domain.actions {
        if schema.parameters.is_empty() {
            actions.push(GroundAction {
                name: format!("{}()", schema.name),
                cost: schema.cost,
                preconditions: schema.preconditions.clone(),
                effects: schema.effects.clone(),
            });
            continue;
        }
        for objects in (0..schema.parameters.len())
            .map(|_| problem.objects.iter())
            .multi_cartesian_product()
        {
            let bindings: Vec<(&str, &str)> = schema
                .parameters
                .iter()
                .zip(&objects)
                .map(|(param, object)| (param.name.as_str(), object.as_str()))
                .collect();
            actions.push(GroundAction {
                name: format!("{}({})", schema.name, objects.iter().join(",")),
                cost: schema.cost,
                preconditions: schema
                    .preconditions
                    .iter()
                    .map(|p| substitute_predicate(p, &bindings))
                    .collect(),
                effects: schema
                    .effects
                    .iter()
                    .map(|e| substitute_effect(e, &bindings))
                    .collect(),
            });
        }
    }
    actions
}

/// Replaces each bound variable in `s` by its object, but only at token
/// boundaries: an occurrence counts only when the characters immediately
/// before and after it are not alphanumeric. `?a -> alice` rewrites
/// `(money ?a)` but leaves `(money ?ab)` alone.
fn substitute(s: &str, bindings: &[(&str, &str)]) -> String {
    let mut result = s.to_string();
    for &(variable, object) in bindings {
        let mut rewritten = String::with_capacity(result.len());
        let mut copied = 0;
        for (pos, _) in result.match_indices(variable) {
            let before = result[..pos].chars().next_back();
            let after = result[pos + variable.len()..].chars().next();
            let at_boundary = !before.is_some_and(|c| c.is_ascii_alphanumeric())
                && !after.is_some_and(|c| c.is_ascii_alphanumeric());
            if at_boundary {
                rewritten.push_str(&result[copied..pos]);
                rewritten.push_str(object);
                copied = pos + variable.len();
            }
        }
        rewritten.push_str(&result[copied..]);
        result = rewritten;
    }
    result
}

fn substitute_term(term: &Term, bindings: &[(&str, &str)]) -> Term {
    Term {
        name: substitute(&term.name, bindings),
        is_variable: false,
    }
}

fn substitute_predicate(p: &Predicate, bindings: &[(&str, &str)]) -> Predicate {
    Predicate {
        name: p.name.clone(),
        args: p.args.iter().map(|t| substitute_term(t, bindings)).collect(),
        line: p.line,
    }
}

fn substitute_effect(effect: &Effect, bindings: &[(&str, &str)]) -> Effect {
    match effect {
        Effect::Add(p) => Effect::Add(substitute_predicate(p, bindings)),
        Effect::Delete(p) => Effect::Delete(substitute_predicate(p, bindings)),
        Effect::Numeric { op, target, amount } => Effect::Numeric {
            op: *op,
            target: substitute_term(target, bindings),
            amount: substitute_term(amount, bindings),
        },
        Effect::When { condition, effect } => Effect::When {
            condition: substitute_predicate(condition, bindings),
            effect: Box::new(substitute_effect(effect, bindings)),
        },
    }
}

/// True when every precondition evaluates to true in `state`.
pub fn is_applicable(action: &GroundAction, state: &WorldState) -> bool {
    action.preconditions.iter().all(|p| state.evaluates(p))
}

/// Applies all effects in order on a copy of `state`. Later effects observe
/// the changes of earlier ones; conditional effects are evaluated against the
/// in-progress state.
pub fn apply_action(action: &GroundAction, state: &WorldState) -> Result<WorldState, EvalError> {
    let mut next = state.clone();
    for effect in &action.effects {
        apply_effect(&mut next, effect)?;
    }
    Ok(next)
}

fn apply_effect(state: &mut WorldState, effect: &Effect) -> Result<(), EvalError> {
    match effect {
        Effect::Add(p) => {
            let fact = Predicate {
                name: p.name.clone(),
                args: p
                    .args
                    .iter()
                    .map(|t| Term {
                        name: t.name.clone(),
                        is_variable: false,
                    })
                    .collect(),
                line: p.line,
            };
            state.add(fact);
        }
        Effect::Delete(p) => state.remove(&p.name, &p.arg_names()),
        Effect::Numeric { op, target, amount } => {
            let key = fluent_target(&target.name)?;
            let value = eval_numeric_strict(state, &amount.name)?;
            let updated = match op {
                NumericOp::Increase => state.get_fluent(&key) + value,
                NumericOp::Decrease => state.get_fluent(&key) - value,
                NumericOp::Assign => value,
            };
            state.set_fluent(key, updated);
        }
        Effect::When { condition, effect } => {
            if state.evaluates(condition) {
                apply_effect(state, effect)?;
            }
        }
    }
    Ok(())
}

fn fluent_target(expr: &str) -> Result<String, EvalError> {
    if expr.starts_with('(') {
        if let Ok(parsed) = sexpr::parse(Input::with_label(expr, "<effect>")) {
            if let Some(key) = fluent_key(&parsed) {
                return Ok(key);
            }
        }
    }
    Err(EvalError::InvalidFluent(expr.to_string()))
}

/// Strict counterpart of the state's tolerant evaluation, used on the effect
/// side where an unknown expression is a domain bug.
fn eval_numeric_strict(state: &WorldState, expr: &str) -> Result<i64, EvalError> {
    if let Some(value) = parse_integer(expr) {
        return Ok(value);
    }
    if expr.starts_with('(') {
        if let Ok(parsed) = sexpr::parse(Input::with_label(expr, "<eval>")) {
            if let Some(key) = fluent_key(&parsed) {
                return Ok(state.get_fluent(&key));
            }
        }
    }
    Err(EvalError::UnknownExpression(expr.to_string()))
}
