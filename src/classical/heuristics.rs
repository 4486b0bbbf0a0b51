//! Heuristic estimators for the forward search.
//!
//! A heuristic maps a state and the goal conjunction to an estimate of the
//! remaining cost. The planner only returns provably minimum-cost plans when
//! the heuristic never overestimates (and exact state keying is used).

use crate::classical::state::WorldState;
use crate::parsing::pddl::Predicate;

/// Number of goal predicates that do not currently evaluate to true.
///
/// This is the planner's default. It never overestimates as long as every
/// action costs at least 1 and no action satisfies more than one outstanding
/// goal in a single step.
pub fn goal_count(state: &WorldState, goals: &[Predicate]) -> f64 {
    goals.iter().filter(|g| !state.evaluates(g)).count() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::pddl::Term;

    fn pred(name: &str, args: &[&str]) -> Predicate {
        Predicate {
            name: name.to_string(),
            args: args.iter().map(|a| Term::new(*a)).collect(),
            line: 0,
        }
    }

    #[test]
    fn counts_unsatisfied_goals() {
        let mut state = WorldState::new();
        let goals = [pred("at", &["b"]), pred(">=", &["(money alice)", "100"])];
        assert_eq!(goal_count(&state, &goals), 2.0);
        state.add(pred("at", &["b"]));
        assert_eq!(goal_count(&state, &goals), 1.0);
        state.set_fluent("money(alice)", 100);
        assert_eq!(goal_count(&state, &goals), 0.0);
        assert_eq!(goal_count(&state, &[]), 0.0);
    }
}
