//! Best-first (A*) search over world states.
//!
//! Nodes are ordered by `f = g + h` where `g` is the exact cost of the plan
//! so far and `h` the heuristic estimate. Visited states are de-duplicated
//! through their canonical key, optionally bucketed to trade optimality for
//! a smaller frontier. The search is synchronous and performs no I/O; its
//! only cancellation vector is the iteration cap.

use crate::classical::heuristics;
use crate::classical::state::WorldState;
use crate::classical::{apply_action, is_applicable, EvalError, GroundAction};
use crate::parsing::pddl::Predicate;
use log::{debug, info};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Estimates the remaining cost from a state to the goals. Must never
/// overestimate for the returned plan to be minimum-cost.
pub type Heuristic = Box<dyn Fn(&WorldState, &[Predicate]) -> f64>;

pub struct PlannerConfig {
    /// Hard upper bound on node pops.
    pub max_iterations: usize,
    /// Fluent values are integer-divided by this before state keying;
    /// 0 keys states exactly. Positive values merge nearby states and lose
    /// optimality guarantees.
    pub fluent_bucket_size: i64,
    /// Emit progress every 1000 iterations and at terminal events.
    pub verbose: bool,
    /// Estimator to use instead of [`heuristics::goal_count`].
    pub heuristic: Option<Heuristic>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            max_iterations: 500_000,
            fluent_bucket_size: 10,
            verbose: false,
            heuristic: None,
        }
    }
}

#[derive(Debug)]
pub struct PlanResult {
    pub success: bool,
    /// Ground-action names, in execution order. Empty on failure.
    pub plan: Vec<String>,
    pub final_state: WorldState,
    /// Node pops consumed.
    pub iterations: usize,
}

struct Node {
    /// g + h.
    f: f64,
    /// Exact cost of the plan so far.
    g: i64,
    state: WorldState,
    plan: Vec<String>,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so that the max-heap pops the lowest f first; ties prefer
        // the shorter plan
        f64::partial_cmp(&other.f, &self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.plan.len().cmp(&self.plan.len()))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

/// Searches for a minimum-cost action sequence from `initial` to a state
/// satisfying all `goals`.
///
/// Returns a failed [`PlanResult`] (empty plan, iteration count) when the
/// search space is exhausted or the iteration cap is reached; an `Err` only
/// when a malformed effect cannot be applied.
pub fn plan(
    initial: &WorldState,
    actions: &[GroundAction],
    goals: &[Predicate],
    config: &PlannerConfig,
) -> Result<PlanResult, EvalError> {
    let h: &dyn Fn(&WorldState, &[Predicate]) -> f64 = match &config.heuristic {
        Some(h) => h.as_ref(),
        None => &heuristics::goal_count,
    };

    let mut open: BinaryHeap<Node> = BinaryHeap::new();
    let mut best_cost: HashMap<String, i64> = HashMap::new();
    open.push(Node {
        f: h(initial, goals),
        g: 0,
        state: initial.clone(),
        plan: Vec::new(),
    });

    let mut iterations = 0;
    while iterations < config.max_iterations {
        let Some(current) = open.pop() else {
            break;
        };
        iterations += 1;

        // goal test before the visited check, so that a cheaper rediscovery
        // of a goal state is still accepted
        if current.state.is_goal_reached(goals) {
            if config.verbose {
                info!("goal reached after {iterations} iterations");
            }
            return Ok(PlanResult {
                success: true,
                plan: current.plan,
                final_state: current.state,
                iterations,
            });
        }

        let key = current.state.key(config.fluent_bucket_size);
        match best_cost.get(&key) {
            Some(&g) if g <= current.g => continue,
            _ => {
                best_cost.insert(key, current.g);
            }
        }

        if config.verbose && iterations % 1000 == 0 {
            debug!(
                "{iterations} iterations, {} open, {} visited, best plan={}",
                open.len(),
                best_cost.len(),
                current.plan.len()
            );
        }

        for action in actions {
            if !is_applicable(action, &current.state) {
                continue;
            }
            let state = apply_action(action, &current.state)?;
            let g = current.g + action.cost;
            let key = state.key(config.fluent_bucket_size);
            if best_cost.get(&key).is_some_and(|&best| best <= g) {
                continue;
            }
            let f = g as f64 + h(&state, goals);
            let mut plan = current.plan.clone();
            plan.push(action.name.clone());
            open.push(Node { f, g, state, plan });
        }
    }

    if config.verbose {
        info!("no plan found after {iterations} iterations");
    }
    Ok(PlanResult {
        success: false,
        plan: Vec::new(),
        final_state: initial.clone(),
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classical::{build_initial_state, instantiate_actions};
    use crate::parsing::pddl::{parse_pddl_domain, parse_pddl_problem};

    fn setup(domain: &str, problem: &str) -> (Vec<GroundAction>, WorldState, Vec<Predicate>) {
        let domain = parse_pddl_domain(domain).unwrap();
        let problem = parse_pddl_problem(problem).unwrap();
        let actions = instantiate_actions(&domain, &problem);
        let initial = build_initial_state(&problem);
        (actions, initial, problem.goal)
    }

    fn exact() -> PlannerConfig {
        PlannerConfig {
            fluent_bucket_size: 0,
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn vacuous_goal_needs_no_steps() {
        let (actions, initial, goals) = setup(
            "(define (domain d) (:action noop :parameters () :precondition () :effect ()))",
            "(define (problem p) (:domain d) (:init) (:goal ()))",
        );
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "noop()");
        let result = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(result.success);
        assert!(result.plan.is_empty());
        assert!(result.iterations >= 1);
    }

    #[test]
    fn strips_reachability() {
        let (actions, initial, goals) = setup(
            "(define (domain nav)
               (:action move
                 :parameters (?x ?y)
                 :precondition (at ?x)
                 :effect (and (not (at ?x)) (at ?y))))",
            "(define (problem p) (:domain nav)
               (:objects a b)
               (:init (at a))
               (:goal (at b)))",
        );
        let result = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(result.success);
        assert_eq!(result.plan, vec!["move(a,b)"]);
        assert!(result.final_state.holds("at", &["b"]));
        assert!(!result.final_state.holds("at", &["a"]));
    }

    #[test]
    fn numeric_goal() {
        let (actions, initial, goals) = setup(
            "(define (domain work)
               (:action earn
                 :parameters (?a)
                 :cost 1
                 :precondition ()
                 :effect (increase (money ?a) 100)))",
            "(define (problem p) (:domain work)
               (:objects alice)
               (:init (= (money alice) 0))
               (:goal (>= (money alice) 300)))",
        );
        let result = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(result.success);
        assert_eq!(result.plan, vec!["earn(alice)"; 3]);
        assert_eq!(result.final_state.get_fluent("money(alice)"), 300);
    }

    #[test]
    fn negated_precondition() {
        let (actions, initial, goals) = setup(
            "(define (domain blocks)
               (:action clear
                 :parameters (?x)
                 :precondition (not (on ?x b))
                 :effect (clear ?x)))",
            "(define (problem p) (:domain blocks)
               (:objects a b c)
               (:init (on a b))
               (:goal (clear c)))",
        );
        let result = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(result.success);
        assert_eq!(result.plan, vec!["clear(c)"]);
    }

    #[test]
    fn conditional_effect_fires_on_fifth_step() {
        let (actions, initial, goals) = setup(
            "(define (domain d)
               (:action step
                 :parameters ()
                 :effect (and (increase (x) 1) (when (>= (x) 5) (done)))))",
            "(define (problem p) (:domain d)
               (:init (= (x) 0))
               (:goal (done)))",
        );
        let result = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(result.success);
        assert_eq!(result.plan.len(), 5);
        assert_eq!(result.final_state.get_fluent("x()"), 5);
        assert!(result.final_state.holds("done", &[]));
    }

    #[test]
    fn unreachable_goal_fails_cleanly() {
        let (actions, initial, goals) = setup(
            "(define (domain d) (:action noop :parameters () :precondition () :effect ()))",
            "(define (problem p) (:domain d) (:goal (impossible)))",
        );
        let result = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(!result.success);
        assert!(result.plan.is_empty());
        assert!(result.iterations <= 500_000);
    }

    #[test]
    fn iteration_cap_bounds_work() {
        let (actions, initial, goals) = setup(
            "(define (domain d)
               (:action tick :parameters () :effect (increase (x) 1)))",
            "(define (problem p) (:domain d) (:init (= (x) 0)) (:goal (never)))",
        );
        let config = PlannerConfig {
            max_iterations: 50,
            ..exact()
        };
        let result = plan(&initial, &actions, &goals, &config).unwrap();
        assert!(!result.success);
        assert_eq!(result.iterations, 50);
    }

    #[test]
    fn cheaper_path_wins_over_expensive_one() {
        let (actions, initial, goals) = setup(
            "(define (domain d)
               (:action direct :parameters () :cost 5 :effect (p))
               (:action step-one :parameters () :effect (q))
               (:action step-two :parameters () :precondition (q) :effect (p)))",
            "(define (problem p) (:domain d) (:goal (p)))",
        );
        let result = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(result.success);
        assert_eq!(result.plan, vec!["step-one()", "step-two()"]);
    }

    #[test]
    fn plan_replays_soundly() {
        let (actions, initial, goals) = setup(
            "(define (domain nav)
               (:action move
                 :parameters (?x ?y)
                 :precondition (at ?x)
                 :effect (and (not (at ?x)) (at ?y)))
               (:action mark
                 :parameters (?x)
                 :precondition (at ?x)
                 :effect (visited ?x)))",
            "(define (problem p) (:domain nav)
               (:objects a b c)
               (:init (at a))
               (:goal (and (visited b) (at c))))",
        );
        let result = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(result.success);
        let mut state = initial;
        for step in &result.plan {
            let action = actions.iter().find(|a| &a.name == step).unwrap();
            assert!(is_applicable(action, &state), "{step} not applicable");
            state = apply_action(action, &state).unwrap();
        }
        assert!(state.is_goal_reached(&goals));
        assert_eq!(state, result.final_state);
    }

    #[test]
    fn custom_heuristic_is_used() {
        let (actions, initial, goals) = setup(
            "(define (domain work)
               (:action earn :parameters (?a) :effect (increase (money ?a) 100)))",
            "(define (problem p) (:domain work)
               (:objects alice)
               (:init (= (money alice) 0))
               (:goal (>= (money alice) 500)))",
        );
        // remaining earns needed: admissible and much sharper than goal count
        let config = PlannerConfig {
            heuristic: Some(Box::new(|state: &WorldState, _: &[Predicate]| {
                ((500 - state.get_fluent("money(alice)")).max(0) as f64 / 100.0).ceil()
            })),
            ..exact()
        };
        let sharp = plan(&initial, &actions, &goals, &config).unwrap();
        assert!(sharp.success);
        assert_eq!(sharp.plan.len(), 5);

        let blunt = plan(&initial, &actions, &goals, &exact()).unwrap();
        assert!(blunt.iterations >= sharp.iterations);
    }

    #[test]
    fn bucketed_search_still_reaches_coarse_goals() {
        let (actions, initial, goals) = setup(
            "(define (domain work)
               (:action earn :parameters (?a) :effect (increase (money ?a) 100)))",
            "(define (problem p) (:domain work)
               (:objects alice)
               (:init (= (money alice) 0))
               (:goal (>= (money alice) 300)))",
        );
        let config = PlannerConfig {
            fluent_bucket_size: 10,
            ..PlannerConfig::default()
        };
        let result = plan(&initial, &actions, &goals, &config).unwrap();
        assert!(result.success);
        assert_eq!(result.plan.len(), 3);
    }

    #[test]
    fn malformed_effect_aborts_search() {
        let (actions, initial, goals) = setup(
            "(define (domain d)
               (:action bad :parameters () :effect (increase (x) nonsense)))",
            "(define (problem p) (:domain d) (:goal (done)))",
        );
        let err = plan(&initial, &actions, &goals, &exact()).unwrap_err();
        assert_eq!(err, EvalError::UnknownExpression("nonsense".to_string()));
    }
}
