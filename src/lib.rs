//! A classical planner for a PDDL subset.
//!
//! The pipeline has three stages: [`parsing::sexpr`] turns source text into
//! a concrete syntax tree, [`parsing::pddl`] interprets the tagged forms
//! into [`Domain`](parsing::pddl::Domain) and
//! [`Problem`](parsing::pddl::Problem) records, and [`classical`] grounds
//! the action schemas and runs an A* search over hybrid states of symbolic
//! facts and integer fluents.
//!
//! ```no_run
//! use groundplan::classical::search::{plan, PlannerConfig};
//! use groundplan::classical::{build_initial_state, instantiate_actions};
//! use groundplan::parsing::pddl::{load_domain, load_problem};
//!
//! # fn main() -> anyhow::Result<()> {
//! let domain = load_domain("demos/wealth.dom.pddl")?;
//! let problem = load_problem("demos/wealth.pb.pddl")?;
//! let actions = instantiate_actions(&domain, &problem);
//! let initial = build_initial_state(&problem);
//! let result = plan(&initial, &actions, &problem.goal, &PlannerConfig::default())?;
//! # Ok(())
//! # }
//! ```

pub mod classical;
pub mod parsing;

pub use classical::search::{plan, PlanResult, PlannerConfig};
pub use classical::state::WorldState;
pub use classical::{apply_action, build_initial_state, instantiate_actions, is_applicable, GroundAction};
pub use parsing::pddl::{load_domain, load_problem, parse_pddl_domain, parse_pddl_problem};
