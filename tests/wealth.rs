//! End-to-end run of the full pipeline on the demo domain: parse both files,
//! ground, search, then replay the plan step by step.

use groundplan::classical::search::{plan, PlannerConfig};
use groundplan::classical::{apply_action, build_initial_state, instantiate_actions, is_applicable};
use groundplan::parsing::pddl::{load_domain, load_problem, LoadError};

fn exact() -> PlannerConfig {
    PlannerConfig {
        fluent_bucket_size: 0,
        ..PlannerConfig::default()
    }
}

#[test]
fn wealth_demo_end_to_end() {
    let domain = load_domain("demos/wealth.dom.pddl").unwrap();
    let problem = load_problem("demos/wealth.pb.pddl").unwrap();
    assert_eq!(problem.domain_name, domain.name);

    let actions = instantiate_actions(&domain, &problem);
    assert_eq!(actions.len(), 3);

    let initial = build_initial_state(&problem);
    assert_eq!(initial.get_fluent("money(alice)"), 10000);
    assert_eq!(initial.get_fluent("health(alice)"), 100);

    let result = plan(&initial, &actions, &problem.goal, &exact()).unwrap();
    assert!(result.success);
    // study, 3 x work, 2 x rest is the cheapest schedule
    assert_eq!(result.plan.len(), 6);

    let mut state = initial;
    for step in &result.plan {
        let action = actions.iter().find(|a| &a.name == step).unwrap();
        assert!(is_applicable(action, &state), "{step} is not applicable");
        state = apply_action(action, &state).unwrap();
    }
    assert!(state.is_goal_reached(&problem.goal));
    assert!(state.get_fluent("money(alice)") >= 90000);
    assert!(state.get_fluent("health(alice)") >= 80);
    assert_eq!(state, result.final_state);
}

#[test]
fn bucketed_config_still_solves_the_demo() {
    let domain = load_domain("demos/wealth.dom.pddl").unwrap();
    let problem = load_problem("demos/wealth.pb.pddl").unwrap();
    let actions = instantiate_actions(&domain, &problem);
    let initial = build_initial_state(&problem);

    let result = plan(&initial, &actions, &problem.goal, &PlannerConfig::default()).unwrap();
    assert!(result.success);

    let mut state = initial;
    for step in &result.plan {
        let action = actions.iter().find(|a| &a.name == step).unwrap();
        assert!(is_applicable(action, &state));
        state = apply_action(action, &state).unwrap();
    }
    assert!(state.is_goal_reached(&problem.goal));
}

#[test]
fn missing_file_reports_the_path() {
    let err = load_domain("demos/no-such-file.pddl").unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
    assert!(err.to_string().contains("demos/no-such-file.pddl"));
}
