use anyhow::{Context, Result};
use groundplan::classical::search::{plan, PlannerConfig};
use groundplan::classical::state::WorldState;
use groundplan::classical::{apply_action, build_initial_state, instantiate_actions};
use groundplan::parsing::pddl::{load_domain, load_problem};
use itertools::Itertools;
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use structopt::StructOpt;

/// A classical planner for a PDDL subset with numeric fluents and
/// conditional effects.
#[derive(Debug, StructOpt)]
#[structopt(name = "groundplan", rename_all = "kebab-case")]
struct Opt {
    /// Path to the domain file.
    #[structopt(short = "d", long = "domain")]
    domain: PathBuf,
    /// Path to the problem file.
    #[structopt(short = "p", long = "problem")]
    problem: PathBuf,
    /// Print search progress to stderr.
    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
}

fn fluent_line(state: &WorldState) -> String {
    state
        .fluents()
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .join(" ")
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    env_logger::builder()
        .filter_level(if opt.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let domain = load_domain(&opt.domain)?;
    let problem = load_problem(&opt.problem)?;

    println!("=== Domain: {} ===", domain.name);
    println!("Action schemas: {}", domain.actions.len());
    println!();

    println!("=== Problem: {} ===", problem.name);
    println!("Objects: {}", problem.objects.iter().join(" "));
    println!();

    let actions = instantiate_actions(&domain, &problem);
    println!("=== Ground Actions ({}) ===", actions.len());
    for action in &actions {
        println!("  {} (cost={})", action.name, action.cost);
    }
    println!();

    let initial = build_initial_state(&problem);
    println!("=== Initial State ===");
    println!("{initial}");
    println!();

    println!("=== A* Planning ===");
    let config = PlannerConfig {
        verbose: opt.verbose,
        ..PlannerConfig::default()
    };
    let result = plan(&initial, &actions, &problem.goal, &config)?;

    if !result.success {
        println!("No plan found after {} iterations.", result.iterations);
        std::process::exit(1);
    }
    println!(
        "Plan found! {} steps, {} iterations",
        result.plan.len(),
        result.iterations
    );
    println!();

    println!("=== Plan Execution ===");
    println!("{:<4}{:<32}{}", "#", "Action", "State");
    println!("{}", "-".repeat(60));
    println!("{:<4}{:<32}{}", 0, "(initial)", fluent_line(&initial));
    let mut state = initial;
    for (i, step) in result.plan.iter().enumerate() {
        let action = actions
            .iter()
            .find(|a| &a.name == step)
            .with_context(|| format!("plan refers to unknown action `{step}`"))?;
        state = apply_action(action, &state)?;
        println!("{:<4}{:<32}{}", i + 1, step, fluent_line(&state));
    }
    println!();

    println!("=== Final State ===");
    println!("{state}");
    println!();
    println!(
        "Goal reached? {}",
        if state.is_goal_reached(&problem.goal) {
            "YES"
        } else {
            "NO"
        }
    );

    Ok(())
}
