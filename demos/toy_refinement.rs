use std::rc::Rc;

use clap::Parser;
use color_eyre::Result;
use log::info;

use menu_refiner::abstractor::{EnumerativeAbstractor, MenuGameAbstractor};
use menu_refiner::bdd::BddManager;
use menu_refiner::dd::DdManager;
use menu_refiner::equivalence::EnumerativeEquivalenceChecker;
use menu_refiner::explicit::ExplicitManager;
use menu_refiner::expr::{Declarations, Expr};
use menu_refiner::game::{MenuGame, QualitativeResult, QualitativeResultMinMax};
use menu_refiner::program::{Command, Program, Update};
use menu_refiner::refiner::{MenuGameRefiner, RefinementOutcome};
use menu_refiner::settings::RefinerSettings;

#[derive(Parser)]
#[command(author, version, about = "Refine a counter abstraction until both strategies agree")]
struct Cli {
    /// Upper bound of the counter
    #[arg(short, long, default_value_t = 4)]
    bound: i64,

    /// Maximal number of refinement rounds
    #[arg(short, long, default_value_t = 10)]
    rounds: usize,

    /// Split derived predicates into atoms
    #[arg(long)]
    split: bool,

    /// Seed the abstraction with all guards
    #[arg(long)]
    guards: bool,

    /// Print an explanatory trace for every pivot state
    #[arg(long)]
    explain: bool,

    /// Use the truth-table backend instead of BDDs
    #[arg(long)]
    explicit: bool,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

/// A lossy counter: `x` decreases by one or two, or stays.
fn counter(bound: i64) -> Program {
    let mut decls = Declarations::new();
    decls.declare_int("x", 0, bound).declare_bool("done");
    let x = Expr::var("x");
    let done = Expr::var("done");
    Program::new(decls, x.clone().equals(bound).and(!done.clone()))
        .with_command(
            Command::new("step", x.clone().ge(2))
                .with_update(Update::new(0.5, [("x", x.clone() - 1)]))
                .with_update(Update::new(0.25, [("x", x.clone() - 2)]))
                .with_update(Update::new(0.25, [("x", x.clone())])),
        )
        .with_command(
            Command::new("finish", x.clone().le(1).and(!done.clone()))
                .with_update(Update::new(1.0, [("done", Expr::bool(true))])),
        )
}

/// Strategies that resolve Player 2 by the first and the last available choice.
fn first_and_last<M: DdManager>(game: &MenuGame<M>) -> QualitativeResultMinMax<M::Bdd> {
    let dd = game.manager();
    let aux_cols = game.aux_variables().union(game.column_variables());
    let available = dd.exists_abstract(&game.transition_matrix_bdd(), &aux_cols);

    let player1 = dd.exists_representative(
        &dd.exists_abstract(&available, game.player2_variables()),
        game.player1_variables(),
    );
    let available = dd.apply_and(&available, &player1);
    let first = dd.exists_representative(&available, game.player2_variables());
    let others = dd.apply_and(&available, &dd.apply_not(&first));
    let only_one = dd.apply_not(&dd.exists_abstract(&others, game.player2_variables()));
    let last = dd.apply_or(
        &dd.exists_representative(&others, game.player2_variables()),
        &dd.apply_and(&first, &only_one),
    );

    let result = |player2: M::Bdd| QualitativeResult {
        player1_states: dd.zero(),
        player2_states: dd.zero(),
        player1_strategy: player1.clone(),
        player2_strategy: player2,
    };
    QualitativeResultMinMax {
        prob0_min: result(first.clone()),
        prob1_min: result(first),
        prob0_max: result(last.clone()),
        prob1_max: result(last),
    }
}

fn run<M: DdManager>(manager: M, cli: &Cli) -> Result<()> {
    let program = counter(cli.bound);
    let checker = EnumerativeEquivalenceChecker::new(program.declarations.clone());
    let x = Expr::var("x");
    let mut abstractor = EnumerativeAbstractor::new(Rc::new(manager), program, [x.ge(cli.bound)])?;

    let settings = RefinerSettings::default()
        .with_split_predicates(cli.split)
        .with_split_guards(cli.split)
        .with_add_all_guards(cli.guards)
        .with_split_initial_guards(cli.split)
        .with_explain_pivots(cli.explain);
    let refiner = MenuGameRefiner::new(&mut abstractor, settings, checker)?;
    info!(
        "refining {} commands with {:?}",
        abstractor.program().commands.len(),
        refiner.settings()
    );

    for round in 1..=cli.rounds {
        let game = abstractor.build_game()?;
        let states = game
            .manager()
            .non_zero_count(&game.reachable_states(), game.row_variables());
        info!("round {}: {} reachable abstract states", round, states);

        let result = first_and_last(&game);
        match refiner.refine_qualitative(&mut abstractor, &game, &game.transition_matrix_bdd(), &result)? {
            RefinementOutcome::Refined { predicates, trace } => {
                for predicate in &predicates {
                    println!("round {}: new predicate `{}`", round, predicate);
                }
                if let Some(trace) = trace {
                    println!("round {}: pivot reached via {}", round, trace);
                }
            }
            RefinementOutcome::Redundant => {
                println!("round {}: derived predicates are already known", round);
                break;
            }
            RefinementOutcome::NoPivotCandidates => {
                println!("round {}: strategies agree, abstraction is precise", round);
                break;
            }
        }
    }

    println!("predicates:");
    for (i, predicate) in abstractor.abstraction_information().predicates().iter().enumerate() {
        println!("  #{}: {}", i, predicate);
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    simplelog::TermLogger::init(
        if cli.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();
    if cli.explicit {
        run(ExplicitManager::new(), &cli)?;
    } else {
        run(BddManager::new(), &cli)?;
    }
    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
