#![allow(dead_code)]

use std::rc::Rc;

use menu_refiner::abstractor::EnumerativeAbstractor;
use menu_refiner::dd::DdManager;
use menu_refiner::equivalence::EnumerativeEquivalenceChecker;
use menu_refiner::expr::{Declarations, Expr};
use menu_refiner::game::{QualitativeResult, QualitativeResultMinMax};
use menu_refiner::information::AbstractionInformation;
use menu_refiner::program::{Command, Program, Update};

/// `x` in `0..=3`, starting at 3, with one command `x >= 1 -> x' = x - 1`.
///
/// Under `{x >= 1}`, the abstract state `x >= 1` has two distributions:
/// choice 0 (from `x = 1`) leads to `!(x >= 1)`, choice 1 (from `x = 2, 3`) stays.
pub fn decrement<M: DdManager>(manager: Rc<M>) -> (EnumerativeAbstractor<M>, EnumerativeEquivalenceChecker) {
    let mut decls = Declarations::new();
    decls.declare_int("x", 0, 3);
    let x = Expr::var("x");
    let program = Program::new(decls.clone(), x.clone().equals(3)).with_command(
        Command::new("c", x.clone().ge(1)).with_update(Update::new(1.0, [("x", x.clone() - 1)])),
    );
    let abstractor = EnumerativeAbstractor::new(manager, program, [x.ge(1)]).unwrap();
    (abstractor, EnumerativeEquivalenceChecker::new(decls))
}

/// [`decrement`] with a second command `true -> x' = x`.
///
/// Command 0 is the decrement, command 1 keeps every abstract state.
pub fn decrement_or_stay<M: DdManager>(
    manager: Rc<M>,
) -> (EnumerativeAbstractor<M>, EnumerativeEquivalenceChecker) {
    let mut decls = Declarations::new();
    decls.declare_int("x", 0, 3);
    let x = Expr::var("x");
    let program = Program::new(decls.clone(), x.clone().equals(3))
        .with_command(Command::new("c", x.clone().ge(1)).with_update(Update::new(1.0, [("x", x.clone() - 1)])))
        .with_command(Command::new("noop", Expr::bool(true)).with_update(Update::new(1.0, [("x", x.clone())])));
    let abstractor = EnumerativeAbstractor::new(manager, program, [x.ge(1)]).unwrap();
    (abstractor, EnumerativeEquivalenceChecker::new(decls))
}

/// `x, y` in `0..=1`, starting at `x = 0, y = 0`, with one command `y = 0 -> x' = 1`.
///
/// Under `{x >= 1}`, the guard is undecided everywhere: choice 0 is the concrete
/// distribution, choice 1 leads to the bottom state.
pub fn guarded<M: DdManager>(manager: Rc<M>) -> (EnumerativeAbstractor<M>, EnumerativeEquivalenceChecker) {
    let mut decls = Declarations::new();
    decls.declare_int("x", 0, 1).declare_int("y", 0, 1);
    let x = Expr::var("x");
    let y = Expr::var("y");
    let program = Program::new(decls.clone(), x.clone().equals(0).and(y.clone().equals(0))).with_command(
        Command::new("c2", y.equals(0)).with_update(Update::new(1.0, [("x", Expr::int(1))])),
    );
    let abstractor = EnumerativeAbstractor::new(manager, program, [x.ge(1)]).unwrap();
    (abstractor, EnumerativeEquivalenceChecker::new(decls))
}

/// Player-1 strategy picking command 0 everywhere.
pub fn player1_strategy<M: DdManager>(info: &AbstractionInformation<M>) -> M::Bdd {
    info.encode_player1_choice(0)
}

/// Player-2 strategy picking `choice` for command 0 everywhere.
pub fn player2_strategy<M: DdManager>(info: &AbstractionInformation<M>, choice: usize) -> M::Bdd {
    let dd = info.manager();
    dd.apply_and(&info.encode_player1_choice(0), &info.encode_player2_choice(choice))
}

fn qualitative<M: DdManager>(info: &AbstractionInformation<M>, choice: usize) -> QualitativeResult<M::Bdd> {
    let dd = info.manager();
    QualitativeResult {
        player1_states: dd.zero(),
        player2_states: dd.zero(),
        player1_strategy: player1_strategy(info),
        player2_strategy: player2_strategy(info, choice),
    }
}

/// A qualitative result whose min and max strategies pick the given Player-2 choices.
pub fn qualitative_result<M: DdManager>(
    info: &AbstractionInformation<M>,
    min_choice: usize,
    max_choice: usize,
) -> QualitativeResultMinMax<M::Bdd> {
    QualitativeResultMinMax {
        prob0_min: qualitative(info, min_choice),
        prob1_min: qualitative(info, min_choice),
        prob0_max: qualitative(info, max_choice),
        prob1_max: qualitative(info, max_choice),
    }
}
