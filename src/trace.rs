//! Explanatory traces: most probable paths from the initial states to a pivot state.

use std::collections::HashSet;
use std::fmt;

use log::debug;

use crate::bitvector::BitVector;
use crate::dd::{AddOp, DdManager};
use crate::error::RefinementError;
use crate::game::MenuGame;
use crate::information::{bits_to_raw, AbstractionInformation};

/// One step of an explanatory trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    /// Predicate valuation of the state the step leaves.
    pub state: BitVector,
    /// Command chosen by Player 1.
    pub command: usize,
    /// Update of the command that leads to the next state.
    pub update: u64,
}

/// A path of abstract states from an initial state to the pivot state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplanatoryTrace {
    pub steps: Vec<TraceStep>,
    pub pivot: BitVector,
}

impl ExplanatoryTrace {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceStep> + '_ {
        self.steps.iter()
    }
}

impl fmt::Display for ExplanatoryTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{} --[c{}/u{}]--> ", step.state, step.command, step.update)?;
        }
        write!(f, "{}", self.pivot)
    }
}

/// Spanning tree of maximal-probability paths from the initial states, over row,
/// auxiliary and column variables.
///
/// Each column (target) state in the tree has exactly one incoming edge,
/// labeled by the update that realizes it. The search stops as soon as
/// `target` is reached.
pub fn most_probable_path_spanning_tree<M: DdManager>(
    game: &MenuGame<M>,
    target: &M::Bdd,
    strategy_filter: &M::Bdd,
) -> M::Bdd {
    let dd = game.manager();
    let pairs = game.row_column_pairs();
    let extended = game.extended_transition_matrix();

    // For every transition keep only the most likely update.
    let likeliest = dd.add_max_abstract_representative(extended, game.aux_variables());
    let filter = dd.to_add(&dd.apply_and(strategy_filter, &likeliest));
    let transitions = dd.add_apply(AddOp::Times, &filter, extended);
    let transitions = dd.add_sum_abstract(&transitions, &game.nondeterminism_variables());

    let variables = game.row_variables().union(game.aux_variables());
    let mut max_probabilities = dd.to_add(game.initial_states());
    let mut border = max_probabilities.clone();
    let mut tree = dd.zero();
    let mut iterations = 0;
    while !dd.add_is_zero(&border) && dd.is_zero(&dd.apply_and(&dd.add_to_bdd(&border), target)) {
        iterations += 1;
        let weighted = dd.add_apply(AddOp::Times, &border, &transitions);
        let weighted = dd.add_apply(AddOp::Times, &weighted, &max_probabilities);

        let choices = dd.add_max_abstract_representative(&weighted, &variables);
        let new_max = dd.add_swap_variables(&dd.add_max_abstract(&weighted, &variables), pairs);

        let update = dd.add_greater(&new_max, &max_probabilities);
        max_probabilities = dd.add_ite(&update, &new_max, &max_probabilities);

        // Improved states drop their old incoming edge and take the new one.
        let update_cols = dd.swap_variables(&update, pairs);
        tree = dd.apply_and(&tree, &dd.apply_not(&update_cols));
        tree = dd.apply_or(&tree, &dd.apply_and(&update_cols, &choices));

        border = dd.to_add(&update);
    }
    debug!("spanning tree computed in {} iterations", iterations);
    tree
}

/// Walks `spanning_tree` backward from `pivot_state` to an initial state.
///
/// Commands are read off `player1_strategy`, the strategy the tree was built
/// for. The steps are returned in forward order.
pub fn build_explanatory_trace<M: DdManager>(
    game: &MenuGame<M>,
    information: &AbstractionInformation<M>,
    spanning_tree: &M::Bdd,
    pivot_state: &M::Bdd,
    player1_strategy: &M::Bdd,
) -> Result<ExplanatoryTrace, RefinementError> {
    let dd = game.manager();
    let rows = game.row_variables();
    let aux = game.aux_variables();
    let row_aux = rows.union(aux);
    let aux_cols = aux.union(game.column_variables());
    let rows_cols = rows.union(game.column_variables());

    let pivot = information
        .decode_state(pivot_state)
        .ok_or_else(|| RefinementError::TraceBroken("pivot is not a regular state".to_string()))?;

    let mut steps = Vec::new();
    let mut visited = HashSet::new();
    visited.insert(pivot.clone());
    let mut current = pivot_state.clone();
    while dd.is_zero(&dd.apply_and(&current, game.initial_states())) {
        let incoming = dd.apply_and(&dd.swap_variables(&current, game.row_column_pairs()), spanning_tree);
        if dd.is_zero(&incoming) {
            return Err(RefinementError::TraceBroken(format!(
                "state {} has no predecessor in the spanning tree",
                information.decode_state(&current).map_or("bottom".to_string(), |s| s.to_string())
            )));
        }
        let incoming = dd.exists_representative(&incoming, &row_aux);
        let predecessor = dd.exists_abstract(&incoming, &aux_cols);
        let state = information
            .decode_state(&predecessor)
            .ok_or_else(|| RefinementError::TraceBroken("path runs through the bottom state".to_string()))?;
        if !visited.insert(state.clone()) {
            return Err(RefinementError::TraceBroken(format!("cycle through state {}", state)));
        }

        let labels = dd.exists_abstract(&incoming, &rows_cols);
        let update = dd
            .minterms(&labels, aux)
            .into_iter()
            .next()
            .map(bits_to_raw)
            .unwrap_or_default();
        let choice = dd.and_exists(&predecessor, player1_strategy, rows);
        if dd.is_zero(&choice) {
            return Err(RefinementError::TraceBroken(format!("no Player-1 choice in state {}", state)));
        }
        let command = information.decode_player1_set(&choice)?;

        steps.push(TraceStep { state, command, update });
        current = predecessor;
    }
    steps.reverse();
    Ok(ExplanatoryTrace { steps, pivot })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    use test_log::test;

    use crate::abstractor::{EnumerativeAbstractor, MenuGameAbstractor};
    use crate::bdd::BddManager;
    use crate::expr::{Declarations, Expr};
    use crate::program::{Command, Program, Update};

    fn counter() -> EnumerativeAbstractor<BddManager> {
        let mut decls = Declarations::new();
        decls.declare_int("x", 0, 2);
        let x = Expr::var("x");
        let program = Program::new(decls, x.clone().equals(0)).with_command(
            Command::new("inc", x.clone().le(1)).with_update(Update::new(1.0, [("x", x.clone() + 1)])),
        );
        EnumerativeAbstractor::new(Rc::new(BddManager::new()), program, [x.clone().ge(1), x.ge(2)]).unwrap()
    }

    #[test]
    fn test_trace_to_pivot() {
        let mut abstractor = counter();
        let game = abstractor.build_game().unwrap();
        let info = abstractor.abstraction_information();
        let dd = game.manager();

        let pivot = info.encode_valuation(&BitVector::from_bools(&[true, true]), true);
        let tree = most_probable_path_spanning_tree(&game, &pivot, &dd.one());
        let trace = build_explanatory_trace(&game, info, &tree, &pivot, &info.encode_player1_choice(0)).unwrap();

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.steps[0].state, BitVector::from_bools(&[false, false]));
        assert_eq!(trace.steps[1].state, BitVector::from_bools(&[true, false]));
        assert!(trace.iter().all(|s| s.command == 0 && s.update == 0));
        assert_eq!(trace.to_string(), "00 --[c0/u0]--> 10 --[c0/u0]--> 11");
    }

    #[test]
    fn test_initial_pivot_has_empty_trace() {
        let mut abstractor = counter();
        let game = abstractor.build_game().unwrap();
        let info = abstractor.abstraction_information();
        let dd = game.manager();

        let pivot = info.encode_valuation(&BitVector::from_bools(&[false, false]), true);
        let tree = most_probable_path_spanning_tree(&game, &pivot, &dd.one());
        assert!(dd.is_zero(&tree));
        let trace = build_explanatory_trace(&game, info, &tree, &pivot, &info.encode_player1_choice(0)).unwrap();
        assert!(trace.is_empty());
    }

    #[test]
    fn test_unreachable_pivot_breaks_trace() {
        let mut abstractor = counter();
        let game = abstractor.build_game().unwrap();
        let info = abstractor.abstraction_information();
        let dd = game.manager();

        // `x >= 2` without `x >= 1` is infeasible.
        let pivot = info.encode_valuation(&BitVector::from_bools(&[false, true]), true);
        let tree = most_probable_path_spanning_tree(&game, &pivot, &dd.one());
        let res = build_explanatory_trace(&game, info, &tree, &pivot, &info.encode_player1_choice(0));
        assert!(matches!(res, Err(RefinementError::TraceBroken(_))));
    }
}
