//! Pivot states: reachable states where the lower and upper strategies disagree.

use log::debug;

use crate::dd::{AddOp, DdManager};
use crate::error::RefinementError;
use crate::game::{MenuGame, PivotStateResult, QuantitativeResultMinMax};
use crate::types::{OptimizationDirection, VarSet};

/// Computes the strategy-restricted transition relations and the pivot candidates.
///
/// A pivot candidate is reachable under the lower or the upper strategy pair,
/// both Player-1 strategies pick a choice there, both Player-2 strategies pick
/// a choice, and the Player-2 choices differ.
pub fn compute_pivot_states<M: DdManager>(
    game: &MenuGame<M>,
    transition_matrix_bdd: &M::Bdd,
    min_player1_strategy: &M::Bdd,
    min_player2_strategy: &M::Bdd,
    max_player1_strategy: &M::Bdd,
    max_player2_strategy: &M::Bdd,
) -> PivotStateResult<M::Bdd> {
    let dd = game.manager();
    let nondeterminism = game.nondeterminism_variables();
    let rows = game.row_variables();
    let cols = game.column_variables();

    let min_strategy = dd.apply_and(min_player1_strategy, min_player2_strategy);
    let reachable_transitions_min = dd.and_exists(transition_matrix_bdd, &min_strategy, &nondeterminism);
    let reachable_min = dd.reachable_states(game.initial_states(), &reachable_transitions_min, rows, cols);

    let max_strategy = dd.apply_and(max_player1_strategy, max_player2_strategy);
    let reachable_transitions_max = dd.and_exists(transition_matrix_bdd, &max_strategy, &nondeterminism);
    let reachable_max = dd.reachable_states(game.initial_states(), &reachable_transitions_max, rows, cols);

    let player2 = game.player2_variables();
    let differing = dd.apply_and_many([
        &dd.exists_abstract(min_player2_strategy, player2),
        &dd.exists_abstract(max_player2_strategy, player2),
        &dd.apply_xor(min_player2_strategy, max_player2_strategy),
    ]);
    let player1_agree = dd.apply_and(min_player1_strategy, max_player1_strategy);
    let disagreement = dd.and_exists(&player1_agree, &differing, &nondeterminism);

    let pivot_states = dd.apply_and(&dd.apply_or(&reachable_min, &reachable_max), &disagreement);

    PivotStateResult {
        reachable_transitions_min,
        reachable_transitions_max,
        pivot_states,
    }
}

/// Picks one pivot state closest to the initial states.
///
/// Both transition relations are explored breadth-first in lockstep. On the
/// first level that contains a candidate, the candidate is picked: with a
/// quantitative result, the one with the largest gap between upper and lower
/// value on the frontier with the larger maximal gap (ties go to the lower
/// frontier), otherwise the first candidate on the lower frontier if any.
///
/// Fails with [`RefinementError::PivotUnreachable`] when both explorations
/// saturate without meeting a candidate.
#[allow(clippy::too_many_arguments)]
pub fn pick_pivot_state<M: DdManager>(
    dd: &M,
    initial_states: &M::Bdd,
    transitions_min: &M::Bdd,
    transitions_max: &M::Bdd,
    row_variables: &VarSet,
    column_variables: &VarSet,
    pivot_states: &M::Bdd,
    quantitative_result: Option<&QuantitativeResultMinMax<M::Bdd, M::Add>>,
) -> Result<(M::Bdd, OptimizationDirection), RefinementError> {
    let initial_candidates = dd.apply_and(initial_states, pivot_states);
    if !dd.is_zero(&initial_candidates) {
        debug!("picked initial pivot state");
        return Ok((
            dd.exists_representative(&initial_candidates, row_variables),
            OptimizationDirection::Minimize,
        ));
    }

    let mut frontier_min = initial_states.clone();
    let mut frontier_max = initial_states.clone();
    let mut reached_min = initial_states.clone();
    let mut reached_max = initial_states.clone();
    let mut level = 0;
    loop {
        level += 1;
        frontier_min = dd.relational_product(&frontier_min, transitions_min, row_variables, column_variables);
        frontier_max = dd.relational_product(&frontier_max, transitions_max, row_variables, column_variables);

        let candidates_min = dd.apply_and(&frontier_min, pivot_states);
        let candidates_max = dd.apply_and(&frontier_max, pivot_states);
        if !dd.is_zero(&candidates_min) || !dd.is_zero(&candidates_max) {
            debug!(
                "found {} (min) and {} (max) pivot candidates on level {}",
                dd.non_zero_count(&candidates_min, row_variables),
                dd.non_zero_count(&candidates_max, row_variables),
                level
            );
            return Ok(match quantitative_result {
                Some(result) => pick_by_gap(dd, &candidates_min, &candidates_max, row_variables, result),
                None if !dd.is_zero(&candidates_min) => (
                    dd.exists_representative(&candidates_min, row_variables),
                    OptimizationDirection::Minimize,
                ),
                None => (
                    dd.exists_representative(&candidates_max, row_variables),
                    OptimizationDirection::Maximize,
                ),
            });
        }

        let new_min = dd.apply_and(&frontier_min, &dd.apply_not(&reached_min));
        let new_max = dd.apply_and(&frontier_max, &dd.apply_not(&reached_max));
        if dd.is_zero(&new_min) && dd.is_zero(&new_max) {
            return Err(RefinementError::PivotUnreachable);
        }
        reached_min = dd.apply_or(&reached_min, &new_min);
        reached_max = dd.apply_or(&reached_max, &new_max);
    }
}

/// The candidate with the largest value gap, out of the frontier with the larger maximal gap.
fn pick_by_gap<M: DdManager>(
    dd: &M,
    candidates_min: &M::Bdd,
    candidates_max: &M::Bdd,
    row_variables: &VarSet,
    result: &QuantitativeResultMinMax<M::Bdd, M::Add>,
) -> (M::Bdd, OptimizationDirection) {
    let gap = dd.add_apply(AddOp::Minus, &result.max.values, &result.min.values);
    let gap = dd.add_apply(AddOp::Max, &gap, &dd.add_constant(0.0));
    // Shifted by one so that every candidate beats every non-candidate.
    let shifted = dd.add_apply(AddOp::Plus, &gap, &dd.add_constant(1.0));
    let zero = dd.add_constant(0.0);
    let restrict = |candidates: &M::Bdd| {
        if dd.is_zero(candidates) {
            None
        } else {
            let gaps = dd.add_ite(candidates, &shifted, &zero);
            let best = dd.add_max_value(&gaps);
            Some((gaps, best))
        }
    };

    let (gaps, direction) = match (restrict(candidates_min), restrict(candidates_max)) {
        (Some((min_gaps, min_best)), Some((_, max_best))) if min_best >= max_best => {
            (min_gaps, OptimizationDirection::Minimize)
        }
        (_, Some((max_gaps, _))) => (max_gaps, OptimizationDirection::Maximize),
        (Some((min_gaps, _)), None) => (min_gaps, OptimizationDirection::Minimize),
        (None, None) => unreachable!("pick_by_gap called without candidates"),
    };
    debug!("picked pivot state by value gap from the {} frontier", direction);
    (dd.add_max_abstract_representative(&gaps, row_variables), direction)
}
