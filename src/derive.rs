//! Deriving predicates from the choices the lower and upper strategies make at a pivot state.

use log::debug;

use crate::abstractor::MenuGameAbstractor;
use crate::dd::DdManager;
use crate::equivalence::EquivalenceChecker;
use crate::error::RefinementError;
use crate::game::{MenuGame, PredicateSource, RefinementPredicates};
use crate::refiner::MenuGameRefiner;

impl<E: EquivalenceChecker> MenuGameRefiner<E> {
    /// Derives a predicate from the first strategy whose Player-2 choices
    /// differ at `pivot_state`, trying the lower Player-1 choice first.
    #[allow(clippy::too_many_arguments)]
    pub fn derive_predicates_from_pivot_state<M, A>(
        &self,
        abstractor: &A,
        game: &MenuGame<M>,
        pivot_state: &M::Bdd,
        min_player1_strategy: &M::Bdd,
        min_player2_strategy: &M::Bdd,
        max_player1_strategy: &M::Bdd,
        max_player2_strategy: &M::Bdd,
    ) -> Result<RefinementPredicates, RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        let dd = game.manager();
        let variables = game.nondeterminism_variables().union(game.row_variables());
        let transitions = dd.apply_and(pivot_state, &game.extended_transition_matrix_bdd());

        for (label, player1_strategy) in [("lower", min_player1_strategy), ("upper", max_player1_strategy)] {
            let choices = dd.apply_and(&transitions, player1_strategy);
            let lower = dd.and_exists(&choices, min_player2_strategy, &variables);
            let upper = dd.and_exists(&choices, max_player2_strategy, &variables);
            if !dd.is_zero(&dd.apply_xor(&lower, &upper)) {
                debug!("Player-2 choices differ under the {} Player-1 choice", label);
                let player1_choice = dd.and_exists(pivot_state, player1_strategy, game.row_variables());
                return self.derive_predicates_from_differing_choices(
                    abstractor,
                    pivot_state,
                    &player1_choice,
                    &lower,
                    &upper,
                );
            }
        }
        Err(RefinementError::NoDifferingChoices)
    }

    /// Derives a predicate from two choices (over auxiliary and column
    /// variables) of Player 2 for the command in `player1_choice`.
    ///
    /// If either choice reaches the bottom state, the command's guard is
    /// imprecise and becomes the new predicate. Otherwise the first update
    /// whose successors differ yields the weakest precondition of the first
    /// differing predicate.
    pub fn derive_predicates_from_differing_choices<M, A>(
        &self,
        abstractor: &A,
        pivot_state: &M::Bdd,
        player1_choice: &M::Bdd,
        lower_choice: &M::Bdd,
        upper_choice: &M::Bdd,
    ) -> Result<RefinementPredicates, RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        let information = abstractor.abstraction_information();
        let dd = information.manager();
        if dd.is_zero(player1_choice) {
            return Err(RefinementError::MissingPlayer1Choice);
        }
        let command = information.decode_player1_set(player1_choice)?;
        debug!(
            "deriving predicates for command {} in state {:?}",
            command,
            information.decode_state(pivot_state).map(|s| s.to_string())
        );

        let bottom = information.bottom_states(false);
        if !dd.is_zero(&dd.apply_and(&bottom, lower_choice)) || !dd.is_zero(&dd.apply_and(&bottom, upper_choice)) {
            let guard = abstractor.guard(command)?;
            debug!("choice reaches the bottom state, deriving guard `{}`", guard);
            return Ok(RefinementPredicates::new(PredicateSource::Guard, vec![guard]));
        }

        let lower = information.decode_choice_to_update_successor_mapping(lower_choice);
        let upper = information.decode_choice_to_update_successor_mapping(upper_choice);
        if lower.len() != upper.len() {
            return Err(RefinementError::MismatchedUpdateMappings {
                lower: lower.len(),
                upper: upper.len(),
            });
        }

        for ((&lower_update, lower_successor), (&upper_update, upper_successor)) in lower.iter().zip(&upper) {
            if lower_update != upper_update {
                return Err(RefinementError::UpdateIndexMismatch {
                    lower: lower_update,
                    upper: upper_update,
                });
            }
            if let Some(index) = lower_successor.first_difference(upper_successor) {
                let update = lower_update as usize;
                let assignment = abstractor.variable_updates(command, update)?;
                let predicate = information.predicate_by_index(index);
                let precondition = predicate.substitute(assignment).simplify();
                debug!(
                    "update {} splits on `{}`, deriving `{}`",
                    update, predicate, precondition
                );
                return Ok(RefinementPredicates::new(
                    PredicateSource::WeakestPrecondition,
                    vec![precondition],
                ));
            }
        }
        Err(RefinementError::NoDeviation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    use test_log::test;

    use crate::abstractor::EnumerativeAbstractor;
    use crate::bdd::BddManager;
    use crate::bitvector::BitVector;
    use crate::equivalence::EnumerativeEquivalenceChecker;
    use crate::expr::{Declarations, Expr};
    use crate::program::{Command, Program, Update};
    use crate::settings::RefinerSettings;

    fn decrement() -> (EnumerativeAbstractor<BddManager>, MenuGameRefiner<EnumerativeEquivalenceChecker>) {
        let mut decls = Declarations::new();
        decls.declare_int("x", 0, 3);
        let x = Expr::var("x");
        let program = Program::new(decls.clone(), x.clone().equals(3)).with_command(
            Command::new("c", x.clone().ge(1)).with_update(Update::new(1.0, [("x", x.clone() - 1)])),
        );
        let mut abstractor = EnumerativeAbstractor::new(Rc::new(BddManager::new()), program, [x.ge(1)]).unwrap();
        let checker = EnumerativeEquivalenceChecker::new(decls);
        let refiner = MenuGameRefiner::new(&mut abstractor, RefinerSettings::default(), checker).unwrap();
        (abstractor, refiner)
    }

    #[test]
    fn test_weakest_precondition() {
        let (abstractor, refiner) = decrement();
        let info = abstractor.abstraction_information();
        let dd = info.manager();
        let pivot = info.encode_valuation(&BitVector::from_bools(&[true]), true);
        let to = |bit: bool| {
            dd.apply_and(
                &info.encode_update(0),
                &info.encode_valuation(&BitVector::from_bools(&[bit]), false),
            )
        };
        let res = refiner
            .derive_predicates_from_differing_choices(
                &abstractor,
                &pivot,
                &info.encode_player1_choice(0),
                &to(false),
                &to(true),
            )
            .unwrap();
        assert_eq!(res.source, PredicateSource::WeakestPrecondition);
        assert_eq!(res.predicates, vec![Expr::var("x").ge(2)]);
    }

    #[test]
    fn test_bottom_yields_guard() {
        let (abstractor, refiner) = decrement();
        let info = abstractor.abstraction_information();
        let dd = info.manager();
        let pivot = info.encode_valuation(&BitVector::from_bools(&[true]), true);
        let lower = dd.apply_and(&info.encode_update(0), &info.encode_bottom_state(false));
        let upper = dd.apply_and(
            &info.encode_update(0),
            &info.encode_valuation(&BitVector::from_bools(&[true]), false),
        );
        let res = refiner
            .derive_predicates_from_differing_choices(&abstractor, &pivot, &info.encode_player1_choice(0), &lower, &upper)
            .unwrap();
        assert_eq!(res.source, PredicateSource::Guard);
        assert_eq!(res.predicates, vec![Expr::var("x").ge(1)]);
    }

    #[test]
    fn test_identical_choices_have_no_deviation() {
        let (abstractor, refiner) = decrement();
        let info = abstractor.abstraction_information();
        let dd = info.manager();
        let pivot = info.encode_valuation(&BitVector::from_bools(&[true]), true);
        let choice = dd.apply_and(
            &info.encode_update(0),
            &info.encode_valuation(&BitVector::from_bools(&[true]), false),
        );
        let res = refiner.derive_predicates_from_differing_choices(
            &abstractor,
            &pivot,
            &info.encode_player1_choice(0),
            &choice,
            &choice,
        );
        assert_eq!(res, Err(RefinementError::NoDeviation));

        let res = refiner.derive_predicates_from_differing_choices(&abstractor, &pivot, &dd.zero(), &choice, &choice);
        assert_eq!(res, Err(RefinementError::MissingPlayer1Choice));
    }

    #[test]
    fn test_equal_strategies_have_no_differing_choices() {
        let (mut abstractor, refiner) = decrement();
        let game = abstractor.build_game().unwrap();
        let info = abstractor.abstraction_information();
        let dd = info.manager();
        let pivot = info.encode_valuation(&BitVector::from_bools(&[true]), true);
        let player1 = info.encode_player1_choice(0);
        let player2 = dd.apply_and(&player1, &info.encode_player2_choice(1));
        let res = refiner.derive_predicates_from_pivot_state(
            &abstractor,
            &game,
            &pivot,
            &player1,
            &player2,
            &player1,
            &player2,
        );
        assert_eq!(res, Err(RefinementError::NoDifferingChoices));
    }

    #[test]
    fn test_mismatched_mappings() {
        let (abstractor, refiner) = decrement();
        let info = abstractor.abstraction_information();
        let dd = info.manager();
        let pivot = info.encode_valuation(&BitVector::from_bools(&[true]), true);
        let lower = dd.apply_and(
            &info.encode_update(0),
            &info.encode_valuation(&BitVector::from_bools(&[true]), false),
        );
        let res = refiner.derive_predicates_from_differing_choices(
            &abstractor,
            &pivot,
            &info.encode_player1_choice(0),
            &lower,
            &dd.zero(),
        );
        assert_eq!(res, Err(RefinementError::MismatchedUpdateMappings { lower: 1, upper: 0 }));
    }
}
