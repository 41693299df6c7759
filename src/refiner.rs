//! The refinement orchestrator.

use log::{debug, info};

use crate::abstractor::MenuGameAbstractor;
use crate::dd::DdManager;
use crate::equivalence::EquivalenceChecker;
use crate::error::RefinementError;
use crate::expr::Expr;
use crate::game::{
    MenuGame, PredicateSource, QualitativeResultMinMax, QuantitativeResultMinMax, RefinementCommand,
};
use crate::information::AbstractionInformation;
use crate::pivot::{compute_pivot_states, pick_pivot_state};
use crate::settings::RefinerSettings;
use crate::split::PredicateSplitter;
use crate::trace::{build_explanatory_trace, most_probable_path_spanning_tree, ExplanatoryTrace};
use crate::types::OptimizationDirection;

/// What a refinement call did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefinementOutcome {
    /// New predicates were handed to the abstractor.
    Refined {
        predicates: Vec<Expr>,
        trace: Option<ExplanatoryTrace>,
    },
    /// Every derived predicate was already known, nothing was issued.
    Redundant,
    /// The qualitative strategies agree on all reachable states.
    NoPivotCandidates,
}

impl RefinementOutcome {
    /// Whether the abstraction changed.
    pub fn performed(&self) -> bool {
        matches!(self, RefinementOutcome::Refined { .. })
    }
}

/// Refines a menu-game abstraction where lower and upper strategies disagree.
///
/// The refiner does not keep the abstractor: every call borrows it mutably for
/// the duration of one refinement step.
#[derive(Debug, Clone)]
pub struct MenuGameRefiner<E: EquivalenceChecker> {
    settings: RefinerSettings,
    splitter: PredicateSplitter,
    checker: E,
}

impl<E: EquivalenceChecker> MenuGameRefiner<E> {
    /// Creates a refiner, seeding `abstractor` with all command guards when
    /// [`RefinerSettings::add_all_guards`] is set.
    pub fn new<M, A>(
        abstractor: &mut A,
        settings: RefinerSettings,
        checker: E,
    ) -> Result<Self, RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        let refiner = Self {
            settings,
            splitter: PredicateSplitter::new(),
            checker,
        };
        if settings.add_all_guards {
            let guards = abstractor
                .player1_choice_range()
                .map(|command| abstractor.guard(command))
                .collect::<Result<Vec<_>, _>>()?;
            debug!("seeding abstraction with {} guards", guards.len());
            let predicates = refiner.preprocess_predicates(
                abstractor.abstraction_information(),
                &guards,
                settings.split_initial_guards,
            )?;
            refiner.issue(abstractor, predicates, None)?;
        }
        Ok(refiner)
    }

    pub fn settings(&self) -> &RefinerSettings {
        &self.settings
    }

    /// Refines with the given predicates, bypassing pivot selection.
    pub fn refine_with_predicates<M, A>(
        &self,
        abstractor: &mut A,
        predicates: &[Expr],
    ) -> Result<RefinementOutcome, RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        let predicates = self.preprocess_predicates(
            abstractor.abstraction_information(),
            predicates,
            self.settings.split_predicates,
        )?;
        self.issue(abstractor, predicates, None)
    }

    /// Refines based on the prob0/prob1 strategies of a qualitative analysis.
    ///
    /// Returns [`RefinementOutcome::NoPivotCandidates`] when the strategies
    /// agree on every reachable state; a quantitative pass is needed then.
    pub fn refine_qualitative<M, A>(
        &self,
        abstractor: &mut A,
        game: &MenuGame<M>,
        transition_matrix_bdd: &M::Bdd,
        result: &QualitativeResultMinMax<M::Bdd>,
    ) -> Result<RefinementOutcome, RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        let dd = game.manager();
        let max_player1 = &result.prob1_max.player1_strategy;
        let max_player2 = &result.prob1_max.player2_strategy;
        let min_player2 = &result.prob0_min.player2_strategy;

        // Follow the upper Player-1 choice wherever it still leads into a prob0 Player-2 state.
        let redirect = dd.and_exists(
            max_player1,
            &result.prob0_min.player2_states,
            game.player1_variables(),
        );
        let min_player1 = dd.apply_ite(&redirect, max_player1, &result.prob0_min.player1_strategy);

        let pivot_result = compute_pivot_states(
            game,
            transition_matrix_bdd,
            &min_player1,
            min_player2,
            max_player1,
            max_player2,
        );
        if dd.is_zero(&pivot_result.pivot_states) {
            info!("no pivot candidates, qualitative result is precise");
            return Ok(RefinementOutcome::NoPivotCandidates);
        }

        let (pivot_state, direction) = pick_pivot_state(
            dd,
            game.initial_states(),
            &pivot_result.reachable_transitions_min,
            &pivot_result.reachable_transitions_max,
            game.row_variables(),
            game.column_variables(),
            &pivot_result.pivot_states,
            None,
        )?;
        let strategies = match direction {
            OptimizationDirection::Minimize => (&min_player1, min_player2),
            OptimizationDirection::Maximize => (max_player1, max_player2),
        };
        let trace = self.explain(abstractor, game, &pivot_state, strategies)?;

        let derived = self.derive_predicates_from_pivot_state(
            abstractor,
            game,
            &pivot_state,
            &min_player1,
            min_player2,
            max_player1,
            max_player2,
        )?;
        let predicates = self.preprocess_predicates(
            abstractor.abstraction_information(),
            &derived.predicates,
            self.split_for(derived.source),
        )?;
        self.issue(abstractor, predicates, trace)
    }

    /// Refines based on the optimal strategies of a quantitative analysis.
    ///
    /// Fails with [`RefinementError::NoQuantitativePivotCandidates`] when the
    /// strategies agree everywhere.
    pub fn refine_quantitative<M, A>(
        &self,
        abstractor: &mut A,
        game: &MenuGame<M>,
        transition_matrix_bdd: &M::Bdd,
        result: &QuantitativeResultMinMax<M::Bdd, M::Add>,
    ) -> Result<RefinementOutcome, RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        let dd = game.manager();
        let (min, max) = (&result.min, &result.max);
        let pivot_result = compute_pivot_states(
            game,
            transition_matrix_bdd,
            &min.player1_strategy,
            &min.player2_strategy,
            &max.player1_strategy,
            &max.player2_strategy,
        );
        if dd.is_zero(&pivot_result.pivot_states) {
            return Err(RefinementError::NoQuantitativePivotCandidates);
        }

        let (pivot_state, direction) = pick_pivot_state(
            dd,
            game.initial_states(),
            &pivot_result.reachable_transitions_min,
            &pivot_result.reachable_transitions_max,
            game.row_variables(),
            game.column_variables(),
            &pivot_result.pivot_states,
            Some(result),
        )?;
        let chosen = match direction {
            OptimizationDirection::Minimize => min,
            OptimizationDirection::Maximize => max,
        };
        let trace = self.explain(
            abstractor,
            game,
            &pivot_state,
            (&chosen.player1_strategy, &chosen.player2_strategy),
        )?;

        let derived = self.derive_predicates_from_pivot_state(
            abstractor,
            game,
            &pivot_state,
            &min.player1_strategy,
            &min.player2_strategy,
            &max.player1_strategy,
            &max.player2_strategy,
        )?;
        let predicates = self.preprocess_predicates(
            abstractor.abstraction_information(),
            &derived.predicates,
            self.split_for(derived.source),
        )?;
        self.issue(abstractor, predicates, trace)
    }

    /// Splits predicates into atoms and drops every atom equivalent to a known
    /// predicate or to an atom accepted before it. Without `split`, the
    /// predicates are returned unchanged.
    pub fn preprocess_predicates<M: DdManager>(
        &self,
        information: &AbstractionInformation<M>,
        predicates: &[Expr],
        split: bool,
    ) -> Result<Vec<Expr>, RefinementError> {
        if !split {
            return Ok(predicates.to_vec());
        }

        let mut accepted: Vec<Expr> = Vec::new();
        for atom in self.splitter.split_all(predicates) {
            let mut redundant = false;
            for known in information.predicates().iter().chain(&accepted) {
                if self.checker.are_equivalent(&atom, known)? {
                    debug!("dropping `{}`, equivalent to `{}`", atom, known);
                    redundant = true;
                    break;
                }
            }
            if !redundant {
                accepted.push(atom);
            }
        }
        Ok(accepted)
    }

    fn split_for(&self, source: PredicateSource) -> bool {
        match source {
            PredicateSource::Guard => self.settings.split_guards,
            PredicateSource::WeakestPrecondition => self.settings.split_predicates,
        }
    }

    fn explain<M, A>(
        &self,
        abstractor: &A,
        game: &MenuGame<M>,
        pivot_state: &M::Bdd,
        (player1_strategy, player2_strategy): (&M::Bdd, &M::Bdd),
    ) -> Result<Option<ExplanatoryTrace>, RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        if !self.settings.explain_pivots {
            return Ok(None);
        }
        let dd = game.manager();
        let filter = dd.apply_and(player1_strategy, player2_strategy);
        let tree = most_probable_path_spanning_tree(game, pivot_state, &filter);
        let trace = build_explanatory_trace(
            game,
            abstractor.abstraction_information(),
            &tree,
            pivot_state,
            player1_strategy,
        )?;
        debug!("explanatory trace: {}", trace);
        Ok(Some(trace))
    }

    /// One command holding all predicates.
    fn create_global_refinement(&self, predicates: Vec<Expr>) -> Vec<RefinementCommand> {
        vec![RefinementCommand::new(predicates)]
    }

    fn perform_refinement<M, A>(
        &self,
        abstractor: &mut A,
        commands: &[RefinementCommand],
    ) -> Result<(), RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        for command in commands {
            abstractor.refine(command)?;
        }
        Ok(())
    }

    /// Issues the predicates the abstraction does not know yet.
    fn issue<M, A>(
        &self,
        abstractor: &mut A,
        mut predicates: Vec<Expr>,
        trace: Option<ExplanatoryTrace>,
    ) -> Result<RefinementOutcome, RefinementError>
    where
        M: DdManager,
        A: MenuGameAbstractor<M>,
    {
        let known = abstractor.abstraction_information().predicates();
        predicates.retain(|p| !known.contains(p));
        predicates.dedup();
        if predicates.is_empty() {
            info!("all derived predicates are already known");
            return Ok(RefinementOutcome::Redundant);
        }

        info!(
            "refining with {} predicate(s): {}",
            predicates.len(),
            predicates.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
        );
        let commands = self.create_global_refinement(predicates.clone());
        self.perform_refinement(abstractor, &commands)?;
        Ok(RefinementOutcome::Refined { predicates, trace })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    use test_log::test;

    use crate::abstractor::EnumerativeAbstractor;
    use crate::bdd::BddManager;
    use crate::equivalence::EnumerativeEquivalenceChecker;
    use crate::expr::Declarations;
    use crate::program::{Command, Program, Update};

    fn setup() -> (EnumerativeAbstractor<BddManager>, EnumerativeEquivalenceChecker) {
        let mut decls = Declarations::new();
        decls.declare_int("x", 0, 3).declare_int("y", 0, 1);
        let x = Expr::var("x");
        let y = Expr::var("y");
        let program = Program::new(decls.clone(), x.clone().equals(0).and(y.clone().equals(0)))
            .with_command(
                Command::new("inc", x.clone().le(2).and(y.clone().equals(0)))
                    .with_update(Update::new(1.0, [("x", x.clone() + 1)])),
            )
            .with_command(
                Command::new("flip", y.clone().equals(0).or(x.clone().ge(3)))
                    .with_update(Update::new(1.0, [("y", Expr::int(1) - y)])),
            );
        let abstractor =
            EnumerativeAbstractor::new(Rc::new(BddManager::new()), program, [x.ge(1)]).unwrap();
        (abstractor, EnumerativeEquivalenceChecker::new(decls))
    }

    #[test]
    fn test_preprocess_without_split_passes_through() {
        let (mut abstractor, checker) = setup();
        let refiner =
            MenuGameRefiner::new(&mut abstractor, RefinerSettings::default(), checker).unwrap();
        let x = Expr::var("x");
        let input = vec![x.clone().ge(1).and(x.clone().gt(0))];
        let res = refiner
            .preprocess_predicates(abstractor.abstraction_information(), &input, false)
            .unwrap();
        assert_eq!(res, input);
    }

    #[test]
    fn test_preprocess_drops_equivalent_atoms() {
        let (mut abstractor, checker) = setup();
        let refiner =
            MenuGameRefiner::new(&mut abstractor, RefinerSettings::default(), checker).unwrap();
        let x = Expr::var("x");
        let y = Expr::var("y");
        // `x > 0` is `x >= 1`, already known; `y <= 0` is `y = 0` on its domain.
        let input = vec![x.clone().gt(0).and(y.clone().equals(0)), y.clone().le(0).or(x.clone().ge(2))];
        let res = refiner
            .preprocess_predicates(abstractor.abstraction_information(), &input, true)
            .unwrap();
        assert_eq!(res, vec![y.equals(0), x.ge(2)]);
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let (mut abstractor, checker) = setup();
        let refiner =
            MenuGameRefiner::new(&mut abstractor, RefinerSettings::split_all(), checker).unwrap();
        let x = Expr::var("x");
        let input = vec![x.clone().ge(2).and(x.ge(3))];
        let first = refiner.refine_with_predicates(&mut abstractor, &input).unwrap();
        assert!(first.performed());
        let second = refiner.refine_with_predicates(&mut abstractor, &input).unwrap();
        assert_eq!(second, RefinementOutcome::Redundant);
        assert!(!second.performed());
    }

    #[test]
    fn test_guard_seeding() {
        let (mut abstractor, checker) = setup();
        let settings = RefinerSettings::default()
            .with_add_all_guards(true)
            .with_split_initial_guards(true);
        MenuGameRefiner::new(&mut abstractor, settings, checker).unwrap();
        let x = Expr::var("x");
        let y = Expr::var("y");
        // `x >= 1` was already known. `x >= 3` negates `x <= 2` but is not equivalent to it.
        assert_eq!(
            abstractor.abstraction_information().predicates(),
            &[x.clone().ge(1), x.clone().le(2), y.equals(0), x.ge(3)]
        );
    }

    #[test]
    fn test_guard_seeding_without_split() {
        let (mut abstractor, checker) = setup();
        let settings = RefinerSettings::default().with_add_all_guards(true);
        MenuGameRefiner::new(&mut abstractor, settings, checker).unwrap();
        assert_eq!(abstractor.abstraction_information().num_predicates(), 3);
    }
}
