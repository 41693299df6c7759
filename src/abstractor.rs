//! Game abstractors: build menu games from a program and a set of predicates.

use std::collections::BTreeMap;
use std::ops::Range;
use std::rc::Rc;

use log::{debug, info};

use crate::bitvector::BitVector;
use crate::dd::{AddOp, DdManager};
use crate::error::AbstractionError;
use crate::expr::{Assignment, Expr, Valuation, Valuations};
use crate::game::{MenuGame, RefinementCommand};
use crate::information::AbstractionInformation;
use crate::program::Program;

/// The collaborator that owns the abstraction and rebuilds the game.
pub trait MenuGameAbstractor<M: DdManager> {
    fn abstraction_information(&self) -> &AbstractionInformation<M>;

    /// Guard of the command with the given Player-1 choice index.
    fn guard(&self, command: usize) -> Result<Expr, AbstractionError>;

    /// Assignment performed by update `update` of command `command`.
    fn variable_updates(
        &self,
        command: usize,
        update: usize,
    ) -> Result<&Assignment, AbstractionError>;

    fn player1_choice_range(&self) -> Range<usize>;

    /// Adds the predicates of `command` to the abstraction.
    fn refine(&mut self, command: &RefinementCommand) -> Result<(), AbstractionError>;

    /// Builds the menu game for the current predicate set.
    fn build_game(&mut self) -> Result<MenuGame<M>, AbstractionError>;
}

/// The abstract distributions of one command in one abstract state.
#[derive(Debug, Default)]
struct AbstractChoices {
    /// Successor valuation per update, one entry per distinct distribution.
    distributions: Vec<Vec<BitVector>>,
    /// Some concrete state of the abstract state disables the guard.
    partially_disabled: bool,
}

/// Builds menu games by enumerating every concrete state of a bounded program.
///
/// Two concrete states are abstracted to the same abstract state when they agree
/// on all predicates. For each command, every distinct distribution over
/// abstract successors becomes a Player-2 choice. When the guard holds only in
/// part of an abstract state, an extra choice leads to the bottom state.
pub struct EnumerativeAbstractor<M: DdManager> {
    program: Program,
    information: AbstractionInformation<M>,
    concrete_states: Vec<Valuation>,
}

impl<M: DdManager> EnumerativeAbstractor<M> {
    pub const DEFAULT_STATE_LIMIT: u128 = 1 << 16;

    pub fn new(
        manager: Rc<M>,
        program: Program,
        initial_predicates: impl IntoIterator<Item = Expr>,
    ) -> Result<Self, AbstractionError> {
        Self::with_state_limit(manager, program, initial_predicates, Self::DEFAULT_STATE_LIMIT)
    }

    pub fn with_state_limit(
        manager: Rc<M>,
        program: Program,
        initial_predicates: impl IntoIterator<Item = Expr>,
        limit: u128,
    ) -> Result<Self, AbstractionError> {
        program.validate()?;
        let count = program.declarations.space_size();
        if count > limit {
            return Err(AbstractionError::TooManyStates { count, limit });
        }
        let vars = program
            .declarations
            .iter()
            .map(|(name, domain)| (name.to_string(), domain))
            .collect();
        let concrete_states: Vec<Valuation> = Valuations::new(vars).collect();

        let max_updates = program
            .commands
            .iter()
            .map(|c| c.updates.len())
            .max()
            .unwrap_or(1);
        let mut information =
            AbstractionInformation::new(manager, program.commands.len(), max_updates);
        for predicate in initial_predicates {
            information.add_predicate(predicate);
        }
        debug!(
            "abstracting {} concrete states with {} initial predicates",
            concrete_states.len(),
            information.num_predicates()
        );

        Ok(Self {
            program,
            information,
            concrete_states,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The predicate valuation of a concrete state.
    fn abstract_state(&self, state: &Valuation) -> Result<BitVector, AbstractionError> {
        let predicates = self.information.predicates();
        let mut res = BitVector::new(predicates.len());
        for (i, predicate) in predicates.iter().enumerate() {
            res.set(i, predicate.evaluate_bool(state)?);
        }
        Ok(res)
    }

    fn collect_choices(
        &self,
    ) -> Result<BTreeMap<(Vec<bool>, usize), AbstractChoices>, AbstractionError> {
        let mut choices: BTreeMap<(Vec<bool>, usize), AbstractChoices> = BTreeMap::new();
        for state in &self.concrete_states {
            let source = self.abstract_state(state)?;
            let key: Vec<bool> = source.iter().collect();
            for (index, command) in self.program.commands.iter().enumerate() {
                let entry = choices.entry((key.clone(), index)).or_default();
                if !command.guard.evaluate_bool(state)? {
                    entry.partially_disabled = true;
                    continue;
                }
                let successors = command
                    .updates
                    .iter()
                    .map(|update| {
                        let next = update.apply(state, &self.program.declarations)?;
                        self.abstract_state(&next)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if !entry.distributions.contains(&successors) {
                    entry.distributions.push(successors);
                }
            }
        }
        // Commands disabled in the whole abstract state contribute nothing.
        choices.retain(|_, entry| !entry.distributions.is_empty());
        Ok(choices)
    }
}

impl<M: DdManager> MenuGameAbstractor<M> for EnumerativeAbstractor<M> {
    fn abstraction_information(&self) -> &AbstractionInformation<M> {
        &self.information
    }

    fn guard(&self, command: usize) -> Result<Expr, AbstractionError> {
        Ok(self.program.command(command)?.guard.clone())
    }

    fn variable_updates(
        &self,
        command: usize,
        update: usize,
    ) -> Result<&Assignment, AbstractionError> {
        self.program
            .command(command)?
            .updates
            .get(update)
            .map(|u| &u.assignment)
            .ok_or(AbstractionError::UnknownUpdate { command, update })
    }

    fn player1_choice_range(&self) -> Range<usize> {
        self.information.player1_choice_range()
    }

    fn refine(&mut self, command: &RefinementCommand) -> Result<(), AbstractionError> {
        let before = self.information.num_predicates();
        for predicate in command.predicates() {
            self.information.add_predicate(predicate.clone());
        }
        info!(
            "refined abstraction from {} to {} predicates",
            before,
            self.information.num_predicates()
        );
        Ok(())
    }

    fn build_game(&mut self) -> Result<MenuGame<M>, AbstractionError> {
        let choices = self.collect_choices()?;

        let max_choices = choices
            .values()
            .map(|c| c.distributions.len() + c.partially_disabled as usize)
            .max()
            .unwrap_or(1);
        self.information.ensure_player2_variables(max_choices);

        let info = &self.information;
        let dd = info.manager().clone();
        let mut transitions = dd.add_constant(0.0);
        for ((source, index), entry) in &choices {
            let command = &self.program.commands[*index];
            let source = info.encode_valuation(&BitVector::from_bools(source), true);
            let base = dd.apply_and(&source, &info.encode_player1_choice(*index));

            for (choice, distribution) in entry.distributions.iter().enumerate() {
                let base = dd.apply_and(&base, &info.encode_player2_choice(choice));
                for (update, (successor, branch)) in
                    distribution.iter().zip(&command.updates).enumerate()
                {
                    let target = dd.apply_and(
                        &info.encode_update(update),
                        &info.encode_valuation(successor, false),
                    );
                    let edge = dd.to_add(&dd.apply_and(&base, &target));
                    let weighted =
                        dd.add_apply(AddOp::Times, &edge, &dd.add_constant(branch.probability));
                    transitions = dd.add_apply(AddOp::Plus, &transitions, &weighted);
                }
            }

            if entry.partially_disabled {
                let choice = entry.distributions.len();
                let base = dd.apply_and(&base, &info.encode_player2_choice(choice));
                let bottom = info.encode_bottom_state(false);
                for (update, branch) in command.updates.iter().enumerate() {
                    let target = dd.apply_and(&info.encode_update(update), &bottom);
                    let edge = dd.to_add(&dd.apply_and(&base, &target));
                    let weighted =
                        dd.add_apply(AddOp::Times, &edge, &dd.add_constant(branch.probability));
                    transitions = dd.add_apply(AddOp::Plus, &transitions, &weighted);
                }
            }
        }

        let mut initial = dd.zero();
        for state in &self.concrete_states {
            if self.program.initial.evaluate_bool(state)? {
                let encoded = info.encode_valuation(&self.abstract_state(state)?, true);
                initial = dd.apply_or(&initial, &encoded);
            }
        }

        debug!(
            "built menu game: {} (state, command) pairs, {} Player-2 variables",
            choices.len(),
            info.player2_variables().len()
        );
        Ok(MenuGame::new(info, transitions, initial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::bdd::BddManager;
    use crate::expr::Declarations;
    use crate::program::{Command, Update};

    fn coin() -> Program {
        let mut decls = Declarations::new();
        decls.declare_int("x", 0, 2);
        let x = Expr::var("x");
        Program::new(decls, x.clone().equals(0)).with_command(
            Command::new("flip", x.clone().le(1))
                .with_update(Update::new(0.5, [("x", x.clone() + 1)]))
                .with_update(Update::new(0.5, [("x", x)])),
        )
    }

    #[test]
    fn test_partially_enabled_guard_reaches_bottom() {
        let manager = Rc::new(BddManager::new());
        let x = Expr::var("x");
        let mut abstractor =
            EnumerativeAbstractor::new(manager.clone(), coin(), [x.clone().ge(1)]).unwrap();
        let game = abstractor.build_game().unwrap();
        let info = abstractor.abstraction_information();

        // In `x >= 1` the guard holds for x = 1 only, so the bottom state is a successor.
        let source = info.encode_valuation(&BitVector::from_bools(&[true]), true);
        let image = manager.relational_product(
            &source,
            &manager.exists_abstract(&game.transition_matrix_bdd(), &game.nondeterminism_variables()),
            game.row_variables(),
            game.column_variables(),
        );
        assert!(!manager.is_zero(&manager.apply_and(&image, game.bottom_states())));
        assert_eq!(info.decode_state(game.initial_states()), Some(BitVector::from_bools(&[false])));
    }

    #[test]
    fn test_distributions_are_stochastic() {
        let manager = Rc::new(BddManager::new());
        let mut abstractor = EnumerativeAbstractor::new(manager.clone(), coin(), Vec::<Expr>::new()).unwrap();
        let game = abstractor.build_game().unwrap();
        let columns = game.column_variables().clone();
        let sums = manager.add_sum_abstract(game.transition_matrix(), &columns);
        assert_eq!(manager.add_max_value(&sums), 1.0);
    }

    #[test]
    fn test_refine_adds_predicates() {
        let manager = Rc::new(BddManager::new());
        let x = Expr::var("x");
        let mut abstractor = EnumerativeAbstractor::new(manager, coin(), Vec::<Expr>::new()).unwrap();
        abstractor
            .refine(&RefinementCommand::new(vec![x.clone().ge(1), x.clone().ge(1)]))
            .unwrap();
        assert_eq!(abstractor.abstraction_information().predicates(), &[x.ge(1)]);
        assert!(matches!(
            abstractor.variable_updates(0, 2),
            Err(AbstractionError::UnknownUpdate { command: 0, update: 2 })
        ));
    }

    #[test]
    fn test_state_limit() {
        let res = EnumerativeAbstractor::with_state_limit(
            Rc::new(BddManager::new()),
            coin(),
            Vec::<Expr>::new(),
            2,
        );
        assert!(matches!(res, Err(AbstractionError::TooManyStates { count: 3, limit: 2 })));
    }
}
