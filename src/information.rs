//! The encoding of predicates, commands and updates into diagram variables.
//!
//! Variable layout:
//!
//! - Player-1 variables encode the command index, most significant bit first.
//! - Auxiliary variables encode the update index, least significant bit first.
//! - A bottom (row, column) pair marks the bottom state.
//! - Every predicate owns a (row, column) pair; row variables describe the
//!   source state of a transition, column variables the target state.
//! - Player-2 variables encode which abstract distribution Player 2 picked,
//!   least significant bit first. They are allocated on demand.

use std::collections::BTreeMap;
use std::ops::Range;
use std::rc::Rc;

use log::debug;

use crate::bitvector::BitVector;
use crate::dd::{variable_pairs, DdManager};
use crate::error::AbstractionError;
use crate::expr::Expr;
use crate::types::{Var, VarSet};

/// Number of bits needed to encode `count` distinct values (at least one).
fn bits_for(count: usize) -> usize {
    let mut bits = 1;
    while (1usize << bits) < count {
        bits += 1;
    }
    bits
}

/// Reads bits as an unsigned integer, the first bit being the least significant.
pub fn bits_to_raw(bits: impl IntoIterator<Item = bool>) -> u64 {
    bits.into_iter()
        .enumerate()
        .fold(0, |acc, (i, b)| acc | ((b as u64) << i))
}

pub struct AbstractionInformation<M: DdManager> {
    manager: Rc<M>,
    num_commands: usize,
    max_updates: usize,
    predicates: Vec<Expr>,
    predicate_vars: Vec<(Var, Var)>,
    bottom_vars: (Var, Var),
    player1_vars: Vec<Var>,
    player2_vars: Vec<Var>,
    aux_vars: Vec<Var>,
}

impl<M: DdManager> AbstractionInformation<M> {
    /// Allocates the command, update and bottom variables.
    pub fn new(manager: Rc<M>, num_commands: usize, max_updates: usize) -> Self {
        let player1_vars = (0..bits_for(num_commands))
            .map(|_| manager.new_variable())
            .collect();
        let aux_vars = (0..bits_for(max_updates))
            .map(|_| manager.new_variable())
            .collect();
        let bottom_row = manager.new_variable();
        let bottom_col = manager.new_variable();
        Self {
            manager,
            num_commands,
            max_updates,
            predicates: Vec::new(),
            predicate_vars: Vec::new(),
            bottom_vars: (bottom_row, bottom_col),
            player1_vars,
            player2_vars: Vec::new(),
            aux_vars,
        }
    }

    pub fn manager(&self) -> &Rc<M> {
        &self.manager
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    /// Registers a predicate and returns its index. A structurally equal
    /// predicate that is already known keeps its index.
    pub fn add_predicate(&mut self, predicate: Expr) -> usize {
        if let Some(index) = self.predicates.iter().position(|p| *p == predicate) {
            return index;
        }
        let row = self.manager.new_variable();
        let col = self.manager.new_variable();
        debug!(
            "predicate #{} `{}` encoded by ({}, {})",
            self.predicates.len(),
            predicate,
            row,
            col
        );
        self.predicates.push(predicate);
        self.predicate_vars.push((row, col));
        self.predicates.len() - 1
    }

    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
    }

    pub fn predicate_by_index(&self, index: usize) -> &Expr {
        &self.predicates[index]
    }

    pub fn num_predicates(&self) -> usize {
        self.predicates.len()
    }

    pub fn num_commands(&self) -> usize {
        self.num_commands
    }

    pub fn max_updates(&self) -> usize {
        self.max_updates
    }

    pub fn player1_choice_range(&self) -> Range<usize> {
        0..self.num_commands
    }

    // ========================================================================
    // Variable sets
    // ========================================================================

    /// Source-state variables: the bottom row variable and all predicate row variables.
    pub fn row_variables(&self) -> VarSet {
        std::iter::once(self.bottom_vars.0)
            .chain(self.predicate_vars.iter().map(|&(row, _)| row))
            .collect()
    }

    /// Target-state variables: the bottom column variable and all predicate column variables.
    pub fn column_variables(&self) -> VarSet {
        std::iter::once(self.bottom_vars.1)
            .chain(self.predicate_vars.iter().map(|&(_, col)| col))
            .collect()
    }

    pub fn row_column_pairs(&self) -> Vec<(Var, Var)> {
        variable_pairs(&self.row_variables(), &self.column_variables())
    }

    pub fn player1_variables(&self) -> VarSet {
        self.player1_vars.iter().copied().collect()
    }

    pub fn player2_variables(&self) -> VarSet {
        self.player2_vars.iter().copied().collect()
    }

    pub fn aux_variables(&self) -> VarSet {
        self.aux_vars.iter().copied().collect()
    }

    /// Allocates enough Player-2 variables to encode `count` choices.
    pub fn ensure_player2_variables(&mut self, count: usize) {
        while self.player2_vars.len() < bits_for(count) {
            self.player2_vars.push(self.manager.new_variable());
        }
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    fn encode_bits(&self, vars: &[Var], bits: impl Fn(usize) -> bool) -> M::Bdd {
        let values: Vec<bool> = (0..vars.len()).map(bits).collect();
        self.manager.cube(vars, &values)
    }

    /// The Player-1 choice of command `index`, most significant bit first.
    pub fn encode_player1_choice(&self, index: usize) -> M::Bdd {
        let width = self.player1_vars.len();
        self.encode_bits(&self.player1_vars, |i| (index >> (width - 1 - i)) & 1 == 1)
    }

    /// Recovers the command index from a raw value whose least significant bit
    /// holds the first Player-1 variable.
    pub fn decode_player1_choice(&self, raw: u64, width: usize) -> usize {
        (0..width)
            .filter(|&i| (raw >> i) & 1 == 1)
            .fold(0, |acc, i| acc | (1 << (width - 1 - i)))
    }

    pub fn encode_player2_choice(&self, index: usize) -> M::Bdd {
        assert!(
            index < (1 << self.player2_vars.len()),
            "Player-2 choice {} needs more than {} variables",
            index,
            self.player2_vars.len()
        );
        self.encode_bits(&self.player2_vars, |i| (index >> i) & 1 == 1)
    }

    pub fn encode_update(&self, index: usize) -> M::Bdd {
        self.encode_bits(&self.aux_vars, |i| (index >> i) & 1 == 1)
    }

    /// The abstract state with the given predicate valuation, over row (`source`)
    /// or column variables. The bottom bit is cleared.
    pub fn encode_valuation(&self, valuation: &BitVector, source: bool) -> M::Bdd {
        assert_eq!(valuation.len(), self.predicates.len(), "Valuation width mismatch");
        let pick = |(row, col): (Var, Var)| if source { row } else { col };
        let mut vars = vec![pick(self.bottom_vars)];
        let mut values = vec![false];
        for (i, &pair) in self.predicate_vars.iter().enumerate() {
            vars.push(pick(pair));
            values.push(valuation.get(i));
        }
        self.manager.cube(&vars, &values)
    }

    /// The bottom state over row (`source`) or column variables.
    pub fn bottom_states(&self, source: bool) -> M::Bdd {
        let var = if source {
            self.bottom_vars.0
        } else {
            self.bottom_vars.1
        };
        self.manager.mk_var(var)
    }

    /// The canonical encoding of the bottom state: the bottom bit set, all predicate bits cleared.
    pub fn encode_bottom_state(&self, source: bool) -> M::Bdd {
        let pick = |(row, col): (Var, Var)| if source { row } else { col };
        let mut vars = vec![pick(self.bottom_vars)];
        let mut values = vec![true];
        for &pair in &self.predicate_vars {
            vars.push(pick(pair));
            values.push(false);
        }
        self.manager.cube(&vars, &values)
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Predicate valuation of some (the first) state in `states`, a set over row variables.
    ///
    /// Returns `None` for the empty set and for the bottom state.
    pub fn decode_state(&self, states: &M::Bdd) -> Option<BitVector> {
        let row_vars = self.row_variables();
        let minterm = self.manager.minterms(states, &row_vars).into_iter().next()?;
        if minterm[0] {
            return None;
        }
        // Row variables are sorted like the predicates, after the bottom variable.
        Some(BitVector::from_bools(&minterm[1..]))
    }

    /// Decodes the command chosen in `choice`, a set over Player-1 variables.
    pub fn decode_player1_set(&self, choice: &M::Bdd) -> Result<usize, AbstractionError> {
        let vars = self.player1_variables();
        let minterm = self
            .manager
            .minterms(choice, &vars)
            .into_iter()
            .next()
            .ok_or(AbstractionError::UnknownCommand(usize::MAX))?;
        let index = self.decode_player1_choice(bits_to_raw(minterm), vars.len());
        if index >= self.num_commands {
            return Err(AbstractionError::UnknownCommand(index));
        }
        Ok(index)
    }

    /// Maps each update index to the successor valuation it leads to, for a
    /// choice over auxiliary and column variables.
    ///
    /// Successors in the bottom state are skipped.
    pub fn decode_choice_to_update_successor_mapping(
        &self,
        choice: &M::Bdd,
    ) -> BTreeMap<u64, BitVector> {
        let aux = self.aux_variables();
        let cols = self.column_variables();
        let domain = aux.union(&cols);
        let aux_pos: Vec<usize> = aux.iter().filter_map(|v| domain.position(v)).collect();
        let bottom_pos = domain.position(self.bottom_vars.1);
        let pred_pos: Vec<usize> = self
            .predicate_vars
            .iter()
            .filter_map(|&(_, col)| domain.position(col))
            .collect();

        let mut mapping = BTreeMap::new();
        for minterm in self.manager.minterms(choice, &domain) {
            if bottom_pos.is_some_and(|p| minterm[p]) {
                continue;
            }
            let update = bits_to_raw(aux_pos.iter().map(|&p| minterm[p]));
            mapping.entry(update).or_insert_with(|| {
                let bits: Vec<bool> = pred_pos.iter().map(|&p| minterm[p]).collect();
                BitVector::from_bools(&bits)
            });
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::bdd::BddManager;

    fn information() -> AbstractionInformation<BddManager> {
        let mut info = AbstractionInformation::new(Rc::new(BddManager::new()), 3, 2);
        info.add_predicate(Expr::var("x").ge(1));
        info.add_predicate(Expr::var("x").ge(2));
        info
    }

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(0), 1);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(5), 3);
    }

    #[test]
    fn test_predicates_are_registered_once() {
        let mut info = information();
        assert_eq!(info.add_predicate(Expr::var("x").ge(1)), 0);
        assert_eq!(info.num_predicates(), 2);
        assert_eq!(info.row_variables().len(), 3);
        assert!(info.row_variables().is_disjoint(&info.column_variables()));
    }

    #[test]
    fn test_player1_round_trip() {
        let info = information();
        let manager = info.manager().clone();
        for command in info.player1_choice_range() {
            let choice = info.encode_player1_choice(command);
            assert_eq!(info.decode_player1_set(&choice), Ok(command));
        }
        // Index 3 is encodable with two bits, but there are only 3 commands.
        let invalid = manager.cube(info.player1_variables().as_slice(), &[true, true]);
        assert_eq!(
            info.decode_player1_set(&invalid),
            Err(AbstractionError::UnknownCommand(3))
        );
    }

    #[test]
    fn test_decode_player1_choice_reverses_bits() {
        let info = information();
        // First variable set, second cleared: LSB-first raw 0b01 is command 0b10.
        assert_eq!(info.decode_player1_choice(0b01, 2), 2);
        assert_eq!(info.decode_player1_choice(0b10, 2), 1);
    }

    #[test]
    fn test_valuation_round_trip() {
        let info = information();
        let valuation = BitVector::from_bools(&[true, false]);
        let state = info.encode_valuation(&valuation, true);
        assert_eq!(info.decode_state(&state), Some(valuation));
        assert_eq!(info.decode_state(&info.bottom_states(true)), None);
    }

    #[test]
    fn test_update_successor_mapping() {
        let info = information();
        let manager = info.manager().clone();
        let to_10 = info.encode_valuation(&BitVector::from_bools(&[true, false]), false);
        let to_11 = info.encode_valuation(&BitVector::from_bools(&[true, true]), false);
        let choice = manager.apply_or(
            &manager.apply_and(&info.encode_update(0), &to_10),
            &manager.apply_and(&info.encode_update(1), &to_11),
        );
        let mapping = info.decode_choice_to_update_successor_mapping(&choice);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping[&0], BitVector::from_bools(&[true, false]));
        assert_eq!(mapping[&1], BitVector::from_bools(&[true, true]));
    }
}
