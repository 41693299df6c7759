//! Menu games, the analysis results computed on them, and refinement data.

use std::fmt;
use std::rc::Rc;

use crate::dd::DdManager;
use crate::expr::Expr;
use crate::information::AbstractionInformation;
use crate::types::{Var, VarSet};

/// A symbolic two-player stochastic game.
///
/// Player 1 picks a command, Player 2 picks one of the abstract distributions
/// of that command, and the auxiliary variables tell which update of the
/// command produced a successor.
pub struct MenuGame<M: DdManager> {
    manager: Rc<M>,
    row_variables: VarSet,
    column_variables: VarSet,
    row_column_pairs: Vec<(Var, Var)>,
    player1_variables: VarSet,
    player2_variables: VarSet,
    aux_variables: VarSet,
    extended_transition_matrix: M::Add,
    transition_matrix: M::Add,
    initial_states: M::Bdd,
    bottom_states: M::Bdd,
}

impl<M: DdManager> MenuGame<M> {
    /// Wraps a transition matrix over row, Player-1, Player-2, auxiliary and column
    /// variables encoded by `information`.
    pub fn new(
        information: &AbstractionInformation<M>,
        extended_transition_matrix: M::Add,
        initial_states: M::Bdd,
    ) -> Self {
        let manager = information.manager().clone();
        let aux_variables = information.aux_variables();
        let transition_matrix = manager.add_sum_abstract(&extended_transition_matrix, &aux_variables);
        Self {
            row_variables: information.row_variables(),
            column_variables: information.column_variables(),
            row_column_pairs: information.row_column_pairs(),
            player1_variables: information.player1_variables(),
            player2_variables: information.player2_variables(),
            aux_variables,
            bottom_states: information.bottom_states(true),
            extended_transition_matrix,
            transition_matrix,
            initial_states,
            manager,
        }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn row_variables(&self) -> &VarSet {
        &self.row_variables
    }

    pub fn column_variables(&self) -> &VarSet {
        &self.column_variables
    }

    pub fn row_column_pairs(&self) -> &[(Var, Var)] {
        &self.row_column_pairs
    }

    pub fn player1_variables(&self) -> &VarSet {
        &self.player1_variables
    }

    pub fn player2_variables(&self) -> &VarSet {
        &self.player2_variables
    }

    /// The probabilistic branching variables.
    pub fn aux_variables(&self) -> &VarSet {
        &self.aux_variables
    }

    /// Player-1 and Player-2 variables.
    pub fn nondeterminism_variables(&self) -> VarSet {
        self.player1_variables.union(&self.player2_variables)
    }

    /// Transition probabilities, including the auxiliary variables.
    pub fn extended_transition_matrix(&self) -> &M::Add {
        &self.extended_transition_matrix
    }

    /// Transition probabilities with the auxiliary variables summed out.
    pub fn transition_matrix(&self) -> &M::Add {
        &self.transition_matrix
    }

    /// The transition relation over row, Player-1, Player-2 and column variables.
    pub fn transition_matrix_bdd(&self) -> M::Bdd {
        self.manager.add_to_bdd(&self.transition_matrix)
    }

    pub fn extended_transition_matrix_bdd(&self) -> M::Bdd {
        self.manager.add_to_bdd(&self.extended_transition_matrix)
    }

    pub fn initial_states(&self) -> &M::Bdd {
        &self.initial_states
    }

    pub fn bottom_states(&self) -> &M::Bdd {
        &self.bottom_states
    }

    /// States reachable from the initial states under any choices.
    pub fn reachable_states(&self) -> M::Bdd {
        let relation = self
            .manager
            .exists_abstract(&self.transition_matrix_bdd(), &self.nondeterminism_variables());
        self.manager.reachable_states(
            &self.initial_states,
            &relation,
            &self.row_variables,
            &self.column_variables,
        )
    }
}

// ============================================================================
// Analysis results
// ============================================================================

/// A qualitative (probability 0 or 1) result for one player objective.
///
/// Player-1 strategies are sets over row and Player-1 variables, Player-2
/// states and strategies additionally range over Player-2 variables.
#[derive(Debug, Clone)]
pub struct QualitativeResult<B> {
    pub player1_states: B,
    pub player2_states: B,
    pub player1_strategy: B,
    pub player2_strategy: B,
}

#[derive(Debug, Clone)]
pub struct QualitativeResultMinMax<B> {
    pub prob0_min: QualitativeResult<B>,
    pub prob1_min: QualitativeResult<B>,
    pub prob0_max: QualitativeResult<B>,
    pub prob1_max: QualitativeResult<B>,
}

/// A quantitative result for one optimization direction.
#[derive(Debug, Clone)]
pub struct QuantitativeResult<B, A> {
    /// Values over row variables.
    pub values: A,
    pub player1_strategy: B,
    pub player2_strategy: B,
}

#[derive(Debug, Clone)]
pub struct QuantitativeResultMinMax<B, A> {
    pub min: QuantitativeResult<B, A>,
    pub max: QuantitativeResult<B, A>,
}

/// The strategy-restricted transitions and the pivot candidates of one refinement step.
#[derive(Debug, Clone)]
pub struct PivotStateResult<B> {
    pub reachable_transitions_min: B,
    pub reachable_transitions_max: B,
    pub pivot_states: B,
}

// ============================================================================
// Refinement data
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PredicateSource {
    Guard,
    WeakestPrecondition,
}

impl fmt::Display for PredicateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateSource::Guard => write!(f, "guard"),
            PredicateSource::WeakestPrecondition => write!(f, "weakest precondition"),
        }
    }
}

/// Predicates derived in one refinement step, tagged with where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementPredicates {
    pub source: PredicateSource,
    pub predicates: Vec<Expr>,
}

impl RefinementPredicates {
    pub fn new(source: PredicateSource, predicates: Vec<Expr>) -> Self {
        Self { source, predicates }
    }
}

/// The predicates the abstractor adds in one refinement step.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementCommand {
    predicates: Vec<Expr>,
}

impl RefinementCommand {
    pub fn new(predicates: Vec<Expr>) -> Self {
        Self { predicates }
    }

    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
    }
}
