use thiserror::Error;

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unbound variable `{0}`")]
    UnboundVariable(String),
    #[error("type mismatch in `{expr}`: expected {expected}")]
    TypeMismatch { expr: String, expected: &'static str },
    #[error("arithmetic overflow in `{0}`")]
    Overflow(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EquivalenceError {
    #[error("variable `{0}` has no declared domain")]
    UndeclaredVariable(String),
    #[error("{count} assignments exceed the enumeration limit of {limit}")]
    TooManyAssignments { count: u128, limit: u128 },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbstractionError {
    #[error("command index {0} is out of range")]
    UnknownCommand(usize),
    #[error("update {update} of command {command} does not exist")]
    UnknownUpdate { command: usize, update: usize },
    #[error("variable `{variable}` has no declared domain")]
    UndeclaredVariable { variable: String },
    #[error("value {value} of `{variable}` is outside its declared domain")]
    OutOfDomain { variable: String, value: String },
    #[error("{count} concrete states exceed the enumeration limit of {limit}")]
    TooManyStates { count: u128, limit: u128 },
    #[error("probabilities of command `{command}` sum to {sum}")]
    InvalidDistribution { command: String, sum: f64 },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Fatal failures of a refinement call.
///
/// Every variant except the wrapped collaborator errors is an internal
/// consistency violation: the analysis results handed to the refiner
/// contradict the game they were computed on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefinementError {
    #[error("update-successor mappings have different sizes ({lower} vs {upper})")]
    MismatchedUpdateMappings { lower: usize, upper: usize },
    #[error("update indices of the lower and upper choice differ ({lower} vs {upper})")]
    UpdateIndexMismatch { lower: u64, upper: u64 },
    #[error("quantitative refinement found no pivot candidates")]
    NoQuantitativePivotCandidates,
    #[error("the successor mappings of the chosen choices do not differ")]
    NoDeviation,
    #[error("neither the min nor the max strategy has differing choices at the pivot state")]
    NoDifferingChoices,
    #[error("no pivot candidate is reachable from the initial states")]
    PivotUnreachable,
    #[error("no Player-1 choice is defined at the pivot state")]
    MissingPlayer1Choice,
    #[error("explanatory trace is broken: {0}")]
    TraceBroken(String),
    #[error(transparent)]
    Equivalence(#[from] EquivalenceError),
    #[error(transparent)]
    Abstraction(#[from] AbstractionError),
}
