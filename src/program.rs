//! Bounded probabilistic guarded-command programs.

use crate::error::AbstractionError;
use crate::expr::{Assignment, Declarations, Expr, Valuation};

/// One probabilistic branch of a command.
#[derive(Debug, Clone)]
pub struct Update {
    pub probability: f64,
    pub assignment: Assignment,
}

impl Update {
    pub fn new<I, S>(probability: f64, assignment: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        Self {
            probability,
            assignment: assignment
                .into_iter()
                .map(|(name, e)| (name.into(), e))
                .collect(),
        }
    }

    /// The successor of `state`: all right-hand sides are evaluated in `state`.
    pub fn apply(
        &self,
        state: &Valuation,
        declarations: &Declarations,
    ) -> Result<Valuation, AbstractionError> {
        let mut next = state.clone();
        for (name, rhs) in &self.assignment {
            let value = rhs.evaluate(state)?;
            let domain =
                declarations
                    .domain(name)
                    .ok_or_else(|| AbstractionError::UndeclaredVariable {
                        variable: name.clone(),
                    })?;
            if !domain.contains(value) {
                return Err(AbstractionError::OutOfDomain {
                    variable: name.clone(),
                    value: value.to_string(),
                });
            }
            next.insert(name.clone(), value);
        }
        Ok(next)
    }
}

#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub guard: Expr,
    pub updates: Vec<Update>,
}

impl Command {
    pub fn new(name: impl Into<String>, guard: Expr) -> Self {
        Self {
            name: name.into(),
            guard,
            updates: Vec::new(),
        }
    }

    pub fn with_update(mut self, update: Update) -> Self {
        self.updates.push(update);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub declarations: Declarations,
    pub initial: Expr,
    pub commands: Vec<Command>,
}

impl Program {
    pub fn new(declarations: Declarations, initial: Expr) -> Self {
        Self {
            declarations,
            initial,
            commands: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn command(&self, index: usize) -> Result<&Command, AbstractionError> {
        self.commands
            .get(index)
            .ok_or(AbstractionError::UnknownCommand(index))
    }

    /// Checks that every command has a probability distribution over its updates,
    /// and that all assigned variables are declared.
    pub fn validate(&self) -> Result<(), AbstractionError> {
        for command in &self.commands {
            let sum: f64 = command.updates.iter().map(|u| u.probability).sum();
            if (sum - 1.0).abs() > 1e-9 {
                return Err(AbstractionError::InvalidDistribution {
                    command: command.name.clone(),
                    sum,
                });
            }
            for update in &command.updates {
                if let Some(name) = update
                    .assignment
                    .keys()
                    .find(|name| self.declarations.domain(name).is_none())
                {
                    return Err(AbstractionError::UndeclaredVariable {
                        variable: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
