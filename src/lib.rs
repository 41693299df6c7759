//! # menu-refiner: counterexample-guided refinement of menu games
//!
//! **`menu-refiner`** refines predicate abstractions of probabilistic programs.
//! The abstraction is a *menu game*: a symbolic two-player stochastic game in which
//! Player 1 picks a command and Player 2 picks one of the abstract distributions
//! that command may induce.
//!
//! After the game has been solved for a lower (min) and an upper (max) bound, the
//! refiner looks for a *pivot state*: a reachable state where the lower and upper
//! strategies of Player 2 disagree. At the pivot, it compares the two choices and
//! derives a new predicate:
//!
//! - if one choice runs into the **bottom state**, the command's guard was not
//!   decided by the predicates, so the guard itself becomes a predicate;
//! - otherwise the first update whose successors differ tells which predicate
//!   separates them, and its **weakest precondition** through that update
//!   becomes the new predicate.
//!
//! New predicates are optionally split into atoms, compared against the known
//! predicates for equivalence, and handed to the abstractor.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use menu_refiner::abstractor::{EnumerativeAbstractor, MenuGameAbstractor};
//! use menu_refiner::bdd::BddManager;
//! use menu_refiner::equivalence::EnumerativeEquivalenceChecker;
//! use menu_refiner::expr::{Declarations, Expr};
//! use menu_refiner::program::{Command, Program, Update};
//! use menu_refiner::refiner::MenuGameRefiner;
//! use menu_refiner::settings::RefinerSettings;
//!
//! let mut decls = Declarations::new();
//! decls.declare_int("x", 0, 3);
//! let x = Expr::var("x");
//! let program = Program::new(decls.clone(), x.clone().equals(3)).with_command(
//!     Command::new("dec", x.clone().ge(1)).with_update(Update::new(1.0, [("x", x.clone() - 1)])),
//! );
//!
//! let manager = Rc::new(BddManager::new());
//! let mut abstractor = EnumerativeAbstractor::new(manager, program, [x.clone().ge(1)]).unwrap();
//! let checker = EnumerativeEquivalenceChecker::new(decls);
//! let refiner = MenuGameRefiner::new(&mut abstractor, RefinerSettings::default(), checker).unwrap();
//!
//! let outcome = refiner.refine_with_predicates(&mut abstractor, &[x.ge(2)]).unwrap();
//! assert!(outcome.performed());
//! assert_eq!(abstractor.abstraction_information().num_predicates(), 2);
//! ```
//!
//! ## Core Components
//!
//! - **[`dd`]**: the decision-diagram algebra, implemented by [`bdd::BddManager`] and [`explicit::ExplicitManager`].
//! - **[`information`]**: how predicates, commands and updates map to diagram variables.
//! - **[`abstractor`]**: builds menu games from a program and a predicate set.
//! - **[`pivot`]**, **[`derive`]**, **[`trace`]**: the steps of one refinement.
//! - **[`refiner`]**: the [`MenuGameRefiner`][crate::refiner::MenuGameRefiner] orchestrator.

pub mod abstractor;
pub mod bdd;
pub mod bitvector;
pub mod cache;
pub mod dd;
pub mod derive;
pub mod equivalence;
pub mod error;
pub mod explicit;
pub mod expr;
pub mod game;
pub mod information;
pub mod node;
pub mod pivot;
pub mod program;
pub mod reference;
pub mod refiner;
pub mod settings;
pub mod split;
pub mod trace;
pub mod types;
