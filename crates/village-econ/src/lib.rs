#![deny(warnings)]

//! Production economics for the village: the modifier stack and the
//! tiered production/consumption engine.
//!
//! - [`modifiers`] defines the read-only bonus providers consumed by the engine
//! - [`engine`] applies a tick to a [`village_core::GameState`] and answers
//!   per-second rate queries with the same multiplier function

pub mod engine;
pub mod modifiers;

pub use engine::{ProductionEngine, ProductionRates};
pub use modifiers::{ModifierProviders, NeutralModifiers, StateModifiers};
