//! Ring Traffic Library
//!
//! A cellular-automaton traffic simulation on parallel circular lanes.

pub mod simulation;
