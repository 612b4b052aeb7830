//! This crate provides the core logic for a finite-automaton workbench.
//! It includes the editable DFA/NFA model, a step-recording simulator, the union,
//! concatenation and intersection constructions, and the text and JSON formats used to
//! store automata.

pub mod analyzer;
pub mod automaton;
pub mod composer;
pub mod loader;
pub mod parser;
pub mod presets;
pub mod printer;
pub mod simulator;
pub mod snapshot;
pub mod types;
pub mod workbench;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
pub use analyzer::{analyze, report, unreachable_states, AnalysisError};
pub use automaton::{Automaton, TableRow, TransitionTable};
pub use composer::{concatenate, intersect, union, Composition, CompositionWarning, Operand};
pub use loader::{AutomatonLoader, Format};
pub use parser::parse;
pub use presets::{PresetInfo, PresetManager, PRESETS};
pub use printer::render;
pub use simulator::{epsilon_closure, run, simulate, Active, Simulation, Trace, TraceStep};
pub use snapshot::{from_json, restore, snapshot, to_json, Snapshot, TransitionRecord};
pub use types::{
    AutomatonError, Kind, State, StateId, StatePatch, Symbol, Transition, TransitionKey,
    TransitionPatch, Verdict, EPSILON, MAX_DEFINITION_SIZE, STATE_ID_PREFIX,
};
pub use workbench::{AutomatonId, Entry, Operation, Workbench};
