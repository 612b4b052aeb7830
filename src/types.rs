//! This module defines the core data structures and types used throughout the automaton
//! engine, including states, transitions, typed update patches, verdicts, and error types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::Rule;

/// A symbol read by an automaton. Input strings are consumed one `char` at a time.
pub type Symbol = char;
/// The identifier of a state, unique within one automaton.
pub type StateId = String;

/// The distinguished empty-string symbol. Legal on NFA transitions only and never a
/// valid input symbol.
pub const EPSILON: Symbol = 'ε';
/// The prefix used when minting fresh state identifiers (`q0`, `q1`, ...).
pub const STATE_ID_PREFIX: char = 'q';
/// The maximum allowed size for an automaton definition in bytes.
pub const MAX_DEFINITION_SIZE: usize = 65536; // 64KB

/// The kind of an automaton, which decides both the validity rules enforced by the
/// mutators and the semantics used by the simulator.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Deterministic: at most one transition per `(state, symbol)`, no epsilon moves.
    #[default]
    Dfa,
    /// Non-deterministic: any number of transitions per `(state, symbol)`, epsilon moves allowed.
    Nfa,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Dfa => write!(f, "dfa"),
            Kind::Nfa => write!(f, "nfa"),
        }
    }
}

/// A single state of an automaton.
///
/// The position is cosmetic. The engine carries it through edits and compositions
/// but never reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct State {
    /// Unique identifier of the state.
    pub id: StateId,
    /// Display label, equal to the id unless renamed.
    pub label: String,
    /// Horizontal position on the canvas.
    pub x: f64,
    /// Vertical position on the canvas.
    pub y: f64,
    /// Whether this is the (single) initial state.
    pub is_initial: bool,
    /// Whether this is an accepting state.
    pub is_final: bool,
}

impl State {
    /// Creates a state whose label matches its id.
    pub fn new(id: impl Into<StateId>, x: f64, y: f64, is_initial: bool, is_final: bool) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            x,
            y,
            is_initial,
            is_final,
        }
    }
}

/// A typed partial update for a [`State`]. Only the fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub label: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub is_initial: Option<bool>,
    pub is_final: Option<bool>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn initial(mut self, is_initial: bool) -> Self {
        self.is_initial = Some(is_initial);
        self
    }

    pub fn final_state(mut self, is_final: bool) -> Self {
        self.is_final = Some(is_final);
        self
    }

    pub(crate) fn apply(self, state: &mut State) {
        if let Some(label) = self.label {
            state.label = label;
        }
        if let Some(x) = self.x {
            state.x = x;
        }
        if let Some(y) = self.y {
            state.y = y;
        }
        if let Some(is_initial) = self.is_initial {
            state.is_initial = is_initial;
        }
        if let Some(is_final) = self.is_final {
            state.is_final = is_final;
        }
    }
}

/// The identity of a transition. Two transitions with the same source, symbol and
/// target are the same transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionKey {
    pub from: StateId,
    pub symbol: Symbol,
    pub to: StateId,
}

impl TransitionKey {
    pub fn new(from: impl Into<StateId>, symbol: Symbol, to: impl Into<StateId>) -> Self {
        Self {
            from: from.into(),
            symbol,
            to: to.into(),
        }
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.from, self.symbol, self.to)
    }
}

/// A labelled edge between two states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The source state.
    pub from: StateId,
    /// The target state.
    pub to: StateId,
    /// The symbol consumed by this transition, or [`EPSILON`].
    pub symbol: Symbol,
}

impl Transition {
    pub fn new(from: impl Into<StateId>, to: impl Into<StateId>, symbol: Symbol) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            symbol,
        }
    }

    /// Returns the structural key identifying this transition.
    pub fn key(&self) -> TransitionKey {
        TransitionKey::new(self.from.clone(), self.symbol, self.to.clone())
    }

    pub fn is_epsilon(&self) -> bool {
        self.symbol == EPSILON
    }
}

/// A typed partial update for a [`Transition`]. Changing either field re-keys the transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPatch {
    pub to: Option<StateId>,
    pub symbol: Option<Symbol>,
}

impl TransitionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, to: impl Into<StateId>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = Some(symbol);
        self
    }
}

/// The outcome of running an input string to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => write!(f, "accepted"),
            Verdict::Rejected => write!(f, "rejected"),
        }
    }
}

/// Represents the errors that can occur while editing, simulating, parsing or loading automata.
///
/// None of these are fatal. A rejected mutation leaves the automaton unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AutomatonError {
    /// A transition uses a symbol that is not part of the alphabet.
    #[error("Symbol '{0}' is not in the alphabet")]
    InvalidSymbol(Symbol),
    /// A DFA already has a transition leaving `from` on `symbol`.
    #[error("DFA already has a transition from state {from} on symbol {symbol}")]
    DuplicateDeterministicTransition { from: StateId, symbol: Symbol },
    /// A state id does not exist in the automaton.
    #[error("Unknown state: {0}")]
    UnknownState(StateId),
    /// A transition key does not exist in the automaton.
    #[error("Unknown transition: {0}")]
    UnknownTransition(TransitionKey),
    /// A simulation was requested on an automaton without an initial state.
    #[error("The automaton must have an initial state")]
    NoInitialState,
    /// An input string contains a symbol that is not part of the alphabet.
    #[error("Input symbol '{0}' is not in the alphabet")]
    UnknownSymbol(Symbol),
    /// An automaton id does not exist in the workbench library.
    #[error("Unknown automaton: {0}")]
    UnknownAutomaton(usize),
    /// Two automata are already selected for composition.
    #[error("Two automata are already selected")]
    SelectionFull,
    /// A composition was requested without exactly two selected automata.
    #[error("Composition needs two selected automata, {0} selected")]
    IncompleteSelection(usize),
    /// Indicates an error during the parsing of an automaton definition.
    #[error("Automaton parsing error: {0}")]
    ParseError(#[from] Box<pest::error::Error<Rule>>),
    /// Indicates a structural problem found by the analyzer.
    #[error("Automaton validation error: {0}")]
    ValidationError(String),
    /// Indicates a malformed JSON snapshot.
    #[error("Snapshot error: {0}")]
    SnapshotError(String),
    /// Indicates an error related to file system operations.
    #[error("File error: {0}")]
    FileError(String),
}
