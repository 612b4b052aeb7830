//! This module defines the `Automaton` struct, the editable DFA/NFA model. It owns the
//! alphabet, states and transitions and exposes the structural mutators that keep the
//! DFA/NFA validity rules intact.

use indexmap::IndexMap;
use tracing::debug;

use crate::types::{
    AutomatonError, Kind, State, StateId, StatePatch, Symbol, Transition, TransitionKey,
    TransitionPatch, EPSILON, STATE_ID_PREFIX,
};

/// An editable finite automaton.
///
/// States and transitions keep their insertion order, which is the order used when
/// compositions copy them and when tables are rendered. Every rejected mutation leaves
/// the automaton untouched and records a user-visible message in [`Automaton::error`].
#[derive(Debug, Clone, PartialEq)]
pub struct Automaton {
    name: String,
    kind: Kind,
    alphabet: Vec<Symbol>,
    states: IndexMap<StateId, State>,
    transitions: IndexMap<TransitionKey, Transition>,
    next_state_id: usize,
    error: Option<String>,
}

impl Default for Automaton {
    fn default() -> Self {
        Self::new(Kind::default())
    }
}

impl Automaton {
    /// Creates an empty automaton of the given kind.
    pub fn new(kind: Kind) -> Self {
        Self::with_name("", kind)
    }

    /// Creates an empty, named automaton of the given kind.
    pub fn with_name(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            alphabet: Vec::new(),
            states: IndexMap::new(),
            transitions: IndexMap::new(),
            next_state_id: 0,
            error: None,
        }
    }

    /// Assembles an automaton from already-built parts without validating them.
    pub(crate) fn from_parts(
        name: String,
        kind: Kind,
        alphabet: Vec<Symbol>,
        states: IndexMap<StateId, State>,
        transitions: IndexMap<TransitionKey, Transition>,
        next_state_id: usize,
        error: Option<String>,
    ) -> Self {
        Self {
            name,
            kind,
            alphabet,
            states,
            transitions,
            next_state_id,
            error,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns the alphabet in insertion order.
    pub fn alphabet(&self) -> &[Symbol] {
        &self.alphabet
    }

    pub fn has_symbol(&self, symbol: Symbol) -> bool {
        self.alphabet.contains(&symbol)
    }

    /// Returns the last recorded error message, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Returns the value of the counter used to mint the next state id.
    pub fn next_state_id(&self) -> usize {
        self.next_state_id
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    pub fn contains_state(&self, id: &str) -> bool {
        self.states.contains_key(id)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Returns the initial state, if one is marked.
    pub fn initial_state(&self) -> Option<&State> {
        self.states.values().find(|s| s.is_initial)
    }

    pub fn final_states(&self) -> impl Iterator<Item = &State> {
        self.states.values().filter(|s| s.is_final)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn transition(&self, key: &TransitionKey) -> Option<&Transition> {
        self.transitions.get(key)
    }

    pub fn contains_transition(&self, key: &TransitionKey) -> bool {
        self.transitions.contains_key(key)
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Returns every transition leaving `from` on `symbol`, in insertion order.
    pub fn transitions_from<'a>(
        &'a self,
        from: &'a str,
        symbol: Symbol,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions
            .values()
            .filter(move |t| t.from == from && t.symbol == symbol)
    }

    /// Switches between DFA and NFA.
    ///
    /// Existing transitions are kept as they are. Downgrading an NFA to a DFA does not
    /// purge transitions that violate determinism; run [`crate::analyze`] afterwards.
    pub fn set_kind(&mut self, kind: Kind) {
        self.kind = kind;
    }

    /// Appends a symbol to the alphabet. Returns `false` if it was already present.
    pub fn add_symbol(&mut self, symbol: Symbol) -> bool {
        if self.has_symbol(symbol) {
            return false;
        }

        self.alphabet.push(symbol);
        true
    }

    /// Removes a symbol from the alphabet together with every transition on it.
    /// Returns `false` if the symbol was not in the alphabet.
    pub fn remove_symbol(&mut self, symbol: Symbol) -> bool {
        if !self.has_symbol(symbol) {
            return false;
        }

        self.alphabet.retain(|&s| s != symbol);
        self.transitions.retain(|key, _| key.symbol != symbol);
        true
    }

    /// Adds a new state under a freshly minted `q<n>` id and returns that id.
    ///
    /// When `is_initial` is set, every other state loses its initial flag first.
    pub fn add_state(&mut self, x: f64, y: f64, is_initial: bool, is_final: bool) -> StateId {
        let id = self.mint_state_id();

        if is_initial {
            self.clear_initial_flags();
        }

        self.states
            .insert(id.clone(), State::new(id.clone(), x, y, is_initial, is_final));
        id
    }

    /// Inserts a state under its own id, keeping the id counter ahead of any `q<n>` id.
    pub(crate) fn insert_state(&mut self, state: State) {
        if let Some(n) = state
            .id
            .strip_prefix(STATE_ID_PREFIX)
            .and_then(|n| n.parse::<usize>().ok())
        {
            self.next_state_id = self.next_state_id.max(n.saturating_add(1));
        }

        self.states.insert(state.id.clone(), state);
    }

    /// Merges `patch` into the state `id`. Marking the state initial clears the flag on
    /// every other state.
    pub fn update_state(&mut self, id: &str, patch: StatePatch) -> Result<(), AutomatonError> {
        if !self.contains_state(id) {
            return self.reject(AutomatonError::UnknownState(id.to_string()));
        }

        if patch.is_initial == Some(true) {
            self.clear_initial_flags();
        }

        if let Some(state) = self.states.get_mut(id) {
            patch.apply(state);
        }

        Ok(())
    }

    /// Removes a state and every transition entering or leaving it.
    pub fn remove_state(&mut self, id: &str) -> Option<State> {
        let removed = self.states.shift_remove(id)?;
        self.transitions
            .retain(|key, _| key.from != id && key.to != id);
        Some(removed)
    }

    /// Adds the transition `from --symbol--> to`.
    ///
    /// The symbol must be in the alphabet; epsilon is accepted on an NFA only. A DFA
    /// refuses any second transition for an existing `(from, symbol)` pair, including an
    /// exact re-add of the same transition.
    pub fn add_transition(
        &mut self,
        from: &str,
        to: &str,
        symbol: Symbol,
    ) -> Result<TransitionKey, AutomatonError> {
        if let Err(error) = self.check_symbol(symbol) {
            return self.reject(error);
        }

        if let Some(missing) = [from, to].into_iter().find(|id| !self.contains_state(id)) {
            return self.reject(AutomatonError::UnknownState(missing.to_string()));
        }

        if self.kind == Kind::Dfa && self.transitions_from(from, symbol).next().is_some() {
            return self.reject(AutomatonError::DuplicateDeterministicTransition {
                from: from.to_string(),
                symbol,
            });
        }

        let transition = Transition::new(from, to, symbol);
        let key = transition.key();
        self.transitions.insert(key.clone(), transition);
        self.error = None;

        Ok(key)
    }

    /// Inserts a transition without any validation. Used by compositions and imports.
    pub(crate) fn insert_transition(&mut self, transition: Transition) {
        self.transitions.insert(transition.key(), transition);
    }

    /// Changes the target and/or symbol of an existing transition and returns its new key.
    ///
    /// On a DFA, moving the transition onto a symbol already used by another transition
    /// from the same state fails and nothing changes.
    pub fn update_transition(
        &mut self,
        key: &TransitionKey,
        patch: TransitionPatch,
    ) -> Result<TransitionKey, AutomatonError> {
        let Some(current) = self.transitions.get(key) else {
            return self.reject(AutomatonError::UnknownTransition(key.clone()));
        };

        let from = current.from.clone();
        let to = patch.to.clone().unwrap_or_else(|| current.to.clone());
        let symbol = patch.symbol.unwrap_or(current.symbol);

        if patch.symbol.is_some() {
            if let Err(error) = self.check_symbol(symbol) {
                return self.reject(error);
            }

            if self.kind == Kind::Dfa
                && self
                    .transitions_from(&from, symbol)
                    .any(|t| t.key() != *key)
            {
                return self.reject(AutomatonError::DuplicateDeterministicTransition {
                    from,
                    symbol,
                });
            }
        }

        if !self.contains_state(&to) {
            return self.reject(AutomatonError::UnknownState(to));
        }

        let updated = Transition::new(from, to, symbol);
        let new_key = updated.key();
        if new_key != *key {
            self.transitions.shift_remove(key);
        }
        self.transitions.insert(new_key.clone(), updated);
        self.error = None;

        Ok(new_key)
    }

    /// Removes a transition. Returns `None` if it did not exist.
    pub fn remove_transition(&mut self, key: &TransitionKey) -> Option<Transition> {
        self.transitions.shift_remove(key)
    }

    /// Replaces this automaton with a fresh, empty DFA.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Records `error` as the user-visible message without returning it.
    pub(crate) fn record_error(&mut self, error: &AutomatonError) {
        self.error = Some(error.to_string());
    }

    /// Builds the transition table: one row per state (sorted by id), one column per
    /// alphabet symbol, plus an epsilon column when epsilon edges exist outside the alphabet.
    pub fn table(&self) -> TransitionTable {
        let mut symbols = self.alphabet.clone();
        if !symbols.contains(&EPSILON) && self.transitions().any(Transition::is_epsilon) {
            symbols.push(EPSILON);
        }

        let mut states: Vec<&State> = self.states.values().collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));

        let rows = states
            .into_iter()
            .map(|state| TableRow {
                state: state.id.clone(),
                label: state.label.clone(),
                is_initial: state.is_initial,
                is_final: state.is_final,
                targets: symbols
                    .iter()
                    .map(|&symbol| {
                        self.transitions_from(&state.id, symbol)
                            .map(|t| t.to.clone())
                            .collect()
                    })
                    .collect(),
            })
            .collect();

        TransitionTable { symbols, rows }
    }

    fn check_symbol(&self, symbol: Symbol) -> Result<(), AutomatonError> {
        let allowed = if symbol == EPSILON {
            self.kind == Kind::Nfa
        } else {
            self.has_symbol(symbol)
        };

        if allowed {
            Ok(())
        } else {
            Err(AutomatonError::InvalidSymbol(symbol))
        }
    }

    fn mint_state_id(&mut self) -> StateId {
        while let Some(next) = self.next_state_id.checked_add(1) {
            let id = format!("{STATE_ID_PREFIX}{}", self.next_state_id);
            self.next_state_id = next;
            if !self.states.contains_key(&id) {
                return id;
            }
        }

        // The counter is exhausted, fall back to the lowest free number.
        (0..usize::MAX)
            .map(|n| format!("{STATE_ID_PREFIX}{n}"))
            .find(|id| !self.states.contains_key(id))
            .unwrap_or_default()
    }

    fn clear_initial_flags(&mut self) {
        for state in self.states.values_mut() {
            state.is_initial = false;
        }
    }

    fn reject<T>(&mut self, error: AutomatonError) -> Result<T, AutomatonError> {
        debug!(automaton = %self.name, %error, "rejected edit");
        self.record_error(&error);
        Err(error)
    }
}

/// A state-by-symbol view of the transitions of an automaton.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionTable {
    /// Column headers.
    pub symbols: Vec<Symbol>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub state: StateId,
    pub label: String,
    pub is_initial: bool,
    pub is_final: bool,
    /// Targets per column, in the order of [`TransitionTable::symbols`].
    pub targets: Vec<Vec<StateId>>,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::{collection, prelude::*};

    const SYMBOLS: [Symbol; 3] = ['a', 'b', 'c'];

    #[derive(Debug, Clone)]
    enum Edit {
        AddState(bool, bool),
        AddTransition(usize, usize, usize),
        Resymbol(usize, usize),
        Retarget(usize, usize),
        RemoveState(usize),
        RemoveSymbol(usize),
        AddSymbol(usize),
        MarkInitial(usize),
    }

    fn edit() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (any::<bool>(), any::<bool>()).prop_map(|(i, f)| Edit::AddState(i, f)),
            (0..8usize, 0..8usize, 0..3usize).prop_map(|(a, b, s)| Edit::AddTransition(a, b, s)),
            (0..16usize, 0..3usize).prop_map(|(t, s)| Edit::Resymbol(t, s)),
            (0..16usize, 0..8usize).prop_map(|(t, s)| Edit::Retarget(t, s)),
            (0..8usize).prop_map(Edit::RemoveState),
            (0..3usize).prop_map(Edit::RemoveSymbol),
            (0..3usize).prop_map(Edit::AddSymbol),
            (0..8usize).prop_map(Edit::MarkInitial),
        ]
    }

    fn pick<T: Clone>(items: &[T], index: usize) -> Option<T> {
        (!items.is_empty()).then(|| items[index % items.len()].clone())
    }

    fn apply(automaton: &mut Automaton, edit: &Edit) {
        let ids: Vec<StateId> = automaton.states().map(|s| s.id.clone()).collect();
        let keys: Vec<TransitionKey> = automaton.transitions().map(Transition::key).collect();

        match *edit {
            Edit::AddState(initial, fin) => {
                automaton.add_state(0.0, 0.0, initial, fin);
            }
            Edit::AddTransition(a, b, s) => {
                if let (Some(from), Some(to)) = (pick(&ids, a), pick(&ids, b)) {
                    let _ = automaton.add_transition(&from, &to, SYMBOLS[s]);
                }
            }
            Edit::Resymbol(t, s) => {
                if let Some(key) = pick(&keys, t) {
                    let _ = automaton.update_transition(&key, TransitionPatch::new().symbol(SYMBOLS[s]));
                }
            }
            Edit::Retarget(t, s) => {
                if let (Some(key), Some(to)) = (pick(&keys, t), pick(&ids, s)) {
                    let _ = automaton.update_transition(&key, TransitionPatch::new().to(to));
                }
            }
            Edit::RemoveState(s) => {
                if let Some(id) = pick(&ids, s) {
                    automaton.remove_state(&id);
                    assert_no_reference(automaton, &id);
                }
            }
            Edit::RemoveSymbol(s) => {
                automaton.remove_symbol(SYMBOLS[s]);
                assert!(automaton.transitions().all(|t| t.symbol != SYMBOLS[s]));
            }
            Edit::AddSymbol(s) => {
                automaton.add_symbol(SYMBOLS[s]);
            }
            Edit::MarkInitial(s) => {
                if let Some(id) = pick(&ids, s) {
                    let _ = automaton.update_state(&id, StatePatch::new().initial(true));
                }
            }
        }
    }

    fn assert_no_reference(automaton: &Automaton, id: &str) {
        assert!(automaton.transitions().all(|t| t.from != id && t.to != id));
    }

    fn initial_count(automaton: &Automaton) -> usize {
        automaton.states().filter(|s| s.is_initial).count()
    }

    proptest! {
        #[test]
        fn at_most_one_initial_state(edits in collection::vec(edit(), 0..48)) {
            let mut automaton = Automaton::new(Kind::Nfa);
            automaton.add_symbol('a');

            for edit in &edits {
                apply(&mut automaton, edit);
                prop_assert!(initial_count(&automaton) <= 1);

                if let Edit::AddState(true, _) = edit {
                    prop_assert_eq!(initial_count(&automaton), 1);
                }
            }
        }

        #[test]
        fn dfa_stays_deterministic(edits in collection::vec(edit(), 0..48)) {
            let mut automaton = Automaton::new(Kind::Dfa);
            automaton.add_symbol('a');
            automaton.add_symbol('b');

            for edit in &edits {
                apply(&mut automaton, edit);

                let mut pairs: Vec<(StateId, Symbol)> = automaton
                    .transitions()
                    .map(|t| (t.from.clone(), t.symbol))
                    .collect();
                let total = pairs.len();
                pairs.sort();
                pairs.dedup();
                prop_assert_eq!(pairs.len(), total);
            }
        }

        #[test]
        fn transitions_reference_existing_states(edits in collection::vec(edit(), 0..48)) {
            let mut automaton = Automaton::new(Kind::Nfa);

            for edit in &edits {
                apply(&mut automaton, edit);
                prop_assert!(automaton
                    .transitions()
                    .all(|t| automaton.contains_state(&t.from) && automaton.contains_state(&t.to)));
                prop_assert!(automaton.transitions().all(|t| automaton.has_symbol(t.symbol)));
            }
        }
    }
}
