//! This module converts automata to and from a JSON snapshot.
//!
//! The snapshot keeps the wire shape of the editor that produced it: states keyed by id,
//! transitions keyed by `from-symbol-to` strings, and the id counter stored as
//! `currentStateId`. Restoring never trusts the string keys; transition identity is
//! rebuilt from each record's fields.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::automaton::Automaton;
use crate::types::{AutomatonError, Kind, State, StateId, Symbol, Transition};

/// A serializable image of an [`Automaton`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub name: String,
    pub alphabet: Vec<Symbol>,
    pub states: IndexMap<StateId, State>,
    pub transitions: IndexMap<String, TransitionRecord>,
    pub current_state_id: usize,
    pub error: Option<String>,
}

/// One transition inside a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    #[serde(default)]
    pub id: String,
    pub from: StateId,
    pub to: StateId,
    pub symbol: Symbol,
}

impl From<&Automaton> for Snapshot {
    fn from(automaton: &Automaton) -> Self {
        Self {
            kind: automaton.kind(),
            name: automaton.name().to_string(),
            alphabet: automaton.alphabet().to_vec(),
            states: automaton
                .states()
                .map(|state| (state.id.clone(), state.clone()))
                .collect(),
            transitions: automaton
                .transitions()
                .map(|t| {
                    let id = t.key().to_string();
                    let record = TransitionRecord {
                        id: id.clone(),
                        from: t.from.clone(),
                        to: t.to.clone(),
                        symbol: t.symbol,
                    };
                    (id, record)
                })
                .collect(),
            current_state_id: automaton.next_state_id(),
            error: automaton.error().map(str::to_string),
        }
    }
}

impl From<Snapshot> for Automaton {
    fn from(snapshot: Snapshot) -> Self {
        let mut alphabet: Vec<Symbol> = Vec::with_capacity(snapshot.alphabet.len());
        for symbol in snapshot.alphabet {
            if !alphabet.contains(&symbol) {
                alphabet.push(symbol);
            }
        }

        let mut automaton = Automaton::from_parts(
            snapshot.name,
            snapshot.kind,
            alphabet,
            IndexMap::new(),
            IndexMap::new(),
            snapshot.current_state_id,
            snapshot.error,
        );

        for (key, mut state) in snapshot.states {
            if state.id.is_empty() {
                state.id = key;
            }
            if state.label.is_empty() {
                state.label = state.id.clone();
            }
            automaton.insert_state(state);
        }

        for record in snapshot.transitions.into_values() {
            automaton.insert_transition(Transition::new(record.from, record.to, record.symbol));
        }

        automaton
    }
}

impl Automaton {
    /// Replaces this automaton wholesale with the contents of `snapshot`.
    pub fn import(&mut self, snapshot: Snapshot) {
        *self = Automaton::from(snapshot);
    }
}

/// Takes a snapshot of `automaton`.
pub fn snapshot(automaton: &Automaton) -> Snapshot {
    Snapshot::from(automaton)
}

/// Rebuilds an automaton from `snapshot`. The result is not validated; run
/// [`crate::analyze`] to check it.
pub fn restore(snapshot: Snapshot) -> Automaton {
    Automaton::from(snapshot)
}

/// Serializes `automaton` as pretty-printed JSON.
pub fn to_json(automaton: &Automaton) -> Result<String, AutomatonError> {
    serde_json::to_string_pretty(&snapshot(automaton))
        .map_err(|e| AutomatonError::SnapshotError(e.to_string()))
}

/// Parses a JSON snapshot into an automaton.
pub fn from_json(json: &str) -> Result<Automaton, AutomatonError> {
    let snapshot: Snapshot =
        serde_json::from_str(json).map_err(|e| AutomatonError::SnapshotError(e.to_string()))?;

    debug!(
        name = %snapshot.name,
        states = snapshot.states.len(),
        transitions = snapshot.transitions.len(),
        "restoring snapshot"
    );

    Ok(restore(snapshot))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::{collection, prelude::*};

    fn automaton(
        kind: Kind,
        flags: &[(bool, bool)],
        edges: &[(usize, usize, usize)],
    ) -> Automaton {
        let symbols = ['a', 'b', crate::EPSILON];
        let mut automaton = Automaton::with_name("generated", kind);
        automaton.add_symbol('a');
        automaton.add_symbol('b');
        let ids: Vec<StateId> = flags
            .iter()
            .enumerate()
            .map(|(i, &(initial, fin))| automaton.add_state(i as f64 * 10.0, 0.5, initial, fin))
            .collect();
        if ids.is_empty() {
            return automaton;
        }
        for &(from, to, symbol) in edges {
            let _ = automaton.add_transition(
                &ids[from % ids.len()],
                &ids[to % ids.len()],
                symbols[symbol % symbols.len()],
            );
        }
        automaton
    }

    proptest! {
        #[test]
        fn json_round_trip_preserves_automaton(
            nfa in any::<bool>(),
            flags in collection::vec((any::<bool>(), any::<bool>()), 0..6),
            edges in collection::vec((0..6usize, 0..6usize, 0..3usize), 0..16),
        ) {
            let kind = if nfa { Kind::Nfa } else { Kind::Dfa };
            let original = automaton(kind, &flags, &edges);
            let restored = from_json(&to_json(&original).unwrap()).unwrap();

            prop_assert_eq!(restored, original);
        }
    }
}
