//! This module builds new automata out of two existing ones: union and concatenation
//! through epsilon transitions, and intersection through the product construction.
//!
//! Neither operand is modified. Every result mints its own ids (`q0`, `q1`, ...) so
//! operand ids never collide.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{info, warn};

use crate::automaton::Automaton;
use crate::types::{Kind, State, StateId, Transition, EPSILON};

/// Identifies one side of a binary composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    First,
    Second,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::First => write!(f, "first"),
            Operand::Second => write!(f, "second"),
        }
    }
}

/// A degenerate input that was tolerated while composing.
///
/// The composition still returns a well-formed automaton; the warning tells the caller
/// that it is partial or trivially empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionWarning {
    /// The operand has no initial state, so its part of the result is unreachable.
    MissingInitialState(Operand),
    /// The alphabets share no symbol; the intersection accepts nothing.
    DisjointAlphabets,
    /// The product construction only follows the first transition per symbol of an NFA.
    NondeterministicOperand(Operand),
}

impl fmt::Display for CompositionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionWarning::MissingInitialState(operand) => {
                write!(f, "the {operand} automaton has no initial state")
            }
            CompositionWarning::DisjointAlphabets => {
                write!(f, "the alphabets have no symbol in common")
            }
            CompositionWarning::NondeterministicOperand(operand) => write!(
                f,
                "the {operand} automaton is an NFA; only its first transition per symbol is used"
            ),
        }
    }
}

/// The result of a composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub automaton: Automaton,
    pub warnings: Vec<CompositionWarning>,
}

impl Composition {
    fn new(automaton: Automaton, warnings: Vec<CompositionWarning>) -> Self {
        info!(
            automaton = automaton.name(),
            states = automaton.state_count(),
            transitions = automaton.transition_count(),
            "composed automaton"
        );
        for warning in &warnings {
            warn!(automaton = automaton.name(), %warning, "degenerate composition");
        }

        Self {
            automaton,
            warnings,
        }
    }

    /// Returns `true` if the result was built from a degenerate input.
    pub fn is_degenerate(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_automaton(self) -> Automaton {
        self.automaton
    }
}

/// Builds an NFA accepting `L(a1) ∪ L(a2)`.
///
/// A fresh initial state reaches the initial state of each operand through an epsilon
/// transition. An operand without an initial state contributes no such edge.
pub fn union(a1: &Automaton, a2: &Automaton) -> Composition {
    let mut result = Automaton::with_name(
        format!("Union of {} and {}", display_name(a1), display_name(a2)),
        Kind::Nfa,
    );
    let mut warnings = Vec::new();

    merge_alphabets(&mut result, a1, a2);

    let first = copy_states(&mut result, a1, (100.0, 0.0), |s| (false, s.is_final));
    let second = copy_states(&mut result, a2, (-100.0, 100.0), |s| (false, s.is_final));
    let initial = result.add_state(0.0, 0.0, true, false);

    copy_transitions(&mut result, a1, &first);
    copy_transitions(&mut result, a2, &second);

    for (operand, source, ids) in [(Operand::First, a1, &first), (Operand::Second, a2, &second)] {
        match source.initial_state().and_then(|s| ids.get(&s.id)) {
            Some(target) => {
                result.insert_transition(Transition::new(initial.clone(), target.clone(), EPSILON))
            }
            None => warnings.push(CompositionWarning::MissingInitialState(operand)),
        }
    }

    Composition::new(result, warnings)
}

/// Builds an NFA accepting `L(a1) · L(a2)`.
///
/// The final states of `a1` lose their final flag and reach the initial state of `a2`
/// through epsilon transitions. Without an initial state in `a2` the result is returned
/// with no connecting edges.
pub fn concatenate(a1: &Automaton, a2: &Automaton) -> Composition {
    let mut result = Automaton::with_name(
        format!("Concatenation of {} and {}", display_name(a1), display_name(a2)),
        Kind::Nfa,
    );
    let mut warnings = Vec::new();

    merge_alphabets(&mut result, a1, a2);

    let first = copy_states(&mut result, a1, (0.0, 0.0), |s| (s.is_initial, false));
    let second = copy_states(&mut result, a2, (300.0, 0.0), |s| (false, s.is_final));

    copy_transitions(&mut result, a1, &first);
    copy_transitions(&mut result, a2, &second);

    if a1.initial_state().is_none() {
        warnings.push(CompositionWarning::MissingInitialState(Operand::First));
    }

    match a2.initial_state().and_then(|s| second.get(&s.id)) {
        Some(target) => {
            for state in a1.final_states() {
                if let Some(from) = first.get(&state.id) {
                    result.insert_transition(Transition::new(from.clone(), target.clone(), EPSILON));
                }
            }
        }
        None => warnings.push(CompositionWarning::MissingInitialState(Operand::Second)),
    }

    Composition::new(result, warnings)
}

/// Builds a DFA accepting `L(a1) ∩ L(a2)` with the product construction.
///
/// Only pairs reachable from `(initial1, initial2)` are materialized, each exactly once,
/// in breadth-first order. A pair is final when both components are final.
pub fn intersect(a1: &Automaton, a2: &Automaton) -> Composition {
    let mut result = Automaton::with_name(
        format!("Intersection of {} and {}", display_name(a1), display_name(a2)),
        Kind::Dfa,
    );
    let mut warnings = Vec::new();

    for &symbol in a1.alphabet() {
        if symbol != EPSILON && a2.has_symbol(symbol) {
            result.add_symbol(symbol);
        }
    }

    for (operand, source) in [(Operand::First, a1), (Operand::Second, a2)] {
        if source.kind() == Kind::Nfa {
            warnings.push(CompositionWarning::NondeterministicOperand(operand));
        }
    }

    if result.alphabet().is_empty() {
        result.add_state(0.0, 0.0, true, false);
        warnings.push(CompositionWarning::DisjointAlphabets);
        return Composition::new(result, warnings);
    }

    let (Some(initial1), Some(initial2)) = (a1.initial_state(), a2.initial_state()) else {
        for (operand, source) in [(Operand::First, a1), (Operand::Second, a2)] {
            if source.initial_state().is_none() {
                warnings.push(CompositionWarning::MissingInitialState(operand));
            }
        }
        return Composition::new(result, warnings);
    };

    let symbols = result.alphabet().to_vec();
    let mut pairs: HashMap<(StateId, StateId), StateId> = HashMap::new();
    let mut queue = VecDeque::new();

    let start = (initial1.id.clone(), initial2.id.clone());
    let id = add_pair_state(&mut result, initial1, initial2, true);
    pairs.insert(start.clone(), id);
    queue.push_back(start);

    while let Some(pair) = queue.pop_front() {
        let from = pairs[&pair].clone();

        for &symbol in &symbols {
            let (Some(t1), Some(t2)) = (
                a1.transitions_from(&pair.0, symbol).next(),
                a2.transitions_from(&pair.1, symbol).next(),
            ) else {
                continue;
            };

            let next = (t1.to.clone(), t2.to.clone());
            let to = match pairs.get(&next) {
                Some(id) => id.clone(),
                None => {
                    let (Some(s1), Some(s2)) = (a1.state(&next.0), a2.state(&next.1)) else {
                        continue;
                    };
                    let id = add_pair_state(&mut result, s1, s2, false);
                    pairs.insert(next.clone(), id.clone());
                    queue.push_back(next);
                    id
                }
            };

            result.insert_transition(Transition::new(from.clone(), to, symbol));
        }
    }

    Composition::new(result, warnings)
}

fn add_pair_state(result: &mut Automaton, s1: &State, s2: &State, is_initial: bool) -> StateId {
    result.add_state(
        (s1.x + s2.x) / 2.0,
        (s1.y + s2.y) / 2.0,
        is_initial,
        s1.is_final && s2.is_final,
    )
}

fn display_name(automaton: &Automaton) -> &str {
    if automaton.name().is_empty() {
        "unnamed"
    } else {
        automaton.name()
    }
}

/// Union of both alphabets in operand order, plus epsilon.
fn merge_alphabets(result: &mut Automaton, a1: &Automaton, a2: &Automaton) {
    for &symbol in a1.alphabet().iter().chain(a2.alphabet()) {
        result.add_symbol(symbol);
    }
    result.add_symbol(EPSILON);
}

/// Copies every state of `source` under a fresh id, shifted by `offset`, with the
/// `(initial, final)` flags chosen by `flags`. Returns the old-to-new id mapping.
fn copy_states(
    result: &mut Automaton,
    source: &Automaton,
    (dx, dy): (f64, f64),
    flags: impl Fn(&State) -> (bool, bool),
) -> HashMap<StateId, StateId> {
    source
        .states()
        .map(|state| {
            let (is_initial, is_final) = flags(state);
            let id = result.add_state(state.x + dx, state.y + dy, is_initial, is_final);
            (state.id.clone(), id)
        })
        .collect()
}

fn copy_transitions(result: &mut Automaton, source: &Automaton, ids: &HashMap<StateId, StateId>) {
    for transition in source.transitions() {
        if let (Some(from), Some(to)) = (ids.get(&transition.from), ids.get(&transition.to)) {
            result.insert_transition(Transition::new(from.clone(), to.clone(), transition.symbol));
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::simulator::simulate;
    use crate::types::Verdict;
    use proptest::prelude::*;

    /// A complete DFA over `{0, 1}` with three states and the given transition table.
    fn dfa(table: [(usize, usize); 3], finals: [bool; 3]) -> Automaton {
        let mut automaton = Automaton::new(Kind::Dfa);
        automaton.add_symbol('0');
        automaton.add_symbol('1');
        for (i, &fin) in finals.iter().enumerate() {
            automaton.add_state(0.0, 0.0, i == 0, fin);
        }
        for (i, &(zero, one)) in table.iter().enumerate() {
            let from = format!("q{i}");
            let _ = automaton.add_transition(&from, &format!("q{zero}"), '0');
            let _ = automaton.add_transition(&from, &format!("q{one}"), '1');
        }
        automaton
    }

    fn arbitrary_dfa() -> impl Strategy<Value = Automaton> {
        (
            [(0..3usize, 0..3usize), (0..3usize, 0..3usize), (0..3usize, 0..3usize)],
            any::<[bool; 3]>(),
        )
            .prop_map(|(table, finals)| dfa(table, finals))
    }

    fn accepts(automaton: &Automaton, input: &str) -> bool {
        simulate(automaton, input) == Ok(Verdict::Accepted)
    }

    proptest! {
        #[test]
        fn compositions_follow_language_operations(
            a1 in arbitrary_dfa(),
            a2 in arbitrary_dfa(),
            input in "[01]{0,6}",
        ) {
            let union = union(&a1, &a2).into_automaton();
            let intersection = intersect(&a1, &a2).into_automaton();

            prop_assert_eq!(accepts(&union, &input), accepts(&a1, &input) || accepts(&a2, &input));
            prop_assert_eq!(
                accepts(&intersection, &input),
                accepts(&a1, &input) && accepts(&a2, &input)
            );
        }

        #[test]
        fn concatenation_accepts_every_split(
            a1 in arbitrary_dfa(),
            a2 in arbitrary_dfa(),
            input in "[01]{0,6}",
        ) {
            let concatenation = concatenate(&a1, &a2).into_automaton();
            let expected = (0..=input.len())
                .any(|i| accepts(&a1, &input[..i]) && accepts(&a2, &input[i..]));

            prop_assert_eq!(accepts(&concatenation, &input), expected);
        }
    }
}
