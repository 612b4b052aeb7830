//! This module provides functions for analyzing automata to detect structural problems that
//! the mutators cannot rule out on their own: automata restored from snapshots, or DFAs
//! that were downgraded from NFAs, may violate the model invariants.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;

use crate::automaton::Automaton;
use crate::types::{AutomatonError, Kind, StateId, Symbol, TransitionKey, EPSILON};

/// Represents the problems that can be found during the analysis of an automaton.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// More than one state is flagged as initial.
    MultipleInitialStates(Vec<StateId>),
    /// Transitions whose source or target state does not exist.
    DanglingTransitions(Vec<TransitionKey>),
    /// Transitions labelled with symbols that are not in the alphabet.
    UndeclaredSymbols(Vec<Symbol>),
    /// Epsilon transitions inside a DFA.
    EpsilonInDfa(Vec<TransitionKey>),
    /// `(state, symbol)` pairs of a DFA with more than one transition.
    NondeterministicTransitions(Vec<(StateId, Symbol)>),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::MultipleInitialStates(states) => {
                write!(f, "Multiple initial states: {}", states.join(", "))
            }
            AnalysisError::DanglingTransitions(keys) => {
                write!(f, "Transitions reference undefined states: {}", join(keys))
            }
            AnalysisError::UndeclaredSymbols(symbols) => {
                write!(f, "Transitions use symbols outside the alphabet: {}", join(symbols))
            }
            AnalysisError::EpsilonInDfa(keys) => {
                write!(f, "DFA contains epsilon transitions: {}", join(keys))
            }
            AnalysisError::NondeterministicTransitions(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(state, symbol)| format!("({state}, {symbol})"))
                    .collect();
                write!(f, "DFA has several transitions for {}", pairs.join(", "))
            }
        }
    }
}

impl From<AnalysisError> for AutomatonError {
    /// Converts an `AnalysisError` into an `AutomatonError::ValidationError`.
    fn from(error: AnalysisError) -> Self {
        AutomatonError::ValidationError(error.to_string())
    }
}

/// Analyzes an automaton and returns the first problem found.
///
/// # Returns
///
/// * `Ok(())` if the automaton satisfies every model invariant.
/// * `Err(AutomatonError::ValidationError)` otherwise.
pub fn analyze(automaton: &Automaton) -> Result<(), AutomatonError> {
    match report(automaton).into_iter().next() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Runs every check and collects all problems found, in a fixed order.
pub fn report(automaton: &Automaton) -> Vec<AnalysisError> {
    [
        check_initial_states,
        check_dangling_transitions,
        check_symbols,
        check_epsilon,
        check_determinism,
    ]
    .iter()
    .filter_map(|check| check(automaton).err())
    .collect()
}

/// Returns the states that cannot be reached from the initial state, sorted by id.
///
/// Without an initial state every state is unreachable. Unreachable states are legal (the
/// compositions produce them) so this is reported separately from [`analyze`].
pub fn unreachable_states(automaton: &Automaton) -> Vec<StateId> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = automaton
        .initial_state()
        .map(|s| s.id.as_str())
        .into_iter()
        .collect();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        for transition in automaton.transitions().filter(|t| t.from == id) {
            if !visited.contains(transition.to.as_str()) {
                queue.push_back(&transition.to);
            }
        }
    }

    let mut unreachable: Vec<StateId> = automaton
        .states()
        .filter(|s| !visited.contains(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect();
    unreachable.sort();
    unreachable
}

fn check_initial_states(automaton: &Automaton) -> Result<(), AnalysisError> {
    let initial: Vec<StateId> = automaton
        .states()
        .filter(|s| s.is_initial)
        .map(|s| s.id.clone())
        .collect();

    if initial.len() > 1 {
        return Err(AnalysisError::MultipleInitialStates(initial));
    }

    Ok(())
}

fn check_dangling_transitions(automaton: &Automaton) -> Result<(), AnalysisError> {
    let dangling: Vec<TransitionKey> = automaton
        .transitions()
        .filter(|t| !automaton.contains_state(&t.from) || !automaton.contains_state(&t.to))
        .map(|t| t.key())
        .collect();

    if !dangling.is_empty() {
        return Err(AnalysisError::DanglingTransitions(dangling));
    }

    Ok(())
}

/// Epsilon is exempt here; whether it is allowed depends on the kind.
fn check_symbols(automaton: &Automaton) -> Result<(), AnalysisError> {
    let undeclared: BTreeSet<Symbol> = automaton
        .transitions()
        .map(|t| t.symbol)
        .filter(|&symbol| symbol != EPSILON && !automaton.has_symbol(symbol))
        .collect();

    if !undeclared.is_empty() {
        return Err(AnalysisError::UndeclaredSymbols(
            undeclared.into_iter().collect(),
        ));
    }

    Ok(())
}

fn check_epsilon(automaton: &Automaton) -> Result<(), AnalysisError> {
    if automaton.kind() != Kind::Dfa {
        return Ok(());
    }

    let epsilon: Vec<TransitionKey> = automaton
        .transitions()
        .filter(|t| t.is_epsilon())
        .map(|t| t.key())
        .collect();

    if !epsilon.is_empty() {
        return Err(AnalysisError::EpsilonInDfa(epsilon));
    }

    Ok(())
}

fn check_determinism(automaton: &Automaton) -> Result<(), AnalysisError> {
    if automaton.kind() != Kind::Dfa {
        return Ok(());
    }

    let mut seen = HashSet::new();
    let mut conflicts = BTreeSet::new();
    for transition in automaton.transitions() {
        let pair = (transition.from.clone(), transition.symbol);
        if !seen.insert(pair.clone()) {
            conflicts.insert(pair);
        }
    }

    if !conflicts.is_empty() {
        return Err(AnalysisError::NondeterministicTransitions(
            conflicts.into_iter().collect(),
        ));
    }

    Ok(())
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::from_json;

    fn create_test_automaton(kind: Kind) -> Automaton {
        let mut automaton = Automaton::with_name("Test Automaton", kind);
        automaton.add_symbol('a');
        automaton.add_symbol('b');
        automaton.add_state(0.0, 0.0, true, false);
        automaton.add_state(100.0, 0.0, false, true);
        automaton.add_transition("q0", "q1", 'a').unwrap();
        automaton
    }

    #[test]
    fn test_valid_automaton() {
        let automaton = create_test_automaton(Kind::Dfa);
        assert!(analyze(&automaton).is_ok());
        assert!(report(&automaton).is_empty());
    }

    #[test]
    fn test_multiple_initial_states() {
        let automaton = from_json(
            r#"{"states": {"a": {"isInitial": true}, "b": {"isInitial": true}}}"#,
        )
        .unwrap();

        let result = check_initial_states(&automaton);
        assert_eq!(
            result.unwrap_err(),
            AnalysisError::MultipleInitialStates(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_dangling_transitions() {
        let automaton = from_json(
            r#"{
                "alphabet": ["a"],
                "states": {"q0": {}},
                "transitions": {"x": {"from": "q0", "to": "nowhere", "symbol": "a"}}
            }"#,
        )
        .unwrap();

        let result = check_dangling_transitions(&automaton);
        assert_eq!(
            result.unwrap_err(),
            AnalysisError::DanglingTransitions(vec![TransitionKey::new("q0", 'a', "nowhere")])
        );
    }

    #[test]
    fn test_symbols_outside_alphabet() {
        let mut automaton = create_test_automaton(Kind::Nfa);
        automaton.add_transition("q1", "q0", 'b').unwrap();
        automaton.add_transition("q1", "q1", EPSILON).unwrap();
        automaton.remove_symbol('a');
        automaton.insert_transition(crate::Transition::new("q0", "q0", 'z'));

        assert_eq!(
            check_symbols(&automaton).unwrap_err(),
            AnalysisError::UndeclaredSymbols(vec!['z'])
        );
    }

    #[test]
    fn test_downgraded_nfa_is_reported() {
        let mut automaton = create_test_automaton(Kind::Nfa);
        automaton.add_transition("q0", "q0", 'a').unwrap();
        automaton.add_transition("q1", "q0", EPSILON).unwrap();
        assert!(analyze(&automaton).is_ok());

        automaton.set_kind(Kind::Dfa);
        let problems = report(&automaton);

        assert_eq!(
            problems,
            vec![
                AnalysisError::EpsilonInDfa(vec![TransitionKey::new("q1", EPSILON, "q0")]),
                AnalysisError::NondeterministicTransitions(vec![("q0".to_string(), 'a')]),
            ]
        );
    }

    #[test]
    fn test_analysis_error_conversion() {
        let error = AnalysisError::MultipleInitialStates(vec!["q0".into(), "q3".into()]);
        let automaton_error: AutomatonError = error.into();

        match automaton_error {
            AutomatonError::ValidationError(msg) => {
                assert_eq!(msg, "Multiple initial states: q0, q3");
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_unreachable_states() {
        let mut automaton = create_test_automaton(Kind::Dfa);
        automaton.add_state(200.0, 0.0, false, false);
        automaton.add_state(300.0, 0.0, false, false);
        automaton.add_transition("q3", "q2", 'b').unwrap();

        assert_eq!(unreachable_states(&automaton), vec!["q2", "q3"]);
    }

    #[test]
    fn test_everything_unreachable_without_initial_state() {
        let mut automaton = create_test_automaton(Kind::Dfa);
        automaton
            .update_state("q0", crate::StatePatch::new().initial(false))
            .unwrap();

        assert_eq!(unreachable_states(&automaton), vec!["q0", "q1"]);
    }

    #[test]
    fn test_reachability_through_cycles() {
        let mut automaton = create_test_automaton(Kind::Dfa);
        automaton.add_transition("q1", "q0", 'b').unwrap();
        automaton.add_transition("q1", "q1", 'a').unwrap();

        assert!(unreachable_states(&automaton).is_empty());
    }
}
