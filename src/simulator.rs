//! This module runs input strings against an automaton. A run is materialized up front
//! into a [`Trace`] of snapshots that a [`Simulation`] session can replay step by step.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

use crate::automaton::Automaton;
use crate::types::{AutomatonError, Kind, StateId, Symbol, Transition, TransitionKey, Verdict, EPSILON};

/// The states active after a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Active {
    /// The current state of a DFA run, `None` once the run fell off the automaton.
    Single(Option<StateId>),
    /// The current state set of an NFA run, already closed under epsilon moves.
    Set(BTreeSet<StateId>),
}

impl Active {
    /// Returns `true` if `id` is among the active states.
    pub fn contains(&self, id: &str) -> bool {
        match self {
            Active::Single(state) => state.as_deref() == Some(id),
            Active::Set(states) => states.contains(id),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Active::Single(state) => state.is_none(),
            Active::Set(states) => states.is_empty(),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        match self {
            Active::Single(state) => state.iter().map(String::as_str).collect(),
            Active::Set(states) => states.iter().map(String::as_str).collect(),
        }
    }
}

/// One snapshot of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    /// Number of input symbols consumed so far.
    pub index: usize,
    /// The symbol consumed by this step, `None` for the start snapshot.
    pub symbol: Option<Symbol>,
    pub active: Active,
    /// Set on the terminal step of a run that ran out of transitions.
    pub rejected: bool,
    /// The transitions taken to reach this step.
    pub transitions: Vec<TransitionKey>,
}

/// The complete, replayable record of running one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    input: String,
    kind: Kind,
    steps: Vec<TraceStep>,
    verdict: Verdict,
}

impl Trace {
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The semantics the run used.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn last(&self) -> Option<&TraceStep> {
        self.steps.last()
    }
}

/// Transitions grouped by source state and symbol, built once per run.
struct TransitionIndex<'a> {
    edges: HashMap<&'a str, HashMap<Symbol, Vec<&'a Transition>>>,
}

impl<'a> TransitionIndex<'a> {
    fn new(automaton: &'a Automaton) -> Self {
        let mut edges: HashMap<&'a str, HashMap<Symbol, Vec<&'a Transition>>> = HashMap::new();
        for transition in automaton.transitions() {
            edges
                .entry(transition.from.as_str())
                .or_default()
                .entry(transition.symbol)
                .or_default()
                .push(transition);
        }

        Self { edges }
    }

    fn targets(&self, from: &str, symbol: Symbol) -> &[&'a Transition] {
        self.edges
            .get(from)
            .and_then(|by_symbol| by_symbol.get(&symbol))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn closure(&self, seeds: impl IntoIterator<Item = StateId>) -> BTreeSet<StateId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();

        for seed in seeds {
            if seen.insert(seed.clone()) {
                queue.push_back(seed);
            }
        }

        while let Some(id) = queue.pop_front() {
            for transition in self.targets(&id, EPSILON) {
                if seen.insert(transition.to.clone()) {
                    queue.push_back(transition.to.clone());
                }
            }
        }

        seen
    }
}

/// Returns every state reachable from `seeds` through zero or more epsilon transitions.
pub fn epsilon_closure<I>(automaton: &Automaton, seeds: I) -> BTreeSet<StateId>
where
    I: IntoIterator,
    I::Item: Into<StateId>,
{
    TransitionIndex::new(automaton).closure(seeds.into_iter().map(Into::into))
}

/// Runs `input` to completion and returns only the verdict.
pub fn simulate(automaton: &Automaton, input: &str) -> Result<Verdict, AutomatonError> {
    run(automaton, input).map(|trace| trace.verdict())
}

/// Runs `input` and records every intermediate configuration.
///
/// # Returns
///
/// * `Ok(Trace)` with verdict `Accepted` or `Rejected`. Running out of transitions is a
///   rejection, not an error.
/// * `Err(AutomatonError::NoInitialState)` if no state is marked initial.
/// * `Err(AutomatonError::UnknownSymbol)` if the input contains a symbol outside the alphabet.
pub fn run(automaton: &Automaton, input: &str) -> Result<Trace, AutomatonError> {
    let initial = automaton
        .initial_state()
        .ok_or(AutomatonError::NoInitialState)?;

    if let Some(symbol) = input
        .chars()
        .find(|&c| c == EPSILON || !automaton.has_symbol(c))
    {
        return Err(AutomatonError::UnknownSymbol(symbol));
    }

    let index = TransitionIndex::new(automaton);
    let (steps, verdict) = match automaton.kind() {
        Kind::Dfa => run_deterministic(automaton, &index, &initial.id, input),
        Kind::Nfa => run_nondeterministic(automaton, &index, &initial.id, input),
    };

    debug!(
        automaton = automaton.name(),
        input,
        steps = steps.len(),
        %verdict,
        "simulation finished"
    );

    Ok(Trace {
        input: input.to_string(),
        kind: automaton.kind(),
        steps,
        verdict,
    })
}

fn run_deterministic(
    automaton: &Automaton,
    index: &TransitionIndex,
    initial: &str,
    input: &str,
) -> (Vec<TraceStep>, Verdict) {
    let mut current = initial.to_string();
    let mut steps = vec![TraceStep {
        index: 0,
        symbol: None,
        active: Active::Single(Some(current.clone())),
        rejected: false,
        transitions: Vec::new(),
    }];

    for (i, symbol) in input.chars().enumerate() {
        let Some(transition) = index.targets(&current, symbol).first() else {
            steps.push(TraceStep {
                index: i + 1,
                symbol: Some(symbol),
                active: Active::Single(None),
                rejected: true,
                transitions: Vec::new(),
            });
            return (steps, Verdict::Rejected);
        };

        current = transition.to.clone();
        steps.push(TraceStep {
            index: i + 1,
            symbol: Some(symbol),
            active: Active::Single(Some(current.clone())),
            rejected: false,
            transitions: vec![transition.key()],
        });
    }

    let accepted = automaton.state(&current).is_some_and(|s| s.is_final);
    (steps, verdict(accepted))
}

fn run_nondeterministic(
    automaton: &Automaton,
    index: &TransitionIndex,
    initial: &str,
    input: &str,
) -> (Vec<TraceStep>, Verdict) {
    let mut current = index.closure([initial.to_string()]);
    let mut steps = vec![TraceStep {
        index: 0,
        symbol: None,
        active: Active::Set(current.clone()),
        rejected: false,
        transitions: Vec::new(),
    }];

    for (i, symbol) in input.chars().enumerate() {
        let taken: Vec<&Transition> = current
            .iter()
            .flat_map(|id| index.targets(id, symbol).iter().copied())
            .collect();
        let next = index.closure(taken.iter().map(|t| t.to.clone()));

        if next.is_empty() {
            steps.push(TraceStep {
                index: i + 1,
                symbol: Some(symbol),
                active: Active::Set(next),
                rejected: true,
                transitions: Vec::new(),
            });
            return (steps, Verdict::Rejected);
        }

        current = next;
        steps.push(TraceStep {
            index: i + 1,
            symbol: Some(symbol),
            active: Active::Set(current.clone()),
            rejected: false,
            transitions: taken.iter().map(|t| t.key()).collect(),
        });
    }

    let accepted = current
        .iter()
        .any(|id| automaton.state(id).is_some_and(|s| s.is_final));
    (steps, verdict(accepted))
}

fn verdict(accepted: bool) -> Verdict {
    if accepted {
        Verdict::Accepted
    } else {
        Verdict::Rejected
    }
}

/// A playback session over one run.
///
/// The cursor starts before the first step and only moves within the trace; moving it
/// never re-runs the automaton.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    input: String,
    active: bool,
    trace: Option<Trace>,
    cursor: Option<usize>,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Runs the current input against `automaton` and activates the session.
    ///
    /// On a failed precondition the session is left inactive with no trace.
    pub fn start(&mut self, automaton: &Automaton) -> Result<&Trace, AutomatonError> {
        self.active = true;
        self.cursor = None;
        self.trace = None;

        match run(automaton, &self.input) {
            Ok(trace) => Ok(&*self.trace.insert(trace)),
            Err(error) => {
                self.active = false;
                Err(error)
            }
        }
    }

    /// Moves the cursor one step forward, stopping at the last step.
    pub fn next_step(&mut self) -> Option<&TraceStep> {
        if let (true, Some(trace)) = (self.active, &self.trace) {
            let next = self.cursor.map_or(0, |c| c + 1);
            if next < trace.len() {
                self.cursor = Some(next);
            }
        }

        self.current_step()
    }

    /// Moves the cursor one step back, stopping at the first step.
    pub fn previous_step(&mut self) -> Option<&TraceStep> {
        if let (true, Some(c)) = (self.active, self.cursor) {
            if c > 0 {
                self.cursor = Some(c - 1);
            }
        }

        self.current_step()
    }

    /// Moves the cursor back before the first step.
    pub fn rewind(&mut self) {
        if self.active {
            self.cursor = None;
        }
    }

    /// Deactivates the session. The trace and verdict stay available.
    pub fn stop(&mut self) {
        self.active = false;
        self.cursor = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.trace.as_ref().map(Trace::verdict)
    }

    pub fn current_step(&self) -> Option<&TraceStep> {
        self.trace
            .as_ref()
            .zip(self.cursor)
            .and_then(|(trace, c)| trace.steps.get(c))
    }

    /// Returns `true` once the cursor sits on the last step.
    pub fn is_at_end(&self) -> bool {
        match (&self.trace, self.cursor) {
            (Some(trace), Some(c)) => c + 1 >= trace.len(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// q0 (initial, final) and q1 over {0, 1}: accepts strings with an even number of 0s.
    fn even_zeros() -> Automaton {
        let mut automaton = Automaton::with_name("Even zeros", Kind::Dfa);
        automaton.add_symbol('0');
        automaton.add_symbol('1');
        automaton.add_state(0.0, 0.0, true, true);
        automaton.add_state(100.0, 0.0, false, false);
        automaton.add_transition("q0", "q1", '0').unwrap();
        automaton.add_transition("q0", "q0", '1').unwrap();
        automaton.add_transition("q1", "q0", '0').unwrap();
        automaton.add_transition("q1", "q1", '1').unwrap();
        automaton
    }

    /// Accepts a*b* through an epsilon edge between two loops.
    fn a_star_b_star() -> Automaton {
        let mut automaton = Automaton::new(Kind::Nfa);
        automaton.add_symbol('a');
        automaton.add_symbol('b');
        automaton.add_state(0.0, 0.0, true, false);
        automaton.add_state(0.0, 0.0, false, true);
        automaton.add_transition("q0", "q0", 'a').unwrap();
        automaton.add_transition("q0", "q1", EPSILON).unwrap();
        automaton.add_transition("q1", "q1", 'b').unwrap();
        automaton
    }

    #[test]
    fn test_dfa_even_zeros() {
        let automaton = even_zeros();

        assert_eq!(simulate(&automaton, "00"), Ok(Verdict::Accepted));
        assert_eq!(simulate(&automaton, "0"), Ok(Verdict::Rejected));
        assert_eq!(simulate(&automaton, "11"), Ok(Verdict::Accepted));
        assert_eq!(simulate(&automaton, ""), Ok(Verdict::Accepted));
    }

    #[test]
    fn test_dfa_trace_records_each_state() {
        let trace = run(&even_zeros(), "01").unwrap();

        assert_eq!(trace.len(), 3);
        assert_eq!(trace.steps()[0].symbol, None);
        assert_eq!(trace.steps()[0].active, Active::Single(Some("q0".to_string())));
        assert_eq!(trace.steps()[1].active, Active::Single(Some("q1".to_string())));
        assert_eq!(
            trace.steps()[1].transitions,
            vec![TransitionKey::new("q0", '0', "q1")]
        );
        assert_eq!(trace.steps()[2].index, 2);
        assert_eq!(trace.steps()[2].symbol, Some('1'));
        assert_eq!(trace.verdict(), Verdict::Rejected);
    }

    #[test]
    fn test_dfa_missing_transition_rejects_with_terminal_step() {
        let mut automaton = even_zeros();
        automaton.remove_transition(&TransitionKey::new("q1", '1', "q1"));

        let trace = run(&automaton, "0101").unwrap();

        assert_eq!(trace.verdict(), Verdict::Rejected);
        assert_eq!(trace.len(), 3);
        let last = trace.last().unwrap();
        assert!(last.rejected);
        assert_eq!(last.active, Active::Single(None));
        assert_eq!(last.index, 2);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let automaton = even_zeros();
        assert_eq!(run(&automaton, "0110").unwrap(), run(&automaton, "0110").unwrap());
    }

    #[test]
    fn test_no_initial_state() {
        let mut automaton = even_zeros();
        automaton.remove_state("q0");

        assert_eq!(simulate(&automaton, "1"), Err(AutomatonError::NoInitialState));
    }

    #[test]
    fn test_unknown_input_symbol() {
        assert_eq!(
            simulate(&even_zeros(), "012"),
            Err(AutomatonError::UnknownSymbol('2'))
        );
    }

    #[test]
    fn test_epsilon_is_never_an_input_symbol() {
        let mut automaton = a_star_b_star();
        automaton.add_symbol(EPSILON);

        assert_eq!(
            simulate(&automaton, "aε"),
            Err(AutomatonError::UnknownSymbol(EPSILON))
        );
    }

    #[test]
    fn test_nfa_with_epsilon() {
        let automaton = a_star_b_star();

        for accepted in ["", "a", "aab", "bbb", "abb"] {
            assert_eq!(simulate(&automaton, accepted), Ok(Verdict::Accepted), "{accepted}");
        }
        for rejected in ["ba", "aba", "bba"] {
            assert_eq!(simulate(&automaton, rejected), Ok(Verdict::Rejected), "{rejected}");
        }
    }

    #[test]
    fn test_nfa_trace_uses_closed_sets() {
        let trace = run(&a_star_b_star(), "ab").unwrap();

        let start: BTreeSet<StateId> = ["q0", "q1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(trace.steps()[0].active, Active::Set(start.clone()));
        assert_eq!(trace.steps()[1].active, Active::Set(start));
        assert_eq!(
            trace.steps()[2].active,
            Active::Set(BTreeSet::from(["q1".to_string()]))
        );
        assert_eq!(trace.kind(), Kind::Nfa);
    }

    #[test]
    fn test_nfa_empty_set_rejects_immediately() {
        let trace = run(&a_star_b_star(), "baa").unwrap();

        assert_eq!(trace.verdict(), Verdict::Rejected);
        assert_eq!(trace.len(), 3);
        assert!(trace.last().unwrap().rejected);
        assert!(trace.last().unwrap().active.is_empty());
    }

    #[test]
    fn test_nfa_branches() {
        let mut automaton = Automaton::new(Kind::Nfa);
        automaton.add_symbol('a');
        automaton.add_state(0.0, 0.0, true, false);
        automaton.add_state(0.0, 0.0, false, true);
        automaton.add_state(0.0, 0.0, false, false);
        automaton.add_transition("q0", "q1", 'a').unwrap();
        automaton.add_transition("q0", "q2", 'a').unwrap();

        let trace = run(&automaton, "a").unwrap();
        assert_eq!(trace.verdict(), Verdict::Accepted);
        assert_eq!(trace.steps()[1].transitions.len(), 2);
        assert!(trace.steps()[1].active.contains("q2"));
    }

    #[test]
    fn test_epsilon_closure_follows_chains_and_cycles() {
        let mut automaton = Automaton::new(Kind::Nfa);
        for _ in 0..4 {
            automaton.add_state(0.0, 0.0, false, false);
        }
        automaton.add_transition("q0", "q1", EPSILON).unwrap();
        automaton.add_transition("q1", "q2", EPSILON).unwrap();
        automaton.add_transition("q2", "q0", EPSILON).unwrap();

        let closure = epsilon_closure(&automaton, ["q0"]);
        assert_eq!(closure.len(), 3);
        assert!(!closure.contains("q3"));

        // Closing a closed set changes nothing.
        assert_eq!(epsilon_closure(&automaton, closure.clone()), closure);
    }

    #[test]
    fn test_session_cursor_stays_in_bounds() {
        let automaton = even_zeros();
        let mut session = Simulation::new();
        session.set_input("00");

        assert_eq!(session.start(&automaton).unwrap().len(), 3);
        assert!(session.is_active());
        assert_eq!(session.cursor(), None);
        assert_eq!(session.verdict(), Some(Verdict::Accepted));

        assert_eq!(session.previous_step(), None);
        assert_eq!(session.next_step().unwrap().index, 0);
        assert_eq!(session.next_step().unwrap().index, 1);
        assert_eq!(session.next_step().unwrap().index, 2);
        assert!(session.is_at_end());
        assert_eq!(session.next_step().unwrap().index, 2);
        assert_eq!(session.cursor(), Some(2));

        assert_eq!(session.previous_step().unwrap().index, 1);
        assert_eq!(session.previous_step().unwrap().index, 0);
        assert_eq!(session.previous_step().unwrap().index, 0);
    }

    #[test]
    fn test_session_stop_keeps_verdict() {
        let automaton = even_zeros();
        let mut session = Simulation::new();
        session.set_input("0");
        session.start(&automaton).unwrap();
        session.next_step();

        session.stop();

        assert!(!session.is_active());
        assert_eq!(session.cursor(), None);
        assert_eq!(session.verdict(), Some(Verdict::Rejected));
        assert_eq!(session.next_step(), None);
    }

    #[test]
    fn test_session_start_failure_deactivates() {
        let mut session = Simulation::new();
        session.set_input("0");

        let result = session.start(&Automaton::default());

        assert_eq!(result.err(), Some(AutomatonError::NoInitialState));
        assert!(!session.is_active());
        assert!(session.trace().is_none());
    }

    #[test]
    fn test_session_rewind() {
        let mut session = Simulation::new();
        session.set_input("1");
        session.start(&even_zeros()).unwrap();
        session.next_step();
        session.next_step();

        session.rewind();
        assert_eq!(session.cursor(), None);
        assert_eq!(session.next_step().unwrap().index, 0);
    }
}
