//! The `Workbench` ties the pieces together for interactive front-ends: one automaton being
//! edited and stepped through, plus a library of saved automata that can be composed and
//! quickly tested.

use tracing::debug;

use crate::automaton::Automaton;
use crate::composer::{concatenate, intersect, union, Composition, CompositionWarning};
use crate::simulator::{simulate, Simulation, Trace, TraceStep};
use crate::types::{AutomatonError, Verdict};

/// Identifies an automaton in the library. Ids are never reused.
pub type AutomatonId = usize;

/// A saved automaton.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: AutomatonId,
    pub automaton: Automaton,
}

/// The composition operators available on the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Union,
    Concatenation,
    Intersection,
}

impl Operation {
    fn apply(self, a1: &Automaton, a2: &Automaton) -> Composition {
        match self {
            Operation::Union => union(a1, a2),
            Operation::Concatenation => concatenate(a1, a2),
            Operation::Intersection => intersect(a1, a2),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbench {
    automaton: Automaton,
    simulation: Simulation,
    library: Vec<Entry>,
    next_id: AutomatonId,
    selection: Vec<AutomatonId>,
    active: Option<AutomatonId>,
    result: Option<Verdict>,
}

impl Workbench {
    pub fn new() -> Self {
        Self::default()
    }

    /// The automaton being edited.
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn automaton_mut(&mut self) -> &mut Automaton {
        &mut self.automaton
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Replaces the edited automaton and drops any running simulation. The library is kept.
    pub fn import(&mut self, automaton: Automaton) {
        self.automaton = automaton;
        self.simulation = Simulation::new();
    }

    /// Returns the workbench to its initial state, library included.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn clear_error(&mut self) {
        self.automaton.clear_error();
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.simulation.set_input(input);
    }

    /// Starts stepping through the current input on the edited automaton.
    ///
    /// A failed precondition is recorded as the automaton's error and leaves the session
    /// stopped.
    pub fn start_simulation(&mut self) -> Result<&Trace, AutomatonError> {
        match self.simulation.start(&self.automaton) {
            Ok(trace) => {
                self.automaton.clear_error();
                Ok(trace)
            }
            Err(error) => {
                debug!(%error, "simulation refused");
                self.automaton.record_error(&error);
                Err(error)
            }
        }
    }

    pub fn next_step(&mut self) -> Option<&TraceStep> {
        self.simulation.next_step()
    }

    pub fn previous_step(&mut self) -> Option<&TraceStep> {
        self.simulation.previous_step()
    }

    /// Moves the playback cursor back before the first step.
    pub fn rewind_simulation(&mut self) {
        self.simulation.rewind();
    }

    pub fn stop_simulation(&mut self) {
        self.simulation.stop();
    }

    /// Adds an automaton to the library and returns its id.
    pub fn add_automaton(&mut self, automaton: Automaton) -> AutomatonId {
        let id = self.next_id;
        self.next_id += 1;
        self.library.push(Entry { id, automaton });
        id
    }

    /// Saves a copy of the edited automaton into the library.
    pub fn save(&mut self) -> AutomatonId {
        self.add_automaton(self.automaton.clone())
    }

    pub fn library(&self) -> &[Entry] {
        &self.library
    }

    pub fn get(&self, id: AutomatonId) -> Option<&Automaton> {
        self.library
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.automaton)
    }

    /// Removes an automaton from the library, along with any reference to it.
    pub fn remove_automaton(&mut self, id: AutomatonId) -> Option<Automaton> {
        let position = self.library.iter().position(|entry| entry.id == id)?;
        self.selection.retain(|&selected| selected != id);
        if self.active == Some(id) {
            self.active = None;
            self.result = None;
        }
        Some(self.library.remove(position).automaton)
    }

    /// Adds `id` to the composition selection. Selecting an already selected automaton
    /// does nothing.
    pub fn select(&mut self, id: AutomatonId) -> Result<(), AutomatonError> {
        self.lookup(id)?;
        if self.selection.contains(&id) {
            return Ok(());
        }
        if self.selection.len() == 2 {
            return Err(AutomatonError::SelectionFull);
        }
        self.selection.push(id);
        Ok(())
    }

    pub fn deselect(&mut self, id: AutomatonId) {
        self.selection.retain(|&selected| selected != id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// The selected ids, in selection order. The first one is the first operand.
    pub fn selection(&self) -> &[AutomatonId] {
        &self.selection
    }

    pub fn compose_union(
        &mut self,
    ) -> Result<(AutomatonId, Vec<CompositionWarning>), AutomatonError> {
        self.compose(Operation::Union)
    }

    pub fn compose_concatenation(
        &mut self,
    ) -> Result<(AutomatonId, Vec<CompositionWarning>), AutomatonError> {
        self.compose(Operation::Concatenation)
    }

    pub fn compose_intersection(
        &mut self,
    ) -> Result<(AutomatonId, Vec<CompositionWarning>), AutomatonError> {
        self.compose(Operation::Intersection)
    }

    /// Composes the two selected automata, saves the result and clears the selection.
    pub fn compose(
        &mut self,
        operation: Operation,
    ) -> Result<(AutomatonId, Vec<CompositionWarning>), AutomatonError> {
        let &[first, second] = self.selection.as_slice() else {
            return Err(AutomatonError::IncompleteSelection(self.selection.len()));
        };

        let composition = operation.apply(self.lookup(first)?, self.lookup(second)?);
        let id = self.add_automaton(composition.automaton);
        self.selection.clear();

        Ok((id, composition.warnings))
    }

    /// Chooses the library automaton used by [`Workbench::simulate_active`] and clears the
    /// previous result.
    pub fn set_active(&mut self, id: AutomatonId) -> Result<(), AutomatonError> {
        self.lookup(id)?;
        self.active = Some(id);
        self.result = None;
        Ok(())
    }

    pub fn active(&self) -> Option<AutomatonId> {
        self.active
    }

    /// Runs `input` on the active automaton and stores the verdict.
    ///
    /// Without an active automaton the result is cleared and `Ok(None)` returned.
    pub fn simulate_active(&mut self, input: &str) -> Result<Option<Verdict>, AutomatonError> {
        self.result = None;
        let Some(automaton) = self.active.and_then(|id| self.get(id)) else {
            return Ok(None);
        };

        let verdict = simulate(automaton, input)?;
        self.result = Some(verdict);
        Ok(Some(verdict))
    }

    /// The verdict of the last [`Workbench::simulate_active`] call.
    pub fn result(&self) -> Option<Verdict> {
        self.result
    }

    pub fn clear_result(&mut self) {
        self.result = None;
    }

    fn lookup(&self, id: AutomatonId) -> Result<&Automaton, AutomatonError> {
        self.get(id).ok_or(AutomatonError::UnknownAutomaton(id))
    }
}
