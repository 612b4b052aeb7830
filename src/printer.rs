//! Renders an automaton back into the `.fa` text format understood by [`crate::parse`].

use crate::automaton::Automaton;
use crate::types::{AutomatonError, State, Symbol};

/// Renders `automaton` as a `.fa` definition.
///
/// Every state is declared explicitly so positions and labels survive a round trip.
/// Fails when the automaton holds something the grammar cannot express: an empty
/// alphabet, a state id outside `[A-Za-z0-9_]` or equal to a section keyword, a label
/// containing `"`, the `'` symbol, or a non-finite coordinate.
pub fn render(automaton: &Automaton) -> Result<String, AutomatonError> {
    if automaton.alphabet().is_empty() {
        return Err(unprintable("the alphabet is empty"));
    }

    let name = automaton.name().trim();
    let mut lines = vec![
        format!("name: {}", if name.is_empty() { "unnamed" } else { name }),
        format!("type: {}", automaton.kind()),
        format!("alphabet: {}", symbols(automaton.alphabet())?),
    ];

    if automaton.state_count() > 0 {
        lines.push("states:".to_string());
        for state in automaton.states() {
            lines.push(format!("  {}", declaration(state)?));
        }
    }

    if let Some(initial) = automaton.initial_state() {
        lines.push(format!("initial: {}", initial.id));
    }

    let finals: Vec<&str> = automaton.final_states().map(|s| s.id.as_str()).collect();
    if !finals.is_empty() {
        lines.push(format!("final: {}", finals.join(", ")));
    }

    if automaton.transition_count() > 0 {
        lines.push("transitions:".to_string());
        for state in automaton.states() {
            let mut edges = automaton.transitions().filter(|t| t.from == state.id).peekable();
            if edges.peek().is_none() {
                continue;
            }
            lines.push(format!("  {}:", state.id));
            for transition in edges {
                lines.push(format!("    {} -> {}", symbol(transition.symbol)?, transition.to));
            }
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// Section names the grammar reads as keywords. A state with one of these ids would end
/// the transitions section early.
const KEYWORDS: [&str; 7] = [
    "name",
    "type",
    "alphabet",
    "states",
    "initial",
    "final",
    "transitions",
];

fn declaration(state: &State) -> Result<String, AutomatonError> {
    let valid_id = !state.id.is_empty()
        && state
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_id || KEYWORDS.contains(&state.id.as_str()) {
        return Err(unprintable(&format!("state id '{}' is not printable", state.id)));
    }
    if !state.x.is_finite() || !state.y.is_finite() {
        return Err(unprintable(&format!("state {} has no finite position", state.id)));
    }

    let label = if state.label == state.id {
        String::new()
    } else if state.label.contains(|c| matches!(c, '"' | '\n' | '\r')) {
        return Err(unprintable(&format!("label of state {} is not printable", state.id)));
    } else {
        format!(" \"{}\"", state.label)
    };

    Ok(format!("{}{label} ({}, {})", state.id, state.x, state.y))
}

fn symbols(alphabet: &[Symbol]) -> Result<String, AutomatonError> {
    let rendered = alphabet
        .iter()
        .map(|&s| symbol(s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join(", "))
}

fn symbol(symbol: Symbol) -> Result<String, AutomatonError> {
    match symbol {
        '\'' => Err(unprintable("the symbol ' cannot be quoted")),
        ',' | '#' => Ok(format!("'{symbol}'")),
        s if s.is_whitespace() => Ok(format!("'{symbol}'")),
        s => Ok(s.to_string()),
    }
}

fn unprintable(reason: &str) -> AutomatonError {
    AutomatonError::ValidationError(format!("Cannot render automaton: {reason}"))
}
