//! This module provides the parser for `.fa` automaton definitions, utilizing the `pest` crate.
//! It turns the grammar defined in `grammar.pest` into a validated [`Automaton`].

use crate::{
    analyzer::analyze,
    automaton::Automaton,
    types::{AutomatonError, Kind, State, StateId, StatePatch, Symbol, MAX_DEFINITION_SIZE},
};
use pest::{
    error::{Error, ErrorVariant},
    iterators::{Pair, Pairs},
    Parser as PestParser, Span,
};
use pest_derive::Parser as PestParser;
use std::collections::HashSet;
use tracing::debug;

/// Derives a `PestParser` for the automaton grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct AutomatonParser;

/// Horizontal distance between states declared without a position.
const DEFAULT_SPACING: f64 = 150.0;

/// Parses the given input string into an [`Automaton`].
///
/// The `states:` section is optional. Without it, states are created in order of first
/// reference (initial state, then transitions, then final states) and laid out on a row.
/// With it, every referenced state must be declared.
///
/// # Returns
///
/// * `Ok(Automaton)` if the input is successfully parsed and validated.
/// * `Err(AutomatonError::ParseError)` for syntax errors and rejected transitions.
/// * `Err(AutomatonError::ValidationError)` for missing sections.
pub fn parse(input: &str) -> Result<Automaton, AutomatonError> {
    if input.len() > MAX_DEFINITION_SIZE {
        return Err(AutomatonError::ValidationError(format!(
            "Definition exceeds {MAX_DEFINITION_SIZE} bytes"
        )));
    }

    let mut pairs = AutomatonParser::parse(Rule::automaton, input.trim())
        .map_err(|e| AutomatonError::ParseError(e.into()))?;
    let root = pairs
        .next()
        .ok_or_else(|| AutomatonError::ValidationError("Empty definition".to_string()))?;

    let automaton = build(parse_sections(root)?)?;

    analyze(&automaton)?;

    debug!(
        name = automaton.name(),
        kind = %automaton.kind(),
        states = automaton.state_count(),
        transitions = automaton.transition_count(),
        "parsed automaton"
    );

    Ok(automaton)
}

/// The raw content of every section, kept with spans for error reporting.
#[derive(Default)]
struct Sections<'i> {
    name: Option<String>,
    kind: Option<Kind>,
    alphabet: Option<Vec<(Symbol, Span<'i>)>>,
    states: Option<Vec<Declaration<'i>>>,
    initial: Option<(StateId, Span<'i>)>,
    finals: Option<Vec<(StateId, Span<'i>)>>,
    edges: Option<Vec<Edge<'i>>>,
}

struct Declaration<'i> {
    id: StateId,
    label: Option<String>,
    position: Option<(f64, f64)>,
    span: Span<'i>,
}

struct Edge<'i> {
    from: StateId,
    to: StateId,
    symbol: Symbol,
    span: Span<'i>,
}

/// Collects the top-level sections, rejecting any section declared twice.
fn parse_sections(pair: Pair<Rule>) -> Result<Sections, AutomatonError> {
    let mut sections = Sections::default();
    let mut seen = HashSet::new();

    for p in pair.into_inner() {
        let span = p.as_span();
        let rule = p.as_rule();

        check_unique_rule(rule, span, &mut seen)?;

        match rule {
            Rule::name => {
                let text = next_inner(&mut p.into_inner(), span)?;
                sections.name = Some(text.as_str().trim().to_string());
            }
            Rule::kind => sections.kind = Some(parse_kind(p)?),
            Rule::alphabet => {
                let symbols = next_inner(&mut p.into_inner(), span)?;
                sections.alphabet = Some(parse_symbols(symbols)?);
            }
            Rule::states => sections.states = Some(parse_declarations(p)?),
            Rule::initial => {
                let id = next_inner(&mut p.into_inner(), span)?;
                sections.initial = Some((id.as_str().to_string(), id.as_span()));
            }
            Rule::finals => {
                sections.finals = Some(
                    p.into_inner()
                        .map(|id| (id.as_str().to_string(), id.as_span()))
                        .collect(),
                );
            }
            Rule::transitions => sections.edges = Some(parse_transitions(p)?),
            _ => {} // EOI
        }
    }

    Ok(sections)
}

/// Assembles the automaton from its sections.
fn build(sections: Sections) -> Result<Automaton, AutomatonError> {
    let name = check_required_rule(sections.name, "name")?;
    let alphabet = check_required_rule(sections.alphabet, "alphabet")?;
    let edges = sections.edges.unwrap_or_default();
    let finals = sections.finals.unwrap_or_default();

    let mut automaton = Automaton::with_name(name, sections.kind.unwrap_or_default());

    for (symbol, span) in alphabet {
        if !automaton.add_symbol(symbol) {
            return Err(parse_error(
                &format!("Duplicate symbol '{symbol}' in alphabet"),
                span,
            ));
        }
    }

    match sections.states {
        Some(declarations) => {
            for declaration in declarations {
                if automaton.contains_state(&declaration.id) {
                    return Err(parse_error(
                        &format!("Duplicate state: {}", declaration.id),
                        declaration.span,
                    ));
                }
                declare(&mut automaton, declaration.id, declaration.label, declaration.position);
            }
        }
        None => {
            let references = sections
                .initial
                .iter()
                .map(|(id, _)| id)
                .chain(edges.iter().flat_map(|e| [&e.from, &e.to]))
                .chain(finals.iter().map(|(id, _)| id));

            for id in references {
                if !automaton.contains_state(id) {
                    declare(&mut automaton, id.clone(), None, None);
                }
            }
        }
    }

    if let Some((id, span)) = sections.initial {
        mark(&mut automaton, &id, StatePatch::new().initial(true), span)?;
    }

    for (id, span) in finals {
        mark(&mut automaton, &id, StatePatch::new().final_state(true), span)?;
    }

    for edge in edges {
        automaton
            .add_transition(&edge.from, &edge.to, edge.symbol)
            .map_err(|e| parse_error(&e.to_string(), edge.span))?;
    }

    Ok(automaton)
}

fn declare(
    automaton: &mut Automaton,
    id: StateId,
    label: Option<String>,
    position: Option<(f64, f64)>,
) {
    let (x, y) = position.unwrap_or((automaton.state_count() as f64 * DEFAULT_SPACING, 0.0));
    let mut state = State::new(id, x, y, false, false);
    if let Some(label) = label {
        state.label = label;
    }
    automaton.insert_state(state);
}

fn mark(
    automaton: &mut Automaton,
    id: &str,
    patch: StatePatch,
    span: Span,
) -> Result<(), AutomatonError> {
    automaton
        .update_state(id, patch)
        .map_err(|e| parse_error(&e.to_string(), span))
}

/// Parses the `states:` section.
fn parse_declarations(pair: Pair<Rule>) -> Result<Vec<Declaration>, AutomatonError> {
    let mut declarations = Vec::new();

    // Rule: states > [state_decl] > state_id, label?, position?
    for decl in pair.into_inner() {
        let span = decl.as_span();
        let mut inner = decl.into_inner();
        let id = next_inner(&mut inner, span)?.as_str().to_string();
        let mut label = None;
        let mut position = None;

        for p in inner {
            match p.as_rule() {
                Rule::label => label = Some(p.as_str().trim_matches('"').to_string()),
                Rule::position => position = Some(parse_position(p)?),
                _ => {}
            }
        }

        declarations.push(Declaration {
            id,
            label,
            position,
            span,
        });
    }

    Ok(declarations)
}

/// Parses the `transitions:` section into one edge per symbol.
///
/// A state may only have one block; its edges are listed together.
fn parse_transitions(pair: Pair<Rule>) -> Result<Vec<Edge>, AutomatonError> {
    let mut edges = Vec::new();
    let mut blocks = HashSet::new();

    // Rule: transitions > [block] > state_id, [edge] > symbols, state_id
    for block in pair.into_inner() {
        let span = block.as_span();
        let mut inner = block.into_inner();
        let from = next_inner(&mut inner, span)?.as_str().to_string();

        if !blocks.insert(from.clone()) {
            return Err(parse_error(
                &format!("Duplicate transition block: {from}"),
                span,
            ));
        }

        for edge in inner {
            let edge_span = edge.as_span();
            let mut parts = edge.into_inner();
            let symbols = parse_symbols(next_inner(&mut parts, edge_span)?)?;
            let to = next_inner(&mut parts, edge_span)?.as_str().to_string();

            edges.extend(symbols.into_iter().map(|(symbol, _)| Edge {
                from: from.clone(),
                to: to.clone(),
                symbol,
                span: edge_span,
            }));
        }
    }

    Ok(edges)
}

fn parse_kind(pair: Pair<Rule>) -> Result<Kind, AutomatonError> {
    let span = pair.as_span();
    let value = next_inner(&mut pair.into_inner(), span)?;

    match value.as_str().to_ascii_lowercase().as_str() {
        "dfa" => Ok(Kind::Dfa),
        "nfa" => Ok(Kind::Nfa),
        other => Err(parse_error(
            &format!("Unsupported automaton type: {other}"),
            span,
        )),
    }
}

/// Parses a list of symbols from a `Pair<Rule::symbols>`.
fn parse_symbols(pair: Pair<Rule>) -> Result<Vec<(Symbol, Span)>, AutomatonError> {
    pair.into_inner()
        .map(|p| {
            let span = p.as_span();
            parse_symbol(p.as_str())
                .map(|symbol| (symbol, span))
                .ok_or_else(|| parse_error("Empty symbol", span))
        })
        .collect()
}

/// Parses a single character symbol, handling quoted and unquoted symbols.
fn parse_symbol(input: &str) -> Option<Symbol> {
    let unquoted = input
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(input);
    unquoted.chars().next()
}

fn parse_position(pair: Pair<Rule>) -> Result<(f64, f64), AutomatonError> {
    let span = pair.as_span();
    let mut numbers = pair.into_inner();
    let mut coordinate = || -> Result<f64, AutomatonError> {
        let number = next_inner(&mut numbers, span)?;
        number
            .as_str()
            .parse::<f64>()
            .map_err(|e| parse_error(&format!("Invalid coordinate: {e}"), number.as_span()))
    };

    Ok((coordinate()?, coordinate()?))
}

/// Returns the next inner pair, or an error pointing at `span` if the grammar produced none.
fn next_inner<'i>(pairs: &mut Pairs<'i, Rule>, span: Span<'i>) -> Result<Pair<'i, Rule>, AutomatonError> {
    pairs
        .next()
        .ok_or_else(|| parse_error("Incomplete declaration", span))
}

/// Creates an `AutomatonError::ParseError` from a message and a `Span`.
fn parse_error(msg: &str, span: Span) -> AutomatonError {
    AutomatonError::ParseError(Box::new(Error::new_from_span(
        ErrorVariant::CustomError {
            message: msg.to_string(),
        },
        span,
    )))
}

/// Checks if a given section has already been declared.
fn check_unique_rule(
    rule: Rule,
    span: Span,
    seen: &mut HashSet<Rule>,
) -> Result<(), AutomatonError> {
    let Some(keyword) = section_keyword(rule) else {
        return Ok(());
    };

    if !seen.insert(rule) {
        return Err(parse_error(
            &format!("Duplicate \"{keyword}:\" declaration"),
            span,
        ));
    }

    Ok(())
}

/// Checks if a required section is present, returning an `Err` if it's missing.
fn check_required_rule<T>(value: Option<T>, keyword: &str) -> Result<T, AutomatonError> {
    value.ok_or_else(|| AutomatonError::ValidationError(format!("Missing '{keyword}' section")))
}

fn section_keyword(rule: Rule) -> Option<&'static str> {
    match rule {
        Rule::name => Some("name"),
        Rule::kind => Some("type"),
        Rule::alphabet => Some("alphabet"),
        Rule::states => Some("states"),
        Rule::initial => Some("initial"),
        Rule::finals => Some("final"),
        Rule::transitions => Some("transitions"),
        _ => None,
    }
}
