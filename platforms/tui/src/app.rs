use action::Action;
use automata::{
    parse, render, Active, Automaton, AutomatonLoader, PresetManager, TraceStep, Verdict,
    Workbench, EPSILON,
};
use keymap::{Config, KeyMapConfig};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Padding, Paragraph, Wrap},
    Frame,
};
use std::path::Path;

const BLOCK_PADDING: Padding = Padding::new(1, 1, 0, 0);

pub struct App {
    workbench: Workbench,
    current_index: usize,
    auto_play: bool,
    message: String,
    show_help: bool,
    pub(crate) keymap: Config<Action>,
    // Set when the automaton came from a file or stdin, disabling preset switching
    loaded_from_source: bool,
    source: String,
    // Input given on the command line, reused for every automaton
    input: Option<String>,
}

impl App {
    pub fn new_default(input: Option<String>) -> Result<Self, String> {
        let automaton = PresetManager::get_by_index(0).map_err(|e| e.to_string())?;
        let source = PresetManager::text_by_index(0)
            .map_err(|e| e.to_string())?
            .to_string();

        let mut app = Self::with_input(input, false);
        app.load(automaton, source);
        Ok(app)
    }

    pub fn new_from_file(path: &Path, input: Option<String>) -> Result<Self, String> {
        let automaton = AutomatonLoader::load_automaton(path)
            .map_err(|e| format!("Failed to load automaton: {}", e))?;
        // JSON snapshots have no text of their own, show them in the definition format.
        let source = render(&automaton).unwrap_or_else(|e| format!("# {e}"));

        let mut app = Self::with_input(input, true);
        app.load(automaton, source);
        Ok(app)
    }

    pub fn new_from_definition(source: String, input: Option<String>) -> Result<Self, String> {
        let automaton =
            parse(&source).map_err(|e| format!("Failed to load automaton: {}", e))?;

        let mut app = Self::with_input(input, true);
        app.load(automaton, source);
        Ok(app)
    }

    fn with_input(input: Option<String>, loaded_from_source: bool) -> Self {
        Self {
            workbench: Workbench::new(),
            current_index: 0,
            auto_play: false,
            message: String::new(),
            show_help: false,
            keymap: Action::keymap_config(),
            loaded_from_source,
            source: String::new(),
            input,
        }
    }

    /// Makes `automaton` the one being stepped through and starts a run of the input.
    fn load(&mut self, automaton: Automaton, source: String) {
        let input = self
            .input
            .clone()
            .unwrap_or_else(|| default_input(&automaton));
        let name = automaton.name().to_string();

        self.source = source;
        self.auto_play = false;
        self.workbench.import(automaton);
        self.workbench.set_input(input.as_str());

        self.message = match self.workbench.start_simulation() {
            Ok(_) => format!("Loaded {name} with input \"{input}\". Press 'h' for help."),
            Err(e) => e.to_string(),
        };
    }

    pub fn render(&mut self, f: &mut Frame) {
        let inner_area = f.area().inner(Margin::new(1, 0));

        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // Automaton info
                Constraint::Min(0),    // Source and run
                Constraint::Length(3), // Status
            ])
            .split(inner_area);

        self.render_automaton_info(f, main_chunks[0]);

        let middle_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Length(1),
                Constraint::Percentage(50),
            ])
            .split(main_chunks[1]);

        self.render_source(f, middle_chunks[0]);

        let right_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // Run
                Constraint::Min(0),    // Table or help
            ])
            .split(middle_chunks[2]);

        self.render_run(f, right_chunks[0]);

        if self.show_help {
            self.render_help(f, right_chunks[1]);
        } else {
            self.render_table(f, right_chunks[1]);
        }

        self.render_status(f, main_chunks[2]);
    }

    fn render_source(&self, f: &mut Frame, area: Rect) {
        let keywords = [
            "name:", "type:", "alphabet:", "states:", "initial:", "final:", "transitions:",
        ];

        let mut lines = Vec::new();
        for line in self.source.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') {
                lines.push(Line::from(Span::styled(
                    line,
                    Style::default().fg(Color::DarkGray),
                )));
                continue;
            }

            let mut parts = line.split_whitespace();
            match parts.next() {
                Some(first_word) if keywords.contains(&first_word) => {
                    lines.push(Line::from(vec![
                        Span::styled(first_word, Style::default().fg(Color::Yellow)),
                        Span::raw(" "),
                        Span::raw(parts.collect::<Vec<_>>().join(" ")),
                    ]));
                }
                _ => lines.push(Line::from(line)),
            }
        }

        let paragraph = section("Definition", lines).wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_automaton_info(&self, f: &mut Frame, area: Rect) {
        let automaton = self.workbench.automaton();
        let label = Style::default().fg(Color::Yellow);

        let position = if self.loaded_from_source {
            format!("{} (Custom)", automaton.name())
        } else {
            format!(
                "{} ({}/{})",
                automaton.name(),
                self.current_index + 1,
                PresetManager::count()
            )
        };

        let alphabet = automaton
            .alphabet()
            .iter()
            .map(char::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        let text = vec![
            Line::from(vec![
                Span::styled("Automaton: ", label),
                Span::raw(position),
            ]),
            Line::from(vec![
                Span::styled("Type: ", label),
                Span::raw(automaton.kind().to_string().to_uppercase()),
                Span::styled(" | Alphabet: ", label),
                Span::raw(format!("{{{alphabet}}}")),
            ]),
            Line::from(vec![
                Span::styled("States: ", label),
                Span::raw(automaton.state_count().to_string()),
                Span::styled(" | Transitions: ", label),
                Span::raw(automaton.transition_count().to_string()),
            ]),
        ];

        let paragraph = Paragraph::new(text).block(
            block("Automata - Finite Automaton Workbench (TUI)")
                .title_alignment(Alignment::Center),
        );

        f.render_widget(paragraph, area);
    }

    fn render_run(&self, f: &mut Frame, area: Rect) {
        let simulation = self.workbench.simulation();
        let step = simulation.current_step();
        let consumed = step.map_or(0, |s| s.index);
        let label = Style::default().fg(Color::Yellow);

        let mut input_spans = vec![Span::styled("Input: ", label)];
        if simulation.input().is_empty() {
            input_spans.push(Span::styled("(empty)", Style::default().fg(Color::DarkGray)));
        }
        for (i, symbol) in simulation.input().chars().enumerate() {
            let style = if step.is_some() && i + 1 == consumed {
                Style::default()
                    .bg(Color::Yellow)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD)
            } else if i < consumed {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            input_spans.push(Span::styled(format!(" {symbol} "), style));
        }

        let (status_text, status_color) = match (simulation.trace(), step) {
            (None, _) => ("NOT RUNNING", Color::Red),
            (Some(_), None) => ("READY", Color::Blue),
            (Some(_), Some(s)) if s.rejected => ("STUCK", Color::Red),
            (Some(trace), Some(_)) if simulation.is_at_end() => match trace.verdict() {
                Verdict::Accepted => ("ACCEPTED", Color::Green),
                Verdict::Rejected => ("REJECTED", Color::Red),
            },
            (Some(_), Some(_)) => ("RUNNING", Color::Green),
        };

        let total = simulation.trace().map_or(0, |t| t.len());
        let text = vec![
            Line::from(input_spans),
            Line::from(vec![
                Span::styled("Active: ", label),
                Span::styled(
                    step.map_or("-".to_string(), describe_active),
                    Style::default()
                        .fg(status_color)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Step: ", label),
                Span::raw(format!(
                    "{}/{}",
                    simulation.cursor().map_or(0, |c| c + 1),
                    total
                )),
                Span::styled(" | Status: ", label),
                Span::styled(status_text, Style::default().fg(status_color)),
            ]),
        ];

        f.render_widget(section("Run", text), area);
    }

    fn render_table(&self, f: &mut Frame, area: Rect) {
        let table = self.workbench.automaton().table();
        let step = self.workbench.simulation().current_step();
        let taken: Vec<&str> = step
            .map(|s| s.transitions.iter().map(|k| k.to.as_str()).collect())
            .unwrap_or_default();

        let cell = |targets: &[String]| {
            if targets.is_empty() {
                "-".to_string()
            } else {
                targets.join(",")
            }
        };
        let width = table
            .rows
            .iter()
            .flat_map(|row| row.targets.iter().map(|t| cell(t).chars().count()))
            .chain(table.rows.iter().map(|row| row.state.chars().count() + 2))
            .max()
            .unwrap_or(1)
            .max(3);

        let header_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);
        let mut header = vec![Span::styled(format!("{:<width$}", ""), header_style)];
        for symbol in &table.symbols {
            header.push(Span::styled(format!(" │ {symbol:<width$}"), header_style));
        }

        let mut lines = vec![Line::from(header)];
        for row in &table.rows {
            let flags = format!(
                "{}{}",
                if row.is_initial { "→" } else { "" },
                if row.is_final { "*" } else { "" }
            );
            let is_active = step.is_some_and(|s| s.active.contains(&row.state));
            let style = if is_active {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else if taken.contains(&row.state.as_str()) {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };

            let mut spans = vec![Span::styled(
                format!("{:<width$}", format!("{flags}{}", row.state)),
                style,
            )];
            for targets in &row.targets {
                spans.push(Span::raw(format!(" │ {:<width$}", cell(targets))));
            }
            lines.push(Line::from(spans));
        }

        if let Some(error) = self.workbench.automaton().error() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(Color::Red),
            )));
        }

        let paragraph = section("Transitions", lines).wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let help_text = vec![
            Line::from("Controls:"),
            Line::from("  Space - Next step"),
            Line::from("  b - Previous step"),
            Line::from("  r - Rewind to the start"),
            Line::from("  p - Toggle auto-play"),
            Line::from(if self.loaded_from_source {
                "  ← → - Switching disabled (loaded from file/stdin)"
            } else {
                "  ← → - Switch automata"
            }),
            Line::from("  h - Toggle this help"),
            Line::from("  q - Quit"),
            Line::from(""),
            Line::from(format!(
                "Mode: {}",
                self.workbench.automaton().kind().to_string().to_uppercase()
            )),
            Line::from("  Active states are shown in green in the transition table"),
            Line::from("  NFA runs show the state set after following ε moves"),
            Line::from(format!("  '{EPSILON}' transitions consume no input")),
        ];

        f.render_widget(section("Help", help_text), area);
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let outer = block("Status");
        let inner = outer.inner(area);
        let verdict = match self.workbench.simulation().verdict() {
            Some(verdict) => format!("Verdict: {verdict}"),
            None => "No run".to_string(),
        };
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(verdict.chars().count() as u16),
            ])
            .split(inner);

        let auto_play_status = if self.auto_play { "ON" } else { "OFF" };
        let status = Line::from(vec![
            Span::raw("Auto-play: "),
            Span::styled(auto_play_status, Style::default().fg(Color::Yellow)),
            Span::raw(format!(" | {}", self.message)),
        ]);

        let summary = Text::from(
            Line::from(Span::styled(verdict, Style::default().fg(Color::Yellow))).right_aligned(),
        );

        f.render_widget(outer, area);
        f.render_widget(status, chunks[0]);
        f.render_widget(summary, chunks[1]);
    }

    pub fn next_step(&mut self) {
        let simulation = self.workbench.simulation();
        if simulation.trace().is_none() {
            self.message = "Nothing to step through.".to_string();
            self.auto_play = false;
            return;
        }
        if simulation.is_at_end() {
            if let Some(verdict) = simulation.verdict() {
                self.message = format!("Input {verdict}. Press 'r' to rewind.");
            }
            self.auto_play = false;
            return;
        }

        self.message = match self.workbench.next_step() {
            Some(step) => describe_step(step),
            None => "Nothing to step through.".to_string(),
        };
    }

    pub fn previous_step(&mut self) {
        self.auto_play = false;
        self.message = match self.workbench.previous_step() {
            Some(step) => describe_step(step),
            None => "At the start of the run.".to_string(),
        };
    }

    pub fn rewind(&mut self) {
        self.workbench.rewind_simulation();
        self.auto_play = false;
        self.message = "Run rewound".to_string();
    }

    pub fn toggle_auto_play(&mut self) {
        self.auto_play = !self.auto_play;
        self.message = format!(
            "Auto-play {}",
            if self.auto_play {
                "enabled"
            } else {
                "disabled"
            }
        );
    }

    pub fn is_auto_playing(&self) -> bool {
        let simulation = self.workbench.simulation();
        self.auto_play && simulation.is_active() && !simulation.is_at_end()
    }

    pub fn next_automaton(&mut self) {
        if self.loaded_from_source {
            self.message = "Cannot switch automata when loaded from file/stdin.".to_string();
            return;
        }
        let count = PresetManager::count();
        if count == 0 {
            return;
        }
        self.current_index = (self.current_index + 1) % count;
        self.load_current_preset();
    }

    pub fn previous_automaton(&mut self) {
        if self.loaded_from_source {
            self.message = "Cannot switch automata when loaded from file/stdin.".to_string();
            return;
        }
        let count = PresetManager::count();
        if count == 0 {
            return;
        }
        self.current_index = if self.current_index == 0 {
            count - 1
        } else {
            self.current_index - 1
        };
        self.load_current_preset();
    }

    fn load_current_preset(&mut self) {
        let loaded = PresetManager::get_by_index(self.current_index).and_then(|automaton| {
            PresetManager::text_by_index(self.current_index).map(|text| (automaton, text))
        });

        match loaded {
            Ok((automaton, text)) => self.load(automaton, text.to_string()),
            Err(e) => self.message = e.to_string(),
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }
}

/// Every non-epsilon symbol of the alphabet, twice over.
fn default_input(automaton: &Automaton) -> String {
    let symbols: String = automaton
        .alphabet()
        .iter()
        .filter(|&&symbol| symbol != EPSILON)
        .collect();
    symbols.repeat(2)
}

fn describe_active(step: &TraceStep) -> String {
    match &step.active {
        Active::Single(Some(id)) => id.clone(),
        Active::Single(None) => "none".to_string(),
        Active::Set(ids) if ids.is_empty() => "{}".to_string(),
        Active::Set(_) => format!("{{{}}}", step.active.ids().join(", ")),
    }
}

fn describe_step(step: &TraceStep) -> String {
    match step.symbol {
        None => "Start of the run".to_string(),
        Some(symbol) if step.rejected => {
            format!("Step {}: no transition on '{symbol}'", step.index)
        }
        Some(symbol) => format!("Step {}: read '{symbol}'", step.index),
    }
}
