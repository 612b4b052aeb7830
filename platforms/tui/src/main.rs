mod app;

use action::Action;
use app::App;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::Read;
use std::{error::Error, io, path::Path, time::Duration};

/// Step through finite automaton runs in the terminal.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "EXAMPLES:
  automata-tui samples/even-zeros.fa --input 0100
  cat samples/ends-with-ab.fa | automata-tui --input aabab")]
struct Cli {
    /// Path to an automaton file (.fa or .json).
    /// If not provided, the built-in automata are loaded.
    /// A .fa definition can also be piped via stdin.
    automaton_file: Option<String>,

    /// The input string to run. Defaults to the automaton's alphabet, twice over.
    #[clap(short, long)]
    input: Option<String>,
}

#[derive(PartialEq)]
enum AppState {
    Running,
    ShouldQuit,
}

/// A wrapper around the terminal to ensure it's restored on drop.
struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl Tui {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        // Errors are ignored, there is nothing left to report them to.
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
        let _ = self.terminal.show_cursor();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // Load before entering the alternate screen so errors reach stderr intact.
    let app = match load_app(&cli) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut tui = Tui::new()?;
    run_app(&mut tui.terminal, app)?;

    Ok(())
}

/// Builds the app from a file, then stdin, and finally the built-in automata.
fn load_app(cli: &Cli) -> Result<App, String> {
    let input = cli.input.clone();

    if let Some(file_path) = &cli.automaton_file {
        App::new_from_file(Path::new(file_path), input)
    } else if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        App::new_from_definition(buffer, input)
    } else {
        App::new_default(input)
    }
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| app.render(f))?;

        let timeout = if app.is_auto_playing() {
            Duration::from_millis(500)
        } else {
            Duration::from_millis(100)
        };

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if handle_key_event(&mut app, key) == AppState::ShouldQuit {
                    return Ok(());
                }
            }
        }

        if app.is_auto_playing() {
            app.next_step();
        }
    }
}

fn handle_key_event(app: &mut App, key: KeyEvent) -> AppState {
    if let Some(action) = app.keymap.get(&key) {
        match action {
            Action::Quit => return AppState::ShouldQuit,
            Action::Reset => app.rewind(),
            Action::Next => app.next_step(),
            Action::Previous => app.previous_step(),
            Action::ToggleAutoPlay => app.toggle_auto_play(),
            Action::ToggleHelp => app.toggle_help(),
            Action::PreviousAutomaton => app.previous_automaton(),
            Action::NextAutomaton => app.next_automaton(),
        }
    }
    AppState::Running
}
