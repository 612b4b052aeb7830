use keymap::KeyMap;

#[derive(KeyMap, Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// Quit the application
    #[key("q")]
    Quit,
    /// Rewind the trace to before the first step
    #[key("r")]
    Reset,
    /// Move to the next step of the trace
    #[key("space")]
    Next,
    /// Move back one step
    #[key("b")]
    Previous,
    /// Toggle auto-play
    #[key("p")]
    ToggleAutoPlay,
    /// Toggle help display
    #[key("h")]
    ToggleHelp,
    /// Load the previous automaton
    #[key("left")]
    PreviousAutomaton,
    /// Load the next automaton
    #[key("right")]
    NextAutomaton,
}
