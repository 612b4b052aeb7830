use crate::automaton::Automaton;
use crate::types::{AutomatonError, Kind};

use std::sync::RwLock;
use tracing::warn;

// Embedded preset automata
const PRESET_TEXTS: [&str; 7] = [
    include_str!("../samples/even-zeros.fa"),
    include_str!("../samples/contains-one.fa"),
    include_str!("../samples/only-a.fa"),
    include_str!("../samples/only-b.fa"),
    include_str!("../samples/a-star-b-star.fa"),
    include_str!("../samples/ends-with-ab.fa"),
    include_str!("../samples/divisible-by-three.fa"),
];

lazy_static::lazy_static! {
    pub static ref PRESETS: RwLock<Vec<Automaton>> = RwLock::new(Vec::new());
}

pub struct PresetManager;

impl PresetManager {
    /// Parses the embedded presets into [`PRESETS`].
    pub fn load() -> Result<(), AutomatonError> {
        let mut presets = Vec::new();

        for (index, text) in PRESET_TEXTS.iter().enumerate() {
            match crate::parser::parse(text) {
                Ok(automaton) => presets.push(automaton),
                Err(error) => warn!(index, %error, "failed to parse preset"),
            }
        }

        if let Ok(mut write_guard) = PRESETS.write() {
            *write_guard = presets;
        } else {
            return Err(AutomatonError::FileError(
                "Failed to acquire write lock".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the number of available presets
    pub fn count() -> usize {
        Self::ensure_loaded();

        PRESETS.read().map(|presets| presets.len()).unwrap_or(0)
    }

    pub fn get_by_index(index: usize) -> Result<Automaton, AutomatonError> {
        Self::ensure_loaded();

        PRESETS
            .read()
            .map_err(|_| AutomatonError::FileError("Failed to acquire read lock".to_string()))?
            .get(index)
            .cloned()
            .ok_or_else(|| {
                AutomatonError::ValidationError(format!("Preset index {} out of range", index))
            })
    }

    /// Get a preset by its name, ignoring case
    pub fn get_by_name(name: &str) -> Result<Automaton, AutomatonError> {
        Self::ensure_loaded();

        PRESETS
            .read()
            .map_err(|_| AutomatonError::FileError("Failed to acquire read lock".to_string()))?
            .iter()
            .find(|automaton| automaton.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| AutomatonError::ValidationError(format!("Preset '{}' not found", name)))
    }

    pub fn list_names() -> Vec<String> {
        Self::ensure_loaded();

        PRESETS
            .read()
            .map(|presets| presets.iter().map(|a| a.name().to_string()).collect())
            .unwrap_or_else(|_| Vec::new())
    }

    /// Get a summary of a preset by its index
    pub fn info(index: usize) -> Result<PresetInfo, AutomatonError> {
        let automaton = Self::get_by_index(index)?;

        Ok(PresetInfo {
            index,
            name: automaton.name().to_string(),
            kind: automaton.kind(),
            alphabet: automaton.alphabet().iter().collect(),
            initial_state: automaton.initial_state().map(|s| s.id.clone()),
            state_count: automaton.state_count(),
            transition_count: automaton.transition_count(),
        })
    }

    /// Search for presets by name
    pub fn search(query: &str) -> Vec<usize> {
        Self::ensure_loaded();

        let query = query.to_lowercase();
        PRESETS
            .read()
            .map(|presets| {
                presets
                    .iter()
                    .enumerate()
                    .filter(|(_, automaton)| automaton.name().to_lowercase().contains(&query))
                    .map(|(index, _)| index)
                    .collect()
            })
            .unwrap_or_else(|_| Vec::new())
    }

    /// Get the original `.fa` text of a preset by its index
    pub fn text_by_index(index: usize) -> Result<&'static str, AutomatonError> {
        PRESET_TEXTS.get(index).copied().ok_or_else(|| {
            AutomatonError::ValidationError(format!("Preset text index {} out of range", index))
        })
    }

    fn ensure_loaded() {
        let empty = PRESETS.read().map(|p| p.is_empty()).unwrap_or(true);
        if empty {
            let _ = Self::load();
        }
    }
}

#[derive(Debug, Clone)]
pub struct PresetInfo {
    pub index: usize,
    pub name: String,
    pub kind: Kind,
    pub alphabet: String,
    pub initial_state: Option<String>,
    pub state_count: usize,
    pub transition_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{analyze, unreachable_states};
    use crate::composer::intersect;
    use crate::simulator::simulate;
    use crate::types::Verdict;

    fn accepts(automaton: &Automaton, input: &str) -> bool {
        simulate(automaton, input) == Ok(Verdict::Accepted)
    }

    #[test]
    fn test_preset_manager_initialization() {
        assert!(PresetManager::load().is_ok());
        assert_eq!(PresetManager::count(), PRESET_TEXTS.len());
    }

    #[test]
    fn test_all_presets_are_valid_and_connected() {
        for i in 0..PresetManager::count() {
            let automaton = PresetManager::get_by_index(i).unwrap();
            assert!(analyze(&automaton).is_ok(), "{} is invalid", automaton.name());
            assert!(
                unreachable_states(&automaton).is_empty(),
                "{} has unreachable states",
                automaton.name()
            );
        }
    }

    #[test]
    fn test_preset_languages() {
        let even = PresetManager::get_by_name("Even zeros").unwrap();
        assert!(accepts(&even, "00"));
        assert!(!accepts(&even, "0"));
        assert!(accepts(&even, "11"));

        let ab = PresetManager::get_by_name("a*b*").unwrap();
        assert!(accepts(&ab, ""));
        assert!(accepts(&ab, "aab"));
        assert!(!accepts(&ab, "aba"));

        let suffix = PresetManager::get_by_name("ends with AB").unwrap();
        assert!(accepts(&suffix, "bbab"));
        assert!(!accepts(&suffix, "aba"));

        let three = PresetManager::get_by_name("Divisible by three").unwrap();
        for n in 0u32..32 {
            let binary = format!("{n:b}");
            assert_eq!(accepts(&three, &binary), n % 3 == 0, "{binary}");
        }
    }

    #[test]
    fn test_presets_compose() {
        let even = PresetManager::get_by_name("Even zeros").unwrap();
        let one = PresetManager::get_by_name("Contains a one").unwrap();
        let both = intersect(&even, &one).into_automaton();

        assert!(accepts(&both, "1001"));
        assert!(!accepts(&both, "00"));
    }

    #[test]
    fn test_get_by_index_and_name() {
        assert!(PresetManager::get_by_index(0).is_ok());
        assert!(PresetManager::get_by_index(999).is_err());
        assert!(PresetManager::get_by_name("Nonexistent").is_err());
        assert!(PresetManager::text_by_index(0).unwrap().contains("name: Even zeros"));
        assert!(PresetManager::text_by_index(999).is_err());
    }

    #[test]
    fn test_list_names() {
        let names = PresetManager::list_names();
        assert_eq!(names.len(), PRESET_TEXTS.len());
        assert!(names.contains(&"Only a".to_string()));
        assert!(names.contains(&"Only b".to_string()));
    }

    #[test]
    fn test_preset_info() {
        let info = PresetManager::info(0).unwrap();
        assert_eq!(info.index, 0);
        assert_eq!(info.name, "Even zeros");
        assert_eq!(info.kind, Kind::Dfa);
        assert_eq!(info.alphabet, "01");
        assert_eq!(info.initial_state.as_deref(), Some("q0"));
        assert_eq!(info.state_count, 2);
        assert_eq!(info.transition_count, 4);

        assert!(PresetManager::info(999).is_err());
    }

    #[test]
    fn test_search() {
        assert_eq!(PresetManager::search("only").len(), 2);
        assert!(!PresetManager::search("ZEROS").is_empty());
        assert!(PresetManager::search("nonexistent").is_empty());
    }
}
