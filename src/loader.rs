//! This module provides the `AutomatonLoader` struct, responsible for loading automata from
//! files, strings and directories. `.fa` files go through the parser, `.json` files through
//! the snapshot codec.

use crate::automaton::Automaton;
use crate::parser::parse;
use crate::snapshot::from_json;
use crate::types::{AutomatonError, MAX_DEFINITION_SIZE};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The on-disk formats an automaton can be loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// The `.fa` text format.
    Definition,
    /// A JSON snapshot.
    Snapshot,
}

impl Format {
    /// Picks the format from a file extension, if it is one of ours.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "fa" => Some(Format::Definition),
            "json" => Some(Format::Snapshot),
            _ => None,
        }
    }
}

/// `AutomatonLoader` is a utility struct for loading automata.
pub struct AutomatonLoader;

impl AutomatonLoader {
    /// Loads a single automaton from the specified file path, choosing the format by extension.
    ///
    /// # Returns
    ///
    /// * `Ok(Automaton)` if the file is read and decoded.
    /// * `Err(AutomatonError::FileError)` if the file cannot be read or has an unknown extension.
    /// * `Err(AutomatonError::ParseError)` or `Err(AutomatonError::SnapshotError)` if the content is invalid.
    pub fn load_automaton(path: &Path) -> Result<Automaton, AutomatonError> {
        let format = Format::from_path(path).ok_or_else(|| {
            AutomatonError::FileError(format!(
                "Unsupported file type {} (expected .fa or .json)",
                path.display()
            ))
        })?;

        let content = fs::read_to_string(path).map_err(|e| {
            AutomatonError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), ?format, "loading automaton");
        Self::load_from_string(&content, format)
    }

    /// Loads a single automaton from string content in the given format.
    pub fn load_from_string(content: &str, format: Format) -> Result<Automaton, AutomatonError> {
        if content.len() > MAX_DEFINITION_SIZE {
            return Err(AutomatonError::FileError(format!(
                "Content exceeds maximum size of {MAX_DEFINITION_SIZE} bytes"
            )));
        }

        match format {
            Format::Definition => parse(content),
            Format::Snapshot => from_json(content),
        }
    }

    /// Loads every `.fa` and `.json` file in `directory`, sorted by path.
    ///
    /// Directories and other files are skipped. Each element reports either the loaded
    /// automaton with its path, or the error for that file.
    pub fn load_automata(
        directory: &Path,
    ) -> Vec<Result<(PathBuf, Automaton), AutomatonError>> {
        if !directory.exists() {
            return vec![Err(AutomatonError::FileError(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(AutomatonError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(AutomatonError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }
        paths.sort();

        for path in paths {
            if path.is_dir() || Format::from_path(&path).is_none() {
                continue;
            }

            match Self::load_automaton(&path) {
                Ok(automaton) => results.push(Ok((path, automaton))),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping automaton");
                    results.push(Err(AutomatonError::FileError(format!(
                        "Failed to load automaton from {}: {}",
                        path.display(),
                        e
                    ))));
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::to_json;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const DEFINITION: &str =
        "name: Only a\nalphabet: a\ninitial: q0\nfinal: q1\ntransitions:\n  q0:\n    a -> q1";

    fn write_file(path: &Path, content: &str) {
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_valid_definition() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("only-a.fa");
        write_file(&file_path, DEFINITION);

        let automaton = AutomatonLoader::load_automaton(&file_path).unwrap();
        assert_eq!(automaton.name(), "Only a");
        assert_eq!(automaton.state_count(), 2);
        assert_eq!(automaton.initial_state().unwrap().id, "q0");
    }

    #[test]
    fn test_load_snapshot() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("only-a.json");
        let original = parse(DEFINITION).unwrap();
        write_file(&file_path, &to_json(&original).unwrap());

        let automaton = AutomatonLoader::load_automaton(&file_path).unwrap();
        assert_eq!(automaton, original);
    }

    #[test]
    fn test_load_invalid_definition() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("invalid.fa");
        write_file(&file_path, "This is not a valid automaton");

        let result = AutomatonLoader::load_automaton(&file_path);
        assert!(matches!(result, Err(AutomatonError::ParseError(_))));
    }

    #[test]
    fn test_load_unknown_extension_and_missing_file() {
        let dir = tempdir().unwrap();
        let text_path = dir.path().join("notes.txt");
        write_file(&text_path, DEFINITION);

        assert!(matches!(
            AutomatonLoader::load_automaton(&text_path),
            Err(AutomatonError::FileError(_))
        ));
        assert!(matches!(
            AutomatonLoader::load_automaton(&dir.path().join("missing.fa")),
            Err(AutomatonError::FileError(_))
        ));
    }

    #[test]
    fn test_load_automata_from_directory() {
        let dir = tempdir().unwrap();

        write_file(&dir.path().join("a-valid.fa"), DEFINITION);
        write_file(&dir.path().join("b-invalid.json"), "{ nope");
        write_file(&dir.path().join("ignored.txt"), "This file should be ignored");
        fs::create_dir(dir.path().join("nested.fa")).unwrap();

        let results = AutomatonLoader::load_automata(dir.path());

        assert_eq!(results.len(), 2);
        let (path, automaton) = results[0].as_ref().unwrap();
        assert!(path.ends_with("a-valid.fa"));
        assert_eq!(automaton.name(), "Only a");
        assert!(results[1].is_err());
    }

    #[test]
    fn test_load_automata_from_missing_directory() {
        let dir = tempdir().unwrap();
        let results = AutomatonLoader::load_automata(&dir.path().join("nope"));

        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
