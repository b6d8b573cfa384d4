//! Collection names and display titles derived from document file names

use crate::error::{RegdocError, Result};
use regex::Regex;
use std::path::Path;

/// Shortest name a collection may have
pub const MIN_NAME_LENGTH: usize = 3;

/// Default upper bound on collection name length
pub const DEFAULT_MAX_NAME_LENGTH: usize = 60;

const POLISH_TO_ASCII: [(char, char); 18] = [
    ('ą', 'a'),
    ('ć', 'c'),
    ('ę', 'e'),
    ('ł', 'l'),
    ('ń', 'n'),
    ('ó', 'o'),
    ('ś', 's'),
    ('ż', 'z'),
    ('ź', 'z'),
    ('Ą', 'A'),
    ('Ć', 'C'),
    ('Ę', 'E'),
    ('Ł', 'L'),
    ('Ń', 'N'),
    ('Ó', 'O'),
    ('Ś', 'S'),
    ('Ż', 'Z'),
    ('Ź', 'Z'),
];

/// Replace Polish diacritics with their Latin base letters
pub fn replace_polish_chars(text: &str) -> String {
    text.chars()
        .map(|c| {
            POLISH_TO_ASCII
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// Derive a store-safe collection name from a document's file stem.
///
/// The result contains only `[A-Za-z0-9_-]`, starts and ends with an
/// alphanumeric character and is at most `max_len` characters long.
pub fn generate_collection_name(file_stem: &str, max_len: usize) -> Result<String> {
    let invalid = Regex::new(r"[^A-Za-z0-9_-]+").map_err(|e| RegdocError::InvalidCollectionName {
        name: file_stem.to_string(),
        reason: format!("name pattern failed to compile: {}", e),
    })?;

    let ascii = replace_polish_chars(file_stem);
    let replaced = invalid.replace_all(&ascii, "_");

    // Only ASCII remains, so byte slicing is safe
    let mut name = trim_to_alphanumeric(&replaced);
    if name.len() > max_len {
        name = trim_to_alphanumeric(&name[..max_len]);
    }

    if name.len() < MIN_NAME_LENGTH {
        return Err(RegdocError::InvalidCollectionName {
            name: file_stem.to_string(),
            reason: format!(
                "derived name '{}' is shorter than {} characters",
                name, MIN_NAME_LENGTH
            ),
        });
    }

    tracing::debug!("Collection name for '{}': {}", file_stem, name);
    Ok(name)
}

/// Collection name for a document path
pub fn collection_name_for(path: &Path, max_len: usize) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RegdocError::InvalidCollectionName {
            name: path.display().to_string(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;

    generate_collection_name(stem, max_len)
}

/// Human-readable title for a document: file stem with underscores as spaces
pub fn extract_title(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    stem.replace('_', " ")
}

fn trim_to_alphanumeric(name: &str) -> String {
    name.trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_polish_chars() {
        assert_eq!(replace_polish_chars("Zażółć gęślą jaźń."), "Zazolc gesla jazn.");
        assert_eq!(replace_polish_chars("ŁÓDŹ"), "LODZ");
    }

    #[test]
    fn test_generate_collection_name() {
        assert_eq!(
            generate_collection_name("Rekomendacja P - zarządzanie ryzykiem", 60).unwrap(),
            "Rekomendacja_P_-_zarzadzanie_ryzykiem"
        );
        assert_eq!(
            generate_collection_name("  (2023) Uchwała nr 5  ", 60).unwrap(),
            "2023_Uchwala_nr_5"
        );
    }

    #[test]
    fn test_truncation_keeps_alphanumeric_end() {
        let name = generate_collection_name("abcdefghi jkl", 10).unwrap();
        assert_eq!(name, "abcdefghi");
        assert!(name.len() <= 10);
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            generate_collection_name("a.", 60),
            Err(RegdocError::InvalidCollectionName { .. })
        ));
        assert!(generate_collection_name("???", 60).is_err());
    }

    #[test]
    fn test_collection_name_for_path() {
        let name = collection_name_for(Path::new("/docs/Rekomendacja_Ł.pdf"), 60).unwrap();
        assert_eq!(name, "Rekomendacja_L");
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title("Rekomendacja_P_2023.pdf"), "Rekomendacja P 2023");
        assert_eq!(extract_title("plain"), "plain");
    }
}
