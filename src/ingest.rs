//! Loading extracted document pages and filling collections

use crate::error::{RegdocError, Result};
use crate::retrieval::{PageNumber, Passage};
use crate::store::SqliteStore;
use serde::Deserialize;
use std::path::Path;

/// Characters PDF text extraction leaves behind that carry no meaning
const EXTRACTION_NOISE: [&str; 4] = ["~", "Â©", "_", "\n"];

/// Page separator in plain-text extracts
const FORM_FEED: char = '\u{000C}';

#[derive(Debug, Deserialize)]
struct PageRecord {
    text: String,
    #[serde(default)]
    page_number: Option<PageNumber>,
}

/// Strip extraction noise from a page of text
pub fn clean_extracted_text(text: &str) -> String {
    EXTRACTION_NOISE
        .iter()
        .fold(text.to_string(), |acc, noise| acc.replace(noise, ""))
}

/// Read a document's pages as passages.
///
/// A `.json` file must hold an array of `{ "text", "page_number"? }`
/// objects; anything else is read as text with pages separated by form
/// feeds. Pages without a number get their 1-based position. Pages that
/// are empty after cleanup are dropped.
pub fn load_pages(path: &Path) -> Result<Vec<Passage>> {
    let content = std::fs::read_to_string(path).map_err(|e| RegdocError::Io {
        source: e,
        context: format!("Failed to read pages from {:?}", path),
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let records = if is_json {
        serde_json::from_str::<Vec<PageRecord>>(&content).map_err(|e| RegdocError::Json {
            source: e,
            context: format!("Failed to parse page file {:?}", path),
        })?
    } else {
        content
            .split(FORM_FEED)
            .map(|page| PageRecord {
                text: page.to_string(),
                page_number: None,
            })
            .collect()
    };

    let passages = pages_to_passages(records);
    if passages.is_empty() {
        return Err(RegdocError::Ingest(format!(
            "No text found in {}",
            path.display()
        )));
    }

    tracing::debug!("Loaded {} pages from {}", passages.len(), path.display());
    Ok(passages)
}

fn pages_to_passages(records: Vec<PageRecord>) -> Vec<Passage> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let text = clean_extracted_text(&record.text);
            if text.trim().is_empty() {
                tracing::debug!("Skipping empty page {}", index + 1);
                return None;
            }

            let page_number = record
                .page_number
                .unwrap_or_else(|| PageNumber::from(index + 1));
            Some(Passage::new(text, page_number))
        })
        .collect()
}

/// What happened to a document during indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Created { collection: String, passages: usize },
    Replaced { collection: String, passages: usize },
    Skipped { collection: String },
}

/// Index a page file into `collection`.
///
/// An existing collection is left untouched unless `replace` is set.
pub fn index_document(
    store: &SqliteStore,
    path: &Path,
    collection: &str,
    replace: bool,
) -> Result<IndexOutcome> {
    let exists = store.collection_exists(collection)?;
    if exists && !replace {
        tracing::info!(
            "Collection {} already exists. Skipping processing of {}.",
            collection,
            path.display()
        );
        return Ok(IndexOutcome::Skipped {
            collection: collection.to_string(),
        });
    }

    // Read before touching the store so a bad file never drops a collection
    let passages = load_pages(path)?;

    if exists {
        store.delete_collection(collection)?;
    }
    let target = store.create_collection(collection)?;
    let added = target.add_passages(&passages)?;
    tracing::info!("{} was indexed into {} ({} passages)", path.display(), collection, added);

    let collection = collection.to_string();
    Ok(if exists {
        IndexOutcome::Replaced {
            collection,
            passages: added,
        }
    } else {
        IndexOutcome::Created {
            collection,
            passages: added,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_clean_extracted_text() {
        assert_eq!(
            clean_extracted_text("Rekomendacja~ P\nÂ© KNF_2023"),
            "Rekomendacja P KNF2023"
        );
    }

    #[test]
    fn test_load_text_pages() {
        let file = file_with(".txt", "First page\u{000C}\u{000C}Third page");
        let passages = load_pages(file.path()).unwrap();

        assert_eq!(
            passages,
            vec![
                Passage::new("First page", 1),
                Passage::new("Third page", 3),
            ]
        );
    }

    #[test]
    fn test_load_json_pages() {
        let file = file_with(
            ".json",
            r#"[
                {"text": "Cover", "page_number": "i"},
                {"text": "Scope", "page_number": 4},
                {"text": "Annex"}
            ]"#,
        );
        let passages = load_pages(file.path()).unwrap();

        assert_eq!(passages[0].page_number, PageNumber::Label("i".to_string()));
        assert_eq!(passages[1].page_number, PageNumber::Number(4));
        assert_eq!(passages[2].page_number, PageNumber::Number(3));
    }

    #[test]
    fn test_malformed_json() {
        let file = file_with(".json", r#"{"text": "not an array"}"#);
        assert!(matches!(
            load_pages(file.path()),
            Err(RegdocError::Json { .. })
        ));
    }

    #[test]
    fn test_empty_document() {
        let file = file_with(".txt", "\n\u{000C}  ");
        assert!(matches!(load_pages(file.path()), Err(RegdocError::Ingest(_))));
    }

    #[test]
    fn test_index_skip_and_replace() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = file_with(".txt", "one\u{000C}two");
        let second = file_with(".txt", "three");

        assert_eq!(
            index_document(&store, first.path(), "doc", false).unwrap(),
            IndexOutcome::Created {
                collection: "doc".to_string(),
                passages: 2
            }
        );
        assert_eq!(
            index_document(&store, second.path(), "doc", false).unwrap(),
            IndexOutcome::Skipped {
                collection: "doc".to_string()
            }
        );
        assert_eq!(
            index_document(&store, second.path(), "doc", true).unwrap(),
            IndexOutcome::Replaced {
                collection: "doc".to_string(),
                passages: 1
            }
        );
    }
}
