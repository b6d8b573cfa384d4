//! Result deduplication by passage text

use crate::retrieval::Candidate;
use ahash::AHashSet;

/// Drop candidates whose text was already seen, keeping the first
/// occurrence regardless of score
pub fn deduplicate_by_text(candidates: impl IntoIterator<Item = Candidate>) -> Vec<Candidate> {
    let mut seen: AHashSet<String> = AHashSet::new();

    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.passage.text.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{Passage, Source};

    #[test]
    fn test_deduplication() {
        let candidates = vec![
            Candidate::new(Passage::new("text1", 1), Source::Lexical),
            Candidate::new(Passage::new("text2", 2), Source::Lexical),
            Candidate::new(Passage::new("text1", 9), Source::Semantic),
        ];

        let deduped = deduplicate_by_text(candidates);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].source, Source::Lexical);
        assert_eq!(deduped[0].passage, Passage::new("text1", 1));
    }

    #[test]
    fn test_exact_match_only() {
        let candidates = vec![
            Candidate::new(Passage::new("Capital buffers", 1), Source::Lexical),
            Candidate::new(Passage::new("capital buffers", 1), Source::Semantic),
            Candidate::new(Passage::new("Capital buffers ", 1), Source::Semantic),
        ];

        assert_eq!(deduplicate_by_text(candidates).len(), 3);
    }
}
