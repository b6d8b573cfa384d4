/// Keep the first `k` ranked items whose score is at least `threshold`.
///
/// Input order is preserved; an item below the threshold is dropped even
/// when it sits inside the first `k`.
pub fn autocut<T>(ranked: Vec<(T, f32)>, k: usize, threshold: f32) -> Vec<T> {
    ranked
        .into_iter()
        .take(k)
        .filter(|(_, score)| *score >= threshold)
        .map(|(item, _)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_at_threshold() {
        let ranked = vec![("a", 0.91), ("b", 0.75), ("c", 0.40)];
        assert_eq!(autocut(ranked, 3, 0.75), vec!["a", "b"]);
    }

    #[test]
    fn test_capped_at_k() {
        let ranked = vec![("a", 0.99), ("b", 0.98), ("c", 0.97)];
        assert_eq!(autocut(ranked, 2, 0.5), vec!["a", "b"]);
    }

    #[test]
    fn test_k_applies_before_threshold() {
        // "c" clears the threshold but is outside the first k
        let ranked = vec![("a", 0.9), ("b", 0.1), ("c", 0.8)];
        assert_eq!(autocut(ranked, 2, 0.5), vec!["a"]);
    }

    #[test]
    fn test_empty() {
        let ranked: Vec<(&str, f32)> = Vec::new();
        assert!(autocut(ranked, 5, 0.75).is_empty());
    }

    #[test]
    fn test_nothing_clears_threshold() {
        let ranked = vec![("a", 0.74), ("b", 0.2)];
        assert!(autocut(ranked, 5, 0.75).is_empty());
    }
}
