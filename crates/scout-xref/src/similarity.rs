//! Dice coefficient over character bigrams.

use std::collections::HashSet;

/// Similarity of two strings in `[0, 1]`.
///
/// Both strings are trimmed and lowercased. An empty string scores 0 against
/// anything, itself included. Equal strings score 1; otherwise the score is
/// `2·|A∩B| / (|A|+|B|)` over the sets of adjacent character pairs, so a
/// single character scores 0 against anything but itself.
#[must_use]
pub fn dice(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let left = bigrams(&a);
    let right = bigrams(&b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count();
    #[allow(clippy::cast_precision_loss)]
    let score = (2 * shared) as f64 / (left.len() + right.len()) as f64;
    score
}

fn bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}
