//! Fixed-size overlapping word windows.

/// Split `text` into overlapping windows of whitespace-separated words.
///
/// Window size is `max(2, target_words)` and consecutive windows start
/// `max(1, floor(target_words * (1 - overlap_ratio)))` words apart. The last
/// window may be shorter. Words are re-joined with single spaces.
///
/// Unlike the plain sliding rule, a segment of at most `size` words is
/// returned as one window. A segment of exactly `target_words` words
/// therefore does not get a second, tail-only window.
pub fn overlap_windows(text: &str, target_words: usize, overlap_ratio: f32) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let size = target_words.max(2);
    let step = window_step(target_words, overlap_ratio);

    // A segment that fits in one window is not re-windowed.
    if words.len() <= size {
        return vec![words.join(" ")];
    }

    let mut windows = Vec::with_capacity(words.len() / step + 1);
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        windows.push(words[start..end].join(" "));
        start += step;
    }
    windows
}

pub(crate) fn window_step(target_words: usize, overlap_ratio: f32) -> usize {
    // Tolerance keeps 300 * (1 - 0.2) at 240 despite f32 rounding.
    let step = (target_words as f32 * (1.0 - overlap_ratio) + 1e-4).floor();
    (step as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cat_and_dog() {
        let windows = overlap_windows("The cat sat. The dog ran.", 3, 0.2);
        assert_eq!(windows, vec!["The cat sat.", "sat. The dog", "dog ran."]);
    }

    #[test]
    fn test_empty_segment_yields_nothing() {
        assert!(overlap_windows("", 300, 0.2).is_empty());
        assert!(overlap_windows(" \n\t ", 300, 0.2).is_empty());
    }

    #[test]
    fn test_short_segment_is_one_chunk() {
        let text = "only a handful of words here";
        assert_eq!(overlap_windows(text, 300, 0.2), vec![text]);
        // Holds even when the step is tiny.
        assert_eq!(overlap_windows(text, 10, 0.9), vec![text]);
    }

    #[test]
    fn test_segment_of_exactly_target_words_is_one_window() {
        let text = "one two three four five";
        assert_eq!(overlap_windows(text, 5, 0.2), vec![text]);
        // One word more slides: starts 0 and 4.
        assert_eq!(
            overlap_windows("one two three four five six", 5, 0.2),
            vec!["one two three four five", "five six"]
        );
    }

    #[test]
    fn test_whitespace_is_normalized() {
        assert_eq!(
            overlap_windows("a\n\nb\t c", 300, 0.2),
            vec!["a b c".to_string()]
        );
    }

    #[test]
    fn test_windows_cover_every_word_with_overlap() {
        let words: Vec<String> = (0..1000).map(|i| format!("w{}", i)).collect();
        let text = words.join(" ");
        let target = 300;
        let ratio = 0.2;
        let size = target;
        let step = window_step(target, ratio);
        assert_eq!(step, 240);

        let windows = overlap_windows(&text, target, ratio);
        let split: Vec<Vec<&str>> = windows.iter().map(|w| w.split(' ').collect()).collect();

        // Every word appears in some window.
        let mut seen = std::collections::HashSet::new();
        for w in split.iter().flatten() {
            seen.insert(*w);
        }
        assert_eq!(seen.len(), words.len());

        // Consecutive full windows overlap by size - step words.
        for pair in split.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.len() == size {
                let overlap = size - step;
                assert_eq!(&a[size - overlap..], &b[..overlap.min(b.len())]);
            }
        }
        assert_eq!(windows.len(), 5);
    }

    #[test]
    fn test_degenerate_parameters() {
        // target 1 still produces two-word windows advancing by one.
        let windows = overlap_windows("a b c", 1, 0.2);
        assert_eq!(windows, vec!["a b", "b c", "c"]);
    }
}
