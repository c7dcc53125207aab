//! Scanner that splits host-authored strings into plain and math segments.
//!
//! A maximal run of `k` unescaped `$` characters opens a math segment of
//! depth `k`. While a math segment is open, the next unescaped run closes it
//! and the segment id is the larger of the opening and closing run lengths
//! (so `$...$$` reads as display math). `\$` keeps the dollar literal; the
//! escape sequence stays in the segment text verbatim. Concatenating the
//! returned segments in order always reconstructs the input.

const DELIMITER: char = '$';

/// Splits `input` into parallel `(ids, segments)` sequences. Id 0 marks plain
/// text; id `N >= 1` marks a math segment of depth `N`. An unterminated math
/// segment runs to the end of input and keeps its opening depth.
pub fn tokenize(input: &str) -> (Vec<u32>, Vec<String>) {
    let mut ids = Vec::new();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth: u32 = 0;

    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() && chars[i + 1] == DELIMITER {
            current.push('\\');
            current.push(DELIMITER);
            i += 2;
            continue;
        }
        if chars[i] == DELIMITER {
            let mut run = 0u32;
            while i < chars.len() && chars[i] == DELIMITER {
                run += 1;
                i += 1;
            }
            if depth == 0 {
                if !current.is_empty() {
                    ids.push(0);
                    segments.push(std::mem::take(&mut current));
                }
                for _ in 0..run {
                    current.push(DELIMITER);
                }
                depth = run;
            } else {
                for _ in 0..run {
                    current.push(DELIMITER);
                }
                ids.push(depth.max(run));
                segments.push(std::mem::take(&mut current));
                depth = 0;
            }
            continue;
        }
        current.push(chars[i]);
        i += 1;
    }

    if !current.is_empty() {
        ids.push(depth);
        segments.push(current);
    }
    (ids, segments)
}

/// True when any segment of `input` is math. Used to decide whether a string
/// argument may be quoted or must be forwarded verbatim to the runtime.
pub fn contains_math(input: &str) -> bool {
    tokenize(input).0.iter().any(|&id| id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_input_yields_no_segments() {
        assert_eq!(tokenize(""), (vec![], vec![]));
    }

    #[test]
    fn plain_text_is_one_segment() {
        assert_eq!(tokenize("a"), (vec![0], owned(&["a"])));
    }

    #[test]
    fn inline_math() {
        assert_eq!(tokenize("$a$"), (vec![1], owned(&["$a$"])));
    }

    #[test]
    fn unterminated_display_math_keeps_opening_depth() {
        assert_eq!(tokenize("$$a$"), (vec![2], owned(&["$$a$"])));
    }

    #[test]
    fn math_between_plain_segments() {
        assert_eq!(tokenize("x$a$y"), (vec![0, 1, 0], owned(&["x", "$a$", "y"])));
    }

    #[test]
    fn escapes_stay_literal_and_longer_close_wins() {
        assert_eq!(
            tokenize("x\\$0$a\\$1b$$\\$y"),
            (vec![0, 2, 0], owned(&["x\\$0", "$a\\$1b$$", "\\$y"]))
        );
    }

    #[test]
    fn lone_escaped_run_is_plain() {
        assert_eq!(tokenize("\\$\\$"), (vec![0], owned(&["\\$\\$"])));
    }

    #[test]
    fn segments_concatenate_back_to_input() {
        for input in [
            "",
            "a",
            "$a$",
            "$$a$",
            "x$a$y",
            "x\\$0$a\\$1b$$\\$y",
            "$$never closed",
            "trailing backslash\\",
            "$a$$b$c$d$",
        ] {
            let (ids, segments) = tokenize(input);
            assert_eq!(ids.len(), segments.len());
            assert_eq!(segments.concat(), input, "round trip for {input:?}");
        }
    }

    #[test]
    fn contains_math_distinguishes_plain_strings() {
        assert!(!contains_math("plain \\$5 price"));
        assert!(contains_math("area: $x^2$"));
    }
}
