//! Natural-order string comparison (§4.6): lockstep scan, full maximal
//! digit runs compared numerically at the first digit either side hits.
//!
//! The source's asymmetric-exhaustion handling is replaced here with an
//! explicit total order, per the §9 design note: whenever the lockstep scan
//! reaches a position where one side holds a digit and the other does not
//! (and neither string has ended), the digit side sorts first — digits are
//! defined to sort before any other character class. Where one string ends
//! before the other, the shorter, exhausted string sorts first. This keeps
//! the comparator a strict weak order for every pair of inputs.

use std::cmp::Ordering;

fn fold(c: char, ignore_case: bool) -> char {
    if ignore_case {
        c.to_ascii_uppercase()
    } else {
        c
    }
}

/// Returns the end index (exclusive) of the maximal run of ASCII digits
/// starting at `start`. `start` must index a digit.
fn digit_run_end(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    end
}

/// Compares two digit runs numerically without risking integer overflow:
/// strip leading zeros, then compare by length, then lexicographically.
fn compare_digit_runs(a: &[char], b: &[char]) -> Ordering {
    let a_trimmed = a.iter().position(|&c| c != '0').map(|p| &a[p..]).unwrap_or(&a[a.len()..]);
    let b_trimmed = b.iter().position(|&c| c != '0').map(|p| &b[p..]).unwrap_or(&b[b.len()..]);
    match a_trimmed.len().cmp(&b_trimmed.len()) {
        Ordering::Equal => a_trimmed.cmp(b_trimmed),
        other => other,
    }
}

pub fn natural_compare(a: &str, b: &str, ignore_case: bool) -> Ordering {
    let a: Vec<char> = a.chars().map(|c| fold(c, ignore_case)).collect();
    let b: Vec<char> = b.chars().map(|c| fold(c, ignore_case)).collect();

    let (mut i, mut j) = (0usize, 0usize);
    loop {
        match (a.get(i), b.get(j)) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&ca), Some(&cb)) => {
                let a_digit = ca.is_ascii_digit();
                let b_digit = cb.is_ascii_digit();
                if a_digit || b_digit {
                    match (a_digit, b_digit) {
                        (true, true) => {
                            let ai = digit_run_end(&a, i);
                            let bj = digit_run_end(&b, j);
                            match compare_digit_runs(&a[i..ai], &b[j..bj]) {
                                Ordering::Equal => {
                                    i = ai;
                                    j = bj;
                                    continue;
                                }
                                other => return other,
                            }
                        }
                        (true, false) => return Ordering::Less,
                        (false, true) => return Ordering::Greater,
                        (false, false) => unreachable!(),
                    }
                }
                if ca != cb {
                    return ca.cmp(&cb);
                }
                i += 1;
                j += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_numerically_not_lexically() {
        let mut names = vec!["file10.mp3", "file2.mp3", "file1.mp3"];
        names.sort_by(|a, b| natural_compare(a, b, false));
        assert_eq!(names, vec!["file1.mp3", "file2.mp3", "file10.mp3"]);
    }

    #[test]
    fn ignore_case_folds_letters() {
        let mut names = vec!["file10.mp3", "file2.mp3", "File1.mp3"];
        names.sort_by(|a, b| natural_compare(a, b, true));
        assert_eq!(names, vec!["File1.mp3", "file2.mp3", "file10.mp3"]);
    }

    #[test]
    fn leading_zeros_do_not_change_magnitude() {
        assert_eq!(natural_compare("file007.txt", "file7.txt", false), Ordering::Equal);
    }

    #[test]
    fn shorter_exhausted_string_is_less() {
        assert_eq!(natural_compare("abc", "abcd", false), Ordering::Less);
    }

    #[test]
    fn digit_sorts_before_non_digit_at_tie_point() {
        assert_eq!(natural_compare("file1", "fileA", false), Ordering::Less);
    }

    #[test]
    fn strict_weak_order_is_transitive_for_a_sample() {
        let items = ["a1", "a10", "a2", "aA", "a"];
        for x in &items {
            for y in &items {
                for z in &items {
                    let xy = natural_compare(x, y, false);
                    let yz = natural_compare(y, z, false);
                    let xz = natural_compare(x, z, false);
                    if xy == Ordering::Less && yz == Ordering::Less {
                        assert_eq!(xz, Ordering::Less, "{x} < {y} < {z} but not {x} < {z}");
                    }
                }
            }
        }
    }
}
