//! Translation of whole-text snapshots into edit operations.
//!
//! Texts are compared as sequences of Unicode scalar values (`char`), the same
//! unit [`Document`] positions use, so multi-byte characters are never split.

use crate::crdt::{CrdtError, Document, Update};

/// One span of a text diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Equal(String),
    Insert(String),
    Delete(String),
}

impl DiffOp {
    /// Length of the span in characters.
    pub fn char_len(&self) -> usize {
        match self {
            DiffOp::Equal(s) | DiffOp::Insert(s) | DiffOp::Delete(s) => s.chars().count(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Equal,
    Insert,
    Delete,
}

/// Computes an edit script turning `previous` into `new`.
///
/// The script is minimal unless the texts differ almost everywhere, in which
/// case the search is cut off after [`MAX_COST`] rounds and the unmatched
/// stretch is replaced wholesale. Memory stays linear in the text length.
///
/// Returns no ops when the texts are identical.
pub fn compute_ops(previous: &str, new: &str) -> Vec<DiffOp> {
    if previous == new {
        return Vec::new();
    }

    let a: Vec<char> = previous.chars().collect();
    let b: Vec<char> = new.chars().collect();

    let mut script: Vec<(Kind, char)> = Vec::with_capacity(a.len().max(b.len()));
    diff_into(&a, &b, &mut script);
    group(script)
}

/// Applies the diff between the document's visible text and `new_text`.
///
/// Returns the combined update, or `None` when the text is unchanged.
pub fn apply_text_diff(doc: &mut Document, new_text: &str) -> Result<Option<Update>, CrdtError> {
    let current = doc.text();
    if current == new_text {
        return Ok(None);
    }

    let mut update = Update::default();
    let mut cursor = 0;
    for op in compute_ops(&current, new_text) {
        let len = op.char_len();
        match op {
            DiffOp::Equal(_) => cursor += len,
            DiffOp::Insert(text) => {
                update.merge(doc.local_insert(cursor, &text)?);
                cursor += len;
            }
            DiffOp::Delete(_) => update.merge(doc.local_delete(cursor, len)?),
        }
    }

    Ok(Some(update))
}

/// Rounds of the middle-snake search before a stretch is given up on.
pub const MAX_COST: usize = 1024;

/// Linear-space Myers: trim, split where the two searches meet, recurse.
fn diff_into(a: &[char], b: &[char], script: &mut Vec<(Kind, char)>) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    script.extend(a[..prefix].iter().map(|&c| (Kind::Equal, c)));

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    if a_mid.is_empty() {
        script.extend(b_mid.iter().map(|&c| (Kind::Insert, c)));
    } else if b_mid.is_empty() {
        script.extend(a_mid.iter().map(|&c| (Kind::Delete, c)));
    } else {
        match split_point(a_mid, b_mid) {
            Some((x, y)) => {
                diff_into(&a_mid[..x], &b_mid[..y], script);
                diff_into(&a_mid[x..], &b_mid[y..], script);
            }
            None => {
                script.extend(a_mid.iter().map(|&c| (Kind::Delete, c)));
                script.extend(b_mid.iter().map(|&c| (Kind::Insert, c)));
            }
        }
    }

    script.extend(a[a.len() - suffix..].iter().map(|&c| (Kind::Equal, c)));
}

/// Searches from both ends at once and returns where an optimal path crosses
/// the point the two searches meet.
///
/// Expects `a` and `b` to be non-empty. Returns `None` if the searches have
/// not met after [`MAX_COST`] rounds, or the meeting point would not split
/// the problem.
fn split_point(a: &[char], b: &[char]) -> Option<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let delta = n - m;
    let front = delta % 2 != 0;
    let limit = ((n + m + 1) / 2).min(MAX_COST as isize);

    // Furthest x reached per diagonal k = x - y, indexed by k + limit, or -1.
    // The reverse search counts characters consumed from the end of each text.
    let len = (2 * limit + 2) as usize;
    let mut forward = vec![-1isize; len];
    let mut reverse = vec![-1isize; len];
    let at = |k: isize| (k + limit) as usize;
    forward[at(1)] = 0;
    reverse[at(1)] = 0;

    // Diagonals that ran off the right or bottom edge are skipped from then on.
    let (mut f_start, mut f_end, mut r_start, mut r_end) = (0, 0, 0, 0);

    let split = |x: isize, y: isize| {
        let inside = (0..=n).contains(&x) && (0..=m).contains(&y);
        let inner = (x, y) != (0, 0) && (x, y) != (n, m);
        (inside && inner).then_some((x as usize, y as usize))
    };

    for d in 0..limit {
        let mut k = -d + f_start;
        while k <= d - f_end {
            let mut x = if k == -d || (k != d && forward[at(k - 1)] < forward[at(k + 1)]) {
                forward[at(k + 1)]
            } else {
                forward[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            forward[at(k)] = x;

            if x > n {
                f_end += 2;
            } else if y > m {
                f_start += 2;
            } else if front {
                let kr = delta - k;
                if kr.abs() <= limit && reverse[at(kr)] != -1 && x >= n - reverse[at(kr)] {
                    return split(x, y);
                }
            }
            k += 2;
        }

        let mut kr = -d + r_start;
        while kr <= d - r_end {
            let mut x = if kr == -d || (kr != d && reverse[at(kr - 1)] < reverse[at(kr + 1)]) {
                reverse[at(kr + 1)]
            } else {
                reverse[at(kr - 1)] + 1
            };
            let mut y = x - kr;
            while x < n && y < m && a[(n - 1 - x) as usize] == b[(m - 1 - y) as usize] {
                x += 1;
                y += 1;
            }
            reverse[at(kr)] = x;

            if x > n {
                r_end += 2;
            } else if y > m {
                r_start += 2;
            } else if !front {
                let k = delta - kr;
                if k.abs() <= limit && forward[at(k)] != -1 && forward[at(k)] >= n - x {
                    let fx = forward[at(k)];
                    return split(fx, fx - k);
                }
            }
            kr += 2;
        }
    }

    None
}

fn group(script: Vec<(Kind, char)>) -> Vec<DiffOp> {
    let mut ops: Vec<DiffOp> = Vec::new();
    let mut current: Option<(Kind, String)> = None;

    for (kind, ch) in script {
        match current.as_mut() {
            Some((k, text)) if *k == kind => text.push(ch),
            _ => {
                if let Some(done) = current.take() {
                    ops.push(into_op(done));
                }
                current = Some((kind, ch.to_string()));
            }
        }
    }
    if let Some(done) = current {
        ops.push(into_op(done));
    }

    ops
}

fn into_op((kind, text): (Kind, String)) -> DiffOp {
    match kind {
        Kind::Equal => DiffOp::Equal(text),
        Kind::Insert => DiffOp::Insert(text),
        Kind::Delete => DiffOp::Delete(text),
    }
}
