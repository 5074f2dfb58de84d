//! Three-way textual merge (§4.7 "Update"): diff each side against the
//! pivot (common ancestor), then walk both edit scripts in lockstep over
//! pivot coordinates, emitting conflict markers where they disagree.

const CONFLICT_BEGIN: &str = "<<<<<<< BEGIN MERGE CONFLICT";
const CONFLICT_PIVOT: &str = "||||||| COMMON ANCESTOR";
const CONFLICT_SEP: &str = "=======";
const CONFLICT_END: &str = ">>>>>>> END MERGE CONFLICT";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Hunk {
    p_start: usize,
    p_end: usize,
    replacement: Vec<String>,
}

fn lcs_matrix(a: &[String], b: &[String]) -> Vec<Vec<u32>> {
    let n = a.len();
    let m = b.len();
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }
    dp
}

/// Edit script turning `pivot` into `other`, expressed as the spans of
/// `pivot` that were deleted or replaced (insertions are zero-width
/// spans). Equal runs between hunks are implicit.
fn diff_hunks(pivot: &[String], other: &[String]) -> Vec<Hunk> {
    let dp = lcs_matrix(pivot, other);
    let mut hunks = Vec::new();
    let mut i = 0;
    let mut j = 0;
    let mut pending_start: Option<usize> = None;
    let mut pending_other: Vec<String> = Vec::new();

    while i < pivot.len() && j < other.len() {
        if pivot[i] == other[j] {
            if let Some(ps) = pending_start.take() {
                hunks.push(Hunk { p_start: ps, p_end: i, replacement: std::mem::take(&mut pending_other) });
            }
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            pending_start.get_or_insert(i);
            i += 1;
        } else {
            pending_start.get_or_insert(i);
            pending_other.push(other[j].clone());
            j += 1;
        }
    }
    if i < pivot.len() || j < other.len() {
        pending_start.get_or_insert(i);
        while j < other.len() {
            pending_other.push(other[j].clone());
            j += 1;
        }
        i = pivot.len();
    }
    if let Some(ps) = pending_start.take() {
        hunks.push(Hunk { p_start: ps, p_end: i, replacement: pending_other });
    }
    hunks
}

pub struct MergeOutcome {
    pub lines: Vec<String>,
    pub conflict: bool,
}

/// Merge `a` and `b`, both derived from `pivot`, into one line sequence.
/// Non-overlapping edits from either side are applied; overlapping edits
/// that disagree are wrapped in conflict markers with all three versions.
pub fn merge3(pivot: &[String], a: &[String], b: &[String]) -> MergeOutcome {
    let a_hunks = diff_hunks(pivot, a);
    let b_hunks = diff_hunks(pivot, b);

    let mut out = Vec::new();
    let mut conflict = false;
    let mut i = 0;
    let mut ai = 0;
    let mut bi = 0;

    while i < pivot.len() {
        let a_hunk = a_hunks.get(ai).filter(|h| h.p_start == i);
        let b_hunk = b_hunks.get(bi).filter(|h| h.p_start == i);

        match (a_hunk, b_hunk) {
            (None, None) => {
                out.push(pivot[i].clone());
                i += 1;
            }
            (Some(ha), None) => {
                out.extend(ha.replacement.clone());
                i = ha.p_end;
                ai += 1;
            }
            (None, Some(hb)) => {
                out.extend(hb.replacement.clone());
                i = hb.p_end;
                bi += 1;
            }
            (Some(ha), Some(hb)) => {
                if ha.p_end == hb.p_end && ha.replacement == hb.replacement {
                    out.extend(ha.replacement.clone());
                } else {
                    conflict = true;
                    let p_end = ha.p_end.max(hb.p_end);
                    out.push(CONFLICT_BEGIN.to_string());
                    out.extend(ha.replacement.clone());
                    out.push(CONFLICT_PIVOT.to_string());
                    out.extend(pivot[ha.p_start.min(hb.p_start)..p_end].iter().cloned());
                    out.push(CONFLICT_SEP.to_string());
                    out.extend(hb.replacement.clone());
                    out.push(CONFLICT_END.to_string());
                    i = p_end;
                }
                ai += 1;
                bi += 1;
            }
        }
    }

    // trailing insert-only hunks past the end of pivot (both sides may
    // have appended lines at EOF)
    while ai < a_hunks.len() {
        out.extend(a_hunks[ai].replacement.clone());
        ai += 1;
    }
    while bi < b_hunks.len() {
        out.extend(b_hunks[bi].replacement.clone());
        bi += 1;
    }

    MergeOutcome { lines: out, conflict }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(String::from).collect()
    }

    #[test]
    fn non_overlapping_edits_merge_cleanly() {
        let pivot = lines("1\n2\n3\n");
        let a = lines("1a\n2\n3\n");
        let b = lines("1\n2\n3b\n");
        let out = merge3(&pivot, &a, &b);
        assert!(!out.conflict);
        assert_eq!(out.lines, vec!["1a", "2", "3b"]);
    }

    #[test]
    fn same_change_on_both_sides_is_not_a_conflict() {
        let pivot = lines("1\n2\n3\n");
        let a = lines("1\n2x\n3\n");
        let b = lines("1\n2x\n3\n");
        let out = merge3(&pivot, &a, &b);
        assert!(!out.conflict);
        assert_eq!(out.lines, vec!["1", "2x", "3"]);
    }

    #[test]
    fn conflicting_edit_to_the_same_line_emits_markers() {
        let pivot = lines("1\n2\n3\n");
        let a = lines("1\n2A\n3\n");
        let b = lines("1\n2B\n3\n");
        let out = merge3(&pivot, &a, &b);
        assert!(out.conflict);
        assert!(out.lines.contains(&CONFLICT_BEGIN.to_string()));
        assert!(out.lines.contains(&"2A".to_string()));
        assert!(out.lines.contains(&"2B".to_string()));
    }
}
