//! # Stack Reconciler
//!
//! Computes the minimal insert/remove edit script between two ordered
//! sequences, using Myers' shortest-edit-script algorithm.
//!
//! - Cost is the number of insertions plus removals; there is no move
//! - Elements are compared with a caller-supplied equality
//! - Runs in O((N+M)·D) time, D being the edit distance
//! - Pure: neither input is mutated
//!
//! ## Tie-breaking
//!
//! Among minimal scripts the reconciler always returns the same one:
//! common elements are paired as early as possible in both sequences, and
//! where both a removal and an insertion happen at one position, the
//! removal comes first.
//!
//! ## Index Semantics
//!
//! Edit indices refer to the working sequence at the moment the edit is
//! applied, edits being applied in order. `EditScript::apply` replays them.

use crate::types::NavigationError;
use serde::Serialize;
use tracing::trace;

// =============================================================================
// EDIT SCRIPT
// =============================================================================

/// One edit of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit<T> {
    /// Remove the element at `index`; `item` is the removed element.
    Remove {
        /// Position in the working sequence.
        index: usize,
        /// The element being removed (from the previous sequence).
        item: T,
    },
    /// Insert `item` at `index`.
    Insert {
        /// Position in the working sequence.
        index: usize,
        /// The element being inserted (from the next sequence).
        item: T,
    },
}

impl<T> Edit<T> {
    /// The element this edit touches.
    #[must_use]
    pub fn item(&self) -> &T {
        match self {
            Self::Remove { item, .. } | Self::Insert { item, .. } => item,
        }
    }

    /// The working-sequence index of this edit.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Remove { index, .. } | Self::Insert { index, .. } => *index,
        }
    }
}

/// A pair of positions holding equal elements that the script keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Kept {
    /// Index in the previous sequence.
    pub previous: usize,
    /// Index in the next sequence.
    pub next: usize,
}

/// Ordered edits transforming a previous sequence into a next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditScript<T> {
    edits: Vec<Edit<T>>,
    kept: Vec<Kept>,
}

impl<T> EditScript<T> {
    /// Rebuild a script from edits whose items were substituted after diffing.
    pub(crate) fn from_parts(edits: Vec<Edit<T>>, kept: Vec<Kept>) -> Self {
        Self { edits, kept }
    }

    /// The edits, in application order.
    #[must_use]
    pub fn edits(&self) -> &[Edit<T>] {
        &self.edits
    }

    /// Matched pairs the script leaves untouched, in order.
    #[must_use]
    pub fn kept(&self) -> &[Kept] {
        &self.kept
    }

    /// Number of edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// True for the no-op script.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Removed elements, in previous-sequence order.
    pub fn removals(&self) -> impl Iterator<Item = &T> {
        self.edits.iter().filter_map(|edit| match edit {
            Edit::Remove { item, .. } => Some(item),
            Edit::Insert { .. } => None,
        })
    }

    /// Inserted elements, in next-sequence order.
    pub fn insertions(&self) -> impl Iterator<Item = &T> {
        self.edits.iter().filter_map(|edit| match edit {
            Edit::Insert { item, .. } => Some(item),
            Edit::Remove { .. } => None,
        })
    }

    /// Consume the script into its edits.
    #[must_use]
    pub fn into_edits(self) -> Vec<Edit<T>> {
        self.edits
    }
}

impl<T: Clone> EditScript<T> {
    /// Replay the script on `previous`.
    pub fn apply(&self, previous: &[T]) -> Result<Vec<T>, NavigationError> {
        let mut working = previous.to_vec();
        for edit in &self.edits {
            match edit {
                Edit::Remove { index, .. } => {
                    if *index >= working.len() {
                        return Err(NavigationError::ScriptMismatch(format!(
                            "remove at {} on sequence of {}",
                            index,
                            working.len()
                        )));
                    }
                    working.remove(*index);
                }
                Edit::Insert { index, item } => {
                    if *index > working.len() {
                        return Err(NavigationError::ScriptMismatch(format!(
                            "insert at {} on sequence of {}",
                            index,
                            working.len()
                        )));
                    }
                    working.insert(*index, item.clone());
                }
            }
        }
        Ok(working)
    }
}

// =============================================================================
// RECONCILER
// =============================================================================

/// One step of the shortest path through the edit graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Keep { previous: usize, next: usize },
    Remove { previous: usize },
    Insert { next: usize },
}

/// Computes edit scripts between stack sequences.
pub struct StackReconciler;

impl StackReconciler {
    /// Diff two sequences using `PartialEq`.
    #[must_use]
    pub fn diff<T: PartialEq + Clone>(previous: &[T], next: &[T]) -> EditScript<T> {
        Self::diff_by(previous, next, |a, b| a == b)
    }

    /// Diff two sequences using an explicit equality.
    ///
    /// `eq` is called as `eq(previous_item, next_item)`.
    pub fn diff_by<T, F>(previous: &[T], next: &[T], eq: F) -> EditScript<T>
    where
        T: Clone,
        F: FnMut(&T, &T) -> bool,
    {
        let steps = Self::shortest_path(previous, next, eq);

        let mut edits = Vec::new();
        let mut kept = Vec::new();
        let mut cursor = 0usize;
        for step in steps {
            match step {
                Step::Keep { previous, next } => {
                    kept.push(Kept { previous, next });
                    cursor += 1;
                }
                Step::Remove { previous: at } => edits.push(Edit::Remove {
                    index: cursor,
                    item: previous[at].clone(),
                }),
                Step::Insert { next: at } => {
                    edits.push(Edit::Insert {
                        index: cursor,
                        item: next[at].clone(),
                    });
                    cursor += 1;
                }
            }
        }

        trace!(
            previous = previous.len(),
            next = next.len(),
            edits = edits.len(),
            "reconciled sequences"
        );
        EditScript { edits, kept }
    }

    /// Myers' greedy forward search, then backtracking over the saved
    /// frontiers. Returns the steps in forward order.
    fn shortest_path<T, F>(a: &[T], b: &[T], mut eq: F) -> Vec<Step>
    where
        F: FnMut(&T, &T) -> bool,
    {
        let n = a.len() as isize;
        let m = b.len() as isize;
        let max = n + m;
        let offset = max + 1;
        // Frontier: furthest x reached on each diagonal k = x - y.
        let mut v = vec![0isize; (2 * max + 3) as usize];
        let mut trace: Vec<Vec<isize>> = Vec::new();

        'search: for d in 0..=max {
            trace.push(v.clone());
            let mut k = -d;
            while k <= d {
                let at = (k + offset) as usize;
                let mut x = if k == -d || (k != d && v[at - 1] < v[at + 1]) {
                    v[at + 1]
                } else {
                    v[at - 1] + 1
                };
                let mut y = x - k;
                while x < n && y < m && eq(&a[x as usize], &b[y as usize]) {
                    x += 1;
                    y += 1;
                }
                v[at] = x;
                if x >= n && y >= m {
                    break 'search;
                }
                k += 2;
            }
        }

        let mut steps = Vec::with_capacity((n + m) as usize);
        let (mut x, mut y) = (n, m);
        for (d, frontier) in trace.iter().enumerate().rev() {
            let d = d as isize;
            let k = x - y;
            let at = (k + offset) as usize;
            let prev_k = if k == -d || (k != d && frontier[at - 1] < frontier[at + 1]) {
                k + 1
            } else {
                k - 1
            };
            let prev_x = frontier[(prev_k + offset) as usize];
            let prev_y = prev_x - prev_k;

            while x > prev_x && y > prev_y {
                x -= 1;
                y -= 1;
                steps.push(Step::Keep {
                    previous: x as usize,
                    next: y as usize,
                });
            }
            if d > 0 {
                if x == prev_x {
                    steps.push(Step::Insert {
                        next: prev_y as usize,
                    });
                } else {
                    steps.push(Step::Remove {
                        previous: prev_x as usize,
                    });
                }
            }
            x = prev_x;
            y = prev_y;
        }

        steps.reverse();
        steps
    }
}

// =============================================================================
// TESTS
// =============================================================================
