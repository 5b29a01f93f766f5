//! Nested-set range arithmetic and tree reconstruction.
//!
//! Every row of the category table (live or soft-deleted) owns a `[left, right]`
//! range. All roots are numbered as consecutive top-level siblings, so the
//! whole table is described by the contiguous interval `[1, 2N]`.
//!
//! The storage layer executes the row updates; everything here is pure so the
//! arithmetic can be checked without a database.

use std::collections::{HashMap, HashSet};

use log::warn;
use serde::{Deserialize, Serialize};

use super::{Category, CategoryError, CategoryTreeNode};

/// Range consumed by a single leaf node.
pub const NODE_WIDTH: i64 = 2;

/// The `[left, right]` pair of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRange {
    pub left: i64,
    pub right: i64,
}

impl NodeRange {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// Number of positions the subtree occupies (`2 * size`).
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Strict containment: `other` is a descendant of `self`.
    pub fn contains(&self, other: &NodeRange) -> bool {
        self.left < other.left && other.right < self.right
    }

    pub fn is_disjoint(&self, other: &NodeRange) -> bool {
        self.right < other.left || other.right < self.left
    }

    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }
}

fn overflow(what: &str, value: i64, delta: i64) -> CategoryError {
    CategoryError::CapacityExceeded(format!("{} {} + {} overflows i64", what, value, delta))
}

/// `value + delta`, failing with `CapacityExceeded` instead of wrapping.
pub fn checked_shift(value: i64, delta: i64) -> Result<i64, CategoryError> {
    value
        .checked_add(delta)
        .ok_or_else(|| overflow("position", value, delta))
}

/// Verifies that the highest right bound can grow by `growth` positions.
pub fn ensure_capacity(max_right: Option<i64>, growth: i64) -> Result<(), CategoryError> {
    checked_shift(max_right.unwrap_or(0), growth).map(|_| ())
}

/// Insertion point for a new last root.
pub fn root_insertion_point(max_right: Option<i64>) -> Result<i64, CategoryError> {
    checked_shift(max_right.unwrap_or(0), 1)
}

/// Insertion point for a new last child of `parent`.
///
/// Every bound `>= point` has to be shifted right before the node is placed.
pub fn child_insertion_point(parent: &NodeRange) -> i64 {
    parent.right
}

/// Fails with `Cycle` when `target` is the node itself or inside its subtree.
pub fn ensure_not_cycle(
    node_id: i64,
    node: &NodeRange,
    target_id: i64,
    target: &NodeRange,
) -> Result<(), CategoryError> {
    if node_id == target_id || node.contains(target) {
        return Err(CategoryError::Cycle { node_id, target_id });
    }
    Ok(())
}

/// Offsets used to relocate a subtree.
///
/// A move runs in four steps: park the subtree below zero, close the gap it
/// left, open a gap of the same width at the destination, then bring the
/// parked rows back at `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub source: NodeRange,
    pub width: i64,
    /// Subtracted from every bound of the subtree to park it in `[-width, -1]`.
    pub park_offset: i64,
}

impl MovePlan {
    pub fn new(source: NodeRange) -> Result<Self, CategoryError> {
        let park_offset = checked_shift(source.right, 1)?;
        Ok(Self {
            source,
            width: source.width(),
            park_offset,
        })
    }

    /// Range of the subtree root while parked.
    pub fn parked(&self) -> NodeRange {
        NodeRange::new(
            self.source.left - self.park_offset,
            self.source.right - self.park_offset,
        )
    }

    /// Where a bound right of the source ends up after the gap is closed.
    pub fn after_gap_closed(&self, bound: i64) -> i64 {
        if bound > self.source.right {
            bound - self.width
        } else {
            bound
        }
    }

    /// Offset that moves parked bounds to `destination`, the insertion point
    /// measured after the source gap was closed and the destination gap opened.
    pub fn reattach_offset(&self, destination: i64) -> Result<i64, CategoryError> {
        let parked_left = self.parked().left;
        destination
            .checked_sub(parked_left)
            .ok_or_else(|| overflow("reattach offset", destination, -parked_left))
    }
}

/// Rebuilds the parent→children structure from rows ordered by `left`.
///
/// One pass with a stack of currently open ancestors; a node is closed as
/// soon as the next row starts beyond its right bound. Holes left by
/// soft-deleted rows are harmless because containment is decided by range.
pub fn build_forest(mut rows: Vec<Category>) -> Vec<CategoryTreeNode> {
    rows.sort_by_key(|c| c.left);

    let mut roots = Vec::new();
    let mut open: Vec<CategoryTreeNode> = Vec::new();

    for category in rows {
        while open
            .last()
            .is_some_and(|top| top.category.right < category.left)
        {
            close_top(&mut open, &mut roots);
        }
        open.push(CategoryTreeNode::leaf(category));
    }
    while !open.is_empty() {
        close_top(&mut open, &mut roots);
    }

    roots
}

fn close_top(open: &mut Vec<CategoryTreeNode>, roots: &mut Vec<CategoryTreeNode>) {
    if let Some(node) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

/// Pre-order numbering of a materialized forest starting at 1.
pub fn number_forest(forest: &[CategoryTreeNode]) -> Vec<(i64, NodeRange)> {
    let mut numbered = Vec::new();
    let mut counter = 0;
    for root in forest {
        number_node(root, &mut counter, &mut numbered);
    }
    numbered
}

fn number_node(node: &CategoryTreeNode, counter: &mut i64, out: &mut Vec<(i64, NodeRange)>) {
    *counter += 1;
    let slot = out.len();
    out.push((node.category.id, NodeRange::new(*counter, *counter)));
    for child in &node.children {
        number_node(child, counter, out);
    }
    *counter += 1;
    out[slot].1.right = *counter;
}

/// Minimal row data needed to renumber a table from its parent links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLink {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub left: i64,
}

/// Result row of [`renumber_from_links`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenumberedNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub range: NodeRange,
}

/// Recomputes every range from `parent_id`, keeping siblings in current `left` order.
///
/// Rows pointing at a missing parent become roots. Parent links that form a
/// loop cannot be numbered and fail with `Cycle`.
pub fn renumber_from_links(links: &[NodeLink]) -> Result<Vec<RenumberedNode>, CategoryError> {
    let ids: HashSet<i64> = links.iter().map(|l| l.id).collect();
    let mut children: HashMap<Option<i64>, Vec<&NodeLink>> = HashMap::new();
    for link in links {
        let parent = link.parent_id.filter(|p| ids.contains(p));
        if link.parent_id.is_some() && parent.is_none() {
            warn!("Category {} points at missing parent, promoting to root", link.id);
        }
        children.entry(parent).or_default().push(link);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|l| (l.left, l.id));
    }

    let mut out = Vec::with_capacity(links.len());
    let mut counter = 0;
    let roots = children.get(&None).cloned().unwrap_or_default();
    for root in roots {
        number_link(root.id, None, &children, &mut counter, &mut out);
    }

    if out.len() != links.len() {
        let numbered: HashSet<i64> = out.iter().map(|n| n.id).collect();
        let stuck = links
            .iter()
            .find(|l| !numbered.contains(&l.id))
            .map(|l| (l.id, l.parent_id.unwrap_or(l.id)))
            .unwrap_or((0, 0));
        return Err(CategoryError::Cycle {
            node_id: stuck.0,
            target_id: stuck.1,
        });
    }
    Ok(out)
}

fn number_link(
    id: i64,
    parent_id: Option<i64>,
    children: &HashMap<Option<i64>, Vec<&NodeLink>>,
    counter: &mut i64,
    out: &mut Vec<RenumberedNode>,
) {
    *counter += 1;
    let slot = out.len();
    out.push(RenumberedNode {
        id,
        parent_id,
        range: NodeRange::new(*counter, *counter),
    });
    if let Some(kids) = children.get(&Some(id)) {
        for kid in kids {
            number_link(kid.id, Some(id), children, counter, out);
        }
    }
    *counter += 1;
    out[slot].range.right = *counter;
}

/// A broken invariant found by [`check_integrity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeViolation {
    /// `left >= right`, `left < 1`, or an even width.
    MalformedRange { id: i64, left: i64, right: i64 },
    /// Two ranges overlap without one containing the other.
    PartialOverlap { id: i64, other_id: i64 },
    /// `parent_id` disagrees with the innermost enclosing range.
    ParentMismatch {
        id: i64,
        stored: Option<i64>,
        enclosing: Option<i64>,
    },
    /// The bounds are not exactly `1..=2N`.
    NumberingGap { expected: i64, found: Option<i64> },
}

/// Outcome of a full-table invariant check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeIntegrityReport {
    pub checked: usize,
    pub violations: Vec<TreeViolation>,
}

impl TreeIntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Checks every nested-set invariant over all rows of the table.
pub fn check_integrity(nodes: &[(i64, Option<i64>, NodeRange)]) -> TreeIntegrityReport {
    let mut violations = Vec::new();
    let mut sorted: Vec<&(i64, Option<i64>, NodeRange)> = nodes.iter().collect();
    sorted.sort_by_key(|(_, _, r)| r.left);

    for (id, _, range) in &sorted {
        if range.left < 1 || range.left >= range.right || range.width() % 2 != 0 {
            violations.push(TreeViolation::MalformedRange {
                id: *id,
                left: range.left,
                right: range.right,
            });
        }
    }

    let mut bounds: Vec<i64> = sorted
        .iter()
        .flat_map(|(_, _, r)| [r.left, r.right])
        .collect();
    bounds.sort_unstable();
    for (expected, found) in (1..).zip(bounds.iter().map(Some).chain(std::iter::once(None))) {
        if expected > 2 * sorted.len() as i64 {
            break;
        }
        if found != Some(&expected) {
            violations.push(TreeViolation::NumberingGap {
                expected,
                found: found.copied(),
            });
            break;
        }
    }

    let mut open: Vec<(i64, NodeRange)> = Vec::new();
    for (id, parent_id, range) in &sorted {
        while open.last().is_some_and(|(_, top)| top.right < range.left) {
            open.pop();
        }
        if let Some((top_id, top)) = open.last() {
            if range.right > top.right {
                violations.push(TreeViolation::PartialOverlap {
                    id: *id,
                    other_id: *top_id,
                });
            }
        }
        let enclosing = open.last().map(|(top_id, _)| *top_id);
        if enclosing != *parent_id {
            violations.push(TreeViolation::ParentMismatch {
                id: *id,
                stored: *parent_id,
                enclosing,
            });
        }
        open.push((*id, *range));
    }

    TreeIntegrityReport {
        checked: nodes.len(),
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::LocalizedText;
    use chrono::NaiveDateTime;
    use proptest::prelude::*;

    fn category(id: i64, parent_id: Option<i64>, left: i64, right: i64) -> Category {
        Category {
            id,
            slug: format!("c{}", id),
            name: LocalizedText::single("en", format!("Category {}", id)),
            description: None,
            left,
            right,
            parent_id,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
            deleted_at: None,
        }
    }

    /// electronics(1,8) > phones(2,5) > android(3,4); laptops(6,7); books(9,10)
    fn sample_rows() -> Vec<Category> {
        vec![
            category(1, None, 1, 8),
            category(2, Some(1), 2, 5),
            category(3, Some(2), 3, 4),
            category(4, Some(1), 6, 7),
            category(5, None, 9, 10),
        ]
    }

    fn triples(rows: &[Category]) -> Vec<(i64, Option<i64>, NodeRange)> {
        rows.iter().map(|c| (c.id, c.parent_id, c.range())).collect()
    }

    #[test]
    fn test_range_relations() {
        let outer = NodeRange::new(1, 8);
        let inner = NodeRange::new(2, 5);
        let sibling = NodeRange::new(9, 10);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(!outer.contains(&outer));
        assert!(outer.is_disjoint(&sibling));
        assert_eq!(outer.width(), 8);
        assert_eq!(outer.descendant_count(), 3);
        assert_eq!(inner.descendant_count(), 1);
    }

    #[test]
    fn test_insertion_points() {
        assert_eq!(root_insertion_point(None).unwrap(), 1);
        assert_eq!(root_insertion_point(Some(10)).unwrap(), 11);
        assert_eq!(child_insertion_point(&NodeRange::new(2, 5)), 5);
    }

    #[test]
    fn test_overflow_is_capacity_exceeded() {
        assert!(matches!(
            root_insertion_point(Some(i64::MAX)),
            Err(CategoryError::CapacityExceeded(_))
        ));
        assert!(matches!(
            ensure_capacity(Some(i64::MAX - 1), NODE_WIDTH),
            Err(CategoryError::CapacityExceeded(_))
        ));
        assert!(ensure_capacity(Some(i64::MAX - 2), NODE_WIDTH).is_ok());
    }

    #[test]
    fn test_cycle_detection() {
        let node = NodeRange::new(2, 5);
        assert_eq!(
            ensure_not_cycle(2, &node, 2, &node),
            Err(CategoryError::Cycle {
                node_id: 2,
                target_id: 2
            })
        );
        assert!(ensure_not_cycle(2, &node, 3, &NodeRange::new(3, 4)).is_err());
        assert!(ensure_not_cycle(2, &node, 1, &NodeRange::new(1, 8)).is_ok());
        assert!(ensure_not_cycle(2, &node, 5, &NodeRange::new(9, 10)).is_ok());
    }

    #[test]
    fn test_move_plan_to_root() {
        // Move phones(2,5) to be the last root of the sample forest (max right 10).
        let plan = MovePlan::new(NodeRange::new(2, 5)).unwrap();
        assert_eq!(plan.width, 4);
        assert_eq!(plan.parked(), NodeRange::new(-4, -1));

        // After closing the gap the largest bound is 10 - 4 = 6.
        assert_eq!(plan.after_gap_closed(10), 6);
        assert_eq!(plan.after_gap_closed(1), 1);
        let destination = root_insertion_point(Some(plan.after_gap_closed(10))).unwrap();
        assert_eq!(destination, 7);

        let offset = plan.reattach_offset(destination).unwrap();
        assert_eq!(plan.parked().left + offset, 7);
        assert_eq!(plan.parked().right + offset, 10);
        // android(3,4) parks at (-3,-2) and lands at (8,9)
        assert_eq!(3 - plan.park_offset + offset, 8);
        assert_eq!(4 - plan.park_offset + offset, 9);
    }

    #[test]
    fn test_build_forest_reconstructs_structure() {
        let forest = build_forest(sample_rows());
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].category.id, 1);
        assert_eq!(forest[1].category.id, 5);

        let children: Vec<i64> = forest[0].children.iter().map(|n| n.category.id).collect();
        assert_eq!(children, vec![2, 4]);
        assert_eq!(forest[0].children[0].children[0].category.id, 3);
        assert_eq!(forest[0].size(), 4);
    }

    #[test]
    fn test_build_forest_tolerates_holes() {
        // laptops(6,7) soft-deleted and filtered out of the scan
        let rows: Vec<Category> = sample_rows().into_iter().filter(|c| c.id != 4).collect();
        let forest = build_forest(rows);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].category.id, 2);
    }

    #[test]
    fn test_build_forest_accepts_unsorted_rows() {
        let mut rows = sample_rows();
        rows.reverse();
        let forest = build_forest(rows);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].size(), 4);
    }

    #[test]
    fn test_number_forest_round_trip() {
        let rows = sample_rows();
        let forest = build_forest(rows.clone());
        let numbered = number_forest(&forest);
        let expected: Vec<(i64, NodeRange)> = rows.iter().map(|c| (c.id, c.range())).collect();
        assert_eq!(numbered, expected);
    }

    #[test]
    fn test_check_integrity_accepts_valid_forest() {
        let report = check_integrity(&triples(&sample_rows()));
        assert!(report.is_ok(), "{:?}", report.violations);
        assert_eq!(report.checked, 5);
    }

    #[test]
    fn test_check_integrity_flags_partial_overlap() {
        let mut rows = sample_rows();
        // laptops now straddles the end of phones
        rows[3].left = 4;
        rows[3].right = 7;
        rows[2].right = 6;
        let report = check_integrity(&triples(&rows));
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, TreeViolation::PartialOverlap { .. })));
    }

    #[test]
    fn test_check_integrity_flags_parent_mismatch_and_gap() {
        let mut rows = sample_rows();
        rows[2].parent_id = Some(1);
        rows[4].right = 12;
        let report = check_integrity(&triples(&rows));
        assert!(report.violations.contains(&TreeViolation::ParentMismatch {
            id: 3,
            stored: Some(1),
            enclosing: Some(2),
        }));
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, TreeViolation::NumberingGap { .. })));
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, TreeViolation::MalformedRange { id: 5, .. })));
    }

    #[test]
    fn test_renumber_from_links_repairs_ranges() {
        let links = vec![
            NodeLink { id: 1, parent_id: None, left: 1 },
            NodeLink { id: 2, parent_id: Some(1), left: 40 },
            NodeLink { id: 3, parent_id: Some(2), left: 7 },
            NodeLink { id: 4, parent_id: Some(1), left: 50 },
            NodeLink { id: 5, parent_id: Some(99), left: 2 },
        ];
        let out = renumber_from_links(&links).unwrap();
        let ranges: HashMap<i64, NodeRange> = out.iter().map(|n| (n.id, n.range)).collect();
        assert_eq!(ranges[&1], NodeRange::new(1, 8));
        assert_eq!(ranges[&2], NodeRange::new(2, 5));
        assert_eq!(ranges[&3], NodeRange::new(3, 4));
        assert_eq!(ranges[&4], NodeRange::new(6, 7));
        assert_eq!(ranges[&5], NodeRange::new(9, 10));
        let orphan = out.iter().find(|n| n.id == 5).unwrap();
        assert_eq!(orphan.parent_id, None);
    }

    #[test]
    fn test_renumber_from_links_rejects_loops() {
        let links = vec![
            NodeLink { id: 1, parent_id: None, left: 1 },
            NodeLink { id: 2, parent_id: Some(3), left: 2 },
            NodeLink { id: 3, parent_id: Some(2), left: 3 },
        ];
        assert!(matches!(
            renumber_from_links(&links),
            Err(CategoryError::Cycle { .. })
        ));
    }

    /// Random forest: node `i` hangs under an earlier node or is a root.
    fn arb_links() -> impl Strategy<Value = Vec<NodeLink>> {
        prop::collection::vec(any::<prop::sample::Index>(), 1..40).prop_map(|picks| {
            picks
                .iter()
                .enumerate()
                .map(|(i, pick)| {
                    let slot = pick.index(i + 1);
                    NodeLink {
                        id: i as i64 + 1,
                        parent_id: if slot == 0 { None } else { Some(slot as i64) },
                        left: i as i64,
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_renumbered_forest_is_valid(links in arb_links()) {
            let out = renumber_from_links(&links).unwrap();
            let nodes: Vec<(i64, Option<i64>, NodeRange)> =
                out.iter().map(|n| (n.id, n.parent_id, n.range)).collect();
            let report = check_integrity(&nodes);
            prop_assert!(report.is_ok(), "{:?}", report.violations);

            for n in &out {
                prop_assert!(n.range.left < n.range.right);
                prop_assert_eq!((n.range.right - n.range.left) % 2, 1);
                let descendants = out.iter().filter(|d| n.range.contains(&d.range)).count() as i64;
                prop_assert_eq!(n.range.right - n.range.left, 2 * descendants + 1);
            }
            for a in &out {
                for b in &out {
                    if a.id == b.id { continue; }
                    let relations = [a.range.contains(&b.range), b.range.contains(&a.range), a.range.is_disjoint(&b.range)];
                    prop_assert_eq!(relations.iter().filter(|r| **r).count(), 1);
                }
            }
        }

        #[test]
        fn prop_materialize_then_renumber_round_trips(links in arb_links()) {
            let out = renumber_from_links(&links).unwrap();
            let rows: Vec<Category> = out
                .iter()
                .map(|n| category(n.id, n.parent_id, n.range.left, n.range.right))
                .collect();
            let forest = build_forest(rows);
            let total: usize = forest.iter().map(CategoryTreeNode::size).sum();
            prop_assert_eq!(total, out.len());

            let mut renumbered = number_forest(&forest);
            renumbered.sort_by_key(|(id, _)| *id);
            let mut original: Vec<(i64, NodeRange)> = out.iter().map(|n| (n.id, n.range)).collect();
            original.sort_by_key(|(id, _)| *id);
            prop_assert_eq!(renumbered, original);
        }

        #[test]
        fn prop_move_plan_preserves_relative_order(left in 1i64..1000, half in 1i64..50, tail in 0i64..100) {
            let source = NodeRange::new(left, left + 2 * half - 1);
            let plan = MovePlan::new(source).unwrap();
            let parked = plan.parked();
            prop_assert!(parked.right < 0);
            prop_assert_eq!(parked.width(), source.width());

            let destination = root_insertion_point(Some(left - 1 + tail * 2)).unwrap();
            let offset = plan.reattach_offset(destination).unwrap();
            prop_assert_eq!(parked.left + offset, destination);
            prop_assert_eq!(parked.right + offset, destination + source.width() - 1);
        }
    }
}
