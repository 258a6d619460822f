//! Candidate merging.
//!
//! Candidates are grouped with a union-find partition under a proximity
//! predicate: two boxes belong together when their corners lie within a
//! quarter of the reference box's short side and their sizes are within a
//! factor of 1.5. Each group is represented by its most confident member.
use super::Detection;
use crate::types::Rect;

/// Label every item with a group index; groups are numbered in order of
/// first appearance. Returns `(labels, group count)`.
pub fn partition<T>(items: &[T], same: impl Fn(&T, &T) -> bool) -> (Vec<usize>, usize) {
    let n = items.len();
    let mut parent: Vec<usize> = (0..n).collect();
    let mut rank = vec![0u32; n];

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        let mut root = i;
        while parent[root] != root {
            root = parent[root];
        }
        while parent[i] != root {
            let next = parent[i];
            parent[i] = root;
            i = next;
        }
        root
    }

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri != rj && same(&items[i], &items[j]) {
                match rank[ri].cmp(&rank[rj]) {
                    std::cmp::Ordering::Greater => parent[rj] = ri,
                    std::cmp::Ordering::Less => parent[ri] = rj,
                    std::cmp::Ordering::Equal => {
                        parent[rj] = ri;
                        rank[ri] += 1;
                    }
                }
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; n];
    let mut labels = Vec::with_capacity(n);
    let mut classes = 0;
    for i in 0..n {
        let r = find(&mut parent, i);
        if class_of_root[r] == usize::MAX {
            class_of_root[r] = classes;
            classes += 1;
        }
        labels.push(class_of_root[r]);
    }
    (labels, classes)
}

fn proximity(a: &Rect) -> i32 {
    (a.width.min(a.height) as f64 * 0.25 + 0.5) as i32
}

fn within_factor(a: i32, b: i32) -> bool {
    b <= (a as f64 * 1.5 + 0.5) as i32 && (b as f64 * 1.5 + 0.5) as i32 >= a
}

/// Class-agnostic grouping predicate, `r1` being the reference box.
pub fn is_similar(r1: &Rect, r2: &Rect) -> bool {
    let d = proximity(r1);
    r2.x <= r1.x + d
        && r2.x >= r1.x - d
        && r2.y <= r1.y + d
        && r2.y >= r1.y - d
        && within_factor(r1.width, r2.width)
        && within_factor(r1.height, r2.height)
}

/// `inner` lies inside `outer` grown by a quarter of `outer`'s short side.
fn is_nested(inner: &Rect, outer: &Rect) -> bool {
    let d = proximity(outer);
    inner.x >= outer.x - d
        && inner.y >= outer.y - d
        && inner.x + inner.width <= outer.x + outer.width + d
        && inner.y + inner.height <= outer.y + outer.height + d
}

/// Merge the candidates of one model.
///
/// With `min_neighbors == 0` every candidate is kept. Otherwise same-class
/// groups are reduced to their most confident member, groups smaller than
/// `min_neighbors` are dropped, and a survivor nested inside a same-class
/// survivor that is more confident or better supported is removed.
pub fn merge_candidates(candidates: Vec<Detection>, min_neighbors: usize) -> Vec<Detection> {
    if min_neighbors == 0 {
        return candidates;
    }
    let (labels, groups) = partition(&candidates, |a, b| {
        a.class_id == b.class_id && is_similar(&a.rect, &b.rect)
    });

    let mut reps: Vec<Option<Detection>> = vec![None; groups];
    let mut counts = vec![0usize; groups];
    for (cand, &label) in candidates.iter().zip(&labels) {
        let replace = match &reps[label] {
            None => true,
            Some(rep) => cand.confidence > rep.confidence,
        };
        if replace {
            reps[label] = Some(cand.clone());
        }
        counts[label] += 1;
    }
    let mut kept: Vec<Detection> = reps
        .into_iter()
        .zip(counts)
        .filter_map(|(rep, n)| {
            let mut rep = rep?;
            rep.neighbors = n;
            (n >= min_neighbors).then_some(rep)
        })
        .collect();

    // mute a box that holds a stronger, better supported box of its class
    for i in 0..kept.len() {
        let muted = (0..kept.len()).any(|j| {
            let (r1, r2) = (&kept[j], &kept[i]);
            i != j
                && r1.class_id.abs() == r2.class_id
                && is_nested(&r1.rect, &r2.rect)
                && r2.confidence <= r1.confidence
                && r2.neighbors < r1.neighbors
        });
        if muted {
            kept[i].class_id = -kept[i].class_id;
        }
    }

    let mut out = Vec::with_capacity(kept.len());
    for (i, r1) in kept.iter().enumerate() {
        if r1.class_id <= 0 {
            continue;
        }
        let swallowed = kept.iter().enumerate().any(|(j, r2)| {
            i != j
                && r1.class_id == r2.class_id.abs()
                && is_nested(&r1.rect, &r2.rect)
                && (r2.confidence > r1.confidence || r2.neighbors >= r1.neighbors)
        });
        if !swallowed {
            out.push(r1.clone());
        }
    }
    out
}

/// Keep only the most confident detection of each class-agnostic group.
pub fn suppress_nested(detections: Vec<Detection>) -> Vec<Detection> {
    let (labels, groups) = partition(&detections, |a, b| is_similar(&a.rect, &b.rect));
    let mut best: Vec<Option<Detection>> = vec![None; groups];
    for (det, &label) in detections.into_iter().zip(&labels) {
        let better = match &best[label] {
            None => true,
            Some(b) => b.confidence < det.confidence,
        };
        if better {
            best[label] = Some(Detection {
                neighbors: 1,
                ..det
            });
        }
    }
    best.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: i32, y: i32, size: i32, confidence: f32, class_id: i32) -> Detection {
        Detection {
            rect: Rect::new(x, y, size, size),
            class_id,
            confidence,
            neighbors: 1,
            parts: Vec::new(),
        }
    }

    #[test]
    fn partition_groups_transitively() {
        let xs: [i32; 6] = [0, 1, 2, 10, 11, 30];
        let (labels, n) = partition(&xs, |a, b| (a - b).abs() <= 1);
        assert_eq!(n, 3);
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 2]);
    }

    #[test]
    fn similarity_needs_close_corners_and_sizes() {
        let a = Rect::new(100, 100, 40, 40);
        assert!(is_similar(&a, &Rect::new(108, 95, 50, 44)));
        assert!(!is_similar(&a, &Rect::new(112, 100, 40, 40)));
        assert!(!is_similar(&a, &Rect::new(100, 100, 61, 40)));
    }

    #[test]
    fn overlapping_same_class_keeps_the_stronger() {
        let cands = vec![det(50, 50, 40, 0.7, 1), det(53, 52, 40, 1.4, 1)];
        let out = merge_candidates(cands, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 1.4);
        assert_eq!(out[0].neighbors, 2);
    }

    #[test]
    fn min_neighbors_filters_weak_groups() {
        let cands = vec![
            det(0, 0, 40, 1.0, 1),
            det(2, 2, 40, 0.9, 1),
            det(200, 200, 40, 3.0, 1),
        ];
        let out = merge_candidates(cands.clone(), 2);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rect.x, 0);
        assert_eq!(merge_candidates(cands, 0).len(), 3);
    }

    #[test]
    fn nested_weaker_box_is_removed() {
        // the small box is not grouped with the big one (size factor), but
        // lies inside it and has no more support
        let cands = vec![det(0, 0, 100, 2.0, 1), det(20, 20, 40, 1.0, 1)];
        let out = merge_candidates(cands, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rect.width, 100);
    }

    #[test]
    fn no_nested_ignores_class_and_breaks_ties_by_order() {
        let dets = vec![det(10, 10, 40, 1.0, 1), det(12, 10, 40, 1.0, 2), det(300, 0, 40, 0.5, 2)];
        let out = suppress_nested(dets);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].class_id, 1);
        assert_eq!(out[1].rect.x, 300);
    }
}
