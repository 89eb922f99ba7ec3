//! Stage 4: connected-component labeling and crack-edge boundary tracing.
//!
//! Components are found with a union-find over 4-adjacent equal-index
//! pixels. Components smaller than `min_region_pixels` are not dropped —
//! they're folded into their largest adjacent neighbor, so coverage of the
//! canvas stays total. Boundaries are then traced on the pixel-edge lattice
//! so outer and hole contours come out as simple, non-self-intersecting
//! closed polylines (`crate::types::Boundary`), with orientation encoded in
//! the sign of `Boundary::signed_area`.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::cancel::CancellationToken;
use crate::config::VectorizeConfig;
use crate::error::{CoreError, CoreResult, CoreWarning};
use crate::types::{Boundary, GridPoint, IndexMap, Region};

struct DisjointSet {
    parent: Vec<u32>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self { parent: (0..n as u32).collect() }
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut cur = x;
        while self.parent[cur as usize] != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra as usize] = rb;
        }
    }
}

struct RawComponents {
    /// Dense component id per pixel, row-major.
    labels: Vec<u32>,
    sizes: Vec<u64>,
    palette_index: Vec<usize>,
    adjacency: Vec<HashSet<u32>>,
}

fn label_components(indices: &IndexMap) -> RawComponents {
    let width = indices.width() as usize;
    let height = indices.height() as usize;
    let n = width * height;

    let mut dsu = DisjointSet::new(n);
    for y in 0..height {
        for x in 0..width {
            let here = y * width + x;
            let idx = indices.get(x as u32, y as u32);
            if x > 0 && indices.get(x as u32 - 1, y as u32) == idx {
                dsu.union(here as u32, (here - 1) as u32);
            }
            if y > 0 && indices.get(x as u32, y as u32 - 1) == idx {
                dsu.union(here as u32, (here - width) as u32);
            }
        }
    }

    let mut dense_id = vec![u32::MAX; n];
    let mut labels = vec![0u32; n];
    let mut sizes = Vec::new();
    let mut palette_index = Vec::new();

    for pixel in 0..n {
        let root = dsu.find(pixel as u32);
        let id = if dense_id[root as usize] == u32::MAX {
            let id = sizes.len() as u32;
            dense_id[root as usize] = id;
            let x = (pixel % width) as u32;
            let y = (pixel / width) as u32;
            sizes.push(0u64);
            palette_index.push(indices.get(x, y) as usize);
            id
        } else {
            dense_id[root as usize]
        };
        labels[pixel] = id;
        sizes[id as usize] += 1;
    }

    let mut adjacency = vec![HashSet::new(); sizes.len()];
    for y in 0..height {
        for x in 0..width {
            let here = labels[y * width + x];
            if x + 1 < width {
                let right = labels[y * width + x + 1];
                if right != here {
                    adjacency[here as usize].insert(right);
                    adjacency[right as usize].insert(here);
                }
            }
            if y + 1 < height {
                let down = labels[(y + 1) * width + x];
                if down != here {
                    adjacency[here as usize].insert(down);
                    adjacency[down as usize].insert(here);
                }
            }
        }
    }

    RawComponents { labels, sizes, palette_index, adjacency }
}

/// Folds every component smaller than `min_pixels` into its largest
/// adjacent neighbor (by pixel count), repeating until no such component
/// remains or it has no neighbor left to merge into. Returns a find-ready
/// parent array over original component ids.
fn merge_small_components(raw: &RawComponents, min_pixels: u64) -> Vec<u32> {
    let n = raw.sizes.len();
    let mut parent: Vec<u32> = (0..n as u32).collect();
    let mut sizes = raw.sizes.clone();
    let mut adjacency = raw.adjacency.clone();

    fn find(parent: &mut [u32], x: u32) -> u32 {
        let mut root = x;
        while parent[root as usize] != root {
            root = parent[root as usize];
        }
        let mut cur = x;
        while parent[cur as usize] != root {
            let next = parent[cur as usize];
            parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    let mut heap: BinaryHeap<Reverse<(u64, u32)>> = BinaryHeap::new();
    for i in 0..n {
        if sizes[i] < min_pixels {
            heap.push(Reverse((sizes[i], i as u32)));
        }
    }

    while let Some(Reverse((_, id))) = heap.pop() {
        let root = find(&mut parent, id);
        if sizes[root as usize] >= min_pixels {
            continue;
        }

        let neighbor_roots: HashSet<u32> = adjacency[root as usize]
            .iter()
            .map(|&nb| find(&mut parent, nb))
            .filter(|&r| r != root)
            .collect();

        let Some(best) = neighbor_roots.iter().copied().max_by_key(|&r| sizes[r as usize]) else {
            continue;
        };

        parent[root as usize] = best;
        sizes[best as usize] += sizes[root as usize];

        let moved: Vec<u32> = adjacency[root as usize].drain().collect();
        for nb in moved {
            let nb_root = find(&mut parent, nb);
            if nb_root != best {
                adjacency[best as usize].insert(nb_root);
                adjacency[nb_root as usize].insert(best);
            }
        }
        adjacency[best as usize].remove(&best);

        if sizes[best as usize] < min_pixels {
            heap.push(Reverse((sizes[best as usize], best)));
        }
    }

    for i in 0..n {
        find(&mut parent, i as u32);
    }
    parent
}

/// Direction of a unit lattice step, in clockwise order (screen coordinates,
/// y increasing downward): 0=North, 1=East, 2=South, 3=West.
fn dir_code(from: GridPoint, to: GridPoint) -> u8 {
    match (to.x - from.x, to.y - from.y) {
        (0, -1) => 0,
        (1, 0) => 1,
        (0, 1) => 2,
        (-1, 0) => 3,
        _ => unreachable!("crack edges are unit lattice steps"),
    }
}

/// Among a vertex's remaining outgoing edges, picks the one forming the
/// sharpest clockwise turn from `in_code` (right turn, then straight, then
/// left, then a U-turn). A lattice vertex where a component pinches to a
/// single corner has two outgoing edges rather than one; always taking the
/// sharpest right turn is what correctly splits such a vertex into its two
/// separate sub-loops instead of losing one to an overwrite.
fn pick_and_remove(
    edges: &mut std::collections::HashMap<GridPoint, Vec<GridPoint>>,
    at: GridPoint,
    in_code: u8,
) -> Option<GridPoint> {
    let list = edges.get_mut(&at)?;
    if list.is_empty() {
        return None;
    }
    let rank = |cand: GridPoint| -> u8 {
        match (dir_code(at, cand) + 4 - in_code) % 4 {
            1 => 0, // sharpest right turn
            0 => 1, // straight ahead
            3 => 2, // left turn
            _ => 3, // U-turn, last resort
        }
    };
    let idx = (0..list.len()).min_by_key(|&i| rank(list[i]))?;
    Some(list.remove(idx))
}

/// Traces every crack-lattice boundary edge of one connected component and
/// classifies the resulting closed loops into an outer boundary (positive
/// signed area) and holes (negative signed area). See the module doc for
/// the "inside kept on the left of travel" derivation this relies on.
fn trace_component(
    final_label: &[u32],
    width: usize,
    height: usize,
    bbox: (usize, usize, usize, usize),
    target: u32,
) -> CoreResult<(Boundary, Vec<Boundary>)> {
    let (min_x, min_y, max_x, max_y) = bbox;
    let is_inside = |x: i32, y: i32| -> bool {
        if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
            false
        } else {
            final_label[y as usize * width + x as usize] == target
        }
    };

    // A multimap: a lattice vertex where the component pinches to a single
    // corner has more than one outgoing edge, so a plain HashMap<Point,
    // Point> would silently drop all but the last one inserted.
    let mut edges: std::collections::HashMap<GridPoint, Vec<GridPoint>> =
        std::collections::HashMap::new();
    let mut add_edge = |from: GridPoint, to: GridPoint| {
        edges.entry(from).or_default().push(to);
    };

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (xi, yi) = (x as i32, y as i32);
            if !is_inside(xi, yi) {
                continue;
            }
            if !is_inside(xi, yi - 1) {
                // top side: West-bound, (x+1,y) -> (x,y)
                add_edge(GridPoint::new(xi + 1, yi), GridPoint::new(xi, yi));
            }
            if !is_inside(xi - 1, yi) {
                // left side: South-bound, (x,y) -> (x,y+1)
                add_edge(GridPoint::new(xi, yi), GridPoint::new(xi, yi + 1));
            }
            if !is_inside(xi, yi + 1) {
                // bottom side: East-bound, (x,y+1) -> (x+1,y+1)
                add_edge(GridPoint::new(xi, yi + 1), GridPoint::new(xi + 1, yi + 1));
            }
            if !is_inside(xi + 1, yi) {
                // right side: North-bound, (x+1,y+1) -> (x+1,y)
                add_edge(GridPoint::new(xi + 1, yi + 1), GridPoint::new(xi + 1, yi));
            }
        }
    }

    // Sorted so the set of traced loops (and the order edges are assigned
    // to them) doesn't depend on HashMap iteration order.
    let mut starts: Vec<GridPoint> = edges.keys().copied().collect();
    starts.sort();

    let mut loops: Vec<Boundary> = Vec::new();
    for start in starts {
        while let Some(first) = edges.get_mut(&start).and_then(|list| {
            (!list.is_empty()).then(|| list.remove(0))
        }) {
            let mut points = vec![start];
            let mut at = start;
            let mut next = first;
            let mut in_code = dir_code(at, next);
            while next != start {
                points.push(next);
                at = next;
                next = pick_and_remove(&mut edges, at, in_code).ok_or_else(|| {
                    CoreError::internal(
                        "region_boundary_unmatched_degree",
                        "crack-lattice vertex had unmatched in/out edge degree",
                    )
                })?;
                in_code = dir_code(at, next);
            }
            points.reverse();
            loops.push(Boundary { points });
        }
    }

    let mut outer = None;
    let mut holes = Vec::new();
    for boundary in loops {
        if boundary.signed_area() > 0.0 {
            if outer.is_some() {
                return Err(CoreError::internal(
                    "region_multiple_outer_loops",
                    "connected component traced to more than one positively-wound loop",
                ));
            }
            outer = Some(boundary);
        } else {
            holes.push(boundary);
        }
    }

    let outer = outer.ok_or_else(|| {
        CoreError::internal("region_missing_outer_loop", "connected component traced no outer loop")
    })?;

    Ok((outer, holes))
}

/// Runs connected-component extraction and boundary tracing, adaptively
/// raising `min_region_pixels` if the raw component count would exceed
/// `max_regions`.
pub fn extract_regions(
    indices: &IndexMap,
    config: &VectorizeConfig,
    cancel: &CancellationToken,
) -> CoreResult<(Vec<Region>, Option<CoreWarning>)> {
    cancel.check()?;
    let raw = label_components(indices);
    cancel.check()?;

    let original_min = config.effective_min_region_pixels(indices.width(), indices.height());
    let mut min_pixels = original_min.max(1);
    let mut parent = merge_small_components(&raw, min_pixels);
    let mut roots: HashSet<u32> = parent.iter().copied().collect();

    const MAX_ATTEMPTS: u32 = 24;
    let mut attempts = 0;
    while roots.len() > config.max_regions && attempts < MAX_ATTEMPTS {
        min_pixels = min_pixels.saturating_mul(2).max(min_pixels + 1);
        parent = merge_small_components(&raw, min_pixels);
        roots = parent.iter().copied().collect();
        attempts += 1;
        cancel.check()?;
    }

    let warning = if min_pixels != original_min {
        Some(CoreWarning::RegionBudgetExceeded {
            max_regions: config.max_regions,
            original_min,
            adjusted_min: min_pixels,
        })
    } else {
        None
    };

    let width = indices.width() as usize;
    let height = indices.height() as usize;
    let final_label: Vec<u32> = raw.labels.iter().map(|&id| parent[id as usize]).collect();

    let mut bboxes: std::collections::HashMap<u32, (usize, usize, usize, usize)> =
        std::collections::HashMap::new();
    for y in 0..height {
        for x in 0..width {
            let label = final_label[y * width + x];
            bboxes
                .entry(label)
                .and_modify(|b| {
                    b.0 = b.0.min(x);
                    b.1 = b.1.min(y);
                    b.2 = b.2.max(x);
                    b.3 = b.3.max(y);
                })
                .or_insert((x, y, x, y));
        }
    }

    let mut merged_sizes: std::collections::HashMap<u32, u64> = std::collections::HashMap::new();
    for (id, &root) in parent.iter().enumerate() {
        *merged_sizes.entry(root).or_insert(0) += raw.sizes[id];
    }

    // Sorted so the order regions are emitted in (and therefore any
    // downstream tie-break on equal pixel_count/palette_index) doesn't
    // depend on HashSet iteration order.
    let mut sorted_roots: Vec<u32> = roots.into_iter().collect();
    sorted_roots.sort_unstable();

    let mut regions = Vec::with_capacity(sorted_roots.len());
    for root in sorted_roots {
        cancel.check()?;
        let bbox = bboxes[&root];
        let (outer, holes) = trace_component(&final_label, width, height, bbox, root)?;
        regions.push(Region {
            palette_index: raw.palette_index[root as usize],
            pixel_count: merged_sizes[&root],
            outer,
            holes,
        });
    }

    Ok((regions, warning))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_map(width: u32, height: u32, indices: Vec<u16>) -> IndexMap {
        IndexMap::new(width, height, indices)
    }

    #[test]
    fn single_color_canvas_is_one_region() {
        let indices = index_map(4, 4, vec![0; 16]);
        let config = VectorizeConfig { min_region_pixels: Some(1), ..VectorizeConfig::default() };
        let (regions, warning) =
            extract_regions(&indices, &config, &CancellationToken::new()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].pixel_count, 16);
        assert!(warning.is_none());
        assert!(regions[0].holes.is_empty());
        assert!((regions[0].outer.signed_area() - 16.0).abs() < 1e-6);
    }

    #[test]
    fn vertical_split_is_two_regions() {
        #[rustfmt::skip]
        let indices = vec![
            0, 0, 1, 1,
            0, 0, 1, 1,
            0, 0, 1, 1,
            0, 0, 1, 1,
        ];
        let indices = index_map(4, 4, indices);
        let config = VectorizeConfig { min_region_pixels: Some(1), ..VectorizeConfig::default() };
        let (regions, _) = extract_regions(&indices, &config, &CancellationToken::new()).unwrap();
        assert_eq!(regions.len(), 2);
        for r in &regions {
            assert_eq!(r.pixel_count, 8);
        }
    }

    #[test]
    fn donut_shape_produces_a_hole() {
        // A solid square ring of 1s around an isolated center pixel of a
        // third color: the ring is 4-connected to nothing inside it, so it
        // is itself a donut with one hole, and the background is a second,
        // larger donut around the ring+center block.
        #[rustfmt::skip]
        let indices = vec![
            0, 0, 0, 0, 0,
            0, 1, 1, 1, 0,
            0, 1, 2, 1, 0,
            0, 1, 1, 1, 0,
            0, 0, 0, 0, 0,
        ];
        let indices = index_map(5, 5, indices);
        let config = VectorizeConfig { min_region_pixels: Some(1), ..VectorizeConfig::default() };
        let (regions, _) = extract_regions(&indices, &config, &CancellationToken::new()).unwrap();
        assert_eq!(regions.len(), 3);

        let background = regions.iter().find(|r| r.palette_index == 0).unwrap();
        assert_eq!(background.pixel_count, 16);
        assert_eq!(background.holes.len(), 1);

        let ring = regions.iter().find(|r| r.palette_index == 1).unwrap();
        assert_eq!(ring.pixel_count, 8);
        assert_eq!(ring.holes.len(), 1);

        let center = regions.iter().find(|r| r.palette_index == 2).unwrap();
        assert_eq!(center.pixel_count, 1);
        assert!(center.holes.is_empty());
    }

    #[test]
    fn traces_a_component_that_pinches_to_a_single_corner() {
        // Component 1 is one connected blob (bridged through column 0 and
        // row 4) that nonetheless touches itself only diagonally at lattice
        // vertex (2,2): pixel (1,1) and (2,2) are both component 1, while
        // (2,1) and (1,2) are both background, one of them enclosed as a
        // hole. That vertex has two crack edges leaving it and two arriving;
        // a plain from->to HashMap can't represent that degree without
        // dropping one of them.
        #[rustfmt::skip]
        let indices = vec![
            1, 1, 0, 0, 0,
            1, 1, 0, 0, 0,
            1, 0, 1, 1, 1,
            1, 0, 1, 1, 1,
            1, 1, 1, 1, 1,
        ];
        let indices = index_map(5, 5, indices);
        let config = VectorizeConfig { min_region_pixels: Some(1), ..VectorizeConfig::default() };
        let (regions, _) = extract_regions(&indices, &config, &CancellationToken::new()).unwrap();

        let blob = regions.iter().find(|r| r.palette_index == 1).unwrap();
        assert_eq!(blob.pixel_count, 17);
        assert_eq!(blob.holes.len(), 1);

        let hole_area: f64 = blob.holes.iter().map(|h| h.signed_area().abs()).sum();
        assert!((blob.outer.signed_area().abs() - hole_area - blob.pixel_count as f64).abs() < 1e-6);
    }

    #[test]
    fn small_speckle_merges_into_its_larger_neighbor() {
        #[rustfmt::skip]
        let indices = vec![
            0, 0, 0, 0,
            0, 0, 1, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ];
        let indices = index_map(4, 4, indices);
        let config = VectorizeConfig { min_region_pixels: Some(2), ..VectorizeConfig::default() };
        let (regions, _) = extract_regions(&indices, &config, &CancellationToken::new()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].pixel_count, 16);
    }

    #[test]
    fn respects_cancellation() {
        let indices = index_map(4, 4, vec![0; 16]);
        let config = VectorizeConfig::default();
        let token = CancellationToken::new();
        token.cancel();
        let result = extract_regions(&indices, &config, &token);
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }
}
