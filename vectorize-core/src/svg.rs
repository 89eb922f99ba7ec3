//! Stage 6: SVG document assembly.

use svg::node::element::path::Data;
use svg::node::element::{Path as SvgPath, Rectangle};
use svg::Document;

use crate::config::EdgeOverlayConfig;
use crate::types::{EdgeMask, FittedRegion, Path, PathSegment, Point};

/// Formats a coordinate with at most 2 fractional digits, trailing zeros and
/// a bare trailing decimal point stripped, and no `-0`.
fn format_num(value: f32) -> String {
    let rounded = ((value * 100.0).round() / 100.0) as f64;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let mut s = format!("{rounded:.2}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

fn point_tuple(p: Point) -> (f64, f64) {
    (format_num(p.x).parse().unwrap(), format_num(p.y).parse().unwrap())
}

fn append_subpath(mut data: Data, path: &Path) -> Data {
    data = data.move_to(point_tuple(path.start));
    for segment in &path.segments {
        data = match *segment {
            PathSegment::LineTo(p) => data.line_to(point_tuple(p)),
            PathSegment::QuadTo { control, to } => {
                data.quadratic_curve_to((point_tuple(control), point_tuple(to)))
            }
        };
    }
    data.close()
}

fn region_path_data(region: &FittedRegion) -> Data {
    let mut data = Data::new();
    data = append_subpath(data, &region.outer);
    for hole in &region.holes {
        data = append_subpath(data, hole);
    }
    data
}

fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Picks the fill color with the most total covered pixels across all
/// fitted regions, used for the background rectangle. Ties (equal total
/// pixel count) are broken by ascending palette index so the result is
/// independent of hash map iteration order.
fn most_frequent_color(regions: &[FittedRegion]) -> [u8; 3] {
    let mut totals: std::collections::HashMap<usize, (u64, [u8; 3])> = std::collections::HashMap::new();
    for region in regions {
        let entry = totals.entry(region.palette_index).or_insert((0, region.fill_rgb));
        entry.0 += region.pixel_count;
    }
    totals
        .into_iter()
        .max_by_key(|&(index, (count, _))| (count, std::cmp::Reverse(index)))
        .map(|(_, (_, rgb))| rgb)
        .unwrap_or([255, 255, 255])
}

/// Assembles the final SVG document from fitted regions, painted largest
/// first (ties broken by palette index) so smaller detail regions draw on
/// top of the coarse background fill they sit inside.
pub fn assemble(
    width: u32,
    height: u32,
    regions: &[FittedRegion],
    edge_overlay: Option<(&EdgeMask, &EdgeOverlayConfig)>,
) -> String {
    let background_rgb = most_frequent_color(regions);

    let mut ordered: Vec<&FittedRegion> = regions.iter().collect();
    ordered.sort_by(|a, b| {
        b.pixel_count
            .cmp(&a.pixel_count)
            .then(a.palette_index.cmp(&b.palette_index))
    });

    let mut document = Document::new()
        .set("xmlns", "http://www.w3.org/2000/svg")
        .set("viewBox", (0, 0, width, height))
        .set("width", width)
        .set("height", height);

    document = document.add(
        Rectangle::new()
            .set("x", 0)
            .set("y", 0)
            .set("width", width)
            .set("height", height)
            .set("fill", hex_color(background_rgb)),
    );

    for region in ordered {
        let data = region_path_data(region);
        document = document.add(
            SvgPath::new()
                .set("fill", hex_color(region.fill_rgb))
                .set("fill-rule", "nonzero")
                .set("d", data),
        );
    }

    if let Some((mask, overlay)) = edge_overlay {
        if let Some(data) = edge_overlay_data(mask) {
            document = document.add(
                SvgPath::new()
                    .set("fill", "none")
                    .set("stroke", "#000000")
                    .set("stroke-width", overlay.stroke_width)
                    .set("stroke-opacity", overlay.opacity)
                    .set("d", data),
            );
        }
    }

    document.to_string()
}

/// Draws every edge pixel as a 1x1 filled square subpath, cheap and
/// orientation-agnostic; good enough for a visual overlay, not meant to be
/// simplified or curve-fit.
fn edge_overlay_data(mask: &EdgeMask) -> Option<Data> {
    let mut data = Data::new();
    let mut any = false;
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if mask.is_edge(x, y) {
                any = true;
                data = data
                    .move_to((x as f64, y as f64))
                    .line_to((x as f64 + 1.0, y as f64))
                    .line_to((x as f64 + 1.0, y as f64 + 1.0))
                    .line_to((x as f64, y as f64 + 1.0))
                    .close();
            }
        }
    }
    any.then_some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_region(palette_index: usize, pixel_count: u64, fill_rgb: [u8; 3]) -> FittedRegion {
        let outer = Path {
            start: Point::new(0.0, 0.0),
            segments: vec![
                PathSegment::LineTo(Point::new(4.0, 0.0)),
                PathSegment::LineTo(Point::new(4.0, 4.0)),
                PathSegment::LineTo(Point::new(0.0, 4.0)),
            ],
        };
        FittedRegion { palette_index, pixel_count, fill_rgb, outer, holes: Vec::new() }
    }

    #[test]
    fn format_num_strips_trailing_zeros_and_point() {
        assert_eq!(format_num(3.0), "3");
        assert_eq!(format_num(3.5), "3.5");
        assert_eq!(format_num(3.456), "3.46");
        assert_eq!(format_num(-0.001), "0");
    }

    #[test]
    fn svg_contains_viewbox_and_region_paths() {
        let regions = vec![square_region(0, 16, [255, 0, 0])];
        let svg = assemble(4, 4, &regions, None);
        assert!(svg.contains("viewBox"));
        assert!(svg.contains("#ff0000"));
        assert!(svg.contains("fill-rule=\"nonzero\""));
    }

    #[test]
    fn larger_regions_paint_before_smaller_ones() {
        let small = square_region(1, 4, [0, 255, 0]);
        let large = square_region(0, 100, [0, 0, 255]);
        let svg = assemble(10, 10, &[small, large], None);
        let blue_pos = svg.find("#0000ff").unwrap();
        let green_pos = svg.find("#00ff00").unwrap();
        assert!(blue_pos < green_pos);
    }

    #[test]
    fn empty_edge_mask_adds_no_overlay_path() {
        let regions = vec![square_region(0, 16, [0, 0, 0])];
        let mask = EdgeMask::new(4, 4, vec![0; 16]);
        let overlay = EdgeOverlayConfig::default();
        let svg = assemble(4, 4, &regions, Some((&mask, &overlay)));
        assert!(!svg.contains("stroke"));
    }

    #[test]
    fn nonempty_edge_mask_adds_overlay_path() {
        let regions = vec![square_region(0, 16, [0, 0, 0])];
        let mut data = vec![0u8; 16];
        data[5] = 255;
        let mask = EdgeMask::new(4, 4, data);
        let overlay = EdgeOverlayConfig::default();
        let svg = assemble(4, 4, &regions, Some((&mask, &overlay)));
        assert!(svg.contains("stroke"));
    }

    #[test]
    fn background_tie_breaks_by_ascending_palette_index() {
        // Equal pixel counts: the lower palette index (red, index 0) must
        // win regardless of hash map iteration order.
        let red = square_region(0, 8, [255, 0, 0]);
        let blue = square_region(1, 8, [0, 0, 255]);
        assert_eq!(most_frequent_color(&[red.clone(), blue.clone()]), [255, 0, 0]);
        assert_eq!(most_frequent_color(&[blue, red]), [255, 0, 0]);
    }
}
