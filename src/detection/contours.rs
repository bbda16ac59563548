use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

use crate::models::Contour;

/// Outermost borders of the foreground blobs (holes and nested blobs skipped).
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(Contour::from)
        .collect()
}

/// Every border in the image: outer borders and hole borders at all depths.
pub fn find_all_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .map(Contour::from)
        .collect()
}

/// Sort by enclosed area, largest first, and keep the first `keep`.
/// Equal areas keep their discovery order.
pub fn rank_by_area(mut contours: Vec<Contour>, keep: usize) -> Vec<Contour> {
    contours.sort_by(|a, b| b.area().total_cmp(&a.area()));
    contours.truncate(keep);
    contours
}

fn squared_distance(a: Point<i32>, b: Point<i32>) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

fn farthest_from(points: &[Point<i32>], origin: Point<i32>) -> usize {
    let mut best = 0;
    let mut best_distance = -1;
    for (i, &p) in points.iter().enumerate() {
        let d = squared_distance(p, origin);
        if d > best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

/// Simplify a closed curve to a polygon whose edges stay within `epsilon`
/// of the curve.
///
/// The curve is cut at two mutually distant points and each half is
/// simplified separately, so the result does not depend on where the
/// tracing started. The returned vertices are not closed (first != last).
pub fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let epsilon = epsilon.max(f64::EPSILON);
    let a = farthest_from(points, points[0]);
    let b = farthest_from(points, points[a]);
    if a == b {
        return vec![points[a]];
    }
    let (start, end) = if a < b { (a, b) } else { (b, a) };

    let forward = &points[start..=end];
    let backward: Vec<Point<i32>> = points[end..]
        .iter()
        .chain(points[..=start].iter())
        .copied()
        .collect();

    let mut vertices = approximate_polygon_dp(forward, epsilon, false);
    vertices.pop();
    vertices.extend(approximate_polygon_dp(&backward, epsilon, false));
    vertices.pop();
    vertices.dedup();
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    fn contour_with_area(side: i32) -> Contour {
        Contour::new(vec![
            Point::new(0, 0),
            Point::new(side, 0),
            Point::new(side, side),
            Point::new(0, side),
        ])
    }

    #[test]
    fn ranking_sorts_descending_and_truncates() {
        let contours = [3, 9, 1, 7, 5, 2].map(contour_with_area).to_vec();
        let ranked = rank_by_area(contours, 4);
        let areas: Vec<f64> = ranked.iter().map(|c| c.area()).collect();
        assert_eq!(areas, vec![81.0, 49.0, 25.0, 9.0]);
    }

    #[test]
    fn external_contours_skip_holes() {
        let mut mask = GrayImage::new(40, 40);
        draw_filled_rect_mut(&mut mask, Rect::at(5, 5).of_size(30, 30), Luma([255]));
        draw_filled_rect_mut(&mut mask, Rect::at(12, 12).of_size(10, 10), Luma([0]));
        draw_filled_rect_mut(&mut mask, Rect::at(15, 15).of_size(3, 3), Luma([255]));

        let external = find_external_contours(&mask);
        assert_eq!(external.len(), 1);
        assert_eq!(external[0].bounding_box(), crate::BoundingBox::new(5, 5, 30, 30));
        assert!(find_all_contours(&mask).len() >= 3);
    }

    #[test]
    fn traced_rectangle_simplifies_to_four_vertices() {
        let mut mask = GrayImage::new(120, 60);
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(90, 30), Luma([255]));
        let contour = find_external_contours(&mask).remove(0);
        let eps = 0.018 * contour.perimeter();
        let polygon = approximate_closed_polygon(&contour.points, eps);
        assert_eq!(polygon.len(), 4);
    }

    #[test]
    fn traced_circle_needs_more_than_four_vertices() {
        let mut mask = GrayImage::new(120, 120);
        draw_filled_circle_mut(&mut mask, (60, 60), 40, Luma([255]));
        let contour = find_external_contours(&mask).remove(0);
        let eps = 0.018 * contour.perimeter();
        let polygon = approximate_closed_polygon(&contour.points, eps);
        assert!(polygon.len() > 4, "got {} vertices", polygon.len());
    }
}
