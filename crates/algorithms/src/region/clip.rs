//! Clipping to administrative boundaries
//!
//! Points are kept when they intersect any unit (boundary included).
//! Raster cells are kept when their centre falls inside a unit polygon,
//! decided per row with an even-odd scanline over the polygon rings.

use geo::{BoundingRect, Intersects, LineString, Polygon};
use staklim_core::raster::Raster;
use staklim_core::{Error, LocatedStations, RegionSet, Result};
use tracing::warn;

/// Result of [`clip_points_or_fallback`]
#[derive(Debug, Clone)]
pub struct ClippedStations {
    pub stations: LocatedStations,
    /// True when nothing fell inside the region and the unclipped set
    /// was returned instead.
    pub fell_back: bool,
}

/// Stations intersecting any unit of `region`, in input order.
pub fn clip_points(stations: &LocatedStations, region: &RegionSet) -> LocatedStations {
    let rects: Vec<_> = region.iter().map(|u| u.geometry.bounding_rect()).collect();

    let keep: Vec<usize> = stations
        .points()
        .iter()
        .enumerate()
        .filter(|&(_, p)| {
            region.iter().zip(&rects).any(|(unit, rect)| {
                rect.is_some_and(|r| r.intersects(&p.0)) && unit.geometry.intersects(&p.0)
            })
        })
        .map(|(i, _)| i)
        .collect();

    stations.select(&keep)
}

/// Clip, and fall back to the full set with a warning when the clip is
/// empty. With `strict` an empty clip is [`Error::InsufficientStations`].
pub fn clip_points_or_fallback(
    stations: &LocatedStations,
    region: &RegionSet,
    strict: bool,
) -> Result<ClippedStations> {
    let clipped = clip_points(stations, region);
    if !clipped.is_empty() {
        return Ok(ClippedStations {
            stations: clipped,
            fell_back: false,
        });
    }

    if strict {
        return Err(Error::InsufficientStations {
            required: 1,
            available: 0,
        });
    }

    warn!(
        stations = stations.len(),
        units = region.len(),
        "no station inside the region; using the unclipped set"
    );
    Ok(ClippedStations {
        stations: stations.clone(),
        fell_back: true,
    })
}

/// Crossing abscissae of a horizontal line `y` with a ring, using the
/// half-open rule `(yi > y) != (yj > y)`.
fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for seg in ring.lines() {
        let (a, b) = (seg.start, seg.end);
        if (a.y > y) != (b.y > y) {
            out.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
}

/// Mark the columns of one row whose centres lie inside `poly`.
fn mark_row(poly: &Polygon<f64>, y: f64, xs: &[f64], mask: &mut [bool], crossings: &mut Vec<f64>) {
    crossings.clear();
    ring_crossings(poly.exterior(), y, crossings);
    for hole in poly.interiors() {
        ring_crossings(hole, y, crossings);
    }
    if crossings.len() < 2 {
        return;
    }
    crossings.sort_by(f64::total_cmp);

    // Inside on [c0, c1), [c2, c3), ...
    for pair in crossings.chunks_exact(2) {
        let start = xs.partition_point(|&x| x < pair[0]);
        let end = xs.partition_point(|&x| x < pair[1]);
        for m in &mut mask[start..end] {
            *m = true;
        }
    }
}

/// Set every cell whose centre lies outside all units to NaN.
///
/// Returns a new raster with the same shape and transform.
pub fn clip_raster(raster: &Raster<f64>, region: &RegionSet) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    if region.is_empty() {
        return Err(Error::config("cannot clip to an empty region set"));
    }

    let xs: Vec<f64> = (0..cols).map(|c| raster.pixel_to_geo(c, 0).0).collect();
    let descending = xs.windows(2).any(|w| w[0] > w[1]);
    if descending {
        return Err(Error::Algorithm("raster columns must run west to east".into()));
    }

    let polygons: Vec<(&Polygon<f64>, f64, f64)> = region
        .iter()
        .flat_map(|u| u.geometry.0.iter())
        .filter_map(|p| p.bounding_rect().map(|r| (p, r.min().y, r.max().y)))
        .collect();

    let mut out = raster.clone();
    let mut mask = vec![false; cols];
    let mut crossings = Vec::new();

    for row in 0..rows {
        let y = raster.pixel_to_geo(0, row).1;
        mask.iter_mut().for_each(|m| *m = false);
        for &(poly, min_y, max_y) in &polygons {
            if y < min_y || y > max_y {
                continue;
            }
            mark_row(poly, y, &xs, &mut mask, &mut crossings);
        }
        for (col, &inside) in mask.iter().enumerate() {
            if !inside {
                out.set(row, col, f64::NAN)?;
            }
        }
    }

    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use staklim_core::{AdminUnit, BoundingBox, StationObservation, StationTable};

    fn unit_square() -> RegionSet {
        RegionSet::new(vec![AdminUnit::new(
            "P",
            "A",
            BoundingBox::new(0.0, 0.0, 1.0, 1.0).to_polygon(),
        )])
    }

    fn stations(points: &[(f64, f64)]) -> LocatedStations {
        let obs: Vec<_> = points
            .iter()
            .map(|&(x, y)| StationObservation::new(x, y, 1.0))
            .collect();
        StationTable::from_observations(&obs, "CH").unwrap().into()
    }

    #[test]
    fn test_clip_points_keeps_inside_and_boundary() {
        let s = stations(&[(0.5, 0.5), (2.0, 2.0), (1.0, 0.5)]);
        let c = clip_points(&s, &unit_square());
        assert_eq!(c.len(), 2);
        assert_eq!(c.table().lons(), &[0.5, 1.0]);
    }

    #[test]
    fn test_fallback_when_empty() {
        let s = stations(&[(5.0, 5.0), (6.0, 6.0)]);
        let r = clip_points_or_fallback(&s, &unit_square(), false).unwrap();
        assert!(r.fell_back);
        assert_eq!(r.stations.len(), 2);

        let strict = clip_points_or_fallback(&s, &unit_square(), true);
        assert!(strict.unwrap_err().is_insufficient_stations());
    }

    #[test]
    fn test_clip_raster_square() {
        let grid = crate::interpolation::GridTemplate::with_cell_size(BoundingBox::new(-1.0, -1.0, 2.0, 2.0), 0.5)
            .unwrap();
        let raster = grid.raster_from_vec(vec![1.0; grid.len()]).unwrap();
        let clipped = clip_raster(&raster, &unit_square()).unwrap();

        for (row, &y) in grid.y_axis().iter().enumerate() {
            for (col, &x) in grid.x_axis().iter().enumerate() {
                let v = clipped.get(row, col).unwrap();
                if x > 0.0 && x < 1.0 && y > 0.0 && y < 1.0 {
                    assert_eq!(v, 1.0, "({x}, {y})");
                }
                if x < 0.0 || x > 1.0 || y < 0.0 || y > 1.0 {
                    assert!(v.is_nan(), "({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_clip_raster_hole() {
        let donut = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0), (x: 1.0, y: 1.0)]]
        );
        let region = RegionSet::new(vec![AdminUnit::new("P", "D", MultiPolygon::new(vec![donut]))]);
        let grid = crate::interpolation::GridTemplate::with_cell_size(BoundingBox::new(0.0, 0.0, 4.0, 4.0), 0.5)
            .unwrap();
        let raster = grid.raster_from_vec(vec![7.0; grid.len()]).unwrap();
        let clipped = clip_raster(&raster, &region).unwrap();

        // (2, 2) in the hole, (0.5, 0.5) in the ring
        assert!(clipped.get(4, 4).unwrap().is_nan());
        assert_eq!(clipped.get(1, 1).unwrap(), 7.0);
    }

    #[test]
    fn test_clip_raster_two_units() {
        let region = RegionSet::new(vec![
            AdminUnit::new("P", "A", BoundingBox::new(0.0, 0.0, 1.0, 1.0).to_polygon()),
            AdminUnit::new("P", "B", BoundingBox::new(2.0, 0.0, 3.0, 1.0).to_polygon()),
        ]);
        let grid = crate::interpolation::GridTemplate::with_cell_size(BoundingBox::new(0.0, 0.0, 3.0, 1.0), 0.5)
            .unwrap();
        let raster = grid.raster_from_vec(vec![1.0; grid.len()]).unwrap();
        let clipped = clip_raster(&raster, &region).unwrap();
        // Row 1 is y = 0.5; x = 0.5 and 2.5 inside, 1.5 outside
        assert_eq!(clipped.get(1, 1).unwrap(), 1.0);
        assert!(clipped.get(1, 3).unwrap().is_nan());
        assert_eq!(clipped.get(1, 5).unwrap(), 1.0);
    }
}
