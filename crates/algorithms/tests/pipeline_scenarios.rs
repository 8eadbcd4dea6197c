//! End-to-end mapping scenarios on synthetic administrative units.
//!
//! Units are unit squares so that every station's owner is obvious:
//!
//! ```text
//!   Papua Barat                       Maluku
//!   [0,1]x[0,1] Kabupaten Manokwari   [3,4]x[0,1] Kota Ambon
//!   [1,2]x[0,1] Kota Sorong
//! ```

use std::sync::Arc;

use approx::assert_relative_eq;
use geo::{polygon, MultiPolygon};
use staklim_algorithms::interpolation::{distinct_values, idw, IdwParams, SpatialCache};
use staklim_algorithms::pipeline::{InterpolationPath, MapEngine};
use staklim_algorithms::region::{AdminLevel, RegionCount};
use staklim_core::config::{FieldKind, ProductKind, RegionQuery, ResampleMethod, RunConfig};
use staklim_core::{AdminUnit, BoundingBox, Error, RegionSet, StationTable};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn square(province: &str, regency: &str, x0: f64) -> AdminUnit {
    let p = polygon![
        (x: x0, y: 0.0),
        (x: x0 + 1.0, y: 0.0),
        (x: x0 + 1.0, y: 1.0),
        (x: x0, y: 1.0),
        (x: x0, y: 0.0)
    ];
    AdminUnit::new(province, regency, MultiPolygon(vec![p]))
}

fn boundaries() -> RegionSet {
    RegionSet::new(vec![
        square("Papua Barat", "Kabupaten Manokwari", 0.0),
        square("Papua Barat", "Kota Sorong", 1.0),
        square("Maluku", "Kota Ambon", 3.0),
    ])
}

fn config() -> RunConfig {
    let mut cfg = RunConfig::default();
    cfg.interpolation.cell_size = 0.1;
    cfg.region = RegionQuery::parse("Papua Barat");
    cfg
}

fn table(rows: &[(f64, f64, f64)], column: &str) -> StationTable {
    StationTable::new(rows.iter().map(|r| r.0).collect(), rows.iter().map(|r| r.1).collect())
        .unwrap()
        .with_column(column, rows.iter().map(|r| r.2).collect())
        .unwrap()
}

/// Twelve stations spread over both Papua Barat units.
fn continuous_stations() -> StationTable {
    let rows: Vec<(f64, f64, f64)> = (0..12)
        .map(|i| {
            let x = 0.15 + 0.15 * i as f64;
            let y = if i % 2 == 0 { 0.25 } else { 0.75 };
            (x, y, 40.0 + 35.0 * i as f64)
        })
        .collect();
    table(&rows, "CH")
}

fn assert_totals_consistent(counts: &std::collections::BTreeMap<String, RegionCount>) {
    for (name, c) in counts {
        assert_eq!(c.category_sum(), c.total(), "{name}");
    }
}

#[test]
fn basemap_selection_and_title() {
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    assert_eq!(basemap.level, AdminLevel::Province);
    assert_eq!(basemap.title, "Provinsi Papua Barat");
    assert_eq!(basemap.main.len(), 2);
    assert_eq!(basemap.others.as_ref().map(RegionSet::len), Some(1));

    let again = engine.basemap().unwrap();
    assert!(Arc::ptr_eq(&basemap, &again));
    engine.clear_region_cache().unwrap();
    assert!(engine.region_cache().is_empty());
}

#[test]
fn monthly_counts_scenario() {
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    let stations = table(&[(0.2, 0.2, 50.0), (0.5, 0.5, 250.0), (0.8, 0.2, 600.0)], "CH");

    let result = engine.interpolate(stations, "CH", &basemap.main, None).unwrap();
    let manokwari = &result.counts.by_regency["Kabupaten Manokwari"];
    let map = manokwari.to_map();
    assert_eq!(map["Rendah"], 1);
    assert_eq!(map["Menengah"], 1);
    assert_eq!(map["Tinggi"], 0);
    assert_eq!(map["Sangat Tinggi"], 1);
    assert_eq!(map["total"], 3);

    assert_eq!(result.counts.by_province["Papua Barat"].total(), 3);
    assert!(!result.counts.by_regency.contains_key("Kota Sorong"));
    assert_totals_consistent(&result.counts.by_province);
    assert_totals_consistent(&result.counts.by_regency);
}

#[test]
fn discrete_field_uses_nearest_station() {
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    let stations = table(
        &[(0.2, 0.2, 1.0), (0.7, 0.8, 2.0), (1.3, 0.4, 3.0), (1.8, 0.9, 1.0)],
        "CH",
    );

    let result = engine.interpolate(stations, "CH", &basemap.main, None).unwrap();
    assert!(result.field.discrete);
    assert_eq!(result.field.path, InterpolationPath::NearestStation);
    assert_eq!(result.levels, vec![1.0, 2.0, 3.0]);

    let inputs = [1.0, 2.0, 3.0];
    let finite: Vec<f64> = result.field.raster.data().iter().copied().filter(|v| v.is_finite()).collect();
    assert!(!finite.is_empty());
    assert!(finite.iter().all(|v| inputs.contains(v)));
}

#[test]
fn continuous_field_uses_idw() {
    init_logging();
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    let stations = continuous_stations();
    let values = stations.column("CH").unwrap().to_vec();
    let (lo, hi) = (values[0], values[values.len() - 1]);

    let result = engine.interpolate(stations, "CH", &basemap.main, None).unwrap();
    assert!(!result.field.discrete);
    assert_eq!(result.field.path, InterpolationPath::Idw);
    assert_eq!(result.stations_used, 12);
    assert!(!result.fell_back);

    let stats = result.field.raster.statistics();
    let (min, max) = (stats.min.unwrap(), stats.max.unwrap());
    assert!(min >= lo - 1e-9 && max <= hi + 1e-9);

    assert_eq!(result.levels.len(), 10);
    assert_relative_eq!(result.levels[0], min);
    assert_relative_eq!(result.levels[9], max);
    assert_totals_consistent(&result.counts.by_regency);
    assert_eq!(result.counts.by_province["Papua Barat"].total(), 12);
}

#[test]
fn supplied_levels_are_kept() {
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    let levels = engine.preset_levels().unwrap();

    let result = engine
        .interpolate(continuous_stations(), "CH", &basemap.main, Some(levels.as_slice()))
        .unwrap();
    assert_eq!(result.levels, levels);
}

#[test]
fn other_field_counts_against_levels() {
    let mut cfg = config();
    cfg.field = FieldKind::Other;
    let engine = MapEngine::new(boundaries(), cfg);
    let basemap = engine.basemap().unwrap();

    let result = engine
        .interpolate(continuous_stations(), "CH", &basemap.main, Some(&[0.0, 200.0, 400.0][..]))
        .unwrap();
    let province = &result.counts.by_province["Papua Barat"];
    // values 40, 75, ..., 425
    assert_eq!(province.get("0-200"), Some(5));
    assert_eq!(province.get("200-400"), Some(6));
    assert_eq!(province.get(">=400"), Some(1));
    assert_eq!(province.total(), 12);
}

#[test]
fn spatial_cache_is_reused_and_cleared() {
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();

    engine.interpolate(continuous_stations(), "CH", &basemap.main, None).unwrap();
    assert_eq!(engine.spatial_cache().stats(), (0, 1));

    engine.interpolate(continuous_stations(), "CH", &basemap.main, None).unwrap();
    assert_eq!(engine.spatial_cache().stats(), (1, 1));

    engine.clear_spatial_cache().unwrap();
    assert!(engine.spatial_cache().is_empty());
    engine.interpolate(continuous_stations(), "CH", &basemap.main, None).unwrap();
    assert_eq!(engine.spatial_cache().stats(), (1, 2));
}

#[test]
fn interpolate_many_shares_the_spatial_entry() {
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    let stations = continuous_stations();
    let doubled: Vec<f64> = stations.column("CH").unwrap().iter().map(|v| v * 2.0).collect();
    let stations = stations.with_column("a150", doubled).unwrap();

    let results = engine
        .interpolate_many(stations, &["CH", "a150"], &basemap.main, None)
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "CH");
    assert_eq!(results[1].0, "a150");
    assert_eq!(engine.spatial_cache().stats(), (1, 1));

    // IDW is linear in the values
    let a = results[0].1.field.raster.data();
    let b = results[1].1.field.raster.data();
    for (x, y) in a.iter().zip(b.iter()) {
        if x.is_finite() {
            assert_relative_eq!(*y, 2.0 * x, epsilon = 1e-9);
        }
    }
}

#[test]
fn identical_content_gives_identical_field() {
    let bounds = BoundingBox::new(0.0, 0.0, 2.0, 1.0);
    let stations = continuous_stations();
    let values = stations.column("CH").unwrap().to_vec();
    let lons_a = stations.lons().to_vec();
    let lats_a = stations.lats().to_vec();
    let lons_b: Vec<f64> = lons_a.iter().map(|v| v + 0.0).collect();
    let lats_b: Vec<f64> = lats_a.clone();

    let shared = SpatialCache::with_cell_size(0.1);
    let a = shared.get_spatial(&bounds, &lons_a, &lats_a, 6).unwrap();
    let b = shared.get_spatial(&bounds, &lons_b, &lats_b, 6).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let fresh = SpatialCache::with_cell_size(0.1);
    let c = fresh.get_spatial(&bounds, &lons_b, &lats_b, 6).unwrap();
    let fa = idw(&a, &values, IdwParams::default()).unwrap();
    let fc = idw(&c, &values, IdwParams::default()).unwrap();
    assert_eq!(fa.data(), fc.data());
}

#[test]
fn gridded_source_is_resampled() {
    let mut cfg = config();
    cfg.interpolation.resample_method = Some(ResampleMethod::Linear);
    let engine = MapEngine::new(boundaries(), cfg);
    let basemap = engine.basemap().unwrap();

    let mut rows = Vec::new();
    for j in 0..3 {
        for i in 0..5 {
            let (x, y) = (0.5 * i as f64, 0.5 * j as f64);
            rows.push((x, y, 10.0 * x + 100.0 * y));
        }
    }
    let result = engine.interpolate(table(&rows, "CH"), "CH", &basemap.main, None).unwrap();
    assert_eq!(result.field.path, InterpolationPath::Resample(ResampleMethod::Linear));

    // bilinear reproduces a plane
    let raster = &result.field.raster;
    let (r, c) = raster.shape();
    for row in 0..r {
        for col in 0..c {
            let v = raster.get(row, col).unwrap();
            if v.is_finite() {
                let (x, y) = raster.pixel_to_geo(col, row);
                assert_relative_eq!(v, 10.0 * x + 100.0 * y, epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn outside_stations_fall_back_or_fail() {
    init_logging();
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    let ambon = table(&[(3.2, 0.2, 1.0), (3.5, 0.5, 2.0), (3.8, 0.8, 3.0)], "CH");

    let result = engine.interpolate(ambon.clone(), "CH", &basemap.main, None).unwrap();
    assert!(result.fell_back);
    assert_eq!(result.stations_used, 3);
    assert!(result.counts.by_province.is_empty());

    let mut strict = config();
    strict.interpolation.strict_clip = true;
    let engine = MapEngine::new(boundaries(), strict);
    let err = engine.interpolate(ambon, "CH", &basemap.main, None).unwrap_err();
    assert!(err.is_insufficient_stations());
}

#[test]
fn too_few_stations_for_idw() {
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    let rows: Vec<(f64, f64, f64)> = (0..11).map(|i| (0.05 + 0.08 * i as f64, 0.5, i as f64 * 1.5)).collect();
    // 11 distinct values is continuous, and 11 stations cover k = 6
    assert!(engine.interpolate(table(&rows, "CH"), "CH", &basemap.main, None).is_ok());

    let mut cfg = config();
    cfg.interpolation.neighbors = 20;
    let engine = MapEngine::new(boundaries(), cfg);
    let err = engine.interpolate(table(&rows, "CH"), "CH", &basemap.main, None).unwrap_err();
    assert!(matches!(err, Error::InsufficientStations { required: 20, available: 11 }));
}

#[test]
fn unknown_column_is_configuration_error() {
    let engine = MapEngine::new(boundaries(), config());
    let basemap = engine.basemap().unwrap();
    let err = engine
        .interpolate(continuous_stations(), "SH", &basemap.main, None)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn dry_day_classes_are_counted_by_value() {
    let mut cfg = config();
    cfg.product = ProductKind::DryDays;
    let engine = MapEngine::new(boundaries(), cfg);
    let basemap = engine.basemap().unwrap();
    let stations = table(
        &[(0.2, 0.2, 1.0), (0.4, 0.6, 3.0), (0.8, 0.3, 3.0), (1.5, 0.5, 7.0)],
        "INDEKS_HTH",
    );

    let by_value = engine.count_by_value(stations.clone(), "INDEKS_HTH", &basemap.main).unwrap();
    let province = &by_value.by_province["Papua Barat"];
    assert_eq!(province.get("1"), Some(1));
    assert_eq!(province.get("3"), Some(2));
    assert_eq!(province.get("7"), Some(1));
    assert_eq!(province.total(), 4);

    let result = engine.interpolate(stations, "INDEKS_HTH", &basemap.main, None).unwrap();
    assert_eq!(result.counts, by_value);
    assert_eq!(distinct_values(&result.levels), vec![1.0, 3.0, 7.0]);
}
