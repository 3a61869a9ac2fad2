//! Tests for region validation and parsing.

use landcover_common::region::{Coordinate, RegionCatalog};
use landcover_common::LandcoverError;

// ============================================================================
// validate tests
// ============================================================================

#[test]
fn test_validate_triangle() {
    let region =
        RegionCatalog::validate_tuples(&[(0.0, 0.0), (2.0, 0.0), (1.0, 2.0), (0.0, 0.0)]).unwrap();
    let bbox = region.bounding_box();
    assert_eq!(bbox.min_lon, 0.0);
    assert_eq!(bbox.min_lat, 0.0);
    assert_eq!(bbox.max_lon, 2.0);
    assert_eq!(bbox.max_lat, 2.0);
    assert!(region.contains(1.0, 0.5));
    assert!(!region.contains(0.1, 1.9));
}

#[test]
fn test_validate_concave_polygon() {
    // An L-shape is simple but not convex.
    let ring = [
        (0.0, 0.0),
        (2.0, 0.0),
        (2.0, 1.0),
        (1.0, 1.0),
        (1.0, 2.0),
        (0.0, 2.0),
        (0.0, 0.0),
    ];
    let region = RegionCatalog::validate_tuples(&ring).unwrap();
    assert!(region.contains(0.5, 1.5));
    assert!(!region.contains(1.5, 1.5));
    assert!((region.area_deg2() - 3.0).abs() < 1e-12);
}

#[test]
fn test_validate_too_few_positions() {
    let result = RegionCatalog::validate_tuples(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
    assert!(matches!(result, Err(LandcoverError::Geometry(_))));
}

#[test]
fn test_validate_out_of_domain() {
    let ring = [(170.0, 0.0), (190.0, 0.0), (190.0, 10.0), (170.0, 0.0)];
    let err = RegionCatalog::validate_tuples(&ring).unwrap_err();
    assert!(err.to_string().contains("outside the lon/lat domain"));
}

#[test]
fn test_validate_non_finite() {
    let ring = [
        Coordinate::new(0.0, 0.0),
        Coordinate::new(f64::NAN, 0.0),
        Coordinate::new(1.0, 1.0),
        Coordinate::new(0.0, 0.0),
    ];
    assert!(RegionCatalog::validate(&ring).is_err());
}

#[test]
fn test_validate_figure_eight_touching_vertex() {
    // Ring passes through (1, 1) twice: two lobes touching at one point.
    let ring = [
        (0.0, 0.0),
        (1.0, 1.0),
        (2.0, 0.0),
        (2.0, 2.0),
        (1.0, 1.0),
        (0.0, 2.0),
        (0.0, 0.0),
    ];
    assert!(RegionCatalog::validate_tuples(&ring).is_err());
}

#[test]
fn test_geometry_errors_are_fatal() {
    let err = RegionCatalog::validate_tuples(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
        .unwrap_err();
    assert!(err.is_fatal());
}

// ============================================================================
// Parsing tests
// ============================================================================

#[test]
fn test_from_coordinate_list_auto_closes() {
    let region = RegionCatalog::from_coordinate_list("-60,-10 -50,-10 -50,-5; -60,-5").unwrap();
    assert_eq!(region.ring().len(), 5);
    assert_eq!(region.bounding_box().as_tuple(), (-60.0, -10.0, -50.0, -5.0));
}

#[test]
fn test_from_coordinate_list_invalid_pair() {
    assert!(RegionCatalog::from_coordinate_list("-60 -50,-10").is_err());
    assert!(RegionCatalog::from_coordinate_list("a,b 1,1 2,2").is_err());
}

#[test]
fn test_from_geojson_polygon() {
    let json = r#"{
        "type": "Polygon",
        "coordinates": [[[-47.0, -15.0], [-46.0, -15.0], [-46.0, -14.0], [-47.0, -14.0], [-47.0, -15.0]]]
    }"#;
    let region = RegionCatalog::from_geojson(json).unwrap();
    assert!(region.contains(-46.5, -14.5));
}

#[test]
fn test_from_geojson_feature_collection() {
    let json = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "roi"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
            }
        }]
    }"#;
    let region = RegionCatalog::from_geojson(json).unwrap();
    assert_eq!(region.bounding_box().as_tuple(), (0.0, 0.0, 1.0, 1.0));
}

#[test]
fn test_from_geojson_rejects_point() {
    let json = r#"{"type": "Point", "coordinates": [0, 0]}"#;
    let err = RegionCatalog::from_geojson(json).unwrap_err();
    assert!(err.to_string().contains("unsupported geometry type"));
}

#[test]
fn test_from_geojson_open_ring() {
    let json = r#"{"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]}"#;
    assert!(matches!(
        RegionCatalog::from_geojson(json),
        Err(LandcoverError::Geometry(_))
    ));
}

// ============================================================================
// bounding box regions
// ============================================================================

#[test]
fn test_region_from_bbox_csv() {
    // Brazilian Cerrado
    let region = RegionCatalog::from_bbox_csv("-60.0, -24.0, -41.0, -2.0").unwrap();
    assert_eq!(region.bounding_box().as_tuple(), (-60.0, -24.0, -41.0, -2.0));
    assert!(region.contains(-47.9, -15.8));
    assert!(!region.contains(-38.5, -12.9));
}

#[test]
fn test_region_from_inverted_bbox_rejected() {
    let err = RegionCatalog::from_bbox_csv("10,10,5,5").unwrap_err();
    assert!(matches!(err, LandcoverError::Geometry(_)));
    assert!(RegionCatalog::from_bbox_csv("1,2,3").is_err());
}
