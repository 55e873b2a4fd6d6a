use domain::{Coordinates, cumulative_distance_km};

fn approx(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() <= tolerance
}

#[test]
fn distance_to_self_is_zero() {
    let points = [
        Coordinates::new(0.0, 0.0),
        Coordinates::new(18.5204, 73.8567),
        Coordinates::new(-33.8688, 151.2093),
    ];
    for point in points {
        assert_eq!(point.distance_km(&point), 0.0);
    }
}

#[test]
fn distance_is_symmetric() {
    let a = Coordinates::new(18.5204, 73.8567);
    let b = Coordinates::new(19.0760, 72.8777);
    assert_eq!(a.distance_km(&b), b.distance_km(&a));
}

#[test]
fn one_degree_longitude_at_equator() {
    let a = Coordinates::new(0.0, 0.0);
    let b = Coordinates::new(0.0, 1.0);
    let d = a.distance_km(&b);
    assert!(approx(d, 111.19, 111.19 * 0.005), "got {d}");
}

#[test]
fn cumulative_distance_sums_consecutive_legs() {
    let path = [
        Coordinates::new(0.0, 0.0),
        Coordinates::new(0.0, 1.0),
        Coordinates::new(1.0, 1.0),
    ];
    let expected = path[0].distance_km(&path[1]) + path[1].distance_km(&path[2]);
    let shortcut = path[0].distance_km(&path[2]);
    let total = cumulative_distance_km(&path);
    assert!(approx(total, expected, 1e-9));
    assert!(total > shortcut);
}

#[test]
fn cumulative_distance_of_short_paths_is_zero() {
    assert_eq!(cumulative_distance_km(&[]), 0.0);
    assert_eq!(cumulative_distance_km(&[Coordinates::new(10.0, 10.0)]), 0.0);
}

#[test]
fn fixed_point_conversion() {
    let c = Coordinates::from_fixed(18_520_400, 73_856_700, 1_000_000.0);
    assert!(approx(c.latitude, 18.5204, 1e-9));
    assert!(approx(c.longitude, 73.8567, 1e-9));
}
