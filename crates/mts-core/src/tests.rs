//! Unit tests for mts-core primitives.

#[cfg(test)]
mod ids {
    use crate::{EdgeId, NodeId, VehicleId};

    #[test]
    fn index_roundtrip() {
        let id = VehicleId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(VehicleId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_sentinels() {
        assert_eq!(NodeId::INVALID.0, u32::MAX);
        assert!(!EdgeId::default().is_valid());
        assert!(EdgeId(0).is_valid());
    }

    #[test]
    fn display() {
        assert_eq!(VehicleId(7).to_string(), "VehicleId(7)");
    }
}

#[cfg(test)]
mod geo {
    use std::f64::consts::PI;

    use crate::{GeoPoint, Vec2d, sort_by_bearing};

    const N: Vec2d = Vec2d::new(0.0, 1.0);
    const E: Vec2d = Vec2d::new(1.0, 0.0);
    const S: Vec2d = Vec2d::new(0.0, -1.0);
    const W: Vec2d = Vec2d::new(-1.0, 0.0);

    #[test]
    fn clockwise_sort_from_north() {
        let order = sort_by_bearing(N, &[W, S, E, N], true);
        assert_eq!(order, vec![3, 2, 1, 0]); // N, E, S, W
    }

    #[test]
    fn counter_clockwise_sort_from_north() {
        let order = sort_by_bearing(N, &[W, S, E, N], false);
        assert_eq!(order, vec![3, 0, 1, 2]); // N, W, S, E
    }

    #[test]
    fn angle_is_mirrored_by_rotation() {
        let cw  = E.angle_from(N, true);
        let ccw = E.angle_from(N, false);
        assert!((cw - PI / 2.0).abs() < 1e-12);
        assert!((ccw - 3.0 * PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn same_bearing_ignores_length() {
        assert!(Vec2d::new(0.0, 3.0).same_bearing(N));
        assert!(!N.same_bearing(-N));
    }

    #[test]
    fn one_degree_latitude() {
        let a = GeoPoint::new(48.0, 9.0);
        let b = GeoPoint::new(49.0, 9.0);
        let d = a.distance_m(b);
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
        assert_eq!(a.direction_to(b), Vec2d::new(0.0, 1.0));
    }
}

#[cfg(test)]
mod time {
    use std::time::Duration;

    use crate::Tick;
    use crate::time::tick_period;

    #[test]
    fn tick_arithmetic() {
        let t = Tick(10);
        assert_eq!(t + 5, Tick(15));
        assert_eq!(t.next(), Tick(11));
        assert_eq!(Tick(15) - Tick(10), 5u64);
        assert_eq!(t.to_string(), "T10");
    }

    #[test]
    fn speedup_to_period() {
        assert_eq!(tick_period(1), Some(Duration::from_millis(1000)));
        assert_eq!(tick_period(4), Some(Duration::from_millis(250)));
        assert_eq!(tick_period(0), None);
        assert_eq!(tick_period(-3), None);
    }
}

#[cfg(test)]
mod rng {
    use crate::{EntityRng, NodeId, SimRng, VehicleId};

    #[test]
    fn entity_streams_are_reproducible() {
        let mut a = EntityRng::for_node(42, NodeId(3));
        let mut b = EntityRng::for_node(42, NodeId(3));
        for _ in 0..32 {
            assert_eq!(a.gen_range(0..1000u32), b.gen_range(0..1000u32));
        }
    }

    #[test]
    fn node_and_vehicle_streams_differ() {
        let a = EntityRng::for_node(42, NodeId(3));
        let b = EntityRng::for_vehicle(42, VehicleId(3));
        assert_ne!(a.seed(), b.seed());
    }

    #[test]
    fn reset_rewinds() {
        let mut rng = EntityRng::for_vehicle(7, VehicleId(1));
        let first: Vec<u32> = (0..8).map(|_| rng.gen_range(0..100)).collect();
        rng.reset();
        let again: Vec<u32> = (0..8).map(|_| rng.gen_range(0..100)).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn gen_bool_extremes() {
        let mut rng = EntityRng::new(0, 0);
        assert!(rng.gen_bool(1.5));
        assert!(!rng.gen_bool(-0.5));
    }

    #[test]
    fn sim_rng_children_are_reproducible() {
        let mut a = SimRng::new(1);
        let mut b = SimRng::new(1);
        let mut ca = a.child(3);
        let mut cb = b.child(3);
        for _ in 0..16 {
            assert_eq!(ca.gen_range(0..1000u32), cb.gen_range(0..1000u32));
        }
        // The parents stay in step after forking.
        assert_eq!(a.gen_range(0..u64::MAX), b.gen_range(0..u64::MAX));
    }
}

#[cfg(test)]
mod config {
    use crate::{RoadClass, SimulationConfig, StreetPriority};

    #[test]
    fn defaults_validate() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.meters_per_cell, 7.5);
        assert_eq!(config.global_max_velocity, 6);
        assert!(config.crossing_logic.driving_on_the_right);
        assert!(!config.crossing_logic.only_one_vehicle);
    }

    #[test]
    fn rejects_bad_factors() {
        let mut config = SimulationConfig::default();
        config.vehicles.dash_factor = 0.9;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.multi_threading.vehicles_per_runnable = 0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.meters_per_cell = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn cell_count_is_clamped() {
        let config = SimulationConfig::default();
        assert_eq!(config.cell_count(75.0), 10);
        assert_eq!(config.cell_count(76.0), 11);
        assert_eq!(config.cell_count(0.0), 1);
        assert_eq!(config.cell_count(-5.0), 1);
    }

    #[test]
    fn cells_per_tick_is_clamped() {
        let config = SimulationConfig::default();
        // 50 km/h / 3.6 / 7.5 ≈ 1.85 → 2
        assert_eq!(config.cells_per_tick(50.0), 2);
        assert_eq!(config.cells_per_tick(5.0), 1);
        assert_eq!(config.cells_per_tick(0.0), 1);
        // 300 km/h would be 11 cells/tick, capped by global_max_velocity.
        assert_eq!(config.cells_per_tick(300.0), 6);
    }

    #[test]
    fn conditional_dawdle() {
        let mut config = SimulationConfig::default();
        config.vehicles.dawdle_factor = 0.2;
        config.vehicles.dash_factor = 0.5;
        assert!((config.vehicles.conditional_dawdle() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn street_priority_levels() {
        let motorway = StreetPriority::new(RoadClass::Motorway).level();
        let motorway_link = StreetPriority::new(RoadClass::Motorway).link().level();
        let residential = StreetPriority::new(RoadClass::Residential).level();
        let roundabout = StreetPriority::new(RoadClass::Residential).roundabout().level();
        assert_eq!(motorway, 1);
        assert_eq!(motorway_link, 2);
        assert!(motorway < residential);
        assert_eq!(roundabout, 0);
    }
}
