//! Movement plan tests against realistic bin layouts.

mod fixtures;

use fleet_sim::model::RouteStatus;
use fleet_sim::planner::build_plan;

use fixtures::{bin, point, route, route_date, COLLECTION_POINTS};

#[test]
fn test_two_bin_scenario_produces_expected_entry() {
    let bins = vec![bin(1, 6.90, 79.80), bin(2, 6.91, 79.81)];
    let routes = vec![route(10, 5, vec![1, 2], RouteStatus::InProgress)];

    let plan = build_plan(&routes, &bins, Some(route_date()));

    assert_eq!(plan.len(), 1);
    let entry = plan.get(5).expect("driver 5 planned");
    assert_eq!(entry.route_id, 10);
    assert_eq!(entry.bin_ids, vec![1, 2]);
    assert_eq!(entry.points, vec![(6.90, 79.80), (6.91, 79.81)]);
}

#[test]
fn test_only_in_progress_routes_are_planned() {
    let bins: Vec<_> = COLLECTION_POINTS
        .iter()
        .enumerate()
        .map(|(i, location)| bin(i as u64 + 1, location.lat, location.lng))
        .collect();
    let routes = vec![
        route(1, 11, vec![1, 2], RouteStatus::Assigned),
        route(2, 12, vec![3, 4], RouteStatus::InProgress),
        route(3, 13, vec![5, 6], RouteStatus::Completed),
    ];

    let plan = build_plan(&routes, &bins, Some(route_date()));

    for route in &routes {
        let planned = plan.get(route.driver_id).is_some();
        assert_eq!(
            planned,
            route.status == RouteStatus::InProgress,
            "route {} with status {} planned={}",
            route.id,
            route.status,
            planned
        );
    }
}

#[test]
fn test_plan_is_deterministic() {
    let bins: Vec<_> = COLLECTION_POINTS
        .iter()
        .enumerate()
        .map(|(i, location)| bin(i as u64 + 1, location.lat, location.lng))
        .collect();
    let routes = vec![
        route(7, 21, vec![6, 1, 3], RouteStatus::InProgress),
        route(4, 22, vec![2, 5], RouteStatus::InProgress),
        route(9, 23, vec![4], RouteStatus::InProgress),
    ];

    let first = build_plan(&routes, &bins, Some(route_date()));
    let second = build_plan(&routes, &bins, Some(route_date()));
    assert_eq!(first, second);

    let json_first = serde_json::to_string(&first).unwrap();
    let json_second = serde_json::to_string(&second).unwrap();
    assert_eq!(json_first, json_second);
}

#[test]
fn test_visit_order_follows_route_order() {
    let pettah = point("Pettah Floating Market").unwrap();
    let borella = point("Borella Junction").unwrap();
    let bins = vec![bin(1, pettah.lat, pettah.lng), bin(2, borella.lat, borella.lng)];
    let routes = vec![route(30, 8, vec![2, 1], RouteStatus::InProgress)];

    let plan = build_plan(&routes, &bins, Some(route_date()));
    let entry = plan.get(8).unwrap();
    assert_eq!(entry.points, vec![borella.coords(), pettah.coords()]);
    assert!(entry.path_km > 2.0 && entry.path_km < 4.0, "got {}", entry.path_km);
}

#[test]
fn test_plan_serializes_keyed_by_driver() {
    let bins = vec![bin(1, 6.90, 79.80)];
    let routes = vec![route(10, 5, vec![1], RouteStatus::InProgress)];
    let plan = build_plan(&routes, &bins, None);

    let value = serde_json::to_value(&plan).unwrap();
    assert_eq!(value["5"]["routeId"], 10);
    assert_eq!(value["5"]["binIds"][0], 1);
}
