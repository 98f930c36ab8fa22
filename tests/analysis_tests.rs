//! Batch analyses: schedule comparison, weekly breakdown, zone popularity,
//! and the surge sensitivity sweep.

mod fixtures;

use std::sync::Arc;

use fixtures::{four_zone_city, start_date, two_zone_city, CITY};
use shift_planner::analysis::{
    compare_work_schedules, surge_sensitivity, weekly_analysis, zone_popularity,
};
use shift_planner::solver::{Planner, PlannerConfig};
use shift_planner::traits::UniformSurge;

fn planner(store: shift_planner::graph::GraphStore) -> Planner {
    Planner::new(Arc::new(store), PlannerConfig::default())
}

#[test]
fn schedules_come_back_sorted_by_earnings() {
    let planner = planner(two_zone_city());
    let rows = compare_work_schedules(
        &planner,
        CITY,
        "a",
        start_date(),
        &[(3, 4), (8, 1), (8, 8), (20, 2)],
    )
    .expect("compares");

    assert_eq!(rows.len(), 4);
    assert!(rows.windows(2).all(|w| w[0].earnings >= w[1].earnings));
    // All traffic sits at hour 8, so a shift covering it must win.
    assert_eq!(rows[0].start_hour, 8);
    assert_eq!(rows[0].schedule, "08:00-16:00");
}

#[test]
fn weekly_analysis_covers_seven_days() {
    let planner = planner(two_zone_city());
    let rows =
        weekly_analysis(&planner, CITY, "a", 8, 2, start_date()).expect("analyzes the week");

    assert_eq!(rows.len(), 7);
    // 2023-01-15 was a Sunday.
    assert_eq!(rows[0].weekday, "Sunday");
    assert_eq!(rows[6].weekday, "Saturday");
    for (offset, row) in rows.iter().enumerate() {
        assert_eq!(row.date, start_date() + chrono::Duration::days(offset as i64));
        assert!(row.earnings >= 0.0);
        assert_eq!(row.weather_multiplier, 1.0);
        assert!(row.path_diversity >= 1);
    }
}

#[test]
fn popularity_ranks_the_high_fare_corridor_first() {
    let planner = planner(four_zone_city());
    let rows = zone_popularity(&planner, CITY, 8, start_date()).expect("ranks zones");

    assert_eq!(rows.len(), 4);
    assert!(rows.windows(2).all(|w| w[0].earning_rate >= w[1].earning_rate));
    assert_eq!(rows[0].zone, "d");
    assert_eq!(rows[3].zone, "a");

    // Zone c receives from d (8 trips) and b (2 trips), sends 8 out.
    let c = rows.iter().find(|row| row.zone == "c").expect("c present");
    assert_eq!(c.incoming_trips, 10);
    assert_eq!(c.outgoing_trips, 8);
    assert_eq!(c.net_flow, 2);
    assert_eq!(c.total_activity, 18);
}

#[test]
fn sensitivity_scales_linearly_with_uniform_surge() {
    let planner = planner(two_zone_city());
    let rows = surge_sensitivity(
        &planner,
        CITY,
        "a",
        8,
        1,
        start_date(),
        &[1.0, 1.5, 2.0],
    )
    .expect("sweeps");

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].vs_baseline, 1.0);
    assert!((rows[1].vs_baseline - 1.5).abs() < 1e-9);
    assert!((rows[2].vs_baseline - 2.0).abs() < 1e-9);
    // Flat surge multiplies every fare, so earnings scale with it.
    assert!((rows[0].earnings - 28.525).abs() < 1e-9);
    assert!((rows[2].earnings - 57.05).abs() < 1e-9);
}

#[test]
fn earning_rate_scales_with_surge_provider() {
    let baseline = planner(two_zone_city());
    let surged = Planner::new(Arc::new(two_zone_city()), PlannerConfig::default())
        .with_surge(Arc::new(UniformSurge(2.0)));

    let base_rate = baseline
        .earning_rate(CITY, "a", 8, start_date())
        .expect("rates");
    let surged_rate = surged
        .earning_rate(CITY, "a", 8, start_date())
        .expect("rates");
    assert!((surged_rate - 2.0 * base_rate).abs() < 1e-9);
}
