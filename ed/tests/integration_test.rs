//! Integration tests for elevatord
//!
//! These drive the coordinator through its public API: signals go into the inbox, the state
//! machine settles, and the outbound commands are inspected.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use elevatord::config::{Config, TimingConfig};
use elevatord::domain::{
    CarId, CarRecord, Direction, ElevatorSignal, ElevatorState, FaultKind, Floor, FloorRequest, Request,
};
use elevatord::scenario::{self, ScenarioEntry};
use elevatord::scheduler::algorithm::{estimate_pickup_time, select_car, travel_time};
use elevatord::scheduler::{Inbox, Outbound, SchedulerContext, ViewSnapshot, project};
use elevatord::sim::run_simulation;
use proptest::prelude::*;
use tempfile::TempDir;
use tokio::time::Instant;

// =============================================================================
// Helpers
// =============================================================================

fn context(floors: Floor, elevators: CarId) -> SchedulerContext {
    let mut config = Config::default();
    config.building.floors = floors;
    config.building.elevators = elevators;
    SchedulerContext::new(&config, Arc::new(Inbox::new()))
}

fn settle(ctx: &mut SchedulerContext) -> Vec<Outbound> {
    let outbound = ctx.settle(Instant::now());
    ctx.sheet.check_partition().expect("partition invariant");
    ctx.sheet.check_destinations().expect("destination invariant");
    outbound
}

fn commands(outbound: &[Outbound]) -> Vec<ElevatorSignal> {
    outbound
        .iter()
        .filter_map(|o| match o {
            Outbound::Car(signal) => Some(signal.clone()),
            _ => None,
        })
        .collect()
}

fn report(ctx: &mut SchedulerContext, signal: ElevatorSignal) -> Vec<ElevatorSignal> {
    ctx.inbox().push_elevator_signal(signal);
    commands(&settle(ctx))
}

fn report_state(ctx: &mut SchedulerContext, state: ElevatorState, car_id: CarId, floor: Floor) -> Vec<ElevatorSignal> {
    report(ctx, ElevatorSignal::new(state, car_id, floor))
}

/// Report `state` and return the single command it produced
fn step(ctx: &mut SchedulerContext, state: ElevatorState, car_id: CarId, floor: Floor) -> ElevatorSignal {
    let mut out = report_state(ctx, state, car_id, floor);
    assert_eq!(out.len(), 1, "expected one command after {} at {}, got {:?}", state, floor, out);
    out.remove(0)
}

fn request(ctx: &mut SchedulerContext, origin: Floor, target: Floor) -> Vec<Outbound> {
    let direction = Direction::between(origin, target).expect("distinct floors");
    ctx.inbox().push_floor_request(FloorRequest::new(origin, target, direction));
    settle(ctx)
}

fn register(ctx: &mut SchedulerContext, car_id: CarId, floor: Floor) {
    let out = report_state(ctx, ElevatorState::Start, car_id, floor);
    assert_eq!(out.last().map(|c| c.state), Some(ElevatorState::Idle));
}

fn car(ctx: &SchedulerContext, car_id: CarId) -> &CarRecord {
    ctx.sheet.car(car_id).expect("car registered")
}

// =============================================================================
// Scenario A: one idle car serves a request below it, end to end
// =============================================================================

#[test]
fn test_scenario_a_idle_car_fetches_and_delivers() {
    let mut ctx = context(10, 1);
    register(&mut ctx, 1, 5);

    let timing = TimingConfig::default();
    let probe = Request::new(99, &FloorRequest::new(1, 6, Direction::Up));
    assert_eq!(
        estimate_pickup_time(&probe, car(&ctx, 1), &[], &timing),
        timing.moving + timing.stop + 2 * timing.moving_max
    );
    assert_eq!(travel_time(5, 1, &timing), 18);

    let out = request(&mut ctx, 1, 6);
    assert_eq!(ctx.sheet.active_for(1).len(), 1);
    assert!(ctx.sheet.call_lamp(1, Direction::Up));
    assert_eq!(commands(&out).last().map(|c| c.state), Some(ElevatorState::MovingDown));

    // Depart from 5, cruise, stop at the bottom
    assert_eq!(step(&mut ctx, ElevatorState::MovingDown, 1, 5).state, ElevatorState::MovingDown);
    assert_eq!(step(&mut ctx, ElevatorState::MovingDown, 1, 4).state, ElevatorState::MovingDown);
    assert_eq!(step(&mut ctx, ElevatorState::MovingDown, 1, 3).state, ElevatorState::MovingDown);
    assert_eq!(step(&mut ctx, ElevatorState::MovingDown, 1, 2).state, ElevatorState::Stop);

    assert_eq!(step(&mut ctx, ElevatorState::Stop, 1, 1).state, ElevatorState::OpenDoors);
    assert!(!ctx.sheet.call_lamp(1, Direction::Up));
    assert!(ctx.sheet.direction_lamp(1, Direction::Up));

    let close = step(&mut ctx, ElevatorState::OpenDoors, 1, 1);
    assert_eq!(close.state, ElevatorState::CloseDoors);
    assert_eq!(close.new_car_buttons, vec![6]);

    let idle = report(
        &mut ctx,
        ElevatorSignal {
            new_car_buttons: vec![6],
            ..ElevatorSignal::new(ElevatorState::CloseDoors, 1, 1)
        },
    );
    assert_eq!(idle[0].state, ElevatorState::Idle);
    assert!(ctx.sheet.active_for(1)[0].picked_up);
    assert!(!ctx.sheet.direction_lamp(1, Direction::Up));
    assert!(car(&ctx, 1).destinations.contains(&6));

    assert_eq!(step(&mut ctx, ElevatorState::Idle, 1, 1).state, ElevatorState::MovingUp);
    for floor in 1..5 {
        assert_eq!(step(&mut ctx, ElevatorState::MovingUp, 1, floor).state, ElevatorState::MovingUp);
    }
    assert_eq!(step(&mut ctx, ElevatorState::MovingUp, 1, 5).state, ElevatorState::Stop);
    assert_eq!(step(&mut ctx, ElevatorState::Stop, 1, 6).state, ElevatorState::OpenDoors);
    assert_eq!(step(&mut ctx, ElevatorState::OpenDoors, 1, 6).state, ElevatorState::CloseDoors);
    assert_eq!(step(&mut ctx, ElevatorState::CloseDoors, 1, 6).state, ElevatorState::Idle);

    assert_eq!(ctx.sheet.complete.len(), 1);
    assert!(ctx.sheet.is_drained());
    assert!(car(&ctx, 1).destinations.is_empty());

    ctx.inbox().mark_producer_finished();
    let out = settle(&mut ctx);
    assert!(ctx.is_shutdown());
    let ends: Vec<_> = out
        .iter()
        .filter_map(|o| match o {
            Outbound::Control { destination, topic } => Some((*destination, *topic)),
            _ => None,
        })
        .filter(|(_, topic)| *topic == "SCENARIO_END")
        .collect();
    assert_eq!(ends, vec![("floors", "SCENARIO_END"), ("elevators", "SCENARIO_END")]);
}

// =============================================================================
// Scenario B: a car moving up picks up a request on its way
// =============================================================================

#[test]
fn test_scenario_b_on_the_way_assignment() {
    let mut ctx = context(20, 2);
    register(&mut ctx, 1, 3);
    register(&mut ctx, 2, 10);

    let mut riding = Request::new(ctx.sheet.next_request_id(), &FloorRequest::new(3, 13, Direction::Up));
    riding.picked_up = true;
    ctx.sheet.assign(riding, 1);
    ctx.sheet.cars.get_mut(&1).unwrap().state = ElevatorState::MovingUp;

    let out = request(&mut ctx, 5, 9);

    assert_eq!(ctx.sheet.active_for(1).len(), 2);
    assert!(ctx.sheet.active_for(2).is_empty());
    assert!(car(&ctx, 1).destinations.contains(&5));
    // A moving car is not woken and the lamp stays a call lamp only
    assert!(commands(&out).is_empty());
    assert!(ctx.sheet.call_lamp(5, Direction::Up));
    assert!(!ctx.sheet.direction_lamp(5, Direction::Up));
}

#[test]
fn test_scenario_b_opposite_direction_goes_elsewhere() {
    let mut ctx = context(20, 2);
    register(&mut ctx, 1, 3);
    register(&mut ctx, 2, 10);

    let mut riding = Request::new(ctx.sheet.next_request_id(), &FloorRequest::new(3, 13, Direction::Up));
    riding.picked_up = true;
    ctx.sheet.assign(riding, 1);
    ctx.sheet.cars.get_mut(&1).unwrap().state = ElevatorState::MovingUp;

    request(&mut ctx, 9, 5);
    assert_eq!(ctx.sheet.active_for(1).len(), 1);
    assert_eq!(ctx.sheet.active_for(2).len(), 1);
}

// =============================================================================
// Scenario C: a stuck car is retired
// =============================================================================

#[test]
fn test_scenario_c_stuck_car_is_retired() {
    let mut ctx = context(10, 2);
    register(&mut ctx, 1, 1);
    register(&mut ctx, 2, 10);

    let mut riding = Request::new(
        ctx.sheet.next_request_id(),
        &FloorRequest::new(1, 8, Direction::Up).with_fault(FaultKind::ElevatorStuck),
    );
    riding.picked_up = true;
    ctx.sheet.assign(riding, 1);
    ctx.sheet.cars.get_mut(&1).unwrap().state = ElevatorState::MovingUp;

    let dead = step(&mut ctx, ElevatorState::ErrorElevatorStuck, 1, 3);
    assert_eq!(dead.state, ElevatorState::Dead);
    assert_eq!(ctx.sheet.active_for(1)[0].unhandled_fault(), None);

    // A repeated fault report changes nothing
    assert!(report_state(&mut ctx, ElevatorState::ErrorElevatorStuck, 1, 3).is_empty());

    assert!(report_state(&mut ctx, ElevatorState::Dead, 1, 3).is_empty());
    assert!(car(&ctx, 1).is_dead());
    assert!(ctx.sheet.active_for(1).is_empty());
    assert_eq!(ctx.sheet.complete.len(), 1);
    assert!(ctx.sheet.complete[0].completed);
    assert_eq!(ctx.sheet.stranded(), 1);

    // Later reports from the dead car are ignored
    assert!(report_state(&mut ctx, ElevatorState::Idle, 1, 3).is_empty());

    request(&mut ctx, 4, 2);
    assert!(ctx.sheet.active_for(1).is_empty());
    assert_eq!(ctx.sheet.active_for(2).len(), 1);

    let probe = Request::new(50, &FloorRequest::new(2, 3, Direction::Up));
    let pick = select_car(&probe, &ctx.sheet.active, &ctx.sheet.cars, ctx.timing());
    assert_ne!(pick, Some(1));
}

#[test]
fn test_dead_car_returns_unboarded_requests() {
    let mut ctx = context(10, 1);
    register(&mut ctx, 1, 1);

    let mut riding = Request::new(
        ctx.sheet.next_request_id(),
        &FloorRequest::new(1, 8, Direction::Up).with_fault(FaultKind::ElevatorStuck),
    );
    riding.picked_up = true;
    ctx.sheet.assign(riding, 1);
    let waiting = Request::new(ctx.sheet.next_request_id(), &FloorRequest::new(5, 9, Direction::Up));
    ctx.sheet.assign(waiting, 1);
    ctx.sheet.cars.get_mut(&1).unwrap().state = ElevatorState::MovingUp;

    step(&mut ctx, ElevatorState::ErrorElevatorStuck, 1, 2);
    report_state(&mut ctx, ElevatorState::Dead, 1, 2);

    assert_eq!(ctx.sheet.awaiting.len(), 1);
    assert_eq!(ctx.sheet.awaiting[0].car_id, None);
    assert_eq!(ctx.sheet.complete.len(), 1);

    // Only car is dead: once the floors are done the coordinator gives up
    ctx.inbox().mark_producer_finished();
    settle(&mut ctx);
    assert!(ctx.is_shutdown());
}

// =============================================================================
// Scenario D: requests before any car registers
// =============================================================================

#[test]
fn test_scenario_d_awaiting_requests_survive_registration() {
    let mut ctx = context(10, 1);
    request(&mut ctx, 1, 5);
    request(&mut ctx, 1, 3);
    assert_eq!(ctx.sheet.awaiting.len(), 2);
    assert_eq!(ctx.sheet.requests_received(), 2);

    let out = report_state(&mut ctx, ElevatorState::Start, 1, 1);
    let states: Vec<_> = out.iter().map(|c| c.state).collect();
    assert_eq!(states.first(), Some(&ElevatorState::Idle));
    assert_eq!(states.last(), Some(&ElevatorState::OpenDoors));

    let active = ctx.sheet.active_for(1).len();
    assert!(active >= 1);
    assert_eq!(active + ctx.sheet.awaiting.len(), 2);
    assert!(ctx.sheet.complete.is_empty());

    // The IDLE ack the car eventually reports answers an older command
    assert!(report_state(&mut ctx, ElevatorState::Idle, 1, 1).is_empty());
}

// =============================================================================
// Faults and tie-breaks
// =============================================================================

#[test]
fn test_door_fault_fires_once() {
    let mut ctx = context(10, 1);
    register(&mut ctx, 1, 5);

    let mut riding = Request::new(
        ctx.sheet.next_request_id(),
        &FloorRequest::new(2, 6, Direction::Up).with_fault(FaultKind::DoorStuck),
    );
    riding.picked_up = true;
    ctx.sheet.assign(riding, 1);
    ctx.sheet.cars.get_mut(&1).unwrap().state = ElevatorState::Stop;

    let open = step(&mut ctx, ElevatorState::Stop, 1, 6);
    assert_eq!(open.state, ElevatorState::OpenDoors);
    assert_eq!(open.fault, Some(FaultKind::DoorStuck));

    assert_eq!(step(&mut ctx, ElevatorState::ErrorDoorStuck, 1, 6).state, ElevatorState::Reboot);
    assert!(report_state(&mut ctx, ElevatorState::ErrorDoorStuck, 1, 6).is_empty());
    assert!(report_state(&mut ctx, ElevatorState::Reboot, 1, 6).is_empty());

    let close = step(&mut ctx, ElevatorState::OpenDoors, 1, 6);
    assert_eq!(close.state, ElevatorState::CloseDoors);
    assert_eq!(close.fault, None);

    assert_eq!(step(&mut ctx, ElevatorState::CloseDoors, 1, 6).state, ElevatorState::Idle);
    assert_eq!(ctx.sheet.complete.len(), 1);
    assert!(!car(&ctx, 1).is_dead());
}

#[test]
fn test_equal_estimates_pick_lowest_id() {
    let mut ctx = context(10, 2);
    register(&mut ctx, 2, 7);
    register(&mut ctx, 1, 3);

    let probe = Request::new(1, &FloorRequest::new(5, 9, Direction::Up));
    let timing = ctx.timing().clone();
    assert_eq!(
        estimate_pickup_time(&probe, car(&ctx, 1), &[], &timing),
        estimate_pickup_time(&probe, car(&ctx, 2), &[], &timing)
    );
    assert_eq!(select_car(&probe, &ctx.sheet.active, &ctx.sheet.cars, &timing), Some(1));
}

#[test]
fn test_invalid_requests_are_dropped() {
    let mut ctx = context(10, 1);
    register(&mut ctx, 1, 1);

    ctx.inbox().push_floor_request(FloorRequest::new(3, 3, Direction::Up));
    ctx.inbox().push_floor_request(FloorRequest::new(3, 11, Direction::Up));
    ctx.inbox().push_floor_request(FloorRequest::new(6, 2, Direction::Up));
    settle(&mut ctx);

    assert_eq!(ctx.sheet.requests_received(), 0);
    assert!(ctx.sheet.is_drained());
}

// =============================================================================
// View snapshot
// =============================================================================

#[test]
fn test_snapshot_round_trip() {
    let mut ctx = context(10, 2);
    register(&mut ctx, 1, 1);
    register(&mut ctx, 2, 9);
    request(&mut ctx, 4, 8);
    request(&mut ctx, 7, 2);

    let snapshot = project(&ctx.sheet, ctx.timing());
    let json = serde_json::to_string(&snapshot).unwrap();
    let decoded: ViewSnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded, snapshot);
    assert_eq!(decoded.active_count(), 2);
    assert_eq!(decoded.cars_by_id.len(), 2);

    let views: Vec<_> = settle(&mut ctx)
        .into_iter()
        .filter(|o| matches!(o, Outbound::View(_)))
        .collect();
    assert!(views.is_empty(), "no work, no view update");
}

// =============================================================================
// Simulated end-to-end runs
// =============================================================================

fn fast_config(floors: Floor, elevators: CarId) -> Config {
    let mut config = Config::default();
    config.building.floors = floors;
    config.building.elevators = elevators;
    config.timing.speed_factor = 1000;
    config.scheduler.start_resend_ms = 50;
    config
}

fn entry(offset_ms: u64, origin: Floor, target: Floor, fault: Option<FaultKind>) -> ScenarioEntry {
    let direction = Direction::between(origin, target).expect("distinct floors");
    let mut request = FloorRequest::new(origin, target, direction);
    if let Some(kind) = fault {
        request = request.with_fault(kind);
    }
    ScenarioEntry { offset_ms, request }
}

#[tokio::test]
async fn test_simulation_delivers_everyone() {
    let config = fast_config(8, 2);
    let entries = vec![
        entry(0, 1, 8, None),
        entry(5_000, 6, 2, None),
        entry(10_000, 3, 5, Some(FaultKind::DoorStuck)),
        entry(20_000, 8, 1, None),
    ];

    let report = tokio::time::timeout(Duration::from_secs(30), run_simulation(&config, entries))
        .await
        .expect("simulation timed out")
        .expect("simulation failed");

    assert_eq!(report.summary.requests_received, 4);
    assert_eq!(report.summary.delivered, 4);
    assert_eq!(report.summary.awaiting, 0);
    assert!(report.summary.dead_cars.is_empty());
    assert_eq!(report.floors.sent, 4);
    assert!(report.floors.ended);
    assert!(report.floors.start_acks >= 1);
    assert_eq!(report.cars.len(), 2);
    assert!(report.cars.iter().all(|c| !c.dead));
    assert!(report.finished_at >= report.started_at);
}

#[tokio::test]
async fn test_simulation_survives_a_dead_car() {
    let config = fast_config(10, 2);
    let entries = vec![
        entry(0, 1, 7, Some(FaultKind::ElevatorStuck)),
        entry(2_000, 9, 3, None),
        entry(4_000, 2, 6, None),
        entry(6_000, 5, 1, None),
    ];

    let report = tokio::time::timeout(Duration::from_secs(30), run_simulation(&config, entries))
        .await
        .expect("simulation timed out")
        .expect("simulation failed");

    let summary = &report.summary;
    assert_eq!(summary.requests_received, 4);
    assert_eq!(summary.dead_cars.len(), 1);
    assert_eq!(summary.stranded, 1);
    assert_eq!(summary.delivered as u64 + summary.stranded, 4);
    assert_eq!(summary.awaiting, 0);
}

#[tokio::test]
async fn test_simulation_with_generated_scenario() {
    use rand::SeedableRng;

    let mut config = fast_config(12, 4);
    config.scenario.max_duration_ms = 20_000;
    let entries = scenario::generate(&config, &mut rand::rngs::StdRng::seed_from_u64(11));
    let count = entries.len() as u64;

    let report = tokio::time::timeout(Duration::from_secs(60), run_simulation(&config, entries))
        .await
        .expect("simulation timed out")
        .expect("simulation failed");

    let summary = &report.summary;
    assert_eq!(summary.requests_received, count);
    assert_eq!(summary.delivered as u64 + summary.stranded, count);
    assert_eq!(summary.dead_cars.len(), 1);
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Call(Floor, Floor),
    Report(CarId, ElevatorState, Floor),
}

fn op(floors: Floor, elevators: CarId) -> impl Strategy<Value = Op> {
    let states = prop::sample::select(ElevatorState::ALL.to_vec());
    prop_oneof![
        (1..=floors, 1..=floors).prop_map(|(o, t)| Op::Call(o, t)),
        (1..=elevators, states, 1..=floors).prop_map(|(c, s, f)| Op::Report(c, s, f)),
    ]
}

proptest! {
    #[test]
    fn prop_every_request_lives_in_one_place(ops in prop::collection::vec(op(8, 3), 1..60)) {
        let mut ctx = context(8, 3);
        for (car_id, floor) in [(1, 1), (2, 4), (3, 8)] {
            ctx.inbox().push_elevator_signal(ElevatorSignal::new(ElevatorState::Start, car_id, floor));
        }
        ctx.settle(Instant::now());

        for op in ops {
            match op {
                Op::Call(origin, target) => {
                    if let Some(direction) = Direction::between(origin, target) {
                        ctx.inbox().push_floor_request(FloorRequest::new(origin, target, direction));
                    }
                }
                Op::Report(car_id, state, floor) => {
                    ctx.inbox().push_elevator_signal(ElevatorSignal::new(state, car_id, floor));
                }
            }
            ctx.settle(Instant::now());

            prop_assert!(ctx.sheet.check_partition().is_ok(), "{:?}", ctx.sheet.check_partition());
            prop_assert!(ctx.sheet.check_destinations().is_ok(), "{:?}", ctx.sheet.check_destinations());
            let held = ctx.sheet.awaiting.len()
                + ctx.sheet.active.values().map(Vec::len).sum::<usize>()
                + ctx.sheet.complete.len();
            prop_assert_eq!(held as u64, ctx.sheet.requests_received());
        }
    }

    #[test]
    fn prop_travel_time_model(from in 1u32..40, to in 1u32..40, further in 1u32..10) {
        let timing = TimingConfig::default();
        let time = travel_time(from, to, &timing);

        prop_assert_eq!(time, travel_time(to, from, &timing));
        prop_assert_eq!(time == 0, from == to);

        // Going one more floor never takes less time
        let beyond = if to >= from { to + further } else { to.saturating_sub(further).max(1) };
        prop_assert!(travel_time(from, beyond, &timing) >= time);

        let floors = u64::from(from.abs_diff(to));
        if floors >= 2 {
            prop_assert_eq!(time, timing.moving + timing.stop + (floors - 2) * timing.moving_max);
        }
    }
}

#[test]
fn test_trip_times_follow_sorted_order() {
    let mut ctx = context(10, 1);
    register(&mut ctx, 1, 1);
    request(&mut ctx, 1, 4);

    let snapshot = project(&ctx.sheet, ctx.timing());
    let expected: BTreeMap<CarId, u64> = BTreeMap::from([(
        1,
        2 * ctx.timing().doors + travel_time(1, 4, ctx.timing()) + 2 * ctx.timing().doors,
    )]);
    assert_eq!(snapshot.workload_by_car_id, expected);
}

// =============================================================================
// CLI
// =============================================================================

#[test]
fn test_cli_scenario_check_accepts_valid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scenario.txt");
    std::fs::write(&path, "0 1 UP 5 NONE\n1500 9 DOWN 2 DOOR_STUCK\n").unwrap();

    assert_cmd::Command::cargo_bin("ed")
        .unwrap()
        .current_dir(dir.path())
        .args(["scenario", "check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicates::str::contains("requests"));
}

#[test]
fn test_cli_scenario_check_rejects_corrupted_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scenario.txt");
    std::fs::write(&path, "0 1 UP\n").unwrap();

    assert_cmd::Command::cargo_bin("ed")
        .unwrap()
        .current_dir(dir.path())
        .args(["scenario", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicates::str::contains("corrupted"));
}
