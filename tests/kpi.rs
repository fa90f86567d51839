mod common;

use chrono::TimeDelta;
use common::{at, complete_client, event, init_logging, skipping_client};
use funnel_kpi::{EntitySummary, Event, Rollup, StepOrder, Trace, summarize};
use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha12Rng;

fn entity_summary(events: &[Event], steps: &StepOrder) -> EntitySummary {
    let trace = Trace::new(events.iter().collect());
    EntitySummary::from_trace(&events[0].entity_id, &trace, steps)
        .expect("failed to summarize entity")
}

#[test]
fn step_order_accepts_only_the_next_step() {
    let steps = StepOrder::default();
    assert_eq!(steps.terminal(), "confirm");
    assert_eq!(steps.non_terminal(), ["start", "step_1", "step_2", "step_3"]);

    assert!(steps.is_valid_transition("step_1", "start").unwrap());
    assert!(steps.is_valid_transition("confirm", "step_3").unwrap());
    assert!(!steps.is_valid_transition("step_1", "step_1").unwrap());
    assert!(!steps.is_valid_transition("step_2", "start").unwrap());
    assert!(!steps.is_valid_transition("start", "step_1").unwrap());
}

#[test]
fn step_order_rejects_unknown_steps() {
    let steps = StepOrder::default();
    let err = steps.is_valid_transition("payment", "start").unwrap_err();
    assert!(format!("{err:#}").contains("unknown step \"payment\""));
    assert!(steps.rank("").is_err());
}

#[test]
fn step_order_rejects_malformed_lists() {
    assert!(StepOrder::new(["only"]).is_err());
    assert!(StepOrder::new(["start", "start", "confirm"]).is_err());
    assert!(StepOrder::new(["start", " ", "confirm"]).is_err());

    let steps = StepOrder::new(["landing", "cart", "paid"]).unwrap();
    assert_eq!(steps.rank("paid").unwrap(), 2);
    assert!(steps.is_terminal("paid"));
}

#[test]
fn trace_sorts_by_timestamp_and_pairs_neighbours() {
    let events = vec![
        event("A", "step_1", 60, "Test"),
        event("A", "step_2", 130, "Test"),
        event("A", "start", 0, "Test"),
    ];
    let trace = Trace::new(events.iter().collect());

    let order: Vec<_> = trace.events().iter().map(|event| event.step.as_str()).collect();
    assert_eq!(order, ["start", "step_1", "step_2"]);

    let transitions: Vec<_> = trace
        .transitions()
        .map(|trans| (trans.from, trans.to, trans.elapsed.num_seconds()))
        .collect();
    assert_eq!(
        transitions,
        [("start", "step_1", 60), ("step_1", "step_2", 70)]
    );
}

#[test]
fn trace_keeps_input_order_on_ties() {
    let events = vec![
        event("A", "step_1", 10, "Test"),
        event("A", "start", 10, "Test"),
    ];
    let trace = Trace::new(events.iter().collect());
    assert_eq!(trace.events()[0].step, "step_1");
    assert_eq!(trace.events()[0].timestamp, at(10));
}

#[test]
fn single_event_entity() {
    let steps = StepOrder::default();
    let summary = entity_summary(&[event("A", "step_2", 0, "Test")], &steps);

    assert_eq!(summary.error_count, 0);
    assert_eq!(summary.n_valid, 0);
    assert!(summary.durations.is_empty());
    assert!(!summary.confirmed);
    assert_eq!(summary.n_transitions(), 0);
}

#[test]
fn complete_entity() {
    let steps = StepOrder::default();
    let summary = entity_summary(&complete_client("Test"), &steps);

    assert_eq!(summary.error_count, 0);
    assert_eq!(summary.n_valid, 4);
    assert_eq!(summary.durations.len(), 4);
    for step in steps.non_terminal() {
        assert_eq!(summary.duration(step), Some(TimeDelta::seconds(30)));
    }
    assert!(summary.confirmed);
}

#[test]
fn skipped_step_discards_elapsed_time() {
    let steps = StepOrder::default();
    let summary = entity_summary(&skipping_client("Test"), &steps);

    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.n_valid, 2);
    assert_eq!(summary.durations.len(), 2);
    assert_eq!(summary.duration("start"), Some(TimeDelta::seconds(60)));
    assert_eq!(summary.duration("step_1"), Some(TimeDelta::seconds(70)));
    assert_eq!(summary.duration("step_2"), None);
    assert!(!summary.confirmed);
}

#[test]
fn repeated_step_counts_as_error() {
    let steps = StepOrder::default();
    let summary = entity_summary(
        &[
            event("C", "start", 0, "Test"),
            event("C", "step_1", 10, "Test"),
            event("C", "step_1", 25, "Test"),
            event("C", "step_2", 40, "Test"),
        ],
        &steps,
    );

    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.duration("start"), Some(TimeDelta::seconds(10)));
    assert_eq!(summary.duration("step_1"), Some(TimeDelta::seconds(15)));
    assert_eq!(summary.n_valid, 2);
    assert_eq!(summary.error_count + summary.n_valid, summary.n_transitions());
}

#[test]
fn revisited_step_accumulates_time() {
    let steps = StepOrder::default();
    let summary = entity_summary(
        &[
            event("D", "start", 0, "Test"),
            event("D", "step_1", 10, "Test"),
            event("D", "start", 20, "Test"),
            event("D", "step_1", 35, "Test"),
            event("D", "step_2", 50, "Test"),
            event("D", "step_3", 70, "Test"),
            event("D", "confirm", 80, "Test"),
            event("D", "step_3", 90, "Test"),
            event("D", "confirm", 95, "Test"),
        ],
        &steps,
    );

    assert_eq!(summary.error_count, 2);
    assert_eq!(summary.n_valid, 6);
    assert_eq!(summary.error_count + summary.n_valid, summary.n_transitions());
    assert_eq!(summary.duration("start"), Some(TimeDelta::seconds(25)));
    assert_eq!(summary.duration("step_3"), Some(TimeDelta::seconds(15)));
    assert!(summary.confirmed);
}

#[test]
fn unknown_step_fails_the_entity() {
    let steps = StepOrder::default();
    let events = [
        event("E", "start", 0, "Test"),
        event("E", "checkout", 10, "Test"),
    ];
    let trace = Trace::new(events.iter().collect());
    let err = EntitySummary::from_trace("E", &trace, &steps).unwrap_err();
    assert!(format!("{err:#}").contains("unknown step \"checkout\""));

    let err = summarize(&events, &steps).unwrap_err();
    assert!(format!("{err:#}").contains("failed to summarize entity \"E\""));
}

#[test]
fn group_rollup() {
    init_logging();
    let steps = StepOrder::default();
    let mut events = skipping_client("Test");
    events.extend(complete_client("Test"));

    let summary = summarize(&events, &steps).unwrap();

    assert_eq!(summary.group, "Test");
    assert_eq!(summary.total_size, 2);
    assert_eq!(summary.confirm_count, 1);
    assert_eq!(summary.completion_rate, 0.5);
    assert_eq!(summary.step_mean("start"), Some(TimeDelta::seconds(45)));
    assert_eq!(summary.step_mean("step_1"), Some(TimeDelta::seconds(50)));
    assert_eq!(summary.step_mean("step_2"), Some(TimeDelta::seconds(30)));
    assert_eq!(summary.step_mean("step_3"), Some(TimeDelta::seconds(30)));
    assert_eq!(summary.step_mean("confirm"), None);
    assert!((summary.error_rate - 1.0 / 9.0).abs() < 1e-12);
}

#[test]
fn step_mean_ignores_entities_without_time() {
    let steps = StepOrder::default();
    let events = vec![
        event("A", "start", 0, "Control"),
        event("A", "step_1", 40, "Control"),
        event("B", "step_2", 0, "Control"),
        event("C", "start", 0, "Control"),
    ];

    let summary = summarize(&events, &steps).unwrap();

    assert_eq!(summary.total_size, 3);
    assert_eq!(summary.confirm_count, 0);
    assert_eq!(summary.completion_rate, 0.0);
    assert_eq!(summary.step_mean("start"), Some(TimeDelta::seconds(40)));
    assert_eq!(summary.step_mean("step_1"), None);
    assert_eq!(summary.error_rate, 0.0);
}

#[test]
fn rollup_is_independent_of_row_order() {
    let steps = StepOrder::default();
    let mut events = skipping_client("Test");
    events.extend(complete_client("Test"));
    events.push(event("C", "start", 5, "Test"));
    events.push(event("C", "step_1", 8, "Test"));
    events.push(event("C", "start", 17, "Test"));
    let expected = summarize(&events, &steps).unwrap();

    let mut rng = ChaCha12Rng::seed_from_u64(7);
    for _ in 0..8 {
        events.shuffle(&mut rng);
        assert_eq!(summarize(&events, &steps).unwrap(), expected);
    }
}

#[test]
fn merged_rollups_match_a_single_pass() {
    let steps = StepOrder::default();
    let a = entity_summary(&skipping_client("Test"), &steps);
    let b = entity_summary(&complete_client("Test"), &steps);

    let mut single = Rollup::new(&steps);
    single.add(&a);
    single.add(&b);

    let mut left = Rollup::new(&steps);
    left.add(&b);
    let mut right = Rollup::new(&steps);
    right.add(&a);
    left.merge(&right).unwrap();

    assert_eq!(left.total_size(), 2);
    assert_eq!(left.finish("Test").unwrap(), single.finish("Test").unwrap());

    let other_steps = StepOrder::new(["landing", "paid"]).unwrap();
    assert!(left.merge(&Rollup::new(&other_steps)).is_err());
}

#[test]
fn empty_input_is_rejected() {
    let steps = StepOrder::default();
    let err = summarize(&[], &steps).unwrap_err();
    assert!(format!("{err:#}").contains("division by zero"));
    assert!(Rollup::new(&steps).finish("Test").is_err());
}

#[test]
fn summary_serializes_to_a_flat_record() {
    let steps = StepOrder::default();
    let mut events = skipping_client("Test");
    events.extend(complete_client("Test"));
    let summary = summarize(&events, &steps).unwrap();

    let record = serde_json::to_value(&summary).unwrap();
    assert_eq!(record["group"], "Test");
    assert_eq!(record["confirm_count"], 1);
    assert_eq!(record["total_size"], 2);
    assert_eq!(record["completion_rate"], 0.5);
    assert_eq!(record["start_mean"], 45);
    assert_eq!(record["step_1_mean"], 50);
    assert_eq!(record["step_2_mean"], 30);
    assert_eq!(record["step_3_mean"], 30);
    assert!(record.get("confirm_mean").is_none());
    assert_eq!(record.as_object().map(|record| record.len()), Some(9));
}

#[test]
fn custom_step_order_shapes_the_record() {
    let steps = StepOrder::new(["landing", "cart", "paid"]).unwrap();
    let events = vec![
        event("A", "landing", 0, "Test"),
        event("A", "cart", 12, "Test"),
        event("A", "paid", 20, "Test"),
        event("B", "landing", 0, "Test"),
    ];

    let summary = summarize(&events, &steps).unwrap();
    assert_eq!(summary.completion_rate, 0.5);

    let record = serde_json::to_value(&summary).unwrap();
    assert_eq!(record["landing_mean"], 12);
    assert_eq!(record["cart_mean"], 8);
    assert!(record.get("start_mean").is_none());

    let partial = summarize(&events[3..], &steps).unwrap();
    let record = serde_json::to_value(&partial).unwrap();
    assert!(record["landing_mean"].is_null());
}
