//! Persistence snapshot round trip

use abtest_config::EngineConfig;
use abtest_engine::{
    ExperimentEngine, ExperimentSnapshot, ExperimentStatus, ManualClock, MetricType,
};
use approx::assert_relative_eq;
use std::sync::Arc;

fn populated_engine() -> (ExperimentEngine, Vec<uuid::Uuid>) {
    let engine = ExperimentEngine::with_clock(
        &EngineConfig::default(),
        Arc::new(ManualClock::default()),
    );

    let draft = engine
        .create_experiment(engine.draft_config(
            "Draft",
            "Click-through of the new layout",
            "clicks",
            MetricType::Count,
        ))
        .unwrap();

    let analyzed = engine
        .create_experiment(
            engine
                .draft_config(
                    "Latency",
                    "Latency of the distilled model",
                    "latency_ms",
                    MetricType::Continuous,
                )
                .with_description("Compare p50 latency of the distilled model")
                .with_models("gpt-large", "gpt-distilled")
                .with_traffic_split(0.3),
        )
        .unwrap();
    engine.start(&analyzed).unwrap();
    for i in 0..300 {
        let value = 120.0 + (i % 17) as f64 * 1.37;
        engine
            .record_event(&analyzed, &format!("user-{}", i % 120), value)
            .unwrap();
    }
    engine.analyze(&analyzed).unwrap();
    engine.stop(&analyzed).ok();

    (engine, vec![draft, analyzed])
}

#[test]
fn test_snapshot_round_trip() {
    let (engine, ids) = populated_engine();

    let json = engine.snapshot().to_json_pretty().unwrap();
    let decoded = ExperimentSnapshot::from_json(&json).unwrap();
    assert_eq!(decoded, engine.snapshot());

    let restored = ExperimentEngine::new(&EngineConfig::default());
    assert_eq!(restored.restore(decoded).unwrap(), 2);

    for id in &ids {
        let original = engine.get_experiment(id).unwrap();
        let copy = restored.get_experiment(id).unwrap();

        assert_eq!(copy.status, original.status);
        assert_eq!(copy.config, original.config);
        assert_eq!(copy.events, original.events);
        assert_eq!(copy.created_at, original.created_at);
        assert_eq!(copy.started_at, original.started_at);
        assert_eq!(copy.stopped_at, original.stopped_at);

        match (&copy.result, &original.result) {
            (Some(a), Some(b)) => {
                assert_eq!(a.method, b.method);
                assert_eq!(a.recommendation, b.recommendation);
                assert_eq!(a.is_significant, b.is_significant);
                assert_relative_eq!(a.p_value, b.p_value, epsilon = 1e-12);
                assert_relative_eq!(a.test_statistic, b.test_statistic, epsilon = 1e-12);
                assert_relative_eq!(a.relative_lift, b.relative_lift, epsilon = 1e-12);
                assert_relative_eq!(
                    a.confidence_interval.0,
                    b.confidence_interval.0,
                    epsilon = 1e-12
                );
            }
            (None, None) => {}
            _ => panic!("result presence differs for {}", id),
        }
    }

    let analyzed = restored.get_experiment(&ids[1]).unwrap();
    assert!(analyzed.status.is_terminal());
    assert_eq!(analyzed.events.len(), 300);
    assert_eq!(
        restored.get_experiment(&ids[0]).unwrap().status,
        ExperimentStatus::Draft
    );
}

#[test]
fn test_restored_draft_can_start() {
    let (engine, ids) = populated_engine();
    let restored = ExperimentEngine::new(&EngineConfig::default());
    restored.restore(engine.snapshot()).unwrap();

    restored.start(&ids[0]).unwrap();
    restored.record_event(&ids[0], "user-1", 4.0).unwrap();
    assert_eq!(restored.progress(&ids[0]).unwrap().total_events, 1);
}
