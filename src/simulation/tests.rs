use super::*;
use crate::delta::Change;
use crate::entity::{Frame, MovingEntity, VehicleClass};
use crate::source::{DataSource, SourceError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn entity(id: &str, x: f64) -> MovingEntity {
    MovingEntity {
        id: id.to_string(),
        x,
        y: 0.0,
        z: 0.0,
        speed: 1.0,
        angle: 0.0,
        vehicle_type: "car".to_string(),
        class: VehicleClass::Passenger,
        length: 4.5,
        width: 1.8,
        signals: 0,
        color: None,
    }
}

/// Source with a fixed list of frames; counts lifecycle calls
struct ScriptedSource {
    frames: Vec<Frame>,
    cursor: usize,
    fail_start: bool,
    steps: Arc<AtomicU64>,
    stops: Arc<AtomicU64>,
}

impl ScriptedSource {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            cursor: 0,
            fail_start: false,
            steps: Arc::new(AtomicU64::new(0)),
            stops: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn start(&mut self) -> Result<(), SourceError> {
        if self.fail_start {
            return Err(SourceError::Unavailable("engine binary not found".into()));
        }
        self.cursor = 0;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame, SourceError> {
        self.steps.fetch_add(1, Ordering::SeqCst);
        let frame = self
            .frames
            .get(self.cursor)
            .cloned()
            .ok_or(SourceError::EndOfRecording)?;
        self.cursor += 1;
        Ok(frame)
    }

    async fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn three_frames() -> Vec<Frame> {
    vec![
        Frame::from_entities(0, vec![entity("veh0", 0.0), entity("veh1", 0.0)]),
        Frame::from_entities(1000, vec![entity("veh0", 1.0), entity("veh1", 0.0)]),
        Frame::from_entities(2000, vec![entity("veh0", 2.0)]),
    ]
}

fn controller(source: ScriptedSource) -> SimulationController {
    SimulationController::new("toy", Box::new(source), 30)
}

#[tokio::test]
async fn test_initial_state() {
    let ctl = controller(ScriptedSource::new(vec![]));
    assert_eq!(
        ctl.state(),
        SimulationState {
            status: SimulationStatus::Off,
            scenario: "toy".into(),
            delay_ms: 30
        }
    );
}

#[tokio::test]
async fn test_transition_table() {
    let mut ctl = controller(ScriptedSource::new(three_frames()));

    // OFF
    assert!(matches!(
        ctl.apply(Action::Pause).await,
        Err(ControlError::IllegalTransition { action: "pause", status: SimulationStatus::Off })
    ));
    assert!(ctl.apply(Action::Resume).await.is_err());
    assert_eq!(ctl.status(), SimulationStatus::Off);
    ctl.apply(Action::Cancel).await.unwrap();
    assert_eq!(ctl.status(), SimulationStatus::Off);

    ctl.apply(Action::Start).await.unwrap();
    assert_eq!(ctl.status(), SimulationStatus::Running);

    // RUNNING
    ctl.apply(Action::Start).await.unwrap();
    ctl.apply(Action::Resume).await.unwrap();
    assert_eq!(ctl.status(), SimulationStatus::Running);
    ctl.apply(Action::Pause).await.unwrap();
    assert_eq!(ctl.status(), SimulationStatus::Paused);

    // PAUSED
    ctl.apply(Action::Pause).await.unwrap();
    ctl.apply(Action::Start).await.unwrap();
    assert_eq!(ctl.status(), SimulationStatus::Paused);
    ctl.apply(Action::Resume).await.unwrap();
    assert_eq!(ctl.status(), SimulationStatus::Running);

    ctl.apply(Action::Cancel).await.unwrap();
    assert_eq!(ctl.status(), SimulationStatus::Off);
}

#[tokio::test]
async fn test_change_delay_in_any_state() {
    let mut ctl = controller(ScriptedSource::new(three_frames()));
    ctl.apply(Action::ChangeDelay(250)).await.unwrap();
    assert_eq!(ctl.state().delay_ms, 250);
    assert_eq!(ctl.status(), SimulationStatus::Off);

    ctl.apply(Action::Start).await.unwrap();
    ctl.apply(Action::ChangeDelay(0)).await.unwrap();
    assert_eq!(ctl.status(), SimulationStatus::Running);
    assert_eq!(ctl.delay().as_millis(), 0);
}

#[tokio::test]
async fn test_ticks_produce_deltas_then_end() {
    let mut ctl = controller(ScriptedSource::new(three_frames()));
    ctl.apply(Action::Start).await.unwrap();

    let TickOutcome::Snapshot(first) = ctl.tick().await else {
        panic!("expected snapshot");
    };
    assert_eq!(first.vehicles.len(), 2);
    assert_eq!(first.vehicle_counts[&VehicleClass::Passenger], 2);
    assert!(first.lights.is_none());

    let TickOutcome::Snapshot(second) = ctl.tick().await else {
        panic!("expected snapshot");
    };
    assert_eq!(second.time_ms, 1000);
    assert_eq!(second.vehicles.len(), 1);
    assert_eq!(second.vehicles.get("veh0"), Some(&Change::Upsert(entity("veh0", 1.0))));

    let TickOutcome::Snapshot(third) = ctl.tick().await else {
        panic!("expected snapshot");
    };
    assert_eq!(third.vehicles.get("veh1"), Some(&Change::Tombstone));

    assert!(matches!(ctl.tick().await, TickOutcome::Ended));
    assert_eq!(ctl.status(), SimulationStatus::Off);
    assert!(ctl.cache_is_empty());
    assert_eq!(ctl.steps(), 4);
}

#[tokio::test]
async fn test_paused_tick_does_not_step_source() {
    let source = ScriptedSource::new(three_frames());
    let steps = Arc::clone(&source.steps);
    let mut ctl = controller(source);

    ctl.apply(Action::Start).await.unwrap();
    assert!(matches!(ctl.tick().await, TickOutcome::Snapshot(_)));
    ctl.apply(Action::Pause).await.unwrap();

    for _ in 0..5 {
        assert!(matches!(ctl.tick().await, TickOutcome::Idle));
    }
    assert_eq!(steps.load(Ordering::SeqCst), 1);

    ctl.apply(Action::Resume).await.unwrap();
    assert!(matches!(ctl.tick().await, TickOutcome::Snapshot(_)));
    assert_eq!(steps.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_off_tick_is_idle() {
    let source = ScriptedSource::new(three_frames());
    let steps = Arc::clone(&source.steps);
    let mut ctl = controller(source);

    assert!(matches!(ctl.tick().await, TickOutcome::Idle));
    assert_eq!(steps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_clears_cache_from_every_state() {
    for pause_first in [false, true] {
        let source = ScriptedSource::new(three_frames());
        let stops = Arc::clone(&source.stops);
        let mut ctl = controller(source);

        ctl.apply(Action::Start).await.unwrap();
        ctl.tick().await;
        assert!(!ctl.cache_is_empty());
        if pause_first {
            ctl.apply(Action::Pause).await.unwrap();
        }

        ctl.apply(Action::Cancel).await.unwrap();
        assert_eq!(ctl.status(), SimulationStatus::Off);
        assert!(ctl.cache_is_empty());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_restart_after_cancel_resends_everything() {
    let mut ctl = controller(ScriptedSource::new(three_frames()));
    ctl.apply(Action::Start).await.unwrap();
    ctl.tick().await;
    ctl.apply(Action::Cancel).await.unwrap();
    ctl.apply(Action::Start).await.unwrap();

    let TickOutcome::Snapshot(report) = ctl.tick().await else {
        panic!("expected snapshot");
    };
    assert_eq!(report.vehicles.len(), 2);
}

#[tokio::test]
async fn test_failed_start_stays_off() {
    let mut source = ScriptedSource::new(three_frames());
    source.fail_start = true;
    let steps = Arc::clone(&source.steps);
    let mut ctl = controller(source);

    let err = ctl.apply(Action::Start).await.unwrap_err();
    assert!(matches!(err, ControlError::Source(SourceError::Unavailable(_))));
    assert_eq!(ctl.status(), SimulationStatus::Off);
    assert!(matches!(ctl.tick().await, TickOutcome::Idle));
    assert_eq!(steps.load(Ordering::SeqCst), 0);
}

/// Source whose second step fails
struct FlakySource {
    calls: u32,
}

#[async_trait]
impl DataSource for FlakySource {
    async fn start(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame, SourceError> {
        self.calls += 1;
        if self.calls > 1 {
            return Err(SourceError::Unavailable("engine connection lost".into()));
        }
        Ok(Frame::from_entities(0, vec![entity("veh0", 0.0)]))
    }

    async fn stop(&mut self) {}
}

#[tokio::test]
async fn test_failed_tick_stops_instead_of_skipping() {
    let mut ctl = SimulationController::new("live", Box::new(FlakySource { calls: 0 }), 0);
    ctl.apply(Action::Start).await.unwrap();
    assert!(matches!(ctl.tick().await, TickOutcome::Snapshot(_)));
    assert!(matches!(ctl.tick().await, TickOutcome::Failed(_)));
    assert_eq!(ctl.status(), SimulationStatus::Off);
    assert!(ctl.cache_is_empty());
    assert!(matches!(ctl.tick().await, TickOutcome::Idle));
}
