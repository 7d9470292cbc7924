use super::{DataSource, SourceError};
use crate::config::EngineConfig;
use crate::entity::{normalize_vehicle_type, Frame, MovingEntity, TrafficSignal, VehicleClass};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Errors reported by an external simulation engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("failed to launch engine: {0}")]
    Launch(String),

    #[error("engine connection lost: {0}")]
    Connection(String),

    #[error("{domain:?} '{id}' has no value for {variable:?}")]
    MissingVariable {
        domain: Domain,
        id: String,
        variable: Variable,
    },

    #[error("{variable:?} has unexpected value type")]
    UnexpectedType { variable: Variable },
}

/// Object domains the engine exposes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    Vehicle,
    Person,
    Signal,
}

/// Per-object variables a subscription can request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variable {
    Type,
    Speed,
    Angle,
    Length,
    Width,
    Position,
    Position3d,
    Signals,
    VehicleClass,
    Phase,
    Program,
}

/// Value of one subscribed variable
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Integer(i64),
    Position([f64; 3]),
}

/// Subscription results for one object
pub type Record = HashMap<Variable, Value>;

/// Variables subscribed for every vehicle
pub const VEHICLE_VARIABLES: [Variable; 8] = [
    Variable::Type,
    Variable::Speed,
    Variable::Angle,
    Variable::Length,
    Variable::Width,
    Variable::Position3d,
    Variable::Signals,
    Variable::VehicleClass,
];

/// Variables subscribed for every person
pub const PERSON_VARIABLES: [Variable; 6] = [
    Variable::Type,
    Variable::Speed,
    Variable::Angle,
    Variable::Length,
    Variable::Width,
    Variable::Position,
];

/// Variables subscribed for every traffic signal
pub const SIGNAL_VARIABLES: [Variable; 2] = [Variable::Phase, Variable::Program];

/// How to launch the engine for one scenario
#[derive(Clone, Debug, PartialEq)]
pub struct LaunchOptions {
    pub binary: String,
    pub config_file: PathBuf,
    pub extra_args: Vec<String>,
}

impl LaunchOptions {
    pub fn new(engine: &EngineConfig, config_file: PathBuf) -> Self {
        Self {
            binary: engine.binary_name(),
            config_file,
            extra_args: engine.extra_args.clone(),
        }
    }

    /// Full command line: binary, `-c <config>`, then extra arguments
    pub fn command_line(&self) -> Vec<String> {
        let mut args = vec![
            self.binary.clone(),
            "-c".to_string(),
            self.config_file.display().to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Control surface of an external, stepped simulation engine.
///
/// The live source is the only caller. Implementations wrap whatever client
/// protocol the engine speaks.
#[async_trait]
pub trait SimulationEngine: Send {
    async fn launch(&mut self, options: &LaunchOptions) -> Result<(), EngineError>;

    /// Subscribe to variables of one object; re-subscribing is a no-op
    async fn subscribe(
        &mut self,
        domain: Domain,
        id: &str,
        variables: &[Variable],
    ) -> Result<(), EngineError>;

    /// Advance the engine by one discrete step
    async fn step(&mut self) -> Result<(), EngineError>;

    /// Current simulated time in milliseconds
    async fn time_ms(&mut self) -> Result<u64, EngineError>;

    /// Vehicles that entered the simulation during the last step
    async fn departed_vehicle_ids(&mut self) -> Result<Vec<String>, EngineError>;

    /// Ids currently active in a domain
    async fn ids(&mut self, domain: Domain) -> Result<Vec<String>, EngineError>;

    /// Subscription results for one object
    async fn results(&mut self, domain: Domain, id: &str) -> Result<Record, EngineError>;

    async fn close(&mut self);
}

/// Builds a fresh engine handle per session
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn SimulationEngine> + Send + Sync>;

/// Engine used when no engine client is linked in; every launch fails
pub struct UnavailableEngine;

impl UnavailableEngine {
    pub fn factory() -> EngineFactory {
        Arc::new(|| Box::new(UnavailableEngine) as Box<dyn SimulationEngine>)
    }
}

#[async_trait]
impl SimulationEngine for UnavailableEngine {
    async fn launch(&mut self, options: &LaunchOptions) -> Result<(), EngineError> {
        Err(EngineError::Launch(format!(
            "no engine client available to run '{}'",
            options.binary
        )))
    }

    async fn subscribe(&mut self, _: Domain, _: &str, _: &[Variable]) -> Result<(), EngineError> {
        Err(EngineError::Connection("engine not running".into()))
    }

    async fn step(&mut self) -> Result<(), EngineError> {
        Err(EngineError::Connection("engine not running".into()))
    }

    async fn time_ms(&mut self) -> Result<u64, EngineError> {
        Err(EngineError::Connection("engine not running".into()))
    }

    async fn departed_vehicle_ids(&mut self) -> Result<Vec<String>, EngineError> {
        Err(EngineError::Connection("engine not running".into()))
    }

    async fn ids(&mut self, _: Domain) -> Result<Vec<String>, EngineError> {
        Err(EngineError::Connection("engine not running".into()))
    }

    async fn results(&mut self, _: Domain, _: &str) -> Result<Record, EngineError> {
        Err(EngineError::Connection("engine not running".into()))
    }

    async fn close(&mut self) {}
}

/// Drives an external engine one step per tick
pub struct LiveSource {
    engine: Box<dyn SimulationEngine>,
    options: LaunchOptions,
    running: bool,
}

impl LiveSource {
    pub fn new(engine: Box<dyn SimulationEngine>, options: LaunchOptions) -> Self {
        Self {
            engine,
            options,
            running: false,
        }
    }

    async fn collect_vehicles(&mut self) -> Result<Vec<MovingEntity>, SourceError> {
        // Subscriptions persist, so only newly departed vehicles need one
        let departed = self.engine.departed_vehicle_ids().await?;
        for id in &departed {
            self.engine
                .subscribe(Domain::Vehicle, id, &VEHICLE_VARIABLES)
                .await?;
        }

        let mut ids: HashSet<String> = self.engine.ids(Domain::Vehicle).await?.into_iter().collect();
        ids.extend(departed);

        let mut vehicles = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self.engine.results(Domain::Vehicle, &id).await?;
            vehicles.push(vehicle_from_record(id, &record)?);
        }
        Ok(vehicles)
    }

    async fn collect_persons(&mut self) -> Result<Vec<MovingEntity>, SourceError> {
        // Persons are not reported as departed, so subscribe every active one
        let ids = self.engine.ids(Domain::Person).await?;
        let mut persons = Vec::with_capacity(ids.len());
        for id in ids {
            self.engine
                .subscribe(Domain::Person, &id, &PERSON_VARIABLES)
                .await?;
            let record = self.engine.results(Domain::Person, &id).await?;
            persons.push(person_from_record(id, &record)?);
        }
        Ok(persons)
    }

    async fn collect_signals(&mut self) -> Result<HashMap<String, TrafficSignal>, SourceError> {
        let mut signals = HashMap::new();
        for id in self.engine.ids(Domain::Signal).await? {
            let record = self.engine.results(Domain::Signal, &id).await?;
            let signal = TrafficSignal {
                phase: integer(&record, Domain::Signal, &id, Variable::Phase)?,
                program_id: text(&record, Domain::Signal, &id, Variable::Program)?,
                id: id.clone(),
            };
            signals.insert(id, signal);
        }
        Ok(signals)
    }
}

#[async_trait]
impl DataSource for LiveSource {
    async fn start(&mut self) -> Result<(), SourceError> {
        let command = self.options.command_line().join(" ");
        info!(command = %command, "Launching simulation engine");

        if let Err(e) = self.engine.launch(&self.options).await {
            self.engine.close().await;
            return Err(SourceError::Unavailable(e.to_string()));
        }
        self.running = true;

        // The signal set never changes over a run, so subscribe once
        let signal_ids = match self.engine.ids(Domain::Signal).await {
            Ok(ids) => ids,
            Err(e) => {
                self.stop().await;
                return Err(SourceError::Unavailable(e.to_string()));
            }
        };
        for id in &signal_ids {
            if let Err(e) = self
                .engine
                .subscribe(Domain::Signal, id, &SIGNAL_VARIABLES)
                .await
            {
                self.stop().await;
                return Err(SourceError::Unavailable(e.to_string()));
            }
        }

        info!(signals = signal_ids.len(), "Simulation engine started");
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if !self.running {
            return Err(SourceError::NotStarted);
        }

        self.engine.step().await?;

        let mut entities = self.collect_vehicles().await?;
        entities.extend(self.collect_persons().await?);

        let mut frame = Frame::from_entities(
            self.engine.time_ms().await?,
            entities.into_iter().map(MovingEntity::rounded),
        );
        frame.lights = Some(self.collect_signals().await?);

        debug!(
            time_ms = frame.time_ms,
            entities = frame.vehicles.len(),
            "Engine stepped"
        );
        Ok(frame)
    }

    async fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.engine.close().await;
            info!("Simulation engine closed");
        }
    }
}

fn vehicle_from_record(id: String, record: &Record) -> Result<MovingEntity, SourceError> {
    let d = Domain::Vehicle;
    let [x, y, z] = position(record, d, &id, Variable::Position3d)?;
    let class = match record.get(&Variable::VehicleClass) {
        Some(Value::Text(label)) => VehicleClass::from_label(label),
        _ => VehicleClass::Passenger,
    };
    let signals = match record.get(&Variable::Signals) {
        Some(_) => integer(record, d, &id, Variable::Signals)?,
        None => 0,
    };

    let entity = MovingEntity {
        x,
        y,
        z,
        speed: number(record, d, &id, Variable::Speed)?,
        angle: number(record, d, &id, Variable::Angle)?,
        vehicle_type: normalize_vehicle_type(Some(text(record, d, &id, Variable::Type)?.as_str())),
        class,
        length: number(record, d, &id, Variable::Length)?,
        width: number(record, d, &id, Variable::Width)?,
        signals,
        color: None,
        id,
    };
    Ok(entity.validate()?)
}

fn person_from_record(id: String, record: &Record) -> Result<MovingEntity, SourceError> {
    let d = Domain::Person;
    let [x, y, _] = position(record, d, &id, Variable::Position)?;
    let entity = MovingEntity {
        x,
        y,
        z: 0.0,
        speed: number(record, d, &id, Variable::Speed)?,
        angle: number(record, d, &id, Variable::Angle)?,
        vehicle_type: normalize_vehicle_type(Some(text(record, d, &id, Variable::Type)?.as_str())),
        class: VehicleClass::Pedestrian,
        length: number(record, d, &id, Variable::Length)?,
        width: number(record, d, &id, Variable::Width)?,
        signals: 0,
        color: None,
        id,
    };
    Ok(entity.validate()?)
}

fn lookup<'a>(
    record: &'a Record,
    domain: Domain,
    id: &str,
    variable: Variable,
) -> Result<&'a Value, EngineError> {
    record.get(&variable).ok_or_else(|| EngineError::MissingVariable {
        domain,
        id: id.to_string(),
        variable,
    })
}

fn number(record: &Record, domain: Domain, id: &str, variable: Variable) -> Result<f64, EngineError> {
    match lookup(record, domain, id, variable)? {
        Value::Number(n) => Ok(*n),
        Value::Integer(n) => Ok(*n as f64),
        _ => Err(EngineError::UnexpectedType { variable }),
    }
}

fn integer(record: &Record, domain: Domain, id: &str, variable: Variable) -> Result<i64, EngineError> {
    match lookup(record, domain, id, variable)? {
        Value::Integer(n) => Ok(*n),
        Value::Number(n) if n.fract() == 0.0 => Ok(*n as i64),
        _ => Err(EngineError::UnexpectedType { variable }),
    }
}

fn text(record: &Record, domain: Domain, id: &str, variable: Variable) -> Result<String, EngineError> {
    match lookup(record, domain, id, variable)? {
        Value::Text(s) => Ok(s.clone()),
        _ => Err(EngineError::UnexpectedType { variable }),
    }
}

fn position(
    record: &Record,
    domain: Domain,
    id: &str,
    variable: Variable,
) -> Result<[f64; 3], EngineError> {
    match lookup(record, domain, id, variable)? {
        Value::Position(p) => Ok(*p),
        _ => Err(EngineError::UnexpectedType { variable }),
    }
}
