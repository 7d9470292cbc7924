use crate::session::protocol::{
    parse_action, ErrorMessage, ProtocolError, SnapshotMessage, StatusMessage,
};
use crate::session::transport::{Transport, TransportError};
use crate::simulation::{Action, SimulationController, SimulationStatus, TickOutcome};
use serde::Serialize;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Why the message loop stopped
enum Exit {
    Disconnected,
    Protocol(ProtocolError),
}

/// Runs one client connection: applies inbound actions to the session's own
/// controller and streams a snapshot per tick.
///
/// Inbound messages and the tick timer are multiplexed in a single task, so
/// there is never more than one tick loop and a tick is never interrupted
/// between stepping the source and sending the result.
pub struct StreamingSession {
    controller: SimulationController,
    next_tick: Instant,
    last_tick: Option<Instant>,
}

impl StreamingSession {
    pub fn new(controller: SimulationController) -> Self {
        Self {
            controller,
            next_tick: Instant::now(),
            last_tick: None,
        }
    }

    /// Drive the session until the peer leaves or breaks the protocol.
    ///
    /// The controller is always shut down on exit and handed back.
    pub async fn run<T: Transport>(mut self, transport: &mut T) -> SimulationController {
        info!(scenario = %self.controller.scenario(), "Streaming session opened");

        let exit = loop {
            let running = self.controller.is_running();
            let next_tick = self.next_tick;

            tokio::select! {
                biased;

                inbound = transport.recv() => {
                    let text = match inbound {
                        Some(Ok(text)) => text,
                        Some(Err(TransportError::UnsupportedFrame(kind))) => {
                            break Exit::Protocol(ProtocolError::UnsupportedFrame(kind));
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Transport error");
                            break Exit::Disconnected;
                        }
                        None => break Exit::Disconnected,
                    };

                    let action = match parse_action(&text) {
                        Ok(action) => action,
                        Err(e) => break Exit::Protocol(e),
                    };

                    let status = self.handle_action(action).await;
                    if send_json(transport, &status).await.is_err() {
                        break Exit::Disconnected;
                    }
                }

                _ = sleep_until(next_tick), if running => {
                    if self.tick(transport).await.is_err() {
                        break Exit::Disconnected;
                    }
                }
            }
        };

        match exit {
            Exit::Disconnected => {
                info!(scenario = %self.controller.scenario(), "Client disconnected");
            }
            Exit::Protocol(e) => {
                warn!(error = %e, "Protocol error, closing session");
                let _ = send_json(transport, &ErrorMessage::from(&e)).await;
                transport.close().await;
            }
        }

        self.controller.shutdown().await;
        info!(
            scenario = %self.controller.scenario(),
            steps = self.controller.steps(),
            "Streaming session closed"
        );
        self.controller
    }

    /// Apply an action and build the status reply
    async fn handle_action(&mut self, action: Action) -> StatusMessage {
        let before = self.controller.status();
        let result = self.controller.apply(action).await;
        let after = self.controller.status();

        match (action, before, after) {
            (Action::Start, SimulationStatus::Off, SimulationStatus::Running) => {
                self.last_tick = None;
                self.reschedule();
            }
            (Action::Resume, SimulationStatus::Paused, SimulationStatus::Running)
            | (Action::ChangeDelay(_), _, _) => self.reschedule(),
            _ => {}
        }

        let status = StatusMessage::from(self.controller.state());
        match result {
            Ok(()) => status,
            Err(e) => {
                warn!(action = action.name(), error = %e, "Action rejected");
                status.with_error(e)
            }
        }
    }

    /// One tick: step, diff, send
    async fn tick<T: Transport>(&mut self, transport: &mut T) -> Result<(), TransportError> {
        match self.controller.tick().await {
            TickOutcome::Snapshot(report) => {
                send_json(transport, &SnapshotMessage::from(report)).await?;
                self.last_tick = Some(Instant::now());
                self.reschedule();
            }
            TickOutcome::Ended => {
                send_json(transport, &StatusMessage::from(self.controller.state())).await?;
            }
            TickOutcome::Failed(e) => {
                let status = StatusMessage::from(self.controller.state()).with_error(e);
                send_json(transport, &status).await?;
            }
            TickOutcome::Idle => {}
        }
        Ok(())
    }

    /// Next tick is one delay after the last one, or immediately if none ran yet
    fn reschedule(&mut self) {
        self.next_tick = match self.last_tick {
            Some(last) => last + self.controller.delay(),
            None => Instant::now(),
        };
        debug!(delay_ms = self.controller.delay().as_millis() as u64, "Tick rescheduled");
    }
}

async fn send_json<T: Transport, M: Serialize>(
    transport: &mut T,
    msg: &M,
) -> Result<(), TransportError> {
    let json = serde_json::to_string(msg)?;
    transport.send(json).await
}
