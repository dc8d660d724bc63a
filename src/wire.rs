//! Line-oriented front end: one command per line in, one JSON object per
//! line out. `LISTEN` additionally streams `{"event":...}` lines for the
//! property until the connection closes.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::command::{parse_command, Command};
use crate::config::EngineConfig;
use crate::engine::{AvailabilityEngine, EngineError};
use crate::limits::MAX_LINE_LEN;
use crate::model::*;
use crate::observability::{command_label, COMMANDS_TOTAL, COMMAND_DURATION_SECONDS};
use crate::store::Store;

/// Everything a connection needs: the store for property registration and
/// the engine for bookings.
pub struct Service {
    pub store: Arc<Store>,
    pub engine: AvailabilityEngine,
}

impl Service {
    pub fn new(store: Arc<Store>, config: EngineConfig) -> Self {
        let engine = AvailabilityEngine::with_store(store.clone(), config);
        Self { store, engine }
    }

    /// Run a command and build its success payload. `Listen` is answered
    /// here but subscribed by the connection loop.
    pub async fn execute(&self, cmd: Command) -> Result<Value, EngineError> {
        let engine = &self.engine;
        Ok(match cmd {
            Command::RegisterProperty {
                property_id,
                max_guests,
            } => {
                let info = self.store.register_property(property_id, max_guests).await?;
                json!({ "ok": true, "property": info })
            }
            Command::Reserve {
                property_id,
                guest_id,
                range,
                guest_count,
            } => {
                let booking = engine.reserve(property_id, guest_id, range, guest_count).await?;
                json!({ "ok": true, "booking": booking })
            }
            Command::Cancel {
                booking_id,
                guest_id,
            } => {
                let booking = engine.cancel_checked(booking_id, guest_id).await?;
                json!({ "ok": true, "cancelled": booking })
            }
            Command::Available { property_id, range } => {
                let available = engine.is_available(property_id, range).await?;
                json!({ "ok": true, "available": available })
            }
            Command::Booked { property_id } => {
                let ranges = engine.booked_ranges(property_id).await?;
                json!({ "ok": true, "ranges": ranges })
            }
            Command::Blocked {
                property_id,
                window,
            } => {
                let dates = engine.blocked_dates(property_id, window).await?;
                json!({ "ok": true, "dates": dates })
            }
            Command::Bookings { property_id } => {
                let bookings = engine.bookings_for_property(property_id).await?;
                json!({ "ok": true, "bookings": bookings })
            }
            Command::Trips { guest_id } => {
                let bookings = engine.bookings_for_guest(guest_id).await?;
                json!({ "ok": true, "bookings": bookings })
            }
            Command::Listen { property_id } => json!({ "ok": true, "listening": property_id }),
        })
    }
}

pub fn error_reply(kind: &str, message: impl std::fmt::Display) -> Value {
    json!({ "ok": false, "error": kind, "message": message.to_string() })
}

fn codec_err(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

/// Forward a property's broadcast into the connection's outbound queue.
fn spawn_forwarder(mut rx: broadcast::Receiver<Event>, out: mpsc::Sender<Value>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if out.send(json!({ "event": event })).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("listener lagged, {n} events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn handle_line(
    service: &Service,
    line: &str,
    events_tx: &mpsc::Sender<Value>,
    forwarders: &mut HashMap<PropertyId, JoinHandle<()>>,
) -> Value {
    let cmd = match parse_command(line) {
        Ok(cmd) => cmd,
        Err(e) => return error_reply("parse", e),
    };
    let label = command_label(&cmd);
    let started = Instant::now();

    // One forwarder per property, however often it is listened to.
    if let Command::Listen { property_id } = &cmd {
        forwarders.entry(*property_id).or_insert_with(|| {
            let rx = service.store.notify.subscribe(*property_id);
            spawn_forwarder(rx, events_tx.clone())
        });
    }

    let reply = match service.execute(cmd).await {
        Ok(value) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "ok").increment(1);
            value
        }
        Err(e) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => e.kind())
                .increment(1);
            if e.is_transient() {
                tracing::warn!("{label} failed: {e}");
            }
            error_reply(e.kind(), e)
        }
    };
    metrics::histogram!(COMMAND_DURATION_SECONDS, "command" => label)
        .record(started.elapsed().as_secs_f64());
    reply
}

/// Serve one client until it disconnects.
pub async fn process_connection(socket: TcpStream, service: Arc<Service>) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    let (events_tx, mut events_rx) = mpsc::channel::<Value>(256);
    let mut forwarders = HashMap::new();

    let result = loop {
        tokio::select! {
            incoming = framed.next() => {
                let reply = match incoming {
                    None => break Ok(()),
                    Some(Ok(line)) if line.trim().is_empty() => continue,
                    Some(Ok(line)) => {
                        handle_line(&service, &line, &events_tx, &mut forwarders).await
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        error_reply("parse", format!("line longer than {MAX_LINE_LEN} bytes"))
                    }
                    Some(Err(e)) => break Err(codec_err(e)),
                };
                if let Err(e) = framed.send(reply.to_string()).await {
                    break Err(codec_err(e));
                }
            }
            Some(event) = events_rx.recv() => {
                if let Err(e) = framed.send(event.to_string()).await {
                    break Err(codec_err(e));
                }
            }
        }
    };

    for handle in forwarders.into_values() {
        handle.abort();
    }
    result
}
