//! Frame streaming over WebSocket
//!
//! Clients send JPEG frames as binary messages. Each frame is answered, in
//! arrival order, with the annotated JPEG; sampled ticks are followed by a
//! `decision` event and a confirmed-drowsiness entry by an `alert` event.
//! While the alert plays, the connection reads no further frames.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use alerting::DispatchOutcome;
use dms::{Decision, DmsError, DrowsinessPipeline, FrameOutcome};
use video_frame::{decode_jpeg, encode_jpeg};

use crate::AppState;

/// JSON events sent alongside annotated frames
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Decision {
        sequence: u64,
        decision: Decision,
        #[serde(skip_serializing_if = "Option::is_none")]
        fault: Option<String>,
    },
    Alert {
        sequence: u64,
    },
}

/// HTTP handler that upgrades the connection to a frame stream
pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    run_session(sink, stream, state).await;
}

async fn run_session<Tx, Rx>(mut sink: Tx, mut stream: Rx, state: Arc<AppState>)
where
    Tx: Sink<Message, Error = axum::Error> + Unpin,
    Rx: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let session_id = Uuid::new_v4();
    let active = state.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
    gauge!("drowsy_active_sessions").set(active as f64);
    info!(session = %session_id, "Stream session started");

    let mut pipeline = DrowsinessPipeline::new(state.models.clone(), &state.settings.dms);
    let mut sequence = 0u64;

    while let Some(result) = stream.next().await {
        let bytes = match result {
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(session = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        let frame = match decode_jpeg(&bytes, sequence, now_ns()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session = %session_id, "Dropping undecodable frame: {}", e);
                counter!("drowsy_invalid_input_total").increment(1);
                continue;
            }
        };

        // Inference is CPU-bound; the pipeline travels to the blocking pool and back
        let processed = tokio::task::spawn_blocking(move || {
            let outcome = pipeline.process(&frame);
            (pipeline, outcome)
        })
        .await;
        let outcome = match processed {
            Ok((returned, outcome)) => {
                pipeline = returned;
                outcome
            }
            Err(e) => {
                error!(session = %session_id, "Frame processing task failed: {}", e);
                break;
            }
        };
        record_metrics(&outcome);

        let mut connected = send_outcome(&mut sink, &state, sequence, &outcome).await.is_ok();

        if outcome.decision.should_trigger_alert {
            if connected {
                connected = send_event(&mut sink, &StreamEvent::Alert { sequence }).await.is_ok();
            }
            // Played to completion even if the client is gone
            let dispatched = state.dispatcher.dispatch(true).await;
            pipeline.acknowledge_alert();
            match dispatched {
                DispatchOutcome::Played => counter!("drowsy_alerts_fired_total").increment(1),
                DispatchOutcome::Lost(_) => counter!("drowsy_alerts_lost_total").increment(1),
                DispatchOutcome::Idle | DispatchOutcome::Suppressed => {}
            }
        }

        if !connected {
            debug!(session = %session_id, "WebSocket sink closed");
            break;
        }

        sequence += 1;
    }

    let active = state.active_sessions.fetch_sub(1, Ordering::Relaxed) - 1;
    gauge!("drowsy_active_sessions").set(active as f64);
    info!(session = %session_id, frames = sequence, "Stream session ended");
}

async fn send_outcome<Tx>(
    sink: &mut Tx,
    state: &AppState,
    sequence: u64,
    outcome: &FrameOutcome,
) -> Result<(), axum::Error>
where
    Tx: Sink<Message, Error = axum::Error> + Unpin,
{
    match encode_jpeg(&outcome.frame, state.settings.server.jpeg_quality) {
        Ok(jpeg) => sink.send(Message::Binary(jpeg)).await?,
        Err(e) => warn!("Frame {} could not be encoded: {}", sequence, e),
    }

    if outcome.sampled {
        let event = StreamEvent::Decision {
            sequence,
            decision: outcome.decision.clone(),
            fault: outcome.fault.as_ref().map(DmsError::to_string),
        };
        send_event(sink, &event).await?;
    }
    Ok(())
}

async fn send_event<Tx>(sink: &mut Tx, event: &StreamEvent) -> Result<(), axum::Error>
where
    Tx: Sink<Message, Error = axum::Error> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(text) => sink.send(Message::Text(text)).await,
        Err(e) => {
            warn!("Event could not be serialized: {}", e);
            Ok(())
        }
    }
}

fn record_metrics(outcome: &FrameOutcome) {
    counter!("drowsy_frames_total").increment(1);
    if outcome.sampled {
        counter!("drowsy_sampled_ticks_total").increment(1);
    }
    match &outcome.fault {
        Some(DmsError::NoSubjectFound) => counter!("drowsy_no_subject_total").increment(1),
        Some(_) => counter!("drowsy_invalid_input_total").increment(1),
        None => {}
    }
}

fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
