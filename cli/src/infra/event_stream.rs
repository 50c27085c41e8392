//! Headless output: line-delimited JSON from a child's stdout.
//!
//! A background task reads lines and pushes them through a channel; the
//! caller's task is the only consumer and updates the sink at most once per
//! interval, flushing the last event after the stream ends.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::application::ports::AgentEventSink;
use crate::domain::AgentEvent;

/// Minimum time between two sink updates.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

const CHANNEL_CAPACITY: usize = 256;

enum StreamItem {
    Event(AgentEvent),
    Line(String),
}

/// Read `reader` to EOF, delivering events to `sink`.
pub async fn pump<R>(reader: R, sink: &dyn AgentEventSink, interval: Duration)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let reader_task = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let item = match AgentEvent::parse(&line) {
                        Some(event) => StreamItem::Event(event),
                        None => StreamItem::Line(line),
                    };
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::debug!(error = %err, "event stream read failed");
                    break;
                }
            }
        }
    });

    consume(rx, sink, interval).await;
    if let Err(err) = reader_task.await {
        tracing::debug!(error = %err, "event reader task ended abnormally");
    }
}

async fn consume(mut rx: mpsc::Receiver<StreamItem>, sink: &dyn AgentEventSink, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut pending: Option<AgentEvent> = None;

    loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(StreamItem::Event(event)) => pending = Some(event),
                Some(StreamItem::Line(line)) => sink.passthrough(&line),
                None => break,
            },
            _ = ticker.tick() => {
                if let Some(event) = pending.take() {
                    sink.event(&event);
                }
            }
        }
    }

    if let Some(event) = pending.take() {
        sink.event(&event);
    }
    sink.finish();
}
