//! Structured progress reporting.
//!
//! Pipeline stages never print directly. They emit [`ProgressEvent`]s into a
//! [`ProgressSink`] chosen by the caller: the command-line tool logs them, tests
//! usually collect them over a channel.

use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    StageStarted { stage: String },
    StageFinished { stage: String, elapsed: Duration },
    TileStarted { tile: String },
    TileFinished { tile: String, elapsed: Duration },
    RunwayFlattened { runway: String, cells: usize },
    RunwayFailed { runway: String, reason: String },
    Warning { message: String },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::StageStarted { stage } => write!(f, "{stage}..."),
            ProgressEvent::StageFinished { stage, elapsed } => {
                write!(f, "{stage} done in {:.2}s", elapsed.as_secs_f64())
            }
            ProgressEvent::TileStarted { tile } => write!(f, "Building tile {tile}"),
            ProgressEvent::TileFinished { tile, elapsed } => {
                write!(f, "Tile {tile} finished in {:.2}s", elapsed.as_secs_f64())
            }
            ProgressEvent::RunwayFlattened { runway, cells } => {
                write!(f, "Flattened {runway} ({cells} cells)")
            }
            ProgressEvent::RunwayFailed { runway, reason } => {
                write!(f, "Could not flatten {runway}: {reason}")
            }
            ProgressEvent::Warning { message } => write!(f, "{message}"),
        }
    }
}

/// Receiver of progress events. Shared across worker threads.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    fn warn(&self, message: String) {
        self.emit(ProgressEvent::Warning { message });
    }
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(&event)
    }
}

/// Routes events through the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::Warning { .. } | ProgressEvent::RunwayFailed { .. } => log::warn!("{event}"),
            ProgressEvent::TileStarted { .. } => log::debug!("{event}"),
            _ => log::info!("{event}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events over an mpsc channel. Send errors (receiver gone) are ignored.
pub struct ChannelSink {
    sender: Mutex<Sender<ProgressEvent>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_channel_sink_forwards() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);
        sink.emit(ProgressEvent::TileStarted {
            tile: "0102".to_string(),
        });
        sink.warn("texture missing".to_string());

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ProgressEvent::Warning {
                message: "texture missing".to_string()
            }
        );
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &ProgressEvent| seen.lock().unwrap().push(event.to_string());
        sink.emit(ProgressEvent::RunwayFlattened {
            runway: "KXYZ".to_string(),
            cells: 12,
        });
        assert_eq!(seen.lock().unwrap()[0], "Flattened KXYZ (12 cells)");
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        ChannelSink::new(tx).warn("nobody listening".to_string());
    }
}
