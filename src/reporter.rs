use std::io::Write;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::types::CopyEvent;

/// Receiver of tracked/own trade notifications.
///
/// `emit` must never block the poll loop: a sink that cannot accept an event
/// right now drops it.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CopyEvent);
}

/// Sink used when nobody is listening.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: CopyEvent) {}
}

/// Emit each event as a single JSON line.
///
/// A failed write (closed stdout, broken pipe) drops the event.
pub struct JsonLineSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLineSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl EventSink for JsonLineSink {
    fn emit(&self, event: CopyEvent) {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                debug!("Dropping unserializable event: {e}");
                return;
            }
        };
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{json}").and_then(|()| out.flush()) {
            debug!("Dropping event: {e}");
        }
    }
}

/// Forwards events into a bounded channel for an embedding consumer.
pub struct ChannelSink {
    tx: mpsc::Sender<CopyEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver draining it.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CopyEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: CopyEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!("Dropping event: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventOrigin, InferredTrade, TradeType};
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    fn trade(asset: &str) -> InferredTrade {
        InferredTrade {
            asset_id: asset.to_string(),
            trade_type: TradeType::Buy,
            size: 1.0,
            price: Some(0.5),
            title: String::new(),
            outcome_label: String::new(),
            condition_id: String::new(),
            slug: String::new(),
        }
    }

    #[test]
    fn json_sink_writes_one_line_per_event() {
        let buf = SharedBuf::default();
        let sink = JsonLineSink::new(buf.clone());
        sink.emit(CopyEvent::tracked("0xw", trade("a1")));
        sink.emit(CopyEvent::own("0xw", trade("a2"), None));

        let written = String::from_utf8(buf.0.lock().clone()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["origin"], "tracked");
        assert_eq!(first["trade"]["asset_id"], "a1");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["origin"], "own");
    }

    #[test]
    fn json_sink_survives_broken_pipe() {
        let sink = JsonLineSink::new(BrokenPipe);
        sink.emit(CopyEvent::tracked("0xw", trade("a1")));
        sink.emit(CopyEvent::own("0xw", trade("a1"), None));
    }

    #[test]
    fn channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.emit(CopyEvent::tracked("0xw", trade("a1")));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.origin, EventOrigin::Tracked);
        assert_eq!(event.trade.asset_id, "a1");
    }

    #[test]
    fn full_channel_drops_without_blocking() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.emit(CopyEvent::tracked("0xw", trade("a1")));
        sink.emit(CopyEvent::tracked("0xw", trade("a2")));
        assert_eq!(rx.try_recv().unwrap().trade.asset_id, "a1");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.emit(CopyEvent::own("0xw", trade("a1"), None));
    }
}
