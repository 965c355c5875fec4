use std::{sync::Arc, thread};
use parking_lot::Mutex;
use tracing::{info, warn};

use session::{Session, SessionConfig, SessionError};
use vbt_ingest_core::{channel, ControlOpcode, ControlTransport, InboundRx, IngestError, PayloadSource};

/// Stands in for the device link when replaying: control writes are logged
/// and counted instead of sent.
#[derive(Default)]
pub struct LoggingTransport {
    pub sent: Vec<ControlOpcode>,
}

impl ControlTransport for LoggingTransport {
    fn send_control(&mut self, opcode: ControlOpcode) -> Result<(), IngestError> {
        info!(?opcode, byte = opcode.as_byte(), "control write");
        self.sent.push(opcode);
        Ok(())
    }
}

pub struct AppSession {
    pub inner: Mutex<Session<LoggingTransport>>,
}

impl AppSession {
    pub fn new(config: SessionConfig) -> Self {
        let mut s = Session::new(config);
        s.connect(LoggingTransport::default());
        Self { inner: Mutex::new(s) }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub applied: usize,
    pub dropped: usize,
    pub rejected: usize,
}

/// Runs `src` on the tokio runtime and feeds everything it yields into the
/// session from a blocking thread, in arrival order. Returns once the source
/// is done and the channel has drained.
pub async fn run_source<S: PayloadSource + 'static>(src: S, sess: Arc<AppSession>) -> anyhow::Result<PumpStats> {
    let (tx, rx) = channel();
    let producer = tokio::spawn(async move { src.run(tx).await });
    let handle = thread::spawn(move || pump(rx, &sess));

    // the pump drains whatever was sent even when the source fails
    let produced: anyhow::Result<()> = match producer.await {
        Ok(r) => r.map_err(anyhow::Error::from),
        Err(e) => Err(e.into()),
    };
    let stats = tokio::task::spawn_blocking(move || handle.join())
        .await?
        .map_err(|_| anyhow::anyhow!("pump thread panicked"))?;
    if let Err(e) = produced {
        warn!(applied = stats.applied, dropped = stats.dropped, rejected = stats.rejected, error = %e, "source failed");
        return Err(e);
    }
    Ok(stats)
}

fn pump(rx: InboundRx, sess: &AppSession) -> PumpStats {
    let mut stats = PumpStats::default();
    // recv fails only once every sender is gone
    while let Ok(item) = rx.recv() {
        let mut inner = sess.inner.lock();
        match inner.on_inbound(item) {
            Ok(()) => stats.applied += 1,
            Err(SessionError::Decode(_)) => stats.dropped += 1,
            Err(SessionError::Command(e)) => {
                warn!(error = %e, state = ?inner.state(), "command rejected");
                stats.rejected += 1;
            }
        }
    }
    stats
}
