use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGTERM and SIGINT streams, awaited together.
pub struct TerminationSignals {
    term: Signal,
    int: Signal,
}

impl TerminationSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            int: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next termination signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.term.recv() => "SIGTERM",
            _ = self.int.recv() => "SIGINT",
        }
    }
}
