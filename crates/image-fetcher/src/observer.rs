//! Observer hooks for progress and failures

use crate::error::FetchError;
use crate::types::{ProgressEvent, ResolveEvent};
use tokio::sync::mpsc::UnboundedSender;

/// Receives progress ticks and errors while a resolve runs.
///
/// Both hooks may be called zero or more times and are never called after the
/// resolve has returned. `()` is the no-op observer.
pub trait ResolveObserver: Send + Sync {
    fn on_progress(&self, _progress: &ProgressEvent) {}

    fn on_error(&self, _error: &FetchError) {}
}

impl ResolveObserver for () {}

/// Forwards progress and errors into a streamed resolve's channel
pub(crate) struct ChannelObserver {
    pub(crate) tx: UnboundedSender<ResolveEvent>,
}

impl ResolveObserver for ChannelObserver {
    fn on_progress(&self, progress: &ProgressEvent) {
        // Nobody listening is fine, the resolve still completes
        let _ = self.tx.send(ResolveEvent::Progress(*progress));
    }

    fn on_error(&self, error: &FetchError) {
        let _ = self.tx.send(ResolveEvent::Error(error.to_string()));
    }
}
