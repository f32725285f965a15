use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{ChannelEvent, WindowInfo};
use crate::services::channel::{notify, EventSource};

/// Режим монитора: события фокуса не применяются здесь, а пересылаются
/// системному демону через его сокет
pub struct Forwarder {
    socket_path: PathBuf,
    timeout: Duration,
    verbose: bool,
}

impl Forwarder {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration, verbose: bool) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
            verbose,
        }
    }

    pub async fn forward(&self, window: &WindowInfo) {
        let identity = window.identity();
        if self.verbose {
            info!("Active window: {}", identity);
        }

        let message = WindowInfo::new(identity.class(), identity.title());
        if let Err(e) = notify(&self.socket_path, &message, self.timeout).await {
            warn!("Не удалось передать окно демону: {}", e);
        }
    }

    pub async fn run<S>(&self, source: &mut S) -> Result<()>
    where
        S: EventSource + Send + ?Sized,
    {
        loop {
            match source.receive().await? {
                ChannelEvent::Window(window) => self.forward(&window).await,
                ChannelEvent::Wake => debug_if_enabled!("Пробуждение в режиме монитора игнорируется"),
                ChannelEvent::Shutdown => return Ok(()),
            }
        }
    }
}
