use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::FocusSource;
use crate::error::Result;
use crate::services::channel::WindowHandler;

const FAKE_WINDOWS: [(&str, &str); 4] = [
    ("Konsole", "Terminal - dry_run"),
    ("firefox", "Browser - dry_run"),
    ("Code", "Editor - dry_run"),
    ("steam_app_42", "Game - dry_run"),
];

pub struct DryRunFocusSource {
    period: Duration,
}

impl DryRunFocusSource {
    pub fn new() -> Self {
        Self {
            period: Duration::from_secs(10),
        }
    }

    #[cfg(test)]
    fn with_period(period: Duration) -> Self {
        Self { period }
    }
}

#[async_trait::async_trait]
impl FocusSource for DryRunFocusSource {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn start(self: Box<Self>, handler: WindowHandler) -> Result<()> {
        info!("Dry-run режим - источник фокуса работает в режиме эмуляции");

        let mut ticker = interval(self.period);

        for (class, title) in FAKE_WINDOWS.iter().cycle() {
            ticker.tick().await;

            info!("Dry-run: эмулируем смену окна на: {}|{}", class, title);
            if !handler.on_window_change(class, title) {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelEvent, WindowInfo};
    use crate::services::channel::{callback_channel, EventSource, Interrupts};

    #[tokio::test]
    async fn test_emits_fake_windows_until_channel_closes() {
        let (handler, mut channel) = callback_channel(Interrupts::disabled());
        let source = Box::new(DryRunFocusSource::with_period(Duration::from_millis(1)));
        let task = tokio::spawn(source.start(handler));

        assert_eq!(
            channel.receive().await.unwrap(),
            ChannelEvent::Window(WindowInfo::new("Konsole", "Terminal - dry_run"))
        );
        assert_eq!(
            channel.receive().await.unwrap(),
            ChannelEvent::Window(WindowInfo::new("firefox", "Browser - dry_run"))
        );

        drop(channel);
        assert!(task.await.unwrap().is_ok());
    }
}
