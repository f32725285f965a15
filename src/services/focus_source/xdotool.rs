use tokio::process::Command;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use super::r#trait::FocusSource;
use crate::app_error;
use crate::error::Result;
use crate::events::WindowInfo;
use crate::services::channel::WindowHandler;

/// X11: опрос активного окна через xdotool
pub struct XdotoolFocusSource {
    poll_interval: Duration,
}

impl XdotoolFocusSource {
    pub async fn probe(poll_interval: Duration) -> Option<Self> {
        if std::env::var_os("DISPLAY").is_none() {
            return None;
        }

        match Self::query("getwindowname").await {
            Ok(_) => Some(Self { poll_interval }),
            Err(e) => {
                debug!("xdotool не работает: {}", e);
                None
            }
        }
    }

    async fn query(command: &str) -> Result<String> {
        let output = Command::new("xdotool")
            .args(["getactivewindow", command])
            .output()
            .await
            .map_err(|e| app_error!(service_unavailable, "xdotool не найден: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(app_error!(internal, "xdotool {} вернул ошибку: {}", command, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn active_window() -> Result<WindowInfo> {
        let class = Self::query("getwindowclassname").await?;
        let title = Self::query("getwindowname").await?;
        Ok(WindowInfo::new(class, title))
    }
}

#[async_trait::async_trait]
impl FocusSource for XdotoolFocusSource {
    fn name(&self) -> &'static str {
        "x11 (xdotool)"
    }

    async fn start(self: Box<Self>, handler: WindowHandler) -> Result<()> {
        info!("Опрос активного окна через xdotool каждые {:?}", self.poll_interval);

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut current: Option<WindowInfo> = None;

        loop {
            ticker.tick().await;

            let window = match Self::active_window().await {
                Ok(window) => window,
                // Например, на рабочем столе нет активного окна
                Err(e) => {
                    debug!("Не удалось получить активное окно: {}", e);
                    continue;
                }
            };

            if current.as_ref() == Some(&window) {
                continue;
            }

            debug!("Смена активного окна: {}", window);
            if !handler.on_window_change(&window.class, &window.title) {
                return Ok(());
            }
            current = Some(window);
        }
    }
}
