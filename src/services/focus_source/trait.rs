use std::time::Duration;
use tracing::{debug, info};

use super::dry_run::DryRunFocusSource;
use super::kde::KdeFocusSource;
use super::xdotool::XdotoolFocusSource;
use crate::config::Config;
use crate::error::Result;
use crate::services::channel::WindowHandler;

/// Trait for focus sources of different desktop environments
#[async_trait::async_trait]
pub trait FocusSource {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Start listening and report every focus change to `handler`.
    ///
    /// Returns when the source stops or the handler is closed.
    async fn start(self: Box<Self>, handler: WindowHandler) -> Result<()>;
}

/// Результат определения окружения рабочего стола
pub enum Detection {
    Detected(Box<dyn FocusSource + Send>),
    NoneAvailable,
}

/// Перебрать источники в фиксированном порядке и вернуть первый доступный
pub async fn detect_focus_source(config: &Config, dry_run: bool) -> Detection {
    if dry_run {
        return Detection::Detected(Box::new(DryRunFocusSource::new()));
    }

    if let Some(kde) = KdeFocusSource::probe() {
        info!("Обнаружено окружение: {}", kde.name());
        return Detection::Detected(Box::new(kde));
    }
    debug!("KDE не обнаружен");

    let poll_interval = Duration::from_millis(config.focus.poll_interval_ms);
    if let Some(xdotool) = XdotoolFocusSource::probe(poll_interval).await {
        info!("Обнаружено окружение: {}", xdotool.name());
        return Detection::Detected(Box::new(xdotool));
    }
    debug!("xdotool недоступен");

    Detection::NoneAvailable
}
