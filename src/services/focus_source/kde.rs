use std::fs;
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use zbus::{connection, Connection};

use super::r#trait::FocusSource;
use crate::error::{AppError, Result};
use crate::services::channel::WindowHandler;

const BUS_NAME: &str = "org.rvaiya.keyd";
const LISTENER_PATH: &str = "/listener";
const KWIN_SERVICE: &str = "org.kde.KWin";
const KWIN_SCRIPTING_PATH: &str = "/Scripting";
const KWIN_SCRIPTING_INTERFACE: &str = "org.kde.kwin.Scripting";
const KWIN_SCRIPT_INTERFACE: &str = "org.kde.kwin.Script";
const KWIN_LOOKUP_ATTEMPTS: u32 = 5;

/// Объект на сессионной шине, который вызывает скрипт KWin
struct KwinListener {
    handler: WindowHandler,
}

#[zbus::interface(name = "org.rvaiya.keyd")]
impl KwinListener {
    #[zbus(name = "updateWindow")]
    fn update_window(&self, title: String, klass: String, _id: String) {
        if !self.handler.on_window_change(&klass, &title) {
            debug!("Диспетчер уже остановлен, событие KWin пропущено");
        }
    }
}

/// KDE Plasma: KWin-скрипт сообщает о каждой активации окна по D-Bus
pub struct KdeFocusSource {
    session_version: String,
}

impl KdeFocusSource {
    pub fn probe() -> Option<Self> {
        std::env::var("KDE_SESSION_VERSION")
            .ok()
            .filter(|version| !version.is_empty())
            .map(|session_version| Self { session_version })
    }

    fn is_plasma6(&self) -> bool {
        self.session_version == "6"
    }

    fn script_source(&self) -> String {
        let signal = if self.is_plasma6() {
            "windowActivated"
        } else {
            "clientActivated"
        };

        format!(
            r#"workspace.{signal}.connect(client => {{
    if (!client) return;
    callDBus("{BUS_NAME}", "{LISTENER_PATH}", "{BUS_NAME}", "updateWindow", client.caption, client.resourceClass, client.resourceName);
}});
"#
        )
    }

    fn script_object_path(&self, script_id: i32) -> String {
        if self.is_plasma6() {
            format!("{KWIN_SCRIPTING_PATH}/Script{script_id}")
        } else {
            format!("/{script_id}")
        }
    }

    fn script_path() -> PathBuf {
        let uid = nix::unistd::getuid();
        std::env::temp_dir().join(format!("keyd-kwin-{uid}.js"))
    }

    /// KWin может ещё не успеть зарегистрироваться на шине (автозапуск)
    async fn wait_for_kwin(connection: &Connection) -> Result<()> {
        let mut last_error = None;

        for attempt in 1..=KWIN_LOOKUP_ATTEMPTS {
            match connection
                .call_method(
                    Some(KWIN_SERVICE),
                    KWIN_SCRIPTING_PATH,
                    Some("org.freedesktop.DBus.Peer"),
                    "Ping",
                    &(),
                )
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => {
                    debug!("KWin недоступен (попытка {}): {}", attempt, e);
                    last_error = Some(e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }

        Err(last_error.map(AppError::DBus).unwrap_or_else(|| {
            AppError::ServiceUnavailable("KWin не ответил".to_string())
        }))
    }

    async fn inject_script(&self, connection: &Connection) -> Result<()> {
        let path = Self::script_path();
        fs::write(&path, self.script_source())?;
        let path = path.to_string_lossy().into_owned();

        Self::wait_for_kwin(connection).await?;

        // Скрипт от прошлого запуска мог остаться загруженным
        connection
            .call_method(
                Some(KWIN_SERVICE),
                KWIN_SCRIPTING_PATH,
                Some(KWIN_SCRIPTING_INTERFACE),
                "unloadScript",
                &(path.as_str(),),
            )
            .await?;

        let reply = connection
            .call_method(
                Some(KWIN_SERVICE),
                KWIN_SCRIPTING_PATH,
                Some(KWIN_SCRIPTING_INTERFACE),
                "loadScript",
                &(path.as_str(),),
            )
            .await?;
        let script_id: i32 = reply.body().deserialize()?;

        connection
            .call_method(
                Some(KWIN_SERVICE),
                self.script_object_path(script_id).as_str(),
                Some(KWIN_SCRIPT_INTERFACE),
                "run",
                &(),
            )
            .await?;

        info!("KWin-скрипт {} загружен (id {})", path, script_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl FocusSource for KdeFocusSource {
    fn name(&self) -> &'static str {
        "kde"
    }

    async fn start(self: Box<Self>, handler: WindowHandler) -> Result<()> {
        info!("Подключение к KDE KWin через D-Bus (Plasma {})", self.session_version);

        // Сначала слушатель, потом скрипт: иначе первые события потеряются
        let connection = connection::Builder::session()?
            .name(BUS_NAME)?
            .serve_at(LISTENER_PATH, KwinListener { handler })?
            .build()
            .await?;

        if let Err(e) = self.inject_script(&connection).await {
            warn!("Не удалось загрузить KWin-скрипт: {}", e);
            return Err(e);
        }

        // Соединение обслуживает вызовы в фоне, здесь просто держим его живым
        let _connection = connection;
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(version: &str) -> KdeFocusSource {
        KdeFocusSource {
            session_version: version.to_string(),
        }
    }

    #[test]
    fn test_script_uses_signal_of_plasma_version() {
        assert!(source("6").script_source().contains("workspace.windowActivated"));
        assert!(source("5").script_source().contains("workspace.clientActivated"));
    }

    #[test]
    fn test_script_calls_listener() {
        let script = source("6").script_source();
        assert!(script.contains(r#"callDBus("org.rvaiya.keyd", "/listener", "org.rvaiya.keyd", "updateWindow""#));
        assert!(script.contains("client.caption, client.resourceClass"));
    }

    #[test]
    fn test_script_object_path() {
        assert_eq!(source("6").script_object_path(3), "/Scripting/Script3");
        assert_eq!(source("5").script_object_path(3), "/3");
    }
}
