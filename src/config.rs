use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Исполняемый файл keyd (KEYD_BIN)
    pub bin: String,
    /// Подробная трассировка (KEYD_DEBUG)
    #[serde(deserialize_with = "deserialize_flag")]
    pub debug: bool,
    pub mapper: MapperConfig,
    pub daemon: DaemonConfig,
    pub focus: FocusConfig,
}

/// Пользовательский режим: источник фокуса и диспетчер в одном процессе
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapperConfig {
    pub rules_path: PathBuf,
    pub lock_path: PathBuf,
}

/// Системный демон, принимающий события через unix-сокет
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    pub rules_path: PathBuf,
    pub socket_path: PathBuf,
    /// Группа-владелец сокета; пустая строка отключает chown
    #[serde(default)]
    pub access_group: Option<String>,
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FocusConfig {
    pub poll_interval_ms: u64,
}

fn keyd_config_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".config").join("keyd")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bin: "keyd".to_string(),
            debug: false,
            mapper: MapperConfig {
                rules_path: keyd_config_dir().join("app.conf"),
                lock_path: keyd_config_dir().join("app.lock"),
            },
            daemon: DaemonConfig {
                rules_path: PathBuf::from("/etc/keyd_application_switcher/app.conf"),
                socket_path: PathBuf::from("/run/keyd_application_switcher_daemon.sock"),
                access_group: Some("keyd-application-switcher".to_string()),
                read_timeout_ms: 500,
            },
            focus: FocusConfig {
                poll_interval_ms: 250,
            },
        }
    }
}

impl DaemonConfig {
    pub fn access_group(&self) -> Option<&str> {
        self.access_group.as_deref().filter(|g| !g.trim().is_empty())
    }
}

impl Config {
    /// Значения по умолчанию, поверх них необязательный TOML и переменные KEYD_*
    pub fn load(settings_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = settings_path {
            figment = figment.merge(Toml::file(path));
        }

        let figment = figment.merge(Env::prefixed("KEYD_").split("__"));

        Self::from_figment(figment).with_context(|| match settings_path {
            Some(path) => format!("Не удалось загрузить настройки из {:?}", path),
            None => "Не удалось загрузить настройки из окружения".to_string(),
        })
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bin.trim().is_empty() {
            anyhow::bail!("Путь к keyd (bin) не может быть пустым");
        }

        if self.focus.poll_interval_ms < 50 {
            anyhow::bail!("poll_interval_ms должно быть минимум 50");
        }

        if self.daemon.read_timeout_ms == 0 {
            anyhow::bail!("read_timeout_ms должно быть больше 0");
        }

        Ok(())
    }
}

/// Флаг в духе shell: любое непустое значение включает его
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl<'de> de::Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean, a number or a string")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<bool, E> {
            Ok(true)
        }

        fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<bool, E> {
            Ok(true)
        }

        fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<bool, E> {
            Ok(true)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<bool, E> {
            Ok(!v.is_empty())
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<bool, E> {
            Ok(false)
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<bool, E> {
            Ok(false)
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}
