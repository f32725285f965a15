use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use super::{parse_rules, Rule, RulesError};

/// Правила, загруженные из файла, и время модификации этого файла.
///
/// Хранилище не меняется по частям: перезагрузка строит новое значение
/// целиком, и владелец заменяет им старое только при успешном разборе.
#[derive(Debug, Clone)]
pub struct RuleStore {
    rules: Vec<Rule>,
    source_path: PathBuf,
    last_modified: SystemTime,
    // Версия файла, которую уже пытались загрузить и не смогли
    rejected: Option<SystemTime>,
}

fn modified_time(path: &Path) -> Result<SystemTime, RulesError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| RulesError::Io {
            path: path.to_path_buf(),
            source,
        })
}

impl RuleStore {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RulesError> {
        let path = path.as_ref();

        // Время берём до чтения: если файл поменяется между вызовами,
        // следующая проверка увидит новое время и перечитает его
        let last_modified = modified_time(path)?;
        let text = fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let rules = parse_rules(&text).map_err(|source| RulesError::Format {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Загружено {} правил из {}", rules.len(), path.display());

        Ok(Self {
            rules,
            source_path: path.to_path_buf(),
            last_modified,
            rejected: None,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    #[cfg(test)]
    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Время модификации файла отличается от запомненного при загрузке
    pub fn needs_reload(&self) -> Result<bool, RulesError> {
        Ok(modified_time(&self.source_path)? != self.last_modified)
    }

    /// Заново разобрать файл. Текущее значение не трогается.
    pub fn reload(&self) -> Result<RuleStore, RulesError> {
        Self::load(&self.source_path)
    }

    /// Перечитать файл, если он изменился.
    ///
    /// Возвращает `Ok(true)`, если правила заменены. При ошибке старые
    /// правила остаются в силе, а неудачная версия файла запоминается и не
    /// разбирается повторно, пока файл снова не изменится.
    pub fn refresh(&mut self) -> Result<bool, RulesError> {
        if !self.needs_reload()? {
            return Ok(false);
        }

        let current = modified_time(&self.source_path)?;
        if self.rejected == Some(current) {
            return Ok(false);
        }

        info!("{}: файл обновлён, перечитываем правила...", self.source_path.display());

        match self.reload() {
            Ok(fresh) => {
                *self = fresh;
                Ok(true)
            }
            Err(e) => {
                self.rejected = Some(current);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WindowIdentity;
    use crate::matcher::lookup_bindings;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_rules(path: &Path, text: &str, age: u64) {
        fs::write(path, text).unwrap();
        // Явно сдвигаем mtime: у файловой системы может быть грубое разрешение
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + age);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn firefox() -> WindowIdentity {
        WindowIdentity::from_raw("firefox", "Some page")
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = RuleStore::load(dir.path().join("app.conf")).unwrap_err();
        assert!(matches!(err, RulesError::Io { .. }));
    }

    #[test]
    fn test_load_reports_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        write_rules(&path, "orphan\n", 0);

        let err = RuleStore::load(&path).unwrap_err();
        match err {
            RulesError::Format { source, .. } => assert_eq!(source.line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_needs_reload_on_mtime_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        write_rules(&path, "[firefox]\na\n", 10);

        let store = RuleStore::load(&path).unwrap();
        assert!(!store.needs_reload().unwrap());

        write_rules(&path, "[firefox]\na\n", 20);
        assert!(store.needs_reload().unwrap());

        // Назад во времени тоже считается изменением
        write_rules(&path, "[firefox]\na\n", 5);
        assert!(store.needs_reload().unwrap());

        write_rules(&path, "[firefox]\na\n", 10);
        assert!(!store.needs_reload().unwrap());
    }

    #[test]
    fn test_refresh_replaces_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        write_rules(&path, "[firefox]\nold\n", 0);

        let mut store = RuleStore::load(&path).unwrap();
        assert!(!store.refresh().unwrap());
        assert_eq!(lookup_bindings(store.rules(), &firefox()), vec!["old"]);

        write_rules(&path, "[firefox]\nnew\n[kitty]\nk\n", 10);
        assert!(store.refresh().unwrap());
        assert_eq!(lookup_bindings(store.rules(), &firefox()), vec!["new"]);
        assert_eq!(store.rules().len(), 2);
        assert!(!store.needs_reload().unwrap());
    }

    #[test]
    fn test_refresh_picks_up_older_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        write_rules(&path, "[firefox]\nold\n", 10);

        let mut store = RuleStore::load(&path).unwrap();
        write_rules(&path, "[firefox]\nrestored\n", 5);

        assert!(store.refresh().unwrap());
        assert_eq!(lookup_bindings(store.rules(), &firefox()), vec!["restored"]);
    }

    #[test]
    fn test_reload_returns_new_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        write_rules(&path, "[firefox]\nold\n", 0);

        let store = RuleStore::load(&path).unwrap();
        write_rules(&path, "[firefox]\nnew\n", 10);

        let fresh = store.reload().unwrap();
        assert_eq!(store.rules()[0].bindings(), ["old"]);
        assert_eq!(fresh.rules()[0].bindings(), ["new"]);
        assert!(fresh.last_modified() > store.last_modified());
    }

    #[test]
    fn test_broken_reload_keeps_old_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        write_rules(&path, "[firefox]\nold\n", 0);

        let mut store = RuleStore::load(&path).unwrap();

        write_rules(&path, "orphan\n[firefox]\nnew\n", 10);
        assert!(store.refresh().is_err());
        assert_eq!(lookup_bindings(store.rules(), &firefox()), vec!["old"]);

        // Та же сломанная версия повторно не разбирается
        assert!(!store.refresh().unwrap());

        write_rules(&path, "[firefox]\nfixed\n", 20);
        assert!(store.refresh().unwrap());
        assert_eq!(lookup_bindings(store.rules(), &firefox()), vec!["fixed"]);
    }

    #[test]
    fn test_unreadable_file_keeps_old_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        write_rules(&path, "[firefox]\nold\n", 0);

        let mut store = RuleStore::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(matches!(store.refresh(), Err(RulesError::Io { .. })));
        assert_eq!(lookup_bindings(store.rules(), &firefox()), vec!["old"]);
        assert_eq!(store.source_path(), path.as_path());
    }
}
