use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Внешний бэкенд раскладок: сбросить всё и применить директивы по порядку
#[async_trait::async_trait]
pub trait BindingBackend {
    /// Ошибки бэкенда не возвращаются: цикл диспетчера продолжает работу
    async fn apply(&self, bindings: &[String]);
}

/// `keyd bind reset <директивы...>`
pub struct KeydBackend {
    bin: String,
    dry_run: bool,
}

impl KeydBackend {
    pub fn new(bin: impl Into<String>, dry_run: bool) -> Self {
        Self {
            bin: bin.into(),
            dry_run,
        }
    }

    pub fn arguments(bindings: &[String]) -> Vec<&str> {
        let mut args = vec!["bind", "reset"];
        args.extend(bindings.iter().map(String::as_str));
        args
    }
}

#[async_trait::async_trait]
impl BindingBackend for KeydBackend {
    async fn apply(&self, bindings: &[String]) {
        let args = Self::arguments(bindings);

        if self.dry_run {
            info!("[DRY RUN] {} {}", self.bin, args.join(" "));
            return;
        }

        let status = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                debug!("{} применил {} директив", self.bin, bindings.len());
            }
            Ok(status) => debug!("{} завершился с {}", self.bin, status),
            Err(e) => debug!("Не удалось запустить {}: {}", self.bin, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_start_with_reset() {
        assert_eq!(KeydBackend::arguments(&[]), vec!["bind", "reset"]);

        let bindings = vec!["control.t = C-t".to_string(), "k = right".to_string()];
        assert_eq!(
            KeydBackend::arguments(&bindings),
            vec!["bind", "reset", "control.t = C-t", "k = right"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_fatal() {
        let backend = KeydBackend::new("/nonexistent/keyd-app-mapper-test", false);
        backend.apply(&["a = b".to_string()]).await;
    }

    #[tokio::test]
    async fn test_failing_binary_is_not_fatal() {
        let backend = KeydBackend::new("false", false);
        backend.apply(&[]).await;
    }
}
