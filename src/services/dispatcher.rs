use tracing::{info, warn};

use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{ChannelEvent, WindowInfo};
use crate::matcher::lookup_bindings;
use crate::rules::RuleStore;
use crate::services::backend::BindingBackend;
use crate::services::channel::EventSource;

/// Владелец хранилища правил: на каждое событие окна проверяет файл,
/// подбирает директивы и передаёт их бэкенду.
pub struct Dispatcher<B> {
    store: RuleStore,
    backend: B,
    verbose: bool,
}

impl<B: BindingBackend> Dispatcher<B> {
    pub fn new(store: RuleStore, backend: B, verbose: bool) -> Self {
        Self {
            store,
            backend,
            verbose,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Перечитать правила, если файл изменился. При ошибке продолжаем со старыми.
    pub fn refresh_rules(&mut self) {
        match self.store.refresh() {
            Ok(true) => info!(
                "{}: загружено правил: {}",
                self.store.source_path().display(),
                self.store.rules().len()
            ),
            Ok(false) => {}
            Err(e) => warn!("{}. Продолжаем с прежними правилами", e),
        }
    }

    pub async fn on_event(&mut self, window: &WindowInfo) {
        let identity = window.identity();

        self.refresh_rules();

        if self.verbose {
            info!("Active window: {}", identity);
        }

        let bindings = lookup_bindings(self.store.rules(), &identity);
        debug_if_enabled!("Директивы для {}: {:?}", identity, bindings);

        // Пустой список тоже отправляем: он сбрасывает раскладку к умолчанию
        self.backend.apply(&bindings).await;
    }

    /// Обработать одно событие канала. `false` означает завершение цикла.
    pub async fn handle(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Window(window) => {
                debug_if_enabled!("Вызываем обработчик смены окна для {}|{}", window.class, window.title);
                self.on_event(&window).await;
                true
            }
            ChannelEvent::Wake => {
                debug_if_enabled!("Пробуждение: проверяем файл правил");
                self.refresh_rules();
                true
            }
            ChannelEvent::Shutdown => false,
        }
    }

    /// Обрабатывать события строго по одному, пока канал не сообщит о завершении
    pub async fn run<S>(&mut self, source: &mut S) -> Result<()>
    where
        S: EventSource + Send + ?Sized,
    {
        loop {
            let event = source.receive().await?;
            if !self.handle(event).await {
                info!("Получен сигнал завершения");
                return Ok(());
            }
        }
    }
}
