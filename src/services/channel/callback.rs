use tokio::sync::mpsc;

use super::{EventSource, Interrupts};
use crate::error::Result;
use crate::events::{ChannelEvent, WindowInfo};

/// Обработчик, который регистрируется в источнике фокуса
#[derive(Debug, Clone)]
pub struct WindowHandler {
    sender: mpsc::UnboundedSender<WindowInfo>,
}

impl WindowHandler {
    /// Передать смену окна в цикл диспетчера.
    ///
    /// Возвращает `false`, если цикл уже завершился.
    pub fn on_window_change(&self, class: &str, title: &str) -> bool {
        self.sender.send(WindowInfo::new(class, title)).is_ok()
    }
}

/// Очередь от источников фокуса к единственному потребителю
pub struct CallbackChannel {
    events: mpsc::UnboundedReceiver<WindowInfo>,
    interrupts: Interrupts,
}

pub fn callback_channel(interrupts: Interrupts) -> (WindowHandler, CallbackChannel) {
    let (sender, events) = mpsc::unbounded_channel();
    (
        WindowHandler { sender },
        CallbackChannel { events, interrupts },
    )
}

#[async_trait::async_trait]
impl EventSource for CallbackChannel {
    async fn receive(&mut self) -> Result<ChannelEvent> {
        let event = tokio::select! {
            biased;
            interrupt = self.interrupts.next() => interrupt.into(),
            window = self.events.recv() => match window {
                Some(window) => ChannelEvent::Window(window),
                // Все обработчики закрыты: источник фокуса остановился
                None => ChannelEvent::Shutdown,
            },
        };
        Ok(event)
    }
}
