//! Event channel: how window events reach the dispatcher.
//!
//! Two transports share one contract, [`EventSource::receive`]:
//! - [`CallbackChannel`](callback::CallbackChannel): a focus source in the same process calls a
//!   [`WindowHandler`];
//! - [`SocketChannel`]: a separate monitor process writes `class|title`
//!   into a unix socket, one message per connection.
//!
//! Both race their source against [`Interrupts`], so a wake-up signal or a
//! shutdown request cancels a blocking wait in the same way for either one.

mod callback;
pub mod protocol;
mod socket;

pub use self::callback::{callback_channel, WindowHandler};
pub use self::socket::{notify, SocketChannel};

use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::error::Result;
use crate::events::ChannelEvent;

/// Источник событий для однопоточного цикла диспетчера
#[async_trait::async_trait]
pub trait EventSource {
    /// Ждать следующее событие окна, пробуждение или завершение
    async fn receive(&mut self) -> Result<ChannelEvent>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// SIGUSR1: проверить файл правил без события окна
    Wake,
    /// SIGINT / SIGTERM
    Shutdown,
}

impl From<Interrupt> for ChannelEvent {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Wake => ChannelEvent::Wake,
            Interrupt::Shutdown => ChannelEvent::Shutdown,
        }
    }
}

/// Прерываемое ожидание: сигналы процесса как awaitable
pub struct Interrupts {
    wake: Option<Signal>,
    interrupt: Option<Signal>,
    terminate: Option<Signal>,
}

impl Interrupts {
    /// Установить обработчики SIGUSR1, SIGINT и SIGTERM
    pub fn install() -> Result<Self> {
        Ok(Self {
            wake: Some(signal(SignalKind::user_defined1())?),
            interrupt: Some(signal(SignalKind::interrupt())?),
            terminate: Some(signal(SignalKind::terminate())?),
        })
    }

    /// Никогда не срабатывает
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            wake: None,
            interrupt: None,
            terminate: None,
        }
    }

    pub async fn next(&mut self) -> Interrupt {
        tokio::select! {
            Some(()) = recv(&mut self.wake) => Interrupt::Wake,
            Some(()) = recv(&mut self.interrupt) => Interrupt::Shutdown,
            Some(()) = recv(&mut self.terminate) => Interrupt::Shutdown,
            else => std::future::pending().await,
        }
    }
}

async fn recv(signal: &mut Option<Signal>) -> Option<()> {
    match signal {
        Some(signal) => signal.recv().await,
        None => std::future::pending().await,
    }
}
