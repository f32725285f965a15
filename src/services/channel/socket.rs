use nix::errno::Errno;
use nix::sys::socket::{
    bind, connect, listen, socket, AddressFamily, Backlog, SockFlag, SockType, UnixAddr,
};
use nix::unistd::{chown, Group};
use std::fs;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use super::protocol::{encode_message, parse_message, MAX_MESSAGE_LEN};
use super::{EventSource, Interrupts};
use crate::error::{AppError, Result};
use crate::events::{ChannelEvent, WindowInfo};
use crate::utils::GuardError;

const SOCKET_MODE: u32 = 0o660;
// Пауза после ошибки accept (например, EMFILE), чтобы не крутиться вхолостую
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Unix-сокет, принимающий по одному сообщению на соединение.
///
/// Соединения обрабатываются строго по очереди: следующий `accept`
/// происходит только после закрытия предыдущего соединения.
pub struct SocketChannel {
    listener: UnixListener,
    path: PathBuf,
    // (st_dev, st_ino) нашего файла сокета: чужой файл по тому же пути не удаляем
    inode: (u64, u64),
    read_timeout: Duration,
    interrupts: Interrupts,
}

impl SocketChannel {
    pub fn bind<P: AsRef<Path>>(
        path: P,
        access_group: Option<&str>,
        read_timeout: Duration,
        interrupts: Interrupts,
    ) -> Result<Self> {
        let path = path.as_ref();
        let socket_error = |e: &dyn std::fmt::Display| AppError::socket(path, e.to_string());

        unlink_stale_socket(path)?;

        let fd = socket(
            AddressFamily::Unix,
            SockType::Stream,
            SockFlag::SOCK_CLOEXEC | SockFlag::SOCK_NONBLOCK,
            None,
        )
        .map_err(|e| socket_error(&e))?;
        let address = UnixAddr::new(path).map_err(|e| socket_error(&e))?;
        bind(fd.as_raw_fd(), &address).map_err(|e| socket_error(&e))?;

        // Очередь на одно соединение: монитор всегда ждёт закрытия предыдущего
        let backlog = Backlog::new(1).map_err(|e| socket_error(&e))?;
        listen(&fd, backlog).map_err(|e| socket_error(&e))?;

        if let Some(group_name) = access_group {
            let group = Group::from_name(group_name)
                .map_err(|e| socket_error(&e))?
                .ok_or_else(|| socket_error(&format!("группа {group_name} не найдена")))?;
            chown(path, None, Some(group.gid)).map_err(|e| socket_error(&e))?;
        }
        fs::set_permissions(path, fs::Permissions::from_mode(SOCKET_MODE))
            .map_err(|e| socket_error(&e))?;

        let meta = fs::symlink_metadata(path).map_err(|e| socket_error(&e))?;
        let listener = UnixListener::from_std(std::os::unix::net::UnixListener::from(fd))
            .map_err(|e| socket_error(&e))?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
            inode: (meta.dev(), meta.ino()),
            read_timeout,
            interrupts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_message(&self, mut stream: UnixStream) -> Option<WindowInfo> {
        let mut buf = [0u8; MAX_MESSAGE_LEN];

        let read = tokio::time::timeout(self.read_timeout, stream.read(&mut buf)).await;
        let message = match read {
            Ok(Ok(len)) => parse_message(&buf[..len]),
            Ok(Err(e)) => {
                debug!("Ошибка чтения из сокета: {}", e);
                None
            }
            Err(_) => {
                debug!("Клиент ничего не прислал за {:?}", self.read_timeout);
                None
            }
        };

        if message.is_none() {
            debug!("Отброшено некорректное сообщение");
        }

        // Ответа нет: соединение закрывается при выходе из функции
        message
    }
}

#[async_trait::async_trait]
impl EventSource for SocketChannel {
    async fn receive(&mut self) -> Result<ChannelEvent> {
        loop {
            let accepted = tokio::select! {
                biased;
                interrupt = self.interrupts.next() => return Ok(interrupt.into()),
                accepted = self.listener.accept() => accepted,
            };

            let Some((stream, _)) = accepted_connection(accepted) else {
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            };

            if let Some(window) = self.read_message(stream).await {
                debug!("Получено сообщение {}|{}", window.class, window.title);
                return Ok(ChannelEvent::Window(window));
            }
        }
    }
}

/// Ошибка accept не завершает демон: соединение просто пропускается
fn accepted_connection<T>(accepted: std::io::Result<T>) -> Option<T> {
    match accepted {
        Ok(connection) => Some(connection),
        Err(e) => {
            debug!("Не удалось принять соединение: {}", e);
            None
        }
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        let ours = fs::symlink_metadata(&self.path)
            .map(|meta| (meta.dev(), meta.ino()) == self.inode)
            .unwrap_or(false);
        if !ours {
            return;
        }

        if let Err(e) = fs::remove_file(&self.path) {
            debug!("Не удалось убрать сокет: {}", e);
        }
    }
}

/// Удалить оставшийся от прошлого запуска сокет. Если на нём кто-то слушает,
/// второй экземпляр не запускается. Любой другой файл по этому пути не трогаем.
fn unlink_stale_socket(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::socket(path, e.to_string())),
        Ok(meta) if meta.file_type().is_socket() => {
            if socket_is_live(path)? {
                return Err(GuardError::AlreadyRunning.into());
            }

            match fs::remove_file(path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    Err(AppError::socket(path, e.to_string()))
                }
                _ => Ok(()),
            }
        }
        Ok(meta) => Err(AppError::socket(
            path,
            format!("по этому пути лежит не сокет: {:?}", meta.file_type()),
        )),
    }
}

/// Неблокирующий connect: ECONNREFUSED значит, что сокет брошен
fn socket_is_live(path: &Path) -> Result<bool> {
    let socket_error = |e: Errno| AppError::socket(path, e.to_string());

    let fd = socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_CLOEXEC | SockFlag::SOCK_NONBLOCK,
        None,
    )
    .map_err(socket_error)?;
    let address = UnixAddr::new(path).map_err(socket_error)?;

    match connect(fd.as_raw_fd(), &address) {
        // EAGAIN: очередь живого слушателя заполнена
        Ok(()) | Err(Errno::EAGAIN) => Ok(true),
        Err(Errno::ECONNREFUSED) | Err(Errno::ENOENT) => Ok(false),
        Err(e) => Err(socket_error(e)),
    }
}

/// Клиентская сторона: отправить окно демону и дождаться закрытия соединения
pub async fn notify<P: AsRef<Path>>(socket_path: P, window: &WindowInfo, timeout: Duration) -> Result<()> {
    let path = socket_path.as_ref();
    let socket_error = |e: std::io::Error| AppError::socket(path, e.to_string());

    let exchange = async {
        let mut stream = UnixStream::connect(path).await.map_err(socket_error)?;
        stream.write_all(&encode_message(window)).await.map_err(socket_error)?;
        stream.shutdown().await.map_err(socket_error)?;

        // Демон ничего не отвечает, ждём только EOF
        let mut sink = Vec::new();
        stream.read_to_end(&mut sink).await.map_err(socket_error)?;
        Ok::<(), AppError>(())
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| AppError::socket(path, "демон не закрыл соединение вовремя"))?
}
