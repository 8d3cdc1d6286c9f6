//! Logging backend which writes to a file (or standard error) and, in debug builds, over UDP.

use std::{
    fs::File,
    io::Write,
    net,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::Local;
use eyre::{Context, Result};
use log::{Level, Metadata, Record};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::settings::Options;

#[derive(Clone, Copy, Serialize, Deserialize)]
enum MessageType {
    Normal,
    Error,
    Warning,
    Debug,
}

#[derive(Serialize, Deserialize)]
struct Message {
    module: String,
    msg_type: MessageType,
    string: String,
    time: String,
}

impl Message {
    /// Serialises the message with a little-endian length prefix that includes itself.
    fn pack(&self) -> Option<Vec<u8>> {
        let serialized = bincode::serialize::<Message>(self).ok()?;

        let mut len_bytes = Vec::from(u32::to_le_bytes((serialized.len() as u32) + 4));
        len_bytes.extend(&serialized);

        Some(len_bytes)
    }

    fn line(&self) -> String {
        let level_name = match self.msg_type {
            MessageType::Normal => "info",
            MessageType::Error => "error",
            MessageType::Warning => "warning",
            MessageType::Debug => "debug",
        };

        //      [date time] [module] [level] Text
        format!(
            "[{}] [{}] [{}] {}\n",
            self.time, self.module, level_name, self.string
        )
    }
}

pub struct Logger;

impl Logger {
    pub fn commit(&self, record: &log::Record) {
        let msg_type = match record.level() {
            Level::Error => MessageType::Error,
            Level::Warn => MessageType::Warning,
            Level::Info => MessageType::Normal,
            Level::Debug | Level::Trace => MessageType::Debug,
        };

        let module = record
            .module_path()
            .and_then(|path| path.split("::").last())
            .unwrap_or("unknown");

        let message = Message {
            module: module.to_string(),
            msg_type,
            string: format!("{}", record.args()),
            time: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        };

        if let Some(sender) = MSG_SENDER.get() {
            if let Ok(sender) = sender.lock() {
                // The writer thread only goes away if its sink is gone, so there's nowhere left
                // to report this.
                let _ = sender.send(message);
            }
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.commit(record);
        }
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger;
static MSG_SENDER: OnceCell<Mutex<std::sync::mpsc::Sender<Message>>> = OnceCell::new();
static PANIC_PATH: OnceCell<PathBuf> = OnceCell::new();

fn panic_hook(info: &std::panic::PanicInfo) {
    let message = info
        .payload()
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "no message".to_string());

    let location = info
        .location()
        .map_or_else(|| "unknown".to_string(), ToString::to_string);

    let time = Local::now();
    let backtrace = std::backtrace::Backtrace::force_capture();

    let info_dump = format!(
        "precomp panicked.

Message: {message}
Location: {location}
Time: {time}
Backtrace: see below

{backtrace}"
    );

    log::error!("{info_dump}");

    if let Some(path) = PANIC_PATH.get() {
        let _ = std::fs::write(path, &info_dump);
    } else {
        eprintln!("{info_dump}");
    }
}

/// Returns the path panic reports are written to when logging to `log_path`.
fn panic_path(log_path: &Path) -> PathBuf {
    log_path.with_file_name("PANIC.txt")
}

/// Makes `LOGGER` the global logger. Fails if any logger is already set.
fn register() -> Result<()> {
    log::set_logger(&LOGGER)
        .map(|_| log::set_max_level(log::LevelFilter::max()))
        .wrap_err("a logger is already installed")
}

/// Installs the logger. Messages are written on a background thread, so game code never waits on
/// the file or the socket.
pub fn init(options: &Options) -> Result<()> {
    register()?;

    let mut sink: Box<dyn Write + Send> = match &options.log_path {
        Some(path) => {
            let _ = PANIC_PATH.set(panic_path(path));

            Box::new(
                File::create(path)
                    .wrap_err_with(|| format!("failed to create log file {}", path.display()))?,
            )
        }

        None => Box::new(std::io::stderr()),
    };

    std::panic::set_hook(Box::new(panic_hook));

    // Only attempt to send over UDP if we're in debug mode.
    let socket = match (&options.log_address, cfg!(feature = "debug")) {
        (Some(address), true) => net::UdpSocket::bind("0.0.0.0:0")
            .ok()
            .map(|socket| (socket, address.clone())),
        _ => None,
    };

    let (sender, receiver) = std::sync::mpsc::channel::<Message>();

    if MSG_SENDER.set(Mutex::new(sender)).is_err() {
        eyre::bail!("log channel was already set up");
    }

    std::thread::spawn(move || {
        while let Ok(msg) = receiver.recv() {
            let _ = sink.write_all(msg.line().as_bytes());

            if let Some((socket, address)) = &socket {
                if let Some(bin) = msg.pack() {
                    let _ = socket.send_to(&bin, address.as_str());
                }
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message {
            module: "diprint".to_string(),
            msg_type: MessageType::Warning,
            string: "print dropped".to_string(),
            time: "2024-01-01 00:00:00.000".to_string(),
        }
    }

    #[test]
    fn test_line_format() {
        assert_eq!(
            message().line(),
            "[2024-01-01 00:00:00.000] [diprint] [warning] print dropped\n"
        );
    }

    #[test]
    fn test_pack_length_prefix() {
        let packed = message().pack().unwrap();
        let len = u32::from_le_bytes(packed[..4].try_into().unwrap()) as usize;

        assert_eq!(len, packed.len());

        let decoded: Message = bincode::deserialize(&packed[4..]).unwrap();
        assert_eq!(decoded.string, "print dropped");
    }

    #[test]
    fn test_panic_path_is_next_to_log() {
        assert_eq!(
            panic_path(Path::new("/tmp/logs/precomp.log")),
            PathBuf::from("/tmp/logs/PANIC.txt")
        );
    }

    #[test]
    fn test_second_logger_is_refused() {
        // Whichever call installs the logger, the one after it has to fail.
        let _ = register();

        let err = register().unwrap_err();
        assert!(err.to_string().contains("already installed"));
    }
}
