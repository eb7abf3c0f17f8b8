use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Append-only transfer log. Console output is the binary's job; this file
/// is for diagnosing a finished session after the fact.
pub struct TransferLogger {
    file_path: Option<PathBuf>,
}

static LOGGER: OnceLock<Mutex<TransferLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<TransferLogger> {
    LOGGER.get_or_init(|| Mutex::new(TransferLogger { file_path: None }))
}

impl TransferLogger {
    fn set_file_path(&mut self, path: PathBuf) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        self.file_path = Some(path);
    }

    fn log(&self, level: &str, module: &str, message: &str) {
        let Some(path) = &self.file_path else {
            return;
        };
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] [{}] {}", timestamp, level, module, message);
        }
    }
}

pub fn init(data_dir: PathBuf) {
    let logger = get_logger();
    let mut logger = logger.lock().unwrap();
    logger.set_file_path(data_dir.join("transfer.log"));
}

/// Log under the platform data dir. A missing data dir leaves logging off.
pub fn init_default() {
    if let Some(dir) = dirs::data_dir() {
        init(dir.join("heatlink"));
    }
}

pub fn log(level: &str, module: &str, message: impl Into<String>) {
    let logger = get_logger();
    let logger = logger.lock().unwrap();
    logger.log(level, module, &message.into());
}

#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::logger::log("DEBUG", module_path!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        $crate::logger::log("INFO", module_path!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        $crate::logger::log("ERROR", module_path!(), format!($($arg)*));
    };
}
