use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
        OnceLock, RwLock,
    },
    thread,
};

use crate::utility::app_root_dir;

/* =========================
   GLOBAL STATE
   ========================= */

static ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_TX: OnceLock<Sender<String>> = OnceLock::new();
static LOG_LEVEL: RwLock<String> = RwLock::new(String::new());

const LOG_FILE_NAME: &str = "lockscreen-customizer.log";

/* =========================
   PUBLIC API
   ========================= */

pub fn init(debug: bool, level: &str) {
    if LOG_TX.get().is_some() {
        panic!("logging::init() called more than once");
    }

    ENABLED.store(debug, Ordering::Relaxed);
    set_level(level);
    let path = log_path().clone();
    let (tx, rx) = mpsc::channel::<String>();
    LOG_TX.set(tx).expect("LOG_TX already set");

    thread::spawn(move || {
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) else {
            return;
        };

        while let Ok(line) = rx.recv() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    });
}

/// Re-evaluates verbosity once the config is known; logging starts before it.
pub fn set_debug(debug: bool) {
    ENABLED.store(debug, Ordering::Relaxed);
}

pub fn set_level(level: &str) {
    if let Ok(mut current) = LOG_LEVEL.write() {
        *current = level.trim().to_lowercase();
    }
}

#[inline]
pub fn should_log(level: &str) -> bool {
    if ENABLED.load(Ordering::Relaxed) {
        return true;
    }

    if level == "WARN" || level == "ERROR" {
        return true;
    }

    LOG_LEVEL
        .read()
        .map(|lvl| level_admits_info(&lvl))
        .unwrap_or(false)
}

fn level_admits_info(level: &str) -> bool {
    matches!(level, "info" | "debug" | "trace")
}

/* =========================
   INTERNAL
   ========================= */

#[inline]
pub fn enqueue(level: &str, msg: String) {
    if let Some(tx) = LOG_TX.get() {
        let _ = tx.send(format_line(&timestamp(), level, &msg));
    }
}

fn format_line(ts: &str, level: &str, msg: &str) -> String {
    format!("{ts} [{level}] {msg}")
}

fn timestamp() -> String {
    let now = chrono::Local::now();
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/* =========================
   MACROS
   ========================= */

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("INFO") {
            $crate::logging::enqueue(
                "INFO",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        $crate::logging::enqueue(
            "WARN",
            format!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        $crate::logging::enqueue(
            "ERROR",
            format!($($arg)*)
        );
    }};
}

/* =========================
   PATH
   ========================= */

fn log_path() -> &'static PathBuf {
    LOG_PATH.get_or_init(|| {
        app_root_dir()
            .map(|p| p.join(LOG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(LOG_FILE_NAME))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_timestamp_and_level() {
        let line = format_line("2026-01-02 03:04:05.006", "WARN", "registry write failed");
        assert_eq!(line, "2026-01-02 03:04:05.006 [WARN] registry write failed");
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = timestamp();
        let (_, millis) = ts.rsplit_once('.').expect("fractional part");
        assert_eq!(millis.len(), 3);
    }

    #[test]
    fn info_needs_verbose_level() {
        assert!(level_admits_info("info"));
        assert!(level_admits_info("trace"));
        assert!(!level_admits_info("warn"));
        assert!(!level_admits_info("error"));
    }

    #[test]
    fn routine_success_stays_out_of_a_warn_level_log() {
        set_level("warn");
        assert!(!should_log("INFO"));
        assert!(should_log("WARN"));
        assert!(should_log("ERROR"));
    }

    #[test]
    fn messages_before_init_are_dropped() {
        // Must not panic or block when no writer thread exists.
        enqueue("INFO", "nobody is listening".to_string());
        warn!("still nobody {}", 1);
    }
}
