//! A console logger for running off-device.
//!
//! On the board, `EspLogger` is used instead. Each line is prefixed with a
//! marker for its level so warnings stand out from routine status lines:
//!
//! ```text
//! [x] error   [!] warn   [i] info   [?] debug   [.] trace
//! ```
use log::{Level, LevelFilter, Log, Metadata, Record};

pub fn init() -> Result<(), log::SetLoggerError> {
    static LOGGER: Logger = {
        #[cfg(debug_assertions)]
        let max_level = LevelFilter::Debug;
        #[cfg(not(debug_assertions))]
        let max_level = LevelFilter::Info;
        Logger { max_level }
    };

    log::set_logger(&LOGGER)?;
    log::set_max_level(LOGGER.max_level);
    Ok(())
}

#[must_use]
pub fn prefix(level: Level) -> &'static str {
    static LEVEL_STRS: [&str; 5] = ["[x]", "[!]", "[i]", "[?]", "[.]"];
    LEVEL_STRS[level as usize - 1]
}

#[derive(Debug)]
struct Logger {
    max_level: LevelFilter,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        println!(
            "{} {}: {}",
            prefix(record.level()),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Records log lines per test thread, so tests can assert on what was
/// printed without seeing each other's output.
#[cfg(test)]
pub(crate) mod capture {
    use super::*;
    use std::{cell::RefCell, sync::Once};

    thread_local! {
        static LINES: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
    }

    struct Capture;

    impl Log for Capture {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            let line = format!("{}", record.args());
            LINES.with(|lines| lines.borrow_mut().push((record.level(), line)));
        }

        fn flush(&self) {}
    }

    /// Installs the capturing logger (once per process) and clears this
    /// thread's lines.
    pub(crate) fn start() {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            static CAPTURE: Capture = Capture;
            log::set_logger(&CAPTURE).expect("no other logger is installed in tests");
            log::set_max_level(LevelFilter::Trace);
        });
        LINES.with(|lines| lines.borrow_mut().clear());
    }

    /// Drains the lines logged on this thread at exactly `level`.
    pub(crate) fn take(level: Level) -> Vec<String> {
        LINES.with(|lines| {
            let mut lines = lines.borrow_mut();
            let (matching, rest) = lines.drain(..).partition(|(lvl, _)| *lvl == level);
            *lines = rest;
            matching.into_iter().map(|(_, line)| line).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_prefixes() {
        assert_eq!(prefix(Level::Error), "[x]");
        assert_eq!(prefix(Level::Warn), "[!]");
        assert_eq!(prefix(Level::Info), "[i]");
        assert_eq!(prefix(Level::Debug), "[?]");
        assert_eq!(prefix(Level::Trace), "[.]");
    }

    #[test]
    fn capture_is_per_level() {
        capture::start();
        log::warn!("first");
        log::info!("second");
        log::warn!("third");

        assert_eq!(capture::take(Level::Warn), vec!["first", "third"]);
        assert_eq!(capture::take(Level::Info), vec!["second"]);
        assert!(capture::take(Level::Warn).is_empty());
    }

    #[test]
    fn second_logger_is_an_error() {
        capture::start();
        // same shape as the host binary's `main`
        let main = || -> anyhow::Result<()> {
            init()?;
            Ok(())
        };
        let error = main().expect_err("a logger is already installed");
        assert!(error.downcast_ref::<log::SetLoggerError>().is_some());
    }
}
