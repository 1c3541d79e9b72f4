use chrono::{SecondsFormat, Utc};
use log::{max_level, LevelFilter, Metadata, Record, SetLoggerError};

/// One line per record on stdout, which the runtime ships to the log stream.
pub struct StdLogger;

static LOGGER: StdLogger = StdLogger;

impl log::Log for StdLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= max_level()
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      let time_str = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
      println!("{0} {1:<5} [{2}] {3}", time_str, record.level(), record.target(), record.args())
    }
  }

  fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
  log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

pub fn parse_level(raw: &str) -> LevelFilter {
  match raw.trim().to_ascii_lowercase().as_str() {
    "off" => LevelFilter::Off,
    "error" => LevelFilter::Error,
    "warn" | "warning" => LevelFilter::Warn,
    "debug" => LevelFilter::Debug,
    "trace" => LevelFilter::Trace,
    _ => LevelFilter::Info,
  }
}
