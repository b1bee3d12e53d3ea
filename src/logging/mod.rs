mod pretty_list;

use {
    crate::config::LoggingConfig,
    anyhow::Result,
    flexi_logger::{
        DeferredNow, Duplicate, FileSpec, Logger, LoggerHandle, Record,
        WriteMode,
    },
    regex::Regex,
    std::{fmt::Write as FmtWrite, sync::OnceLock},
    textwrap::{termwidth, Options},
};

pub use self::pretty_list::PrettyList;

/// Matches the continuation marker on the last line of a wrapped record.
static LAST_LINE_MATCHER: OnceLock<Regex> = OnceLock::new();

/// Setup pretty console logging, and file logging when the config names a
/// directory.
///
/// The returned handle must be kept alive for as long as logs should be
/// written.
pub fn setup(config: &LoggingConfig) -> Result<LoggerHandle> {
    let logger = Logger::try_with_env_or_str(&config.level)?
        .format(multiline_format);
    let logger = match &config.directory {
        Some(directory) => logger
            .log_to_file(FileSpec::default().directory(directory))
            .duplicate_to_stdout(Duplicate::All)
            .write_mode(WriteMode::Async),
        None => logger,
    };
    let handle = logger.start()?;

    log::info!(
        "Adjust the log level by setting RUST_LOG. By default RUST_LOG={}",
        config.level
    );

    Ok(handle)
}

/// A multiline log format for flexi_logger.
///
/// Logs are automatically wrapped at terminal width and prefixed with unicode
/// so it's easy to tell where a big log statement begins and ends.
pub fn multiline_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    let mut full_line = String::new();
    writeln!(
        full_line,
        "{} [{}] [{}:{}]",
        record.level(),
        now.now().format("%H:%M:%S%.6f"),
        record.file().unwrap_or("<unnamed>"),
        record.line().unwrap_or(0),
    )
    .and_then(|_| write!(&mut full_line, "{}", &record.args()))
    .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

    writeln!(w, "{}", wrap_record(&full_line, termwidth().min(74)))
}

/// Wrap a formatted record to `width` columns.
///
/// The first line starts with ┏, the middle lines with ┃, and the last line
/// of a multiline record with ┗.
fn wrap_record(full_line: &str, width: usize) -> String {
    let wrap_options = Options::new(width)
        .initial_indent("┏ ")
        .subsequent_indent("┃ ");
    let wrapped = textwrap::fill(full_line, wrap_options);

    match last_line_matcher() {
        Some(matcher) => matcher.replace(&wrapped, "┗$2").into_owned(),
        None => wrapped,
    }
}

fn last_line_matcher() -> Option<&'static Regex> {
    if let Some(matcher) = LAST_LINE_MATCHER.get() {
        return Some(matcher);
    }
    let matcher = Regex::new(r"(┃)(.*)$").ok()?;
    Some(LAST_LINE_MATCHER.get_or_init(|| matcher))
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn short_records_stay_on_one_line() {
        assert_eq!(wrap_record("INFO hello", 74), "┏ INFO hello");
    }

    #[test]
    fn the_last_wrapped_line_is_closed() {
        let wrapped = wrap_record("INFO [x]\nfirst\nsecond\nthird", 74);
        let lines: Vec<&str> = wrapped.lines().collect();
        assert_eq!(
            lines,
            vec!["┏ INFO [x]", "┃ first", "┃ second", "┗ third"]
        );
    }
}
