use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Log to stdout and to the given file. The parent directory of the log file is created if
/// required.
pub fn setup_logger(log_file: &Path, level: log::LevelFilter) -> Result<(), fern::InitError> {
    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .chain(fern::log_file(log_file)?)
        .apply()?;
    Ok(())
}
