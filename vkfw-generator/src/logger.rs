use anyhow::anyhow;

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    // stderr, stdout is not ours.
    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!(
            "{level:<5} {file}:{line} > {text}",
            level = record.level(),
            file = record.file().unwrap_or_else(|| record.target()),
            line = record
                .line()
                .map_or_else(|| "??".to_string(), |line| line.to_string()),
            text = record.args(),
        );
    }

    fn flush(&self) {}
}

pub fn init(level: log::LevelFilter) -> anyhow::Result<()> {
    log::set_logger(&Logger).map_err(|err| anyhow!("could not set logger: {err}"))?;
    log::set_max_level(level);
    Ok(())
}
