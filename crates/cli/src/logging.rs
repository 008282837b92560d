use anyhow::{Context, Result};
use clap::ValueEnum;
use env_logger::{Builder, Env, Target, WriteStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// env_logger's default human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub quiet: bool,
    pub format: LogFormat,
    /// Records are appended here as well as written to stderr.
    pub file: Option<PathBuf>,
}

pub fn init(options: &LogOptions) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if options.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if options.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }

    if options.format == LogFormat::Json {
        builder.format(|buf, record| {
            let line = json_line(
                &buf.timestamp_millis().to_string(),
                record.level(),
                record.target(),
                &record.args().to_string(),
            );
            writeln!(buf, "{line}")
        });
    }

    match &options.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            builder
                .write_style(WriteStyle::Never)
                .target(Target::Pipe(Box::new(Tee::new(io::stderr(), file))));
        }
        None => {
            builder.target(Target::Stderr);
        }
    }

    builder.try_init().context("initialize logger")?;
    Ok(())
}

fn json_line(timestamp: &str, level: log::Level, target: &str, message: &str) -> String {
    serde_json::json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    })
    .to_string()
}

/// Writes every record to both sinks.
struct Tee<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    const fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        self.secondary.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_line_has_the_four_fields() {
        let line = json_line(
            "2024-05-01T10:00:00.000Z",
            log::Level::Warn,
            "filemap_features",
            "Unsupported file type: application/octet-stream",
        );
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["timestamp"], "2024-05-01T10:00:00.000Z");
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["target"], "filemap_features");
        assert_eq!(
            value["message"],
            "Unsupported file type: application/octet-stream"
        );
        assert!(!line.contains('\n'));
    }

    #[test]
    fn tee_duplicates_writes() {
        let mut tee = Tee::new(Vec::new(), Vec::new());
        tee.write_all(b"Data saved to data.json\n").unwrap();
        tee.flush().unwrap();
        assert_eq!(tee.primary, b"Data saved to data.json\n".to_vec());
        assert_eq!(tee.primary, tee.secondary);
    }
}
