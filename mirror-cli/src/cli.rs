use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use mirror_engine::{MirrorConfig, RetryPolicy};

use crate::error::AppError;

/// Mirror an HLS (.m3u8) playlist and every segment it references to disk.
#[derive(Debug, Parser)]
#[command(name = "m3u8-mirror", version, about)]
pub struct Args {
    /// URL of the .m3u8 playlist (http or https)
    #[arg(short = 'i', long = "input")]
    pub input: String,

    /// Output directory for index.m3u8 and the downloaded resources
    #[arg(short = 'o', long = "output", default_value = ".")]
    pub output: PathBuf,

    /// Number of concurrent download workers (1-10000)
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Pause after each download per worker, e.g. 500ms, 2s, 1m
    #[arg(short = 's', long = "sleep", default_value = "0s", value_parser = parse_duration)]
    pub sleep: Duration,

    /// Prefix for generated filenames; may contain a directory such as `ts/`
    #[arg(short = 'p', long = "prefix", default_value = "")]
    pub prefix: String,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = 300)]
    pub timeout: u64,

    /// Attempts per resource before giving up
    #[arg(long = "retries", default_value_t = 5)]
    pub retries: u32,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

/// Parses `<n>ms`, `<n>s`, `<n>m` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (digits, unit) = match input.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => input.split_at(pos),
        None => (input, "s"),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration `{input}`"))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        _ => Err(format!("unknown duration unit in `{input}`, use ms, s or m")),
    }
}

impl Args {
    /// Builds a validated engine configuration. The output directory is made
    /// absolute against the current working directory.
    pub fn into_config(self) -> Result<MirrorConfig, AppError> {
        let output_dir = absolute(&self.output)?;

        let mut config = MirrorConfig::new(self.input, output_dir)
            .with_workers(self.threads)
            .with_request_delay(self.sleep)
            .with_name_prefix(self.prefix)
            .with_retry(RetryPolicy {
                max_attempts: self.retries,
                ..RetryPolicy::default()
            });
        config.request_timeout = Duration::from_secs(self.timeout);

        config
            .validate()
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        Ok(config)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, AppError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("m3u8-mirror").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("0s"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("5h").is_err());
    }

    #[test]
    fn defaults_apply() {
        let args = parse(&["-i", "https://example.com/index.m3u8"]);
        assert_eq!(args.threads, 1);
        assert_eq!(args.sleep, Duration::ZERO);
        assert_eq!(args.retries, 5);
        assert_eq!(args.timeout, 300);
        assert!(args.prefix.is_empty());
    }

    #[test]
    fn builds_config_from_flags() {
        let args = parse(&[
            "-i",
            "https://example.com/index.m3u8",
            "-o",
            "/srv/mirror",
            "-t",
            "8",
            "-s",
            "100ms",
            "-p",
            "ts/",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/mirror"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.request_delay, Duration::from_millis(100));
        assert_eq!(config.name_prefix, "ts/");
        assert_eq!(config.retry.backoff, Duration::from_secs(2));
    }

    #[test]
    fn relative_output_is_made_absolute() {
        let config = parse(&["-i", "https://example.com/index.m3u8", "-o", "out"])
            .into_config()
            .unwrap();
        assert!(config.output_dir.is_absolute());
        assert!(config.output_dir.ends_with("out"));
    }

    #[test]
    fn rejects_invalid_input_url_and_thread_count() {
        let err = parse(&["-i", "example.com/index.m3u8"]).into_config().unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = parse(&["-i", "https://example.com/index.m3u8", "-t", "10001"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let result = Args::try_parse_from([
            "m3u8-mirror",
            "-i",
            "https://example.com/index.m3u8",
            "-v",
            "-q",
        ]);
        assert!(result.is_err());
    }
}
