use crate::utils::{host_of, truncate_str};
use crate::{SummarizeError, Summary};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

pub const LOG_FILE_NAME: &str = "page-summarizer.log";

#[derive(Debug)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub console_output: bool,
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".into(),
            log_level: "info".into(),
            console_output: true,
            file_output: true,
        }
    }
}

fn create_separator(width: usize, ch: char) -> String {
    std::iter::repeat_n(ch, width).collect()
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut wrapped = String::new();
    let mut line_length = 0;

    for word in text.split_whitespace() {
        if line_length > 0 && line_length + word.len() + 1 > width {
            wrapped.push('\n');
            wrapped.push_str("  ");
            wrapped.push_str(word);
            line_length = word.len() + 2;
        } else {
            if line_length > 0 {
                wrapped.push(' ');
                line_length += 1;
            }
            wrapped.push_str(word);
            line_length += word.len();
        }
    }
    wrapped
}

pub fn log_summary_card(summary: &Summary) {
    const CARD_WIDTH: usize = 80;
    const CONTENT_WIDTH: usize = CARD_WIDTH - 2;

    let url_wrapped = wrap_text(&summary.url, CONTENT_WIDTH - 5);
    let title_wrapped = wrap_text(summary.title.as_deref().unwrap_or("N/A"), CONTENT_WIDTH - 7);
    let site = host_of(&summary.url).unwrap_or_else(|_| "N/A".to_string());
    let usage = summary
        .usage
        .map(|u| format!("{} tokens", u.total_tokens))
        .unwrap_or_else(|| "N/A".to_string());
    let text_wrapped = wrap_text(&truncate_str(&summary.summary, 400), CONTENT_WIDTH - 9);

    let horizontal_line = "═".repeat(CARD_WIDTH - 2);

    info!(
        "\n╔{}╗\n\
         URL: {}\n\
         Title: {}\n\
         Site: {}\n\
         Method: {} ({} via {})\n\
         Calls: {} LLM calls, {}, {} ms\n\
         Summary: {}\n\
         ╚{}╝",
        horizontal_line,
        url_wrapped,
        title_wrapped,
        site,
        summary.method,
        summary.model,
        summary.loader,
        summary.llm_calls,
        usage,
        summary.elapsed_ms,
        text_wrapped,
        horizontal_line,
    );
}

pub fn log_error_card<E: Display + std::error::Error>(url: &str, error: &E) {
    const CARD_WIDTH: usize = 70;
    const CONTENT_WIDTH: usize = CARD_WIDTH - 8;

    let top_bottom = create_separator(CARD_WIDTH - 2, '═');
    let middle = create_separator(CARD_WIDTH - 2, '─');

    let mut error_details = error.to_string();
    if let Some(source) = error.source() {
        error_details = format!("{error_details} (caused by: {source})");
    }

    error!(
        "\n╔═{}═╗\n\
         ║ URL: {:<width$} ║\n\
         ║{}║\n\
         ║ Error: {:<width$} ║\n\
         ╚═{}═╝",
        top_bottom,
        truncate_str(url, CONTENT_WIDTH),
        middle,
        truncate_str(&error_details, CONTENT_WIDTH),
        top_bottom,
        width = CONTENT_WIDTH
    );
}

/// Install the global subscriber: an `EnvFilter` (`RUST_LOG` wins over
/// `log_level`), a console layer and a daily rolling file in `log_dir`.
pub fn setup_logging(config: LogConfig) -> Result<(), SummarizeError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut layers = Vec::new();

    if config.console_output {
        let console_layer = subscriber_fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .compact();
        layers.push(console_layer.boxed());
    }

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir).map_err(|e| {
            SummarizeError::InvalidConfiguration(format!(
                "failed to create log directory {}: {e}",
                config.log_dir.display()
            ))
        })?;

        let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, LOG_FILE_NAME);

        let file_layer = subscriber_fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_writer(file_appender);

        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| {
            SummarizeError::InvalidConfiguration(format!("failed to set global subscriber: {e}"))
        })?;

    debug!("Logging system initialized with config: {:?}", config);
    Ok(())
}

/// Scoped subscriber at `level`, restored when dropped.
pub struct LogLevelGuard {
    _guard: tracing::dispatcher::DefaultGuard,
}

impl LogLevelGuard {
    pub fn set_level(level: &str) -> Self {
        let filter = EnvFilter::new(level);
        let subscriber = tracing_subscriber::registry()
            .with(subscriber_fmt::layer().with_test_writer())
            .with(filter);

        LogLevelGuard {
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("one two three", 80), "one two three");
        assert_eq!(wrap_text("one two three", 8), "one two\n  three");
        assert_eq!(wrap_text("", 10), "");
    }

    #[test]
    fn test_separator() {
        assert_eq!(create_separator(3, '═'), "═══");
    }

    #[test]
    fn test_setup_logging_reports_bad_log_dir() {
        let file = std::env::temp_dir().join(format!("page-summarizer-log-{}", std::process::id()));
        std::fs::write(&file, b"not a directory").unwrap();

        let result = setup_logging(LogConfig {
            log_dir: file.join("nested"),
            console_output: false,
            ..LogConfig::default()
        });
        assert!(matches!(result, Err(SummarizeError::InvalidConfiguration(_))));

        std::fs::remove_file(&file).ok();
    }
}
