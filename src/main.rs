use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::{Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use page_summarizer::{
    log_error_card, log_summary_card, setup_logging, ChainType, LlmConfig, LogConfig,
    ServiceConfig, SummarizeError, SummarizeRequest, Summary, SummarizerService,
    DEFAULT_GROQ_MODEL,
};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "page-summarizer")]
#[command(about = "Summarize a web page with a Groq-hosted LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a single URL
    Summarize {
        url: String,

        /// stuff, map_reduce or refine
        #[arg(short, long, default_value = "stuff")]
        method: ChainType,

        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,

        #[command(flatten)]
        options: CommonOptions,
    },
    /// Prompt for URLs and methods until an empty URL is entered
    Interactive {
        #[command(flatten)]
        options: CommonOptions,
    },
}

#[derive(Args)]
struct CommonOptions {
    /// Groq API key
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "GROQ_MODEL", default_value = DEFAULT_GROQ_MODEL)]
    model: String,

    /// Only use the plain HTTP loader
    #[arg(long)]
    no_browser: bool,

    /// Split the page into chunks of this many characters
    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

impl CommonOptions {
    fn service(&self) -> Result<SummarizerService, SummarizeError> {
        let mut config = ServiceConfig::new().with_llm(LlmConfig {
            model: self.model.clone(),
            ..LlmConfig::from_env()
        });
        if self.no_browser {
            config = config.without_browser();
        }
        if let Some(chunk_size) = self.chunk_size {
            config = config.with_chunk_size(chunk_size);
        }
        SummarizerService::new(config)
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn summarize_with_spinner(
    service: &SummarizerService,
    request: &SummarizeRequest,
) -> Result<Summary, SummarizeError> {
    let pb = spinner("Loading page content and summarizing... Please wait.");
    let result = service.summarize(request).await;
    pb.finish_and_clear();
    result
}

fn print_summary(summary: &Summary, format: OutputFormat) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Markdown => {
            println!("{}", "Summary Generated!".bold().green());
            println!();
            println!(
                "{}",
                format!("## Summary ({} Method)", summary.method).bold().blue()
            );
            if let Some(title) = &summary.title {
                println!("{}", title.italic());
            }
            println!();
            println!("{}", summary.summary);
            println!();
            println!(
                "{}",
                format!(
                    "{} | {} loader | {} LLM calls | {} ms",
                    summary.model, summary.loader, summary.llm_calls, summary.elapsed_ms
                )
                .dimmed()
            );
        }
    }
    Ok(())
}

fn report_error(error: &SummarizeError) {
    if error.is_input_error() {
        eprintln!("{}", error.to_string().yellow());
    } else {
        eprintln!("{}", format!("An error occurred: {error}").red());
    }
}

async fn run_summarize(
    url: String,
    method: ChainType,
    format: OutputFormat,
    options: CommonOptions,
) -> Result<(), Box<dyn Error>> {
    let service = options.service()?;
    let request = SummarizeRequest {
        api_key: options.api_key.clone(),
        url: Some(url.clone()),
        method,
    };

    let result = summarize_with_spinner(&service, &request).await;
    if let Err(e) = service.shutdown().await {
        tracing::warn!(error = %e, "Failed to stop the browser");
    }

    match result {
        Ok(summary) => {
            log_summary_card(&summary);
            print_summary(&summary, format)
        }
        Err(e) => {
            log_error_card(&url, &e);
            Err(e.into())
        }
    }
}

async fn run_interactive(options: CommonOptions) -> Result<(), Box<dyn Error>> {
    println!("{}", "Web Page Summarizer".bold().green());
    println!("{}", "===================".green());

    let api_key = match &options.api_key {
        Some(key) => key.clone(),
        None => Password::new()
            .with_prompt("Groq API Key")
            .allow_empty_password(true)
            .interact()?,
    };
    let service = options.service()?;
    let labels: Vec<String> = ChainType::ALL
        .iter()
        .map(|method| format!("{:<10} {}", method.to_string(), method.description()))
        .collect();

    loop {
        let url: String = Input::new()
            .with_prompt("URL to summarize (empty to quit)")
            .allow_empty(true)
            .interact_text()?;
        if url.trim().is_empty() {
            break;
        }

        let selection = Select::new()
            .with_prompt("Summarization method")
            .items(&labels)
            .default(0)
            .interact()?;

        let method = ChainType::ALL[selection];
        let request = SummarizeRequest::new(api_key.clone(), url.clone(), method);
        match summarize_with_spinner(&service, &request).await {
            Ok(summary) => {
                log_summary_card(&summary);
                print_summary(&summary, OutputFormat::Markdown)?
            }
            Err(e) => {
                log_error_card(&url, &e);
                report_error(&e)
            }
        }
        println!();
    }

    service.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig {
        log_level: cli.log_level.clone(),
        file_output: cli.log_dir.is_some(),
        log_dir: cli.log_dir.clone().unwrap_or_else(|| "logs".into()),
        ..LogConfig::default()
    };
    if let Err(e) = setup_logging(log_config) {
        eprintln!("{}", e.to_string().yellow());
    }

    let result = match cli.command {
        Commands::Summarize {
            url,
            method,
            format,
            options,
        } => run_summarize(url, method, format, options).await,
        Commands::Interactive { options } => run_interactive(options).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<SummarizeError>() {
            Some(error) => report_error(error),
            None => eprintln!("{}", format!("An error occurred: {e}").red()),
        }
        std::process::exit(1);
    }
}
