use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use studysnap_core::config::{Config, LoggingConfig};

mod quiz;

#[derive(Parser)]
#[command(
    name = "studysnap",
    about = "Turn a photo of study material into a narrated multiple-choice quiz",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a quiz from an image and take it in the terminal
    Quiz {
        /// Image of the study material (JPEG or PNG)
        #[arg(short, long)]
        image: PathBuf,

        /// Number of questions, 1-10 (default from config, else 5)
        #[arg(short = 'n', long)]
        count: Option<u8>,

        /// Disable the read-aloud option
        #[arg(long)]
        no_narration: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose common issues
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone().unwrap_or_else(|| "info".into())
    };

    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    for directive in &logging.filters {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring invalid log filter '{directive}': {e}"),
        }
    }

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (logging.format.as_str(), logging.output.as_str()) {
        ("json", "stdout") => builder.json().with_writer(std::io::stdout).init(),
        ("json", _) => builder.json().with_writer(std::io::stderr).init(),
        (_, "stdout") => builder.with_writer(std::io::stdout).init(),
        _ => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;

    init_logging(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Quiz {
            image,
            count,
            no_narration,
        } => {
            quiz::run(&config, image, count, !no_narration).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("'{key}' is not set"),
            },
            ConfigAction::Set { key, value } => {
                // Accept JSON literals (numbers, booleans, arrays); anything else is a string.
                let parsed = serde_json::from_str(&value)
                    .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
                config.set_path(&key, parsed)?;

                let (_, errors) = config.validate();
                if !errors.is_empty() {
                    anyhow::bail!("refusing to save invalid config: {}", errors.join("; "));
                }
                config.save(&config_path)?;
                println!("Set {key} in {}", config_path.display());
            }
        },
        Commands::Doctor => {
            println!("StudySnap v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Config: {} ({})",
                config_path.display(),
                if config_path.exists() { "found" } else { "not found, using defaults" }
            );
            println!("Quiz model: {}", config.quiz_model());
            println!(
                "Narration: {} (model {}, voice {}, {} Hz)",
                if config.narration_enabled() { "enabled" } else { "disabled" },
                config.speech_model(),
                config.voice(),
                config.sample_rate()
            );
            match config.player() {
                Some(argv) => println!("Player: {}", argv.join(" ")),
                None => println!("Player: none (narration runs silently)"),
            }

            let (warnings, errors) = config.validate();
            for w in &warnings {
                println!("warning: {w}");
            }
            for e in &errors {
                println!("error: {e}");
            }
            if !errors.is_empty() {
                anyhow::bail!("{} configuration error(s)", errors.len());
            }
            println!("No problems found.");
        }
    }

    Ok(())
}
