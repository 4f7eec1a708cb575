// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{debug, error, info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use zpevnik::app_config::{self, Config};
use zpevnik::database::models::{ChordMode, PaperFormat, SongbookOptions, Visibility};
use zpevnik::database::{DatabaseConnection, Repository};
use zpevnik::file_utils::FileManager;
use zpevnik::songbook_service::{NewVariant, SongbookService};
use zpevnik::translator::{MarkupTranslator, Translator};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for PaperFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliPaperFormat {
    A4,
    A5,
    A4Wide,
    A5Wide,
}

impl From<CliPaperFormat> for PaperFormat {
    fn from(cli_format: CliPaperFormat) -> Self {
        match cli_format {
            CliPaperFormat::A4 => PaperFormat::A4,
            CliPaperFormat::A5 => PaperFormat::A5,
            CliPaperFormat::A4Wide => PaperFormat::A4Wide,
            CliPaperFormat::A5Wide => PaperFormat::A5Wide,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a markup file and print the resulting fragment
    Translate {
        /// Markup file to translate
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Compile a single markup file into a document
    Export {
        /// Markup file to compile
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Song title, defaults to the file name
        #[arg(short, long)]
        title: Option<String>,

        /// Song interpreter, may be repeated
        #[arg(short, long)]
        interpreter: Vec<String>,

        /// Paper format
        #[arg(short, long, value_enum, default_value = "a4")]
        format: CliPaperFormat,

        /// Print lyrics without chords
        #[arg(long)]
        lyrics_only: bool,
    },

    /// Publish a stored songbook, reusing the cached document when possible
    Publish {
        /// Songbook identifier
        #[arg(value_name = "SONGBOOK_ID")]
        songbook_id: String,
    },

    /// Drop expired publish cache entries and unreferenced documents
    Sweep {
        /// Keep sweeping at the configured interval until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Generate shell completions for zpevnik
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Zpevnik - songbook markup translator and publisher
///
/// Translates the song markup language into typesetting source and builds
/// songbook documents with an external typesetting toolchain.
#[derive(Parser, Debug)]
#[command(name = "zpevnik")]
#[command(version)]
#[command(about = "Songbook markup translator and publisher")]
#[command(long_about = "Zpevnik translates song markup into typesetting source and publishes songbooks.

EXAMPLES:
    zpevnik translate song.txt                  # Print the translated fragment
    zpevnik export song.txt -t \"Song\"           # Compile one song into a document
    zpevnik publish 3f2a...                     # Publish a stored songbook
    zpevnik sweep --watch                       # Clean the publish cache periodically
    zpevnik completions bash > zpevnik.bash     # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger with everything enabled; the max level is
    // narrowed once the configuration is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "zpevnik", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config, cli.log_level.clone())?;
    log::set_max_level(level_filter(&config.log_level));

    match cli.command {
        Commands::Translate { file } => run_translate(&config, &file),
        Commands::Export {
            file,
            title,
            interpreter,
            format,
            lyrics_only,
        } => {
            let options = SongbookOptions {
                format: format.into(),
                chords: if lyrics_only {
                    ChordMode::LyricsOnly
                } else {
                    ChordMode::Chorded
                },
                ..Default::default()
            };
            run_export(&config, &file, title, interpreter, options).await
        }
        Commands::Publish { songbook_id } => run_publish(&config, &songbook_id).await,
        Commands::Sweep { watch } => run_sweep(&config, watch).await,
        Commands::Completions { .. } => Ok(()),
    }
}

/// Load or create the configuration, apply CLI overrides and validate it
fn load_config(path: &Path, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = Config::load_or_create(path)?;

    if let Some(log_level) = log_level {
        config.log_level = log_level.into();
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn open_repository(config: &Config) -> Result<Repository> {
    let connection = match &config.storage.database_path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };
    debug!("Song store: {:?}", connection.path());
    Ok(Repository::new(connection))
}

fn run_translate(config: &Config, file: &Path) -> Result<()> {
    let text = FileManager::read_to_string(file)?;
    let result = Translator::new(config.translator.clone()).translate(&text);

    if !result.is_clean() {
        for diagnostic in &result.diagnostics {
            error!("{}", diagnostic);
        }
        return Err(anyhow!(
            "{:?} contains {} error(s)",
            file,
            result.diagnostics.len()
        ));
    }

    println!("{}", result.fragment);
    Ok(())
}

async fn run_export(
    config: &Config,
    file: &Path,
    title: Option<String>,
    interpreters: Vec<String>,
    options: SongbookOptions,
) -> Result<()> {
    let text = FileManager::read_to_string(file)?;
    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "Song".to_string())
    });

    // Single-song exports do not touch the song store
    let service = SongbookService::from_config(config, Repository::new_in_memory()?)?;
    let song = service.create_song(&title, interpreters).await?;
    let variant = service
        .create_variant(
            &song.id,
            "cli",
            NewVariant {
                title,
                text,
                description: String::new(),
                visibility: Visibility::Private,
            },
        )
        .await?;

    let link = service.export_variant(&variant.id, &options).await?;
    info!("Exported {:?} to {:?}", file, link.path);
    println!("{}", link.path.display());
    Ok(())
}

async fn run_publish(config: &Config, songbook_id: &str) -> Result<()> {
    let service = SongbookService::from_config(config, open_repository(config)?)?;

    let link = service.publish_songbook(songbook_id).await?;
    info!("Songbook {} published at {}", songbook_id, link.link);

    let (hits, misses, hit_rate) = service.fragments().stats();
    debug!(
        "Fragment cache: {} hits, {} misses ({:.0}% hit rate)",
        hits,
        misses,
        hit_rate * 100.0
    );
    println!("{}", link.path.display());
    Ok(())
}

async fn run_sweep(config: &Config, watch: bool) -> Result<()> {
    let service = SongbookService::from_config(config, open_repository(config)?)?;

    let stats = service.repository().connection().stats()?;
    debug!(
        "Store: {} songbooks, {} published, {} cached fragments",
        stats.songbook_count, stats.published_songbooks, stats.cached_fragments
    );

    if !watch {
        let report = service.sweep().await?;
        println!(
            "expired: {}, removed: {}, kept: {}",
            report.expired_entries, report.removed_files, report.kept_orphans
        );
        return Ok(());
    }

    let interval = Duration::from_secs(config.cache.sweep_interval_secs);
    info!("Sweeping every {} seconds, press Ctrl+C to stop", interval.as_secs());
    let handle = service.spawn_periodic_sweep(interval);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    handle.abort();

    info!("Sweeper stopped");
    Ok(())
}
