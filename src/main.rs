use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use depcheck::{
    checker::DependencyChecker,
    config::Settings,
    model::Ecosystem,
    output,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "depcheck")]
#[command(
    author,
    version,
    about = "Analyse Swift project dependencies for known vulnerabilities"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a project folder for vulnerable dependency versions
    Analyse {
        /// Project folder (defaults to the current directory)
        path: Option<PathBuf>,

        /// Report source file/line locations referencing vulnerable libraries
        #[arg(long)]
        sources: bool,

        /// Restrict analysis to one dependency manager
        #[arg(short, long, value_enum)]
        platform: Option<Platform>,

        /// Only analyse directly declared dependencies
        #[arg(long)]
        only_direct: bool,

        /// Answer CPE lookups from the cache only, never scan the dictionary
        #[arg(long)]
        cache_only: bool,

        /// Skip updating the Specs checkout and CPE dictionary
        #[arg(long)]
        offline: bool,
    },

    /// List the resolved dependencies of a project folder
    Dependencies {
        path: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        platform: Option<Platform>,

        #[arg(long)]
        only_direct: bool,
    },

    /// Look up the CPE identifier for a canonical owner/repo library name
    FindCpe {
        name: String,

        #[arg(long)]
        cache_only: bool,
    },

    /// Query known vulnerabilities for a CPE identifier
    QueryCve { cpe: String },

    /// Translate an ecosystem-local name and version to its canonical identity
    Translate { name: String, version: String },

    /// Bulk-build the CPE cache from the full dictionary
    BuildIndex {
        /// Checkpoint the cache to disk every N new entries
        #[arg(long, default_value_t = 100)]
        checkpoint_every: usize,
    },

    /// Print the cached translations and CPE mappings
    DumpCache,

    /// Show or create the config file
    Config {
        /// Write a default config file
        #[arg(long)]
        init: bool,

        /// Show the config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Platform {
    Cocoapods,
    Carthage,
    Swiftpm,
}

impl From<Platform> for Ecosystem {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Cocoapods => Ecosystem::Cocoapods,
            Platform::Carthage => Ecosystem::Carthage,
            Platform::Swiftpm => Ecosystem::Swiftpm,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "depcheck=warn",
        1 => "depcheck=info",
        _ => "depcheck=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

fn project_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| PathBuf::from("."))
}

async fn run(command: Commands) -> Result<u8> {
    let settings = Settings::load().unwrap_or_default();

    match command {
        Commands::Analyse {
            path,
            sources,
            platform,
            only_direct,
            cache_only,
            offline,
        } => {
            let mut checker = DependencyChecker::new(settings)
                .with_platform(platform.map(Ecosystem::from))
                .with_only_direct(only_direct)
                .with_cache_only(cache_only);

            if !offline {
                let pb = spinner("Updating vulnerability data...");
                checker.sync_resources().await;
                pb.finish_and_clear();
            }

            let pb = spinner("Analysing dependencies...");
            if sources {
                let locations = checker.analyse_sources(&project_path(path)).await?;
                pb.finish_and_clear();
                output::print_locations(&locations);
            } else {
                let matches = checker.analyse_folder(&project_path(path)).await?;
                pb.finish_and_clear();
                output::print_vulnerable(&matches);
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Dependencies {
            path,
            platform,
            only_direct,
        } => {
            let mut checker = DependencyChecker::new(settings)
                .with_platform(platform.map(Ecosystem::from))
                .with_only_direct(only_direct);

            let libraries = checker.dependencies(&project_path(path))?;
            output::print_libraries(&libraries);
            Ok(exit_codes::SUCCESS)
        }
        Commands::FindCpe { name, cache_only } => {
            let mut checker = DependencyChecker::new(settings).with_cache_only(cache_only);
            match checker.find_cpe(&name) {
                Some(cpe) => println!("{}", cpe),
                None => println!("No CPE found for {}", name),
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::QueryCve { cpe } => {
            let mut checker = DependencyChecker::new(settings);
            let found = checker.query_cve(&cpe).await;
            if found.is_empty() {
                println!("No known vulnerabilities for {}", cpe);
            }
            for cve in found {
                println!(
                    "{}: {}",
                    cve.id,
                    cve.description.as_deref().unwrap_or("(no description)")
                );
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Translate { name, version } => {
            let mut checker = DependencyChecker::new(settings);
            match checker.translate(&name, &version) {
                Some(translated) => {
                    println!("name:    {}", translated.name);
                    if let Some(module) = translated.module {
                        println!("module:  {}", module);
                    }
                    match translated.version {
                        Some(tag) => println!("version: {}", tag),
                        None => println!("version: (name-level only)"),
                    }
                }
                None => println!("No translation found for {} {}", name, version),
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::BuildIndex { checkpoint_every } => {
            let mut checker = DependencyChecker::new(settings);
            let pb = spinner("Indexing the CPE dictionary...");
            let added = checker.build_cpe_index(checkpoint_every)?;
            pb.finish_and_clear();
            println!("Indexed {} new CPE entries.", added);
            Ok(exit_codes::SUCCESS)
        }
        Commands::DumpCache => {
            let checker = DependencyChecker::new(settings);
            let (translations, cpes) = checker.cache_summary();

            println!("Translations ({}):", translations.len());
            for (name, canonical) in &translations {
                println!("  {} -> {}", name, canonical);
            }
            println!();
            println!("CPEs ({}):", cpes.len());
            for (name, cpe) in &cpes {
                println!("  {} -> {}", name, cpe);
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            if path {
                println!("{}", Settings::config_path().display());
            }
            if init {
                settings.save()?;
                println!("Wrote {}", Settings::config_path().display());
            }
            if !init && !path {
                print!("{}", Settings::generate_default_config());
            }
            Ok(exit_codes::SUCCESS)
        }
    }
}
