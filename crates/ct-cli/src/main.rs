//! CalmTube CLI
//!
//! CLI tool for inspecting the region catalog, maintaining a settings file
//! and simulating apply passes offline.

mod file_backend;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

use ct_core::catalog::{self, RegionRole};
use ct_core::memory::{ManualTimers, MemoryDom};
use ct_core::{
    classify, run_command, Command, Engine, EngineConfig, FeatureId, PageCategory,
    PreferenceStore, SettingsPatch,
};

use file_backend::FileBackend;

/// Environment variable overriding the default data directory.
const DATA_DIR_ENV: &str = "CALMTUBE_DATA_DIR";
const DEFAULT_DATA_DIR: &str = ".calmtube";

#[derive(Parser)]
#[command(name = "ct-cli")]
#[command(about = "CalmTube catalog, settings and simulation tools")]
struct Cli {
    /// Settings directory (defaults to $CALMTUBE_DATA_DIR, then ./.calmtube)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the page category of a location
    Classify {
        /// URL or path
        location: String,
    },

    /// List features with their selectors and availability
    Catalog {
        /// Only show this feature
        #[arg(short, long)]
        feature: Option<String>,
    },

    /// Read or change the stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Run a keyboard command against the stored settings
    Command {
        /// Command name, e.g. toggle-shorts
        name: String,
    },

    /// Run one apply pass against an in-memory page
    Simulate {
        /// Location of the simulated page
        #[arg(short, long)]
        path: String,

        /// Settings file to use instead of defaults
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Engine tunables as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current record
    Get,
    /// Shallow-merge a JSON patch, e.g. '{"enabled":false}'
    Set { patch: String },
    /// Write the record to a file, or stdout
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the record from a backup file
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Restore defaults
    Reset,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = resolve_data_dir(cli.data_dir);
    let result = match cli.command {
        Commands::Classify { location } => cmd_classify(&location),
        Commands::Catalog { feature } => cmd_catalog(feature.as_deref()),
        Commands::Settings { action } => cmd_settings(&data_dir, action),
        Commands::Command { name } => cmd_command(&data_dir, &name),
        Commands::Simulate {
            path,
            settings,
            config,
            json,
        } => cmd_simulate(&path, settings, config, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os(DATA_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn open_store(data_dir: &Path) -> PreferenceStore {
    tracing::debug!(dir = %data_dir.display(), "opening settings store");
    PreferenceStore::new(vec![Box::new(FileBackend::new(data_dir))])
}

/// The store degrades to memory on write failure; the CLI treats that as
/// an error since nothing would be saved.
fn ensure_persisted(store: &PreferenceStore, data_dir: &Path) -> Result<(), String> {
    match store.active_backend() {
        Some(_) => Ok(()),
        None => Err(format!(
            "Failed to write settings under '{}'",
            data_dir.display()
        )),
    }
}

fn parse_feature(name: &str) -> Result<FeatureId, String> {
    FeatureId::from_name(name).ok_or_else(|| {
        let known: Vec<_> = FeatureId::ALL.iter().map(|f| f.as_str()).collect();
        format!("Unknown feature '{}' (expected one of: {})", name, known.join(", "))
    })
}

fn cmd_classify(location: &str) -> Result<(), String> {
    println!("{}", classify(location));
    Ok(())
}

fn cmd_catalog(feature: Option<&str>) -> Result<(), String> {
    let features = match feature {
        Some(name) => vec![parse_feature(name)?],
        None => FeatureId::ALL.to_vec(),
    };
    let defaults = ct_core::FeatureMap::DEFAULTS;

    for (i, feature) in features.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        let spec = catalog::spec_for(feature);
        let available: Vec<_> = PageCategory::ALL
            .into_iter()
            .filter(|&c| catalog::is_available(feature, c))
            .map(PageCategory::as_str)
            .collect();

        println!("{}", feature);
        println!("  Default:     {}", if defaults.get(feature) { "on" } else { "off" });
        println!("  Pages:       {}", available.join(", "));
        if spec.is_degenerate() {
            println!("  Selectors:   (overlay)");
        }
        for group in spec.groups {
            let role = match group.role {
                RegionRole::Container => "container",
                RegionRole::Part => "part",
                RegionRole::Item => "item",
            };
            for selector in group.selectors {
                println!("  {:<12} {}", format!("{role}:"), selector);
            }
        }
    }
    Ok(())
}

fn cmd_settings(data_dir: &Path, action: SettingsAction) -> Result<(), String> {
    let mut store = open_store(data_dir);

    match action {
        SettingsAction::Get => {
            println!("{}", store.get().to_json_pretty());
        }
        SettingsAction::Set { patch } => {
            let patch: SettingsPatch = serde_json::from_str(&patch)
                .map_err(|e| format!("Invalid settings patch: {}", e))?;
            store.set(patch);
            ensure_persisted(&store, data_dir)?;
            println!("{}", store.get().to_json_pretty());
        }
        SettingsAction::Export { output } => {
            let text = store.export_to();
            match output {
                Some(path) => {
                    fs::write(&path, &text)
                        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
                    println!("Exported settings to '{}'", path.display());
                }
                None => println!("{}", text),
            }
        }
        SettingsAction::Import { input } => {
            let text = fs::read_to_string(&input)
                .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
            store
                .import_from(&text)
                .map_err(|e| format!("Import failed: {}", e))?;
            ensure_persisted(&store, data_dir)?;
            println!("Imported settings from '{}'", input.display());
        }
        SettingsAction::Reset => {
            store.reset();
            ensure_persisted(&store, data_dir)?;
            println!("Settings reset to defaults");
        }
    }
    Ok(())
}

fn cmd_command(data_dir: &Path, name: &str) -> Result<(), String> {
    let command = Command::from_name(name).map_err(|e| format!("Unknown command: {}", e))?;
    let mut store = open_store(data_dir);
    let outcome = run_command(&mut store, command);
    ensure_persisted(&store, data_dir)?;
    println!("{} -> {}", outcome.command, if outcome.value { "on" } else { "off" });
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    location: String,
    category: PageCategory,
    overlay: bool,
    features: Vec<FeatureReport>,
    regions: Vec<RegionReport>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeatureReport {
    feature: FeatureId,
    available: bool,
    applied: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegionReport {
    selector: String,
    hidden_by: Option<FeatureId>,
}

fn cmd_simulate(
    location: &str,
    settings: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
) -> Result<(), String> {
    let mut store = PreferenceStore::in_memory();
    if let Some(path) = settings {
        let text = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
        store
            .import_from(&text)
            .map_err(|e| format!("Invalid settings '{}': {}", path.display(), e))?;
    }

    let config = match config {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
            EngineConfig::from_json(&text)
                .map_err(|e| format!("Invalid engine config '{}': {}", path.display(), e))?
        }
        None => EngineConfig::default(),
    };

    // One region per catalog selector
    let mut dom = MemoryDom::new(location);
    for feature in FeatureId::ALL {
        for selector in catalog::selectors_for(feature) {
            dom.add_region(selector);
        }
    }

    let mut engine = Engine::new(store, dom, ManualTimers::new(), config);
    let summary = engine
        .start()
        .ok_or_else(|| "Simulated page did not start".to_string())?;

    let report = SimulationReport {
        location: location.to_string(),
        category: summary.category,
        overlay: summary.overlay_mounted,
        features: FeatureId::ALL
            .into_iter()
            .map(|feature| FeatureReport {
                feature,
                available: catalog::is_available(feature, summary.category),
                applied: summary.applied.contains(&feature),
            })
            .collect(),
        regions: engine
            .orchestrator()
            .dom()
            .regions()
            .map(|(selector, hidden_by)| RegionReport {
                selector: selector.to_string(),
                hidden_by,
            })
            .collect(),
    };

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize report: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Page:     {} ({})", report.location, report.category);
    println!("Overlay:  {}", if report.overlay { "mounted" } else { "off" });
    println!();
    println!("Features:");
    for f in &report.features {
        let state = match (f.available, f.applied) {
            (_, true) => "applied",
            (true, false) => "off",
            (false, false) => "n/a",
        };
        println!("  {:<14} {}", f.feature.as_str(), state);
    }
    println!();
    println!("Regions:");
    for r in &report.regions {
        match r.hidden_by {
            Some(feature) => println!("  {:<48} hidden ({})", r.selector, feature),
            None => println!("  {:<48} visible", r.selector),
        }
    }
    Ok(())
}
