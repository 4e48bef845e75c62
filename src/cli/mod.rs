//! Command-line interface for the hyperspectral clustering pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::core::loaders::{self, DataCube, RescaleFactors};
use crate::core::writers;
use crate::processors::search::{run_search, SearchParams};
use crate::visualization;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "hyperspec-pipeline")]
#[command(about = "Hyperspectral cube K-means clustering pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster the cube for a single K value
    Cluster {
        /// Raw BIL cube file
        cube: PathBuf,
        /// Number of clusters
        #[arg(short = 'k', long)]
        clusters: Option<usize>,
        /// Fixed iteration budget
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Per-pixel worker threads
        #[arg(long)]
        threads: Option<usize>,
        /// Data fraction selector (1..=4); each step below 4 halves the lines loaded
        #[arg(long)]
        data_usage: Option<u32>,
        /// Write the final assignment map to this CSV file
        #[arg(long)]
        assignments_csv: Option<PathBuf>,
        /// Render the final cluster map to this PNG file
        #[arg(long)]
        cluster_map: Option<PathBuf>,
        /// Write per-run timing to this log file
        #[arg(long)]
        timing_log: Option<PathBuf>,
    },

    /// Search K in [2, max-clusters] for the minimum-variance clustering
    Search {
        /// Raw BIL cube file
        cube: PathBuf,
        /// Maximum K to try
        #[arg(long)]
        max_clusters: Option<usize>,
        /// Concurrent K instances
        #[arg(long)]
        search_threads: Option<usize>,
        /// Per-pixel worker threads within each instance
        #[arg(long)]
        kmeans_threads: Option<usize>,
        /// Fixed iteration budget per instance
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Data fraction selector (1..=4)
        #[arg(long)]
        data_usage: Option<u32>,
        /// Write the winning assignment map to this CSV file
        #[arg(long)]
        assignments_csv: Option<PathBuf>,
        /// Render the winning cluster map to this PNG file
        #[arg(long)]
        cluster_map: Option<PathBuf>,
        /// Write per-K timing to this log file
        #[arg(long)]
        timing_log: Option<PathBuf>,
    },

    /// Render the cube's RGB composite as PNG
    Render {
        /// Raw BIL cube file
        cube: PathBuf,
        /// Output PNG file path (defaults to the cube name with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Data fraction selector (1..=4)
        #[arg(long)]
        data_usage: Option<u32>,
    },

    /// Write the default configuration to a YAML file
    DefaultConfig {
        /// Output YAML path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        println!("║ {:<20}: {:<39} ║", key, truncate_value(value));
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Shorten a summary value to fit its column. Counts characters, not bytes,
/// so multi-byte paths never split mid-character.
fn truncate_value(value: &str) -> String {
    if value.chars().count() > 39 {
        let head: String = value.chars().take(36).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Cluster {
            cube,
            clusters,
            max_iterations,
            threads,
            data_usage,
            assignments_csv,
            cluster_map,
            timing_log,
        } => {
            let mut config = config;
            apply_override(&mut config.clustering.num_clusters, clusters);
            apply_override(&mut config.clustering.max_iterations, max_iterations);
            apply_override(&mut config.scheduler.kmeans_threads, threads);
            apply_override(&mut config.cube.data_usage, data_usage);
            config.scheduler.search_threads = 1;
            cmd_cluster(&cube, &config, false, assignments_csv, cluster_map, timing_log);
        }
        Commands::Search {
            cube,
            max_clusters,
            search_threads,
            kmeans_threads,
            max_iterations,
            data_usage,
            assignments_csv,
            cluster_map,
            timing_log,
        } => {
            let mut config = config;
            apply_override(&mut config.clustering.num_clusters, max_clusters);
            apply_override(&mut config.clustering.max_iterations, max_iterations);
            apply_override(&mut config.scheduler.search_threads, search_threads);
            apply_override(&mut config.scheduler.kmeans_threads, kmeans_threads);
            apply_override(&mut config.cube.data_usage, data_usage);
            cmd_cluster(&cube, &config, true, assignments_csv, cluster_map, timing_log);
        }
        Commands::Render {
            cube,
            output,
            data_usage,
        } => {
            let mut config = config;
            apply_override(&mut config.cube.data_usage, data_usage);
            cmd_render(&cube, output, &config);
        }
        Commands::DefaultConfig { path } => {
            cmd_default_config(&path);
        }
    }
}

fn apply_override<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn load_cube_or_exit(cube_path: &PathBuf, config: &PipelineConfig) -> (DataCube, RescaleFactors) {
    let spinner = create_spinner("Loading data cube...");
    let start = Instant::now();

    match loaders::load_cube(cube_path, &config.cube) {
        Ok(loaded) => {
            spinner.finish_and_clear();
            info!(
                "Cube loaded in {:.2?}: {}x{} pixels, {} bands",
                start.elapsed(),
                loaded.0.rows(),
                loaded.0.cols(),
                loaded.0.bands()
            );
            loaded
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load cube: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_cluster(
    cube_path: &PathBuf,
    config: &PipelineConfig,
    search: bool,
    assignments_csv: Option<PathBuf>,
    cluster_map: Option<PathBuf>,
    timing_log: Option<PathBuf>,
) {
    let start = Instant::now();

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // Config-file toggles supply default output paths unless a flag already
    // named one.
    let assignments_csv = assignments_csv.or_else(|| {
        config
            .display
            .write_assignments
            .then(|| PathBuf::from("assignments.csv"))
    });
    let cluster_map = cluster_map.or_else(|| {
        config
            .display
            .render_clusters
            .then(|| PathBuf::from("clusters.png"))
    });
    let timing_log = timing_log.or_else(|| {
        config
            .display
            .write_timing
            .then(|| PathBuf::from("time.log"))
    });

    let (cube, _rescale) = load_cube_or_exit(cube_path, config);

    let params = SearchParams {
        max_clusters: config.clustering.num_clusters,
        search,
        max_iterations: config.clustering.max_iterations,
        search_threads: config.scheduler.search_threads,
        kmeans_threads: config.scheduler.kmeans_threads,
    };

    let spinner = create_spinner(if search {
        "Searching K values..."
    } else {
        "Clustering..."
    });

    let (outcome, runs) = match run_search(&cube, &params, None) {
        Ok(result) => {
            spinner.finish_and_clear();
            result
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Clustering failed: {}", e);
            std::process::exit(1);
        }
    };

    // The winning run backs every optional output.
    let best_run = runs
        .iter()
        .find(|run| run.k == outcome.best_k)
        .unwrap_or(&runs[0]);

    if let Some(path) = assignments_csv {
        match writers::write_assignments_csv(&path, cube.rows(), cube.cols(), &best_run.assignments)
        {
            Ok(()) => info!("Assignment CSV -> {}", path.display()),
            Err(e) => error!("Failed to write assignment CSV: {}", e),
        }
    }

    if let Some(path) = cluster_map {
        match visualization::render_cluster_map(
            &path,
            cube.rows(),
            cube.cols(),
            best_run.k,
            &best_run.assignments,
        ) {
            Ok(()) => info!("Cluster map PNG -> {}", path.display()),
            Err(e) => error!("Failed to render cluster map: {}", e),
        }
    }

    if let Some(path) = timing_log {
        match writers::write_timing_log(&path, &runs) {
            Ok(()) => info!("Timing log -> {}", path.display()),
            Err(e) => error!("Failed to write timing log: {}", e),
        }
    }

    let populated = best_run
        .cluster_sizes
        .iter()
        .filter(|&&size| size > 0)
        .count();

    let title = if search {
        "K-Search Complete"
    } else {
        "Clustering Complete"
    };
    print_summary(
        title,
        &[
            ("Input file", cube_path.display().to_string()),
            (
                "Cube",
                format!("{}x{}x{}", cube.rows(), cube.cols(), cube.bands()),
            ),
            ("Best K", outcome.best_k.to_string()),
            ("Variance", format!("{:.6}", outcome.best_variance)),
            ("Populated clusters", populated.to_string()),
            ("Iterations per K", best_run.iterations.to_string()),
            ("K instances run", runs.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_render(cube_path: &PathBuf, output: Option<PathBuf>, config: &PipelineConfig) {
    let start = Instant::now();

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // Default output path to the cube name with .png extension
    let output_path = output.unwrap_or_else(|| {
        let mut path = cube_path.clone();
        path.set_extension("png");
        path
    });

    let (cube, rescale) = load_cube_or_exit(cube_path, config);

    let spinner = create_spinner("Rendering RGB composite...");
    let display_bands = [
        config.cube.red_band,
        config.cube.green_band,
        config.cube.blue_band,
    ];

    match visualization::render_rgb_composite(&output_path, &cube, display_bands, &rescale) {
        Ok(()) => {
            spinner.finish_and_clear();
            print_summary(
                "Render Complete",
                &[
                    ("Input file", cube_path.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    (
                        "Cube",
                        format!("{}x{}x{}", cube.rows(), cube.cols(), cube.bands()),
                    ),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Render failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_default_config(path: &PathBuf) {
    let config = PipelineConfig::default();
    match config.to_yaml(path) {
        Ok(()) => {
            println!("Default config written to {}", path.display());
        }
        Err(e) => {
            error!("Failed to write config: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_value_keeps_short_values() {
        assert_eq!(truncate_value("cube.raw"), "cube.raw");
    }

    #[test]
    fn test_truncate_value_cuts_on_char_boundaries() {
        // Three-byte characters: a byte-indexed cut at 36 would split one.
        let long = "データキューブ".repeat(8);
        let shortened = truncate_value(&long);
        assert!(shortened.ends_with("..."));
        assert_eq!(shortened.chars().count(), 39);
    }
}
