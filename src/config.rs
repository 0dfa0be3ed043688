use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

/// Command-line arguments for the visualizer. Anything left unset falls back
/// to the config file (if given), then to built-in defaults.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Optional TOML configuration file; explicit CLI flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Origin (initial state) snapshot CSV
    #[arg(long)]
    pub origin: Option<PathBuf>,

    /// Terminal snapshot CSV; defaults to the per-step file at the last index
    #[arg(long = "final")]
    pub final_snapshot: Option<PathBuf>,

    /// Directory holding the per-step snapshot CSVs
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,

    /// Base name of per-step snapshot files (`<base>-<index>.csv`)
    #[arg(long)]
    pub snapshot_base: Option<String>,

    /// First frame index to render (inclusive)
    #[arg(long)]
    pub first_index: Option<u32>,

    /// Last frame index to render (inclusive)
    #[arg(long)]
    pub last_index: Option<u32>,

    /// Directory for comparison artifacts
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Directory for rendered animation frames
    #[arg(long)]
    pub frames_dir: Option<PathBuf>,

    /// Frame rate quoted in the encoding advisory
    #[arg(long)]
    pub fps: Option<u32>,

    /// Square block size (in pixels) drawn per grid cell
    #[arg(long)]
    pub pixels_per_cell: Option<u32>,

    /// Skip the origin/final comparison phase
    #[arg(long, default_value_t = false)]
    pub skip_comparison: bool,

    /// Skip the per-step frame rendering phase
    #[arg(long, default_value_t = false)]
    pub skip_frames: bool,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct InputSection {
    origin: Option<PathBuf>,
    final_snapshot: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
    snapshot_base: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct OutputSection {
    results_dir: Option<PathBuf>,
    frames_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct FramesSection {
    first_index: Option<u32>,
    last_index: Option<u32>,
    fps: Option<u32>,
    pixels_per_cell: Option<u32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct ClusterSection {
    k: Option<usize>,
    seed: Option<u64>,
}

/// On-disk configuration mirroring the CLI surface.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    input: InputSection,
    #[serde(default)]
    output: OutputSection,
    #[serde(default)]
    frames: FramesSection,
    #[serde(default)]
    cluster: ClusterSection,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: FileConfig = toml::from_str(&config_str).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from '{}': {}", path.display(), e)
        })?;
        Ok(config)
    }
}

/// Fully-resolved run configuration; one immutable instance per run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub origin_path: PathBuf,
    pub final_path: PathBuf,
    pub snapshot_dir: PathBuf,
    pub snapshot_base: String,
    pub first_index: u32,
    pub last_index: u32,
    pub results_dir: PathBuf,
    pub frames_dir: PathBuf,
    pub fps: u32,
    pub pixels_per_cell: u32,
    pub cluster_k: usize,
    pub cluster_seed: u64,
    pub skip_comparison: bool,
    pub skip_frames: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            origin_path: PathBuf::from("origin.csv"),
            final_path: PathBuf::new(), // derived from last_index unless set
            snapshot_dir: PathBuf::from("results"),
            snapshot_base: "political_coordinates".to_string(),
            first_index: 1,
            last_index: 10_000,
            results_dir: PathBuf::from("results"),
            frames_dir: PathBuf::from("animation_frames"),
            fps: 60,
            pixels_per_cell: 4,
            cluster_k: 2,
            cluster_seed: 42,
            skip_comparison: false,
            skip_frames: false,
        }
    }
}

impl RunConfig {
    /// Merges defaults, the optional config file, and CLI flags (highest
    /// precedence), then validates the result.
    pub fn resolve(args: Args) -> Result<Self> {
        let mut cfg = RunConfig::default();

        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        if let Some(v) = file.input.origin {
            cfg.origin_path = v;
        }
        if let Some(v) = file.input.snapshot_dir {
            cfg.snapshot_dir = v;
        }
        if let Some(v) = file.input.snapshot_base {
            cfg.snapshot_base = v;
        }
        if let Some(v) = file.output.results_dir {
            cfg.results_dir = v;
        }
        if let Some(v) = file.output.frames_dir {
            cfg.frames_dir = v;
        }
        if let Some(v) = file.frames.first_index {
            cfg.first_index = v;
        }
        if let Some(v) = file.frames.last_index {
            cfg.last_index = v;
        }
        if let Some(v) = file.frames.fps {
            cfg.fps = v;
        }
        if let Some(v) = file.frames.pixels_per_cell {
            cfg.pixels_per_cell = v;
        }
        if let Some(v) = file.cluster.k {
            cfg.cluster_k = v;
        }
        if let Some(v) = file.cluster.seed {
            cfg.cluster_seed = v;
        }

        if let Some(v) = args.origin {
            cfg.origin_path = v;
        }
        if let Some(v) = args.snapshot_dir {
            cfg.snapshot_dir = v;
        }
        if let Some(v) = args.snapshot_base {
            cfg.snapshot_base = v;
        }
        if let Some(v) = args.first_index {
            cfg.first_index = v;
        }
        if let Some(v) = args.last_index {
            cfg.last_index = v;
        }
        if let Some(v) = args.results_dir {
            cfg.results_dir = v;
        }
        if let Some(v) = args.frames_dir {
            cfg.frames_dir = v;
        }
        if let Some(v) = args.fps {
            cfg.fps = v;
        }
        if let Some(v) = args.pixels_per_cell {
            cfg.pixels_per_cell = v;
        }
        cfg.skip_comparison = args.skip_comparison;
        cfg.skip_frames = args.skip_frames;

        // The terminal snapshot defaults to the per-step file at the last index
        cfg.final_path = args
            .final_snapshot
            .or(file.input.final_snapshot)
            .unwrap_or_else(|| cfg.snapshot_path(cfg.last_index));

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.first_index == 0 {
            anyhow::bail!("first_index must be at least 1.");
        }
        if self.last_index < self.first_index {
            anyhow::bail!(
                "last_index ({}) must not precede first_index ({}).",
                self.last_index,
                self.first_index
            );
        }
        if self.fps == 0 {
            anyhow::bail!("fps must be positive.");
        }
        if self.pixels_per_cell == 0 {
            anyhow::bail!("pixels_per_cell must be at least 1.");
        }
        if self.cluster_k < 2 {
            anyhow::bail!("cluster k must be at least 2.");
        }
        Ok(())
    }

    /// Path of the per-step snapshot file for one index.
    pub fn snapshot_path(&self, index: u32) -> PathBuf {
        self.snapshot_dir
            .join(format!("{}-{}.csv", self.snapshot_base, index))
    }
}
