//! Model Snapshot CLI
//!
//! Render seven-angle snapshot images of FBX / glTF / GLB models.

use clap::{Parser, Subcommand};
use model_snapshot::loader::ObjectUrlRegistry;
use model_snapshot::{
    load_model, normalize, BatchQueue, BatchStatus, CanonicalView, DirectorySink, HeadlessDrawable,
    ModelAsset, NormalizeOptions, ProcessOptions, SelectionItem, SnapshotConfig, SnapshotSession,
    SourceFile,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-snapshot")]
#[command(author, version, about = "Render seven-angle snapshot images of 3D models", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Background colour as hex (e.g., "#ffffff")
    #[arg(long, global = true)]
    background: Option<String>,

    /// Leave colour map encodings as authored
    #[arg(long, global = true)]
    no_preserve_materials: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the seven views of one model
    Capture {
        /// Model file (.fbx, .gltf or .glb)
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Write one ZIP archive instead of seven PNG files
        #[arg(long)]
        zip: bool,
    },

    /// Capture several models into one batch archive
    Batch {
        /// Model files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Show information about a model
    Info {
        /// Model file (.fbx, .gltf or .glb)
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("model_snapshot=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SnapshotConfig::from_path(path)?,
        None => SnapshotConfig::default(),
    };
    if let Some(background) = &cli.background {
        config = config.with_background_color(background.clone());
    }
    if cli.no_preserve_materials {
        config = config.with_preserve_materials(false);
    }

    match cli.command {
        Commands::Capture { input, output, zip } => {
            capture(&input, &output, zip, config)?;
        }
        Commands::Batch { inputs, output } => {
            batch(&inputs, &output, config)?;
        }
        Commands::Info { input } => {
            show_model_info(&input, config.preserve_materials)?;
        }
    }

    Ok(())
}

fn session(config: SnapshotConfig, output: &Path) -> SnapshotSession {
    let drawable = HeadlessDrawable::new(config.fallback_width, config.fallback_height);
    SnapshotSession::new(drawable, config).with_sink(DirectorySink::new(output))
}

fn capture(
    input: &Path,
    output: &Path,
    zip: bool,
    config: SnapshotConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = ProcessOptions {
        silent: false,
        preserve_materials: config.preserve_materials,
    };
    let (width, height) = (config.capture.width, config.capture.height);
    let mut session = session(config, output);

    println!("Capturing {:?} at {}x{}...", input, width, height);
    let views = pollster::block_on(session.process_file(&SourceFile::from_path(input), options))?;

    if zip {
        if let Some(name) = session.download_current_views()? {
            println!("  Wrote {} ({} views)", output.join(name).display(), views.len());
        }
    } else {
        for view in CanonicalView::ALL {
            if let Some(name) = session.download_view(view.name())? {
                println!("  Wrote {}", output.join(name).display());
            }
        }
    }

    session.dispose_scene();
    Ok(())
}

fn batch(inputs: &[PathBuf], output: &Path, config: SnapshotConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = session(config, output);
    let selection: Vec<SelectionItem> = inputs
        .iter()
        .map(|path| SelectionItem::new(SourceFile::from_path(path)).with_uid(path.to_string_lossy()))
        .collect();

    let mut queue = BatchQueue::new();
    queue.handle_change(&selection);
    println!("Processing {} models...", queue.items().len());

    let report = pollster::block_on(queue.generate(&mut session))?;

    for item in queue.items() {
        let status = match item.status {
            BatchStatus::Success => "ok",
            BatchStatus::Error => "FAILED",
            BatchStatus::Pending => "pending",
        };
        println!("  {:<8} {:<40} {}", status, item.name(), item.message);
    }
    println!("{} succeeded, {} failed", report.succeeded, report.failed);
    if let Some(archive) = report.archive {
        println!("Wrote {}", output.join(archive).display());
    }

    session.dispose_scene();
    Ok(())
}

fn show_model_info(input: &Path, preserve_materials: bool) -> Result<(), Box<dyn std::error::Error>> {
    let asset = ModelAsset::read(&SourceFile::from_path(input))?;
    println!("Model: {}", asset.name);
    println!("  Format: {:?}", asset.format);
    println!("  Size: {} bytes", asset.bytes.len());

    let mut root = load_model(&asset, &ObjectUrlRegistry::new())?;
    let framing = normalize(&mut root, NormalizeOptions { preserve_materials })?;

    println!("  Meshes: {}", root.mesh_count());
    println!("  Triangles: {}", root.triangle_count());
    println!(
        "  Bounds: {:.3} x {:.3} x {:.3}",
        framing.size.x, framing.size.y, framing.size.z
    );
    println!(
        "  Centre: ({:.3}, {:.3}, {:.3})",
        framing.center.x, framing.center.y, framing.center.z
    );
    println!("  View distance: {:.3}", framing.view_distance);

    Ok(())
}
