use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use synthforge_core::constants::{DEFAULT_VARIATION_COUNT, SCRIPTS_DIR};
use synthforge_core::{AnalysisDocument, ForgeConfig, RandomizationConfig, Settings};
use synthforge_data::pipeline::{self, RunRequest};
use synthforge_data::{summarize, Pipeline, ScriptEmitter};
use synthforge_vision::GeminiClient;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synthforge")]
#[command(about = "Video to physics-grounded synthetic data for Isaac Sim")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: analyze, randomize, emit scripts, optionally render
    Run {
        /// Input video (mp4, mov, webm, ...)
        video: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_VARIATION_COUNT, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
        /// Run every script through Isaac Sim (needs ISAAC_SIM_PYTHON or a local install)
        #[arg(long)]
        render: bool,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        /// Seed for reproducible variations
        #[arg(long)]
        seed: Option<u64>,
        /// JSON file with randomization ranges (see `synthforge ranges`)
        #[arg(long)]
        ranges: Option<PathBuf>,
    },

    /// Extract the physics document from a video
    Analyze {
        video: PathBuf,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Generate variations from an existing analysis document
    Randomize {
        analysis: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_VARIATION_COUNT, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        ranges: Option<PathBuf>,
    },

    /// Emit the Isaac Sim script for one document
    Emit {
        document: PathBuf,
        /// Write here instead of stdout
        #[arg(short, long)]
        script: Option<PathBuf>,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        headless: bool,
    },

    /// Render every script in a directory
    Render {
        scripts_dir: PathBuf,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Print the default randomization ranges as JSON
    Ranges,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { video, count, render, output, seed, ranges } => {
            let mut config = ForgeConfig::from_env(output).context("Configuration error")?;
            apply_ranges(&mut config.settings, ranges.as_deref())?;

            let client = GeminiClient::new(config.api_key, config.settings.gemini.clone())?;
            let pipeline = Pipeline::new(config.settings, client);
            let summary = pipeline
                .run(&RunRequest { video, count, render, seed })
                .await
                .context("Pipeline failed")?;

            let m = &summary.manifest;
            println!("\n=== SynthForge run complete ===");
            println!("Analysis:    {}", summary.analysis.display());
            println!("Variations:  {} ({} rejected)", m.variations.len(), m.rejected.len());
            println!("Scripts:     {}", m.variations.len() + 1);
            if render {
                println!("Renders:     {} ({} failed)", m.rendered_count(), m.render_failures.len());
            } else {
                println!("Renders:     skipped (pass --render to run Isaac Sim)");
            }
            println!("Index:       {}", summary.manifest_path.display());
        }

        Commands::Analyze { video, output } => {
            let config = ForgeConfig::from_env(output).context("Configuration error")?;
            let client = GeminiClient::new(config.api_key, config.settings.gemini.clone())?;
            let extracted = pipeline::extract(&client, &video, &config.settings)
                .await
                .with_context(|| format!("Failed to analyze {}", video.display()))?;

            let doc = &extracted.document;
            println!("Objects:  {}", doc.scene_composition.objects.len());
            for object in &doc.scene_composition.objects {
                match doc.physics_for(&object.id) {
                    Some(p) => println!(
                        "  {:<16} {:<9} mass {:.3} kg, e {:.2}, mu {:.2}/{:.2}",
                        object.id,
                        object.primitive.name(),
                        p.mass,
                        p.restitution,
                        p.static_friction,
                        p.dynamic_friction()
                    ),
                    None => println!("  {:<16} {:<9} static", object.id, object.primitive.name()),
                }
            }
            println!("Events:   {}", doc.event_timeline.len());
            println!("Saved to {}", extracted.path.display());
        }

        Commands::Randomize { analysis, count, output, seed, ranges } => {
            let mut settings = Settings::from_env(output).context("Configuration error")?;
            apply_ranges(&mut settings, ranges.as_deref())?;
            let base = AnalysisDocument::load(&analysis)?;

            let written = pipeline::randomize(&settings, &base, count, seed)?;
            for variation in written.batch.variations.iter().take(9) {
                println!("{}", summarize(variation));
            }
            for rejected in &written.batch.rejected {
                println!("variation {} rejected: {}", rejected.variation_id, rejected.reason);
            }
            println!("Wrote {} variations to {}", written.files.len(), settings.output_dir.display());
        }

        Commands::Emit { document, script, headless } => {
            let settings = Settings::from_env(PathBuf::from("output")).context("Configuration error")?;
            let doc = AnalysisDocument::load(&document)?;
            let emitter = ScriptEmitter::new(synthforge_core::ScriptOptions { headless, ..settings.script });

            match script {
                Some(path) => {
                    emitter.write_script(&path, &doc)?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", emitter.emit(&doc)?),
            }
        }

        Commands::Render { scripts_dir, output } => {
            let settings = Settings::from_env(output).context("Configuration error")?;
            let scripts = pipeline::list_scripts(&scripts_dir)
                .with_context(|| format!("Failed to list scripts in {}", scripts_dir.display()))?;
            if scripts.is_empty() {
                anyhow::bail!(
                    "No .py scripts in {} (expected {}/ from `synthforge run`)",
                    scripts_dir.display(),
                    SCRIPTS_DIR
                );
            }

            let report = pipeline::render_all(&settings, &scripts).await;
            println!("Rendered {}/{} scripts", report.rendered.len(), scripts.len());
            for failure in &report.failures {
                println!("  FAILED {}: {}", failure.script.display(), failure.error);
            }
            if report.rendered.is_empty() {
                anyhow::bail!("No script rendered successfully");
            }
        }

        Commands::Ranges => {
            println!("{}", serde_json::to_string_pretty(&RandomizationConfig::default())?);
        }
    }

    Ok(())
}

fn apply_ranges(settings: &mut Settings, ranges: Option<&Path>) -> Result<()> {
    if let Some(path) = ranges {
        settings.randomization = RandomizationConfig::load(path)
            .with_context(|| format!("Failed to load ranges from {}", path.display()))?;
        tracing::info!("Using randomization ranges from {}", path.display());
    }
    Ok(())
}
