use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use classmap::{render_document, RenderConfig, Renderer};
use classmap_cli::{output_stem, RenderJob};
use color_eyre::eyre::{bail, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Render categorical raster windows as styled class maps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every panel of a job file into SVG and JSON
    Render {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        config: PathBuf,
        /// Also write merged polygons as GeoJSON, overriding the job setting
        #[arg(long)]
        geojson: bool,
    },
    /// Print the JSON schema of a configuration file
    Schema {
        #[arg(value_enum, default_value_t = SchemaTarget::Job)]
        target: SchemaTarget,
    },
    /// Write a starter job file
    Skeleton {
        /// Where to save the generated TOML job
        #[arg(short, long)]
        output: PathBuf,
        /// Output directory recorded in the job
        #[arg(long, default_value = "out")]
        output_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaTarget {
    Job,
    Render,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config, geojson } => {
            render_job(config, *geojson).await?;
        }
        Commands::Schema { target } => {
            let schema = match target {
                SchemaTarget::Job => serde_json::to_string_pretty(&RenderJob::schema())?,
                SchemaTarget::Render => serde_json::to_string_pretty(&RenderConfig::schema())?,
            };
            println!("{schema}");
        }
        Commands::Skeleton { output, output_dir } => {
            RenderJob::skeleton(output_dir.clone()).to_toml_file(output)?;
            info!("Skeleton job saved to {:?}", output);
        }
    }

    Ok(())
}

async fn render_job(config_path: &Path, force_geojson: bool) -> Result<()> {
    let job = RenderJob::from_file(config_path)?;
    info!(panels = job.panels.len(), sites = job.sites.len(), "Loaded job {:?}", config_path);

    let styles = job.style_table()?;
    let (panels, load_failures) = job.load_panels();
    let renderer = Renderer::new(job.render.clone(), styles)?;

    let report = renderer.render_panels(panels).await;
    for failure in &report.failures {
        error!(panel = %failure.panel, error = %failure.error, "Panel left out of the document");
    }
    let failed = load_failures.len() + report.failures.len();
    if report.panels.is_empty() {
        bail!("no panel rendered successfully");
    }

    std::fs::create_dir_all(&job.output_dir)?;
    for panel in &report.panels {
        let json_path = job.output_dir.join(format!("{}.json", output_stem(&panel.name)));
        std::fs::write(&json_path, serde_json::to_string_pretty(panel)?)?;
        info!(panel = %panel.name, paths = panel.paths.len(), "Wrote {:?}", json_path);

        if force_geojson || job.write_geojson {
            let geojson_path = job.output_dir.join(format!("{}.geojson", output_stem(&panel.name)));
            panel.save_geojson(&geojson_path, renderer.styles())?;
            info!(panel = %panel.name, "Wrote {:?}", geojson_path);
        }
    }

    let svg_path = job.output_dir.join("map.svg");
    std::fs::write(&svg_path, render_document(&report.panels, &job.layout))?;
    info!("Document saved to {:?}", svg_path);

    if failed > 0 {
        warn!(
            failed,
            rendered = report.panels.len(),
            "Document is missing panels"
        );
    }
    Ok(())
}
