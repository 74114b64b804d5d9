mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_annotator_core::{shape, Annotation, Color, PagePoint, PageRect, Placement, SavePipeline};
use pdf_annotator_viewer::{EngineConfig, Viewer};
use pdf_engine::{LopdfBackend, OpenSource};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pdf-annotator")]
#[command(about = "PDF annotation engine CLI")]
pub struct Cli {
    /// Enable debug logging; RUST_LOG overrides the level.
    #[arg(long, global = true)]
    verbose: bool,

    /// Engine configuration file (JSON). Defaults to the user config location.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print text the way it is laid out when burnt into a page.
    Shape {
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Print the word box under a page-space point as JSON, or null.
    Locate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        x: f32,
        #[arg(long)]
        y: f32,
    },
    /// Burn a JSON list of annotations into a copy of a PDF.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "JSON")]
        annotations: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Render a page to PNG through the page cache.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct AnnotateOutput {
    output: String,
    annotations: usize,
    bytes: usize,
}

/// One entry of the `annotate` input file. Coordinates are page space with
/// the origin at the top-left corner.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum AnnotationInput {
    Highlight {
        page_index: u32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Option<Color>,
    },
    Underline {
        page_index: u32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Option<Color>,
    },
    Text {
        page_index: u32,
        x: f32,
        y: f32,
        text: String,
        color: Option<Color>,
    },
    Stroke {
        page_index: u32,
        points: Vec<PagePoint>,
        color: Option<Color>,
    },
}

impl AnnotationInput {
    fn into_annotation(self, placement: &Placement) -> Option<Annotation> {
        match self {
            AnnotationInput::Highlight { page_index, x, y, width, height, color } => Some(Annotation::highlight(
                page_index,
                PageRect::new(x, y, width, height),
                color.unwrap_or(Color::YELLOW),
            )),
            AnnotationInput::Underline { page_index, x, y, width, height, color } => Some(Annotation::underline(
                page_index,
                PageRect::new(x, y, width, height),
                color.unwrap_or(Color::BLUE),
            )),
            AnnotationInput::Text { page_index, x, y, text, color } => {
                Some(placement.text(page_index, PagePoint::new(x, y), &text, color.unwrap_or(Color::BLACK)))
            }
            AnnotationInput::Stroke { page_index, points, color } => {
                Annotation::stroke(page_index, points, color.unwrap_or(Color::RED))
            }
        }
    }
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    logging::init(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file, cli.config.as_deref()),
        Commands::Shape { text } => {
            println!("{}", shape(&text));
            Ok(())
        }
        Commands::Locate { file, page, x, y } => run_locate(&file, cli.config.as_deref(), page, x, y),
        Commands::Annotate { file, annotations, output } => {
            run_annotate(&file, cli.config.as_deref(), &annotations, &output)
        }
        Commands::Render { file, page, scale, output } => {
            run_render(&file, cli.config.as_deref(), page, scale, output.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::from_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            config.with_env().context("invalid environment configuration")
        }
        None => {
            let default = EngineConfig::default_path();
            EngineConfig::load(default.as_deref()).context("failed to load configuration")
        }
    }
}

fn open_viewer(file: &Path, config: EngineConfig) -> Result<Viewer> {
    ensure_pdf_exists(file)?;
    Viewer::open(OpenSource::from(file), config).context("failed to open PDF")
}

fn page_index(page: u32, viewer: &Viewer) -> Result<u32> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if page > viewer.page_count() {
        anyhow::bail!("--page {page} is out of range (page_count={})", viewer.page_count());
    }
    Ok(page - 1)
}

fn run_info(file: &Path, config: Option<&Path>) -> Result<()> {
    let viewer = open_viewer(file, load_config(config)?)?;

    let page_count = viewer.page_count();
    let first_page_size_pt =
        viewer.page_size(0).map(|size| PageSizeOutput { width: size.width_pt, height: size.height_pt });

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_locate(file: &Path, config: Option<&Path>, page: u32, x: f32, y: f32) -> Result<()> {
    let viewer = open_viewer(file, load_config(config)?)?;
    let page_index = page_index(page, &viewer)?;

    let rect = viewer.locate_word(page_index, PagePoint::new(x, y));
    println!("{}", serde_json::to_string(&rect)?);

    Ok(())
}

fn run_annotate(file: &Path, config: Option<&Path>, annotations: &Path, output: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;
    let config = load_config(config)?;

    let input = fs::read_to_string(annotations)
        .with_context(|| format!("failed to read annotations from {}", annotations.display()))?;
    let entries: Vec<AnnotationInput> = serde_json::from_str(&input).context("malformed annotation list")?;

    let placement = Placement::new(config.placement);
    let annotations: Vec<Annotation> =
        entries.into_iter().filter_map(|entry| entry.into_annotation(&placement)).collect();

    let document = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let pipeline = SavePipeline::new(config.save);
    let saved =
        pipeline.save(&LopdfBackend::new(), &document, &[], &annotations).context("failed to save annotations")?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &saved).with_context(|| format!("failed to write {}", output.display()))?;

    let payload =
        AnnotateOutput { output: output.display().to_string(), annotations: annotations.len(), bytes: saved.len() };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_render(file: &Path, config: Option<&Path>, page: u32, scale: Option<f32>, output: Option<&Path>) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(scale) = scale {
        if !(scale.is_finite() && scale > 0.0) {
            anyhow::bail!("--scale must be a positive number");
        }
        config.cache.render_scale = scale;
        config.cache.fallback_scale = config.cache.fallback_scale.min(scale);
    }

    let viewer = open_viewer(file, config)?;
    let page_index = page_index(page, &viewer)?;

    let Some(bitmap) = viewer.render_now(page_index) else {
        anyhow::bail!("page {page} could not be rendered");
    };

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    bitmap.image.save(&output).with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
