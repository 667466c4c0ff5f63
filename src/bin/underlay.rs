use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use underlay::Segmenter as _;

#[derive(Parser, Debug)]
#[command(name = "underlay", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose text behind (or over) a photo subject and export the result.
    Compose(ComposeArgs),
    /// Split an image into background and subject cutout using a mask image.
    Cutout(CutoutArgs),
    /// List the font families the renderer can resolve.
    Fonts(FontsArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Background image (png/jpeg/webp/...).
    #[arg(long)]
    background: PathBuf,

    /// Subject cutout with alpha, drawn on top. Required unless --overlay.
    #[arg(long)]
    foreground: Option<PathBuf>,

    /// Document JSON: backdrop, mode and text layers.
    #[arg(long)]
    doc: PathBuf,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = FormatChoice::Png)]
    format: FormatChoice,

    /// Encoder quality in (0, 1]; required for jpeg and webp.
    #[arg(long)]
    quality: Option<f64>,

    /// Force text-overlay mode regardless of the document's mode.
    #[arg(long)]
    overlay: bool,

    /// Directory of font files to load (repeatable).
    #[arg(long)]
    font_dir: Vec<PathBuf>,

    /// Load the platform's installed fonts.
    #[arg(long)]
    system_fonts: bool,
}

#[derive(Parser, Debug)]
struct CutoutArgs {
    /// Image to split.
    #[arg(long)]
    image: PathBuf,

    /// Coverage mask: alpha channel if present, otherwise luminance.
    #[arg(long)]
    mask: PathBuf,

    /// Output path for the background image.
    #[arg(long)]
    out_background: PathBuf,

    /// Output path for the foreground cutout.
    #[arg(long)]
    out_foreground: PathBuf,
}

#[derive(Parser, Debug)]
struct FontsArgs {
    /// Directory of font files to load (repeatable).
    #[arg(long)]
    font_dir: Vec<PathBuf>,

    /// Load the platform's installed fonts.
    #[arg(long)]
    system_fonts: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Png,
    Jpeg,
    Webp,
}

impl FormatChoice {
    fn to_format(self) -> underlay::ExportFormat {
        match self {
            FormatChoice::Png => underlay::ExportFormat::Png,
            FormatChoice::Jpeg => underlay::ExportFormat::Jpeg,
            FormatChoice::Webp => underlay::ExportFormat::Webp,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
        Command::Cutout(args) => cmd_cutout(args),
        Command::Fonts(args) => cmd_fonts(args),
    }
}

fn read_doc_json(path: &Path) -> anyhow::Result<underlay::Document> {
    let f = File::open(path).with_context(|| format!("open document '{}'", path.display()))?;
    let r = BufReader::new(f);
    let doc: underlay::Document =
        serde_json::from_reader(r).with_context(|| "parse document JSON")?;
    Ok(doc)
}

fn build_font_library(dirs: &[PathBuf], system: bool) -> underlay::FontLibrary {
    let mut fonts = underlay::FontLibrary::new();
    for dir in dirs {
        fonts.load_fonts_dir(dir);
    }
    // Without any --font-dir the platform fonts are the only possible source.
    if system || dirs.is_empty() {
        fonts.load_system_fonts();
    }
    fonts
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let doc = read_doc_json(&args.doc)?;
    doc.validate()?;

    let bg_bytes = std::fs::read(&args.background)
        .with_context(|| format!("read background '{}'", args.background.display()))?;
    let background = underlay::decode_image(&bg_bytes)?;

    let foreground = match &args.foreground {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("read foreground '{}'", path.display()))?;
            Some(underlay::decode_image(&bytes)?)
        }
        None => None,
    };

    let mode = if args.overlay {
        underlay::CompositeMode::TextOverlay
    } else {
        doc.mode
    };

    let fonts = build_font_library(&args.font_dir, args.system_fonts);
    let mut compositor = underlay::Compositor::new(fonts);

    let scene = underlay::Scene {
        background: &background,
        foreground: foreground.as_ref(),
        backdrop: &doc.backdrop,
        layers: &doc.layers,
        mode,
    };

    let format = args.format.to_format();
    let frame = compositor.render(&scene, !format.supports_alpha())?;
    let bytes = underlay::encode_frame(&frame, format, args.quality)?;

    write_output(&args.out, &bytes)
}

fn cmd_cutout(args: CutoutArgs) -> anyhow::Result<()> {
    let image = std::fs::read(&args.image)
        .with_context(|| format!("read image '{}'", args.image.display()))?;
    let mask = std::fs::read(&args.mask)
        .with_context(|| format!("read mask '{}'", args.mask.display()))?;

    let segmenter = underlay::MaskSegmenter::from_mask_bytes(&mask)?;
    let cutout = segmenter.segment(&image, &mut |fraction| {
        eprintln!("segment progress {:.0}%", fraction * 100.0);
    })?;

    write_output(&args.out_background, &cutout.background)?;
    write_output(&args.out_foreground, &cutout.foreground)
}

fn cmd_fonts(args: FontsArgs) -> anyhow::Result<()> {
    let fonts = build_font_library(&args.font_dir, args.system_fonts);
    if fonts.is_empty() {
        eprintln!("no font faces loaded");
        return Ok(());
    }

    for family in fonts.installed_families() {
        println!("{family}");
    }
    eprintln!("{} faces", fonts.face_count());
    Ok(())
}
