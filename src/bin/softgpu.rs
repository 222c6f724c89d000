use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "softgpu", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a compiled module's reflection as JSON.
    Reflect(ReflectArgs),
    /// Draw a scene file with a vertex/fragment pair and write a PNG.
    Render(RenderArgs),
    /// Draw a UV gradient quad with the built-in shaders.
    Demo(DemoArgs),
}

#[derive(Parser, Debug)]
struct ReflectArgs {
    /// SPIR-V module.
    spv: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Vertex stage SPIR-V.
    #[arg(long)]
    vert: PathBuf,

    /// Fragment stage SPIR-V.
    #[arg(long)]
    frag: PathBuf,

    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Also write the depth buffer as a grayscale PNG.
    #[arg(long)]
    depth_out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DemoArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 256)]
    width: u32,

    #[arg(long, default_value_t = 256)]
    height: u32,
}

fn main() -> anyhow::Result<()> {
    initialise_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Reflect(args) => cmd_reflect(args),
        Command::Render(args) => cmd_render(args),
        Command::Demo(args) => cmd_demo(args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read '{}'", path.display()))
}

fn cmd_reflect(args: ReflectArgs) -> anyhow::Result<()> {
    let bytes = read_bytes(&args.spv)?;
    let part = softgpu::compile(&bytes)
        .with_context(|| format!("compile '{}'", args.spv.display()))?;
    let json = serde_json::to_string_pretty(part.reflection()).context("serialize reflection")?;
    println!("{json}");
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let scene = softgpu::Scene::load(&args.scene)?;
    let vert = read_bytes(&args.vert)?;
    let frag = read_bytes(&args.frag)?;
    let base_dir = args.scene.parent().unwrap_or_else(|| Path::new("."));

    let mut device = softgpu::Device::default();
    let out = scene.render(&mut device, &vert, &frag, base_dir)?;
    tracing::info!(
        triangles = out.stats.triangles,
        fragments = out.stats.fragments_shaded,
        "scene rendered"
    );

    write_png(&args.out, &out.color.to_image()?)?;
    if let Some(path) = args.depth_out {
        let ds = out
            .depth_stencil
            .context("scene does not enable depth or stencil testing")?;
        let depth = ds.depth_image()?;
        create_parent(&path)?;
        depth
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    #[rustfmt::skip]
    let vertices = vec![
        -1.0, -1.0, 0.0, 1.0,   0.0, 0.0,
         1.0, -1.0, 0.0, 1.0,   1.0, 0.0,
         1.0,  1.0, 0.0, 1.0,   1.0, 1.0,
        -1.0,  1.0, 0.0, 1.0,   0.0, 1.0,
    ];
    let scene = softgpu::Scene {
        width: args.width,
        height: args.height,
        format: softgpu::TextureFormat::Rgba8Unorm,
        clear_color: softgpu::Rgba::OPAQUE_BLACK,
        clear_depth: 1.0,
        clear_stencil: 0,
        pipeline: softgpu::PipelineState::default(),
        vertices,
        layout: None,
        indices: vec![0, 1, 2, 0, 2, 3],
        uniforms: Vec::new(),
        textures: Vec::new(),
    };

    let mut device = softgpu::Device::default();
    let out = scene.render(
        &mut device,
        &softgpu::bytecode::presets::passthrough_vertex(),
        &softgpu::bytecode::presets::uv_color_fragment(),
        Path::new("."),
    )?;
    write_png(&args.out, &out.color.to_image()?)
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn write_png(path: &Path, img: &image::RgbaImage) -> anyhow::Result<()> {
    create_parent(path)?;
    image::save_buffer_with_format(
        path,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}
