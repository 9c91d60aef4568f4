use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use luxport_context::{
    ApiContext, Context, FileContext, FileSubset, PackageContext, RecordingApi,
};
use luxport_export::{
    Backend, ExportReport, ExportSession, ExportSettings, ExportSlot, export_material_package,
    film_resolution,
};
use luxport_scene::{HostScene, MemoryScene, ObjectKind};
use luxport_supervisor::{
    ExternalProcess, Framebuffer, RenderHost, RenderSupervisor, SupervisorConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "luxport", about = "Export scenes to LuxRender scene files")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info, or summarise a scene document
    Info {
        /// Scene document to summarise
        #[arg(long)]
        scene: Option<PathBuf>,
    },
    /// Export a scene document
    Export(ExportArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ApiKind {
    /// Partitioned scene files
    File,
    /// Self-contained material package
    Package,
    /// Translate in memory without writing anything
    DryRun,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Cpu,
    Hybrid,
    Gpu,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cpu => Backend::Cpu,
            BackendArg::Hybrid => Backend::Hybrid,
            BackendArg::Gpu => Backend::Gpu,
        }
    }
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Scene document (YAML, or JSON by extension)
    #[arg(long)]
    scene: PathBuf,
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Output name; defaults to the scene name
    #[arg(long)]
    name: Option<String>,
    #[arg(long, value_enum, default_value = "file")]
    api: ApiKind,
    /// Export settings document (YAML) applied before the flags below
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,
    #[arg(long)]
    integrator: Option<String>,
    #[arg(long)]
    motion_blur: bool,
    #[arg(long)]
    halt_spp: Option<u32>,
    #[arg(long)]
    no_main: bool,
    #[arg(long)]
    no_materials: bool,
    #[arg(long)]
    no_geometry: bool,
    /// Material to package (package output only)
    #[arg(long)]
    material: Option<String>,
    /// Renderer binary to launch on the exported scene file
    #[arg(long)]
    render: Option<PathBuf>,
}

impl ExportArgs {
    fn export_settings(&self) -> anyhow::Result<ExportSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
            }
            None => ExportSettings::default(),
        };
        if let Some(backend) = self.backend {
            settings.backend = backend.into();
        }
        if let Some(integrator) = &self.integrator {
            settings.surface_integrator = integrator.clone();
        }
        if let Some(spp) = self.halt_spp {
            settings.halt_spp = spp;
        }
        settings.motion_blur |= self.motion_blur;
        settings.files = FileSubset {
            main: settings.files.main && !self.no_main,
            materials: settings.files.materials && !self.no_materials,
            geometry: settings.files.geometry && !self.no_geometry,
        };
        Ok(settings)
    }
}

/// Reports render progress on the console.
struct ConsoleHost;

impl RenderHost for ConsoleHost {
    fn update_status(&self, status: &str) {
        tracing::info!("{status}");
    }

    fn refresh_image(&self, framebuffer: &Framebuffer) {
        match framebuffer {
            Framebuffer::File(path) => tracing::info!(image = %path.display(), "image updated"),
            Framebuffer::Pixels { width, height, .. } => {
                tracing::info!(width, height, "framebuffer updated")
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info { scene: None } => {
            println!("luxport v{}", env!("CARGO_PKG_VERSION"));
            println!("settings: {}", serde_json::to_string(&ExportSettings::default())?);
            println!("supervisor: {:?}", SupervisorConfig::default());
        }
        Commands::Info { scene: Some(path) } => {
            let scene = MemoryScene::load(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            print_summary(&scene);
        }
        Commands::Export(args) => export(&args)?,
    }

    Ok(())
}

fn print_summary(scene: &MemoryScene) {
    let objects = scene.renderable_objects();
    let count = |kind: ObjectKind| {
        objects
            .iter()
            .filter_map(|id| scene.object(id))
            .filter(|o| o.kind == kind)
            .count()
    };
    let (x, y) = scene.render_settings().film_resolution();
    println!("scene: {}", scene.name());
    println!("frame: {}", scene.frame_current());
    println!("resolution: {x}x{y}");
    println!(
        "renderable: {} objects ({} meshes, {} lamps, {} cameras)",
        objects.len(),
        count(ObjectKind::Mesh),
        count(ObjectKind::Lamp),
        count(ObjectKind::Camera)
    );
    println!("textures: {}", scene.textures().len());
    println!("volumes: {}", scene.volumes().len());
}

fn export(args: &ExportArgs) -> anyhow::Result<()> {
    let scene = MemoryScene::load(&args.scene)
        .with_context(|| format!("loading {}", args.scene.display()))?;
    let settings = args.export_settings()?;
    let name = args.name.clone().unwrap_or_else(|| scene.name().to_string());

    match args.api {
        ApiKind::Package => {
            let material = args
                .material
                .as_deref()
                .context("--material is required for package output")?;
            let path = args.output_dir.join(format!("{name}.lbm2"));
            let mut ctx = Context::Package(PackageContext::create(&path));
            let written = export_material_package(&mut ctx, &scene, material)?;
            ctx.close()?;
            println!("{} ({written} records)", path.display());
        }
        ApiKind::DryRun => {
            let (api, log) = RecordingApi::new();
            let ctx = Context::Api(ApiContext::new(Box::new(api)));
            let mut session = ExportSession::begin(ExportSlot::global(), &scene, ctx, settings)?;
            let report = session.export()?;
            session.close()?;
            print_report(&report)?;
            println!("statements: {}", log.len());
        }
        ApiKind::File => {
            let ctx = FileContext::create(
                &args.output_dir,
                &name,
                scene.frame_current(),
                settings.files,
            )
            .with_context(|| format!("creating scene files in {}", args.output_dir.display()))?;
            let resolution = film_resolution(&scene, &settings);
            let image = image_path(&args.output_dir, &settings, &name);

            let mut session =
                ExportSession::begin(ExportSlot::global(), &scene, Context::File(ctx), settings)?;
            let report = session.export()?;
            session.close()?;
            print_report(&report)?;

            if let Some(binary) = &args.render {
                let scene_file = session
                    .scene_file()
                    .cloned()
                    .context("file export produced no scene file")?;
                render(&mut session, binary, &scene_file, image, resolution)?;
            }
        }
    }
    Ok(())
}

fn image_path(dir: &Path, settings: &ExportSettings, name: &str) -> PathBuf {
    let base = settings.output_image.as_deref().unwrap_or(name);
    dir.join(format!("{base}.png"))
}

fn render(
    session: &mut ExportSession<'_>,
    binary: &Path,
    scene_file: &Path,
    image: PathBuf,
    resolution: (u32, u32),
) -> anyhow::Result<()> {
    let process = ExternalProcess::launch(binary, scene_file, image, resolution)?;
    let supervisor = RenderSupervisor::new(
        Arc::new(process),
        Arc::new(ConsoleHost),
        SupervisorConfig::default(),
    );
    session.attach_supervisor(supervisor);
    let Some(supervisor) = session.supervisor_mut() else {
        anyhow::bail!("render supervisor not attached");
    };
    supervisor.start()?;
    match supervisor.wait() {
        Some(reason) if reason.is_crash() => anyhow::bail!("renderer crashed: {reason:?}"),
        Some(reason) => println!("render finished: {reason:?}"),
        None => println!("render not started"),
    }
    Ok(())
}

fn print_report(report: &ExportReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    for failure in &report.failures {
        eprintln!("skipped {}: {}", failure.object, failure.reason);
    }
    Ok(())
}
