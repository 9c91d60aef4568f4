use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for luxport")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests, doc and the export smoke run
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Export the demo scene to a scratch directory, then dry-run it
    Smoke {
        /// Scene document to export
        #[arg(long, default_value = "demos/studio.yaml")]
        scene: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            cargo("fmt", &["fmt", "--all", "--", "--check"])?;
            clippy()?;
            cargo("test", &["test", "--workspace"])?;
            cargo("doc", &["doc", "--workspace", "--no-deps"])?;
            smoke(Path::new("demos/studio.yaml"))?;
        }
        Commands::Fmt => cargo("fmt", &["fmt", "--all", "--", "--check"])?,
        Commands::Clippy => clippy()?,
        Commands::Test => cargo("test", &["test", "--workspace"])?,
        Commands::Doc => cargo("doc", &["doc", "--workspace", "--no-deps"])?,
        Commands::Smoke { scene } => smoke(&scene)?,
    }

    Ok(())
}

fn cargo(label: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {label}");
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {label} failed");
    }
    Ok(())
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn smoke(scene: &Path) -> Result<()> {
    let out = std::env::temp_dir().join("luxport-smoke");
    std::fs::create_dir_all(&out)?;
    let scene = scene.to_string_lossy();
    let out_dir = out.to_string_lossy();
    let run = ["run", "--quiet", "-p", "luxport-cli", "--", "export", "--scene"];

    let mut file = run.to_vec();
    file.extend([&*scene, "--output-dir", &*out_dir]);
    cargo("run (file export)", &file)?;

    let mut dry = run.to_vec();
    dry.extend([&*scene, "--api", "dry-run"]);
    cargo("run (dry run)", &dry)?;

    println!("==> Smoke output in {}", out.display());
    Ok(())
}
