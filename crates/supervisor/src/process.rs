use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::{Instant, SystemTime};

use crate::control::{Framebuffer, Liveness, RenderControl, StatKey, SupervisorError};

/// Renderer running as a child process on an exported scene file.
///
/// Statistics are derived from process liveness and the image file the
/// renderer writes.
pub struct ExternalProcess {
    child: Mutex<Child>,
    started: Instant,
    started_at: SystemTime,
    image: PathBuf,
    resolution: (u32, u32),
}

impl ExternalProcess {
    /// Spawn `binary` on `scene_file`, writing `image`.
    ///
    /// Fails before spawning when the binary is missing or the scene
    /// directory cannot be written.
    pub fn launch(
        binary: &Path,
        scene_file: &Path,
        image: PathBuf,
        resolution: (u32, u32),
    ) -> Result<Self, SupervisorError> {
        if !binary.is_file() {
            return Err(SupervisorError::RendererNotFound(binary.to_path_buf()));
        }
        let dir = scene_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        check_writable(dir)?;

        let file_arg = scene_file.file_name().unwrap_or(scene_file.as_os_str());
        let child = Command::new(binary)
            .arg(file_arg)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(SupervisorError::Spawn)?;
        tracing::info!(
            pid = child.id(),
            binary = %binary.display(),
            scene = %scene_file.display(),
            "renderer launched"
        );

        Ok(Self {
            child: Mutex::new(child),
            started: Instant::now(),
            started_at: SystemTime::now(),
            image,
            resolution,
        })
    }

    pub fn image_path(&self) -> &Path {
        &self.image
    }

    /// Whether the image file was written after launch.
    fn image_written(&self) -> bool {
        fs::metadata(&self.image)
            .and_then(|m| m.modified())
            .is_ok_and(|t| t >= self.started_at)
    }
}

fn check_writable(dir: &Path) -> Result<(), SupervisorError> {
    let marker = dir.join(".luxport-write-test");
    fs::File::create(&marker)
        .and_then(|_| fs::remove_file(&marker))
        .map_err(|_| SupervisorError::OutputNotWritable(dir.to_path_buf()))
}

impl RenderControl for ExternalProcess {
    fn statistic(&self, key: StatKey) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match key {
            StatKey::FilmIsReady => {
                flag(self.liveness() == Liveness::Exited && self.image_written())
            }
            StatKey::Terminated => flag(self.liveness() != Liveness::Running),
            StatKey::FilmXres => self.resolution.0 as f64,
            StatKey::FilmYres => self.resolution.1 as f64,
            StatKey::SecElapsed => self.started.elapsed().as_secs_f64(),
            StatKey::EnoughSamples | StatKey::SamplesSec | StatKey::SamplesPx => 0.0,
        }
    }

    fn framebuffer(&self) -> Result<Framebuffer, SupervisorError> {
        if self.image_written() {
            Ok(Framebuffer::File(self.image.clone()))
        } else {
            Err(SupervisorError::Framebuffer(format!(
                "{} not written yet",
                self.image.display()
            )))
        }
    }

    fn liveness(&self) -> Liveness {
        let Ok(mut child) = self.child.lock() else {
            return Liveness::Crashed(None);
        };
        match child.try_wait() {
            Ok(None) => Liveness::Running,
            Ok(Some(status)) if status.success() => Liveness::Exited,
            Ok(Some(status)) => Liveness::Crashed(status.code()),
            Err(e) => {
                tracing::warn!(error = %e, "renderer status unavailable");
                Liveness::Crashed(None)
            }
        }
    }

    fn exit(&self) {
        let Ok(mut child) = self.child.lock() else {
            return;
        };
        if matches!(child.try_wait(), Ok(None)) {
            if let Err(e) = child.kill() {
                tracing::warn!(error = %e, "failed to stop renderer");
            }
        }
    }

    fn wait(&self) {
        if let Ok(mut child) = self.child.lock() {
            match child.wait() {
                Ok(status) => tracing::debug!(%status, "renderer exited"),
                Err(e) => tracing::warn!(error = %e, "failed to wait for renderer"),
            }
        }
    }

    fn cleanup(&self) {
        tracing::debug!(image = %self.image.display(), "renderer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_reported_before_spawn() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ExternalProcess::launch(
            &tmp.path().join("no-renderer"),
            &tmp.path().join("scene.lxs"),
            tmp.path().join("scene.png"),
            (64, 64),
        )
        .err();
        assert!(matches!(err, Some(SupervisorError::RendererNotFound(_))));
    }

    #[test]
    fn unwritable_output_is_reported_before_spawn() {
        let tmp = tempfile::tempdir().unwrap();
        let binary = tmp.path().join("renderer");
        fs::write(&binary, b"").unwrap();
        let err = ExternalProcess::launch(
            &binary,
            &tmp.path().join("missing-dir").join("scene.lxs"),
            tmp.path().join("scene.png"),
            (64, 64),
        )
        .err();
        assert!(matches!(err, Some(SupervisorError::OutputNotWritable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_drives_liveness() {
        let tmp = tempfile::tempdir().unwrap();
        let scene = tmp.path().join("scene.lxs");
        for (binary, expected) in [
            ("/bin/true", Liveness::Exited),
            ("/bin/false", Liveness::Crashed(Some(1))),
        ] {
            let binary = Path::new(binary);
            if !binary.is_file() {
                continue;
            }
            let process =
                ExternalProcess::launch(binary, &scene, tmp.path().join("scene.png"), (32, 16))
                    .unwrap();
            process.wait();
            assert_eq!(process.liveness(), expected);
            assert_eq!(process.statistic(StatKey::Terminated), 1.0);
            assert_eq!(process.statistic(StatKey::FilmXres), 32.0);
            assert!(process.framebuffer().is_err());
            process.exit();
            process.cleanup();
        }
    }
}
