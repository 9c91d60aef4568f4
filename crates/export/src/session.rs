use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use luxport_context::{Capability, Context, LogicalFile};
use luxport_scene::HostScene;
use luxport_supervisor::RenderSupervisor;
use serde::Serialize;
use uuid::Uuid;

use crate::camera::export_camera;
use crate::error::{ExportError, ObjectFailure};
use crate::lights::export_lights;
use crate::settings::ExportSettings;
use crate::setup::export_render_setup;
use crate::state::{ExportState, ExportStats};
use crate::walker::SceneWalker;

/// Capabilities every scene export needs from its sink.
const SCENE_CAPABILITIES: &[Capability] = &[
    Capability::SceneSetup,
    Capability::ScopedTransforms,
    Capability::Materials,
    Capability::Geometry,
];

static GLOBAL_SLOT: ExportSlot = ExportSlot::new();

/// Admits at most one active export.
#[derive(Debug)]
pub struct ExportSlot {
    busy: AtomicBool,
}

impl Default for ExportSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportSlot {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// The process-wide slot.
    pub fn global() -> &'static ExportSlot {
        &GLOBAL_SLOT
    }

    pub fn acquire(&self) -> Result<SlotGuard<'_>, ExportError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::Busy)?;
        Ok(SlotGuard { slot: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds the slot until dropped.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slot: &'a ExportSlot,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/// Summary of one export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub run_id: Uuid,
    pub stats: ExportStats,
    pub failures: Vec<ObjectFailure>,
    /// Light groups in id order.
    pub light_groups: Vec<String>,
}

/// One export run: owns the sink, the per-run caches and, once a render is
/// launched, its supervisor.
pub struct ExportSession<'a> {
    run_id: Uuid,
    scene: &'a dyn HostScene,
    settings: ExportSettings,
    ctx: Option<Context>,
    scene_file: Option<PathBuf>,
    state: ExportState,
    supervisor: Option<RenderSupervisor>,
    _guard: SlotGuard<'a>,
}

impl<'a> ExportSession<'a> {
    /// Claim `slot` and check that `ctx` can take a full scene with
    /// `settings`. Nothing is written yet.
    pub fn begin(
        slot: &'a ExportSlot,
        scene: &'a dyn HostScene,
        ctx: Context,
        settings: ExportSettings,
    ) -> Result<Self, ExportError> {
        let guard = slot.acquire()?;
        settings.validate()?;
        ctx.require(SCENE_CAPABILITIES)?;

        let instancing = settings.backend.supports_instancing() && ctx.supports(Capability::Instancing);
        let scene_file = match &ctx {
            Context::File(f) => Some(f.main_path().to_path_buf()),
            _ => None,
        };
        let run_id = Uuid::new_v4();
        tracing::debug!(%run_id, sink = ctx.variant_name(), instancing, "export session started");

        Ok(Self {
            run_id,
            scene,
            settings,
            ctx: Some(ctx),
            scene_file,
            state: ExportState::new(instancing),
            supervisor: None,
            _guard: guard,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Main scene file, for file sinks.
    pub fn scene_file(&self) -> Option<&PathBuf> {
        self.scene_file.as_ref()
    }

    /// Write the whole scene. Fails with [`ExportError::NoLights`] before
    /// `WorldEnd` when nothing in the scene emits light.
    ///
    /// Every pass starts from empty caches and counters.
    pub fn export(&mut self) -> Result<ExportReport, ExportError> {
        let _span = tracing::info_span!("export", run_id = %self.run_id, scene = self.scene.name()).entered();
        let instancing = self.state.cache.global_instancing();
        self.state.reset(instancing);
        let ctx = self.ctx.as_mut().ok_or(luxport_context::ContextError::Closed)?;
        let scene = self.scene;
        let settings = &self.settings;
        let state = &mut self.state;

        export_camera(ctx, scene, settings)?;
        export_render_setup(ctx, scene, settings)?;
        ctx.set_output_file(LogicalFile::Main);
        ctx.world_begin()?;

        state.stats.volumes += state.materials.export_volumes(ctx, scene)?;
        state.stats.textures += state.materials.export_textures(ctx, scene)?;
        tracing::info!(
            volumes = state.stats.volumes,
            textures = state.stats.textures,
            "materials prepared"
        );

        let outcome = SceneWalker::new(scene, settings).walk(ctx, state)?;
        let lights = export_lights(ctx, scene, state, &outcome.dupli_lamps)?;

        if lights == 0 && state.stats.emitters == 0 {
            tracing::error!("export aborted: scene has no light sources");
            return Err(ExportError::NoLights);
        }

        ctx.set_output_file(LogicalFile::Main);
        ctx.world_end()?;

        let report = self.report();
        tracing::info!(
            placements = report.stats.placements,
            definitions = report.stats.definitions,
            instances = report.stats.instances,
            lights = report.stats.lights,
            failures = report.failures.len(),
            "export complete"
        );
        Ok(report)
    }

    pub fn report(&self) -> ExportReport {
        ExportReport {
            run_id: self.run_id,
            stats: self.state.stats.clone(),
            failures: self.state.failures.clone(),
            light_groups: self.state.light_groups.names().to_vec(),
        }
    }

    /// Flush and release the sink. Safe to call more than once.
    pub fn close(&mut self) -> Result<(), ExportError> {
        if let Some(mut ctx) = self.ctx.take() {
            ctx.close()?;
            tracing::debug!(run_id = %self.run_id, "sink closed");
        }
        Ok(())
    }

    /// Hand a render supervisor to the session so teardown covers it.
    pub fn attach_supervisor(&mut self, supervisor: RenderSupervisor) {
        if let Some(mut previous) = self.supervisor.replace(supervisor) {
            previous.reset();
        }
    }

    pub fn supervisor_mut(&mut self) -> Option<&mut RenderSupervisor> {
        self.supervisor.as_mut()
    }

    /// Tear down the render supervisor, then close the sink and clear the
    /// per-run caches.
    pub fn reset(&mut self) {
        if let Some(mut supervisor) = self.supervisor.take() {
            supervisor.reset();
        }
        if let Err(e) = self.close() {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to close sink");
        }
        let instancing = self.state.cache.global_instancing();
        self.state.reset(instancing);
    }
}

impl Drop for ExportSession<'_> {
    fn drop(&mut self) {
        self.reset();
    }
}
