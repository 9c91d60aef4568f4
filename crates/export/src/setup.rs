use luxport_common::ParamSet;
use luxport_context::{Context, LogicalFile};
use luxport_scene::HostScene;

use crate::error::ExportError;
use crate::settings::ExportSettings;

/// Film resolution: the settings override or the scene's own, scaled by the
/// scene's resolution percentage.
pub fn film_resolution(scene: &dyn HostScene, settings: &ExportSettings) -> (u32, u32) {
    let render = scene.render_settings();
    match settings.resolution {
        Some((x, y)) => (render.scale_resolution(x), render.scale_resolution(y)),
        None => render.film_resolution(),
    }
}

/// Emit film, sampler, integrators, pixel filter and accelerator.
pub fn export_render_setup(
    ctx: &mut Context,
    scene: &dyn HostScene,
    settings: &ExportSettings,
) -> Result<(), ExportError> {
    ctx.set_output_file(LogicalFile::Main);
    let (xres, yres) = film_resolution(scene, settings);
    let filename = settings
        .output_image
        .clone()
        .unwrap_or_else(|| scene.name().to_string());

    let mut film = ParamSet::new()
        .add_integer("xresolution", i32::try_from(xres).unwrap_or(i32::MAX))
        .add_integer("yresolution", i32::try_from(yres).unwrap_or(i32::MAX))
        .add_string("filename", filename)
        .add_bool("write_png", true);
    if settings.halt_spp > 0 {
        film = film.add_integer("haltspp", settings.halt_spp as i32);
    }
    if settings.halt_time > 0 {
        film = film.add_integer("halttime", settings.halt_time as i32);
    }
    ctx.film("fleximage", film)?;
    ctx.sampler(&settings.sampler, ParamSet::new())?;
    ctx.surface_integrator(&settings.surface_integrator, ParamSet::new())?;
    ctx.volume_integrator(&settings.volume_integrator, ParamSet::new())?;
    ctx.pixel_filter(&settings.pixel_filter, ParamSet::new())?;
    ctx.accelerator(&settings.accelerator, ParamSet::new())?;
    tracing::debug!(xres, yres, backend = settings.backend.renderer_name(), "render setup exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use luxport_common::ParamValue;
    use luxport_context::{ApiContext, RecordingApi, Statement};
    use luxport_scene::MemoryScene;

    #[test]
    fn resolution_override_keeps_percentage() {
        let mut scene = MemoryScene::new("s");
        scene.settings.resolution_percentage = 50;
        assert_eq!(film_resolution(&scene, &ExportSettings::default()), (960, 540));
        let settings = ExportSettings {
            resolution: Some((800, 600)),
            ..ExportSettings::default()
        };
        assert_eq!(film_resolution(&scene, &settings), (400, 300));
    }

    #[test]
    fn large_override_does_not_overflow() {
        let mut scene = MemoryScene::new("s");
        scene.settings.resolution_percentage = 400;
        let settings = ExportSettings {
            resolution: Some((u32::MAX / 2, 1080)),
            ..ExportSettings::default()
        };
        assert_eq!(film_resolution(&scene, &settings), (u32::MAX, 4320));
    }

    #[test]
    fn setup_order_and_halt_conditions() {
        let scene = MemoryScene::new("s");
        let (api, log) = RecordingApi::new();
        let mut ctx = Context::Api(ApiContext::new(Box::new(api)));
        let settings = ExportSettings {
            halt_spp: 64,
            ..ExportSettings::default()
        };
        export_render_setup(&mut ctx, &scene, &settings).unwrap();

        let keywords: Vec<_> = log.statements().iter().map(|s| s.keyword()).collect();
        assert_eq!(
            keywords,
            vec![
                "Film",
                "Sampler",
                "SurfaceIntegrator",
                "VolumeIntegrator",
                "PixelFilter",
                "Accelerator"
            ]
        );
        let Statement::Film { params, .. } = &log.statements()[0] else {
            panic!("film first");
        };
        assert_eq!(params.get("haltspp"), Some(&ParamValue::Integer(vec![64])));
        assert!(!params.contains("halttime"));
    }
}
