use luxport_common::{LookAt, ParamSet, matrices_differ};
use luxport_context::{Context, LogicalFile};
use luxport_scene::{CameraKind, HostScene, ObjectKind};

use crate::error::ExportError;
use crate::settings::ExportSettings;
use crate::setup::film_resolution;

/// Coordinate system holding the camera transform at shutter close.
pub const CAMERA_END_TRANSFORM: &str = "CameraEndTransform";

/// Screen window `[xmin, xmax, ymin, ymax]` for an image aspect ratio.
///
/// The longer image axis spans `[-1, 1]` before scaling; shifts are in units
/// of that axis.
pub fn screen_window(aspect: f32, shift_x: f32, shift_y: f32, scale: f32) -> [f32; 4] {
    let (sx, sy) = (2.0 * shift_x, 2.0 * shift_y);
    if aspect > 1.0 {
        let inv = 1.0 / aspect;
        [
            (sx - 1.0) * scale,
            (sx + 1.0) * scale,
            (sy - inv) * scale,
            (sy + inv) * scale,
        ]
    } else {
        [
            (sx - aspect) * scale,
            (sx + aspect) * scale,
            (sy - 1.0) * scale,
            (sy + 1.0) * scale,
        ]
    }
}

/// Field of view in degrees along the shorter image axis.
pub fn field_of_view(lens: f32, sensor_width: f32, aspect: f32) -> f32 {
    let angle = 2.0 * (sensor_width / (2.0 * lens)).atan();
    let fov = if aspect >= 1.0 {
        2.0 * ((angle / 2.0).tan() / aspect).atan()
    } else {
        angle
    };
    fov.to_degrees()
}

fn look_at(ctx: &mut Context, m: &glam::Mat4) -> Result<(), ExportError> {
    let l = LookAt::from_matrix(m);
    ctx.look_at(l.eye.to_array(), l.target.to_array(), l.up.to_array())?;
    Ok(())
}

/// Emit the active camera: optional end transform, look-at and `Camera`.
pub fn export_camera(
    ctx: &mut Context,
    scene: &dyn HostScene,
    settings: &ExportSettings,
) -> Result<(), ExportError> {
    let id = scene
        .render_settings()
        .active_camera
        .as_ref()
        .ok_or(ExportError::NoCamera)?;
    let object = scene
        .object(id)
        .filter(|o| o.kind == ObjectKind::Camera)
        .ok_or(ExportError::NoCamera)?;
    let camera = object
        .data
        .as_deref()
        .and_then(|name| scene.camera(name))
        .ok_or(ExportError::NoCamera)?;

    ctx.set_output_file(LogicalFile::Main);
    let (xres, yres) = film_resolution(scene, settings);
    let aspect = xres as f32 / yres as f32;
    let mut params = ParamSet::new();

    if settings.motion_blur && object.motion_blur {
        let next = scene.world_matrix(id, scene.frame_current() + 1)?;
        if matrices_differ(&object.matrix_world, &next) {
            ctx.transform_begin()?;
            ctx.identity()?;
            look_at(ctx, &next)?;
            ctx.coordinate_system(CAMERA_END_TRANSFORM)?;
            ctx.transform_end()?;
            params = params
                .add_float("shutteropen", 0.0)
                .add_float("shutterclose", 1.0)
                .add_string("endtransform", CAMERA_END_TRANSFORM);
        }
    }

    let kind = match camera.kind {
        CameraKind::Perspective => {
            let window = screen_window(aspect, camera.shift_x, camera.shift_y, 1.0);
            params = params
                .add_floats("screenwindow", window.to_vec())
                .add_float("fov", field_of_view(camera.lens, camera.sensor_width, aspect));
            "perspective"
        }
        CameraKind::Orthographic => {
            let scale = camera.ortho_scale / 2.0;
            let window = screen_window(aspect, camera.shift_x, camera.shift_y, scale);
            params = params.add_floats("screenwindow", window.to_vec());
            "orthographic"
        }
        CameraKind::Environment => "environment",
    };
    params = params
        .add_float("hither", camera.clip_start)
        .add_float("yon", camera.clip_end);
    if camera.lens_radius > 0.0 {
        params = params
            .add_float("lensradius", camera.lens_radius)
            .add_float("focaldistance", camera.focal_distance);
    }

    look_at(ctx, &object.matrix_world)?;
    ctx.camera(kind, params)?;
    tracing::debug!(camera = %id, kind, "camera exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use luxport_common::ParamValue;
    use luxport_context::{ApiContext, RecordingApi, Statement};
    use luxport_scene::{CameraData, MemoryScene, ObjectData};

    fn approx(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn landscape_screen_window() {
        let w = screen_window(1920.0 / 1080.0, 0.0, 0.0, 1.0);
        approx(&w, &[-1.0, 1.0, -0.5625, 0.5625]);
    }

    #[test]
    fn portrait_screen_window() {
        let w = screen_window(0.5, 0.0, 0.0, 1.0);
        approx(&w, &[-0.5, 0.5, -1.0, 1.0]);
        let shifted = screen_window(0.5, 0.25, 0.0, 2.0);
        approx(&shifted, &[0.0, 2.0, -2.0, 2.0]);
    }

    #[test]
    fn fov_uses_shorter_axis() {
        let square = field_of_view(16.0, 32.0, 1.0);
        assert!((square - 90.0).abs() < 1e-3);
        let wide = field_of_view(16.0, 32.0, 2.0);
        assert!((wide - 2.0 * 0.5f32.atan().to_degrees()).abs() < 1e-3);
    }

    fn scene_with_camera(motion: bool) -> MemoryScene {
        let mut scene = MemoryScene::new("cam");
        scene.insert_camera(CameraData::perspective("CamData"));
        let mut cam = ObjectData::camera("Camera", "CamData")
            .with_matrix(Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)));
        if motion {
            cam.motion_blur = true;
            cam.motion_matrix = Some(Mat4::from_translation(Vec3::new(1.0, 0.0, 5.0)));
        }
        let id = scene.insert_object(cam);
        scene.settings.active_camera = Some(id);
        scene
    }

    #[test]
    fn static_camera() {
        let scene = scene_with_camera(false);
        let (api, log) = RecordingApi::new();
        let mut ctx = Context::Api(ApiContext::new(Box::new(api)));
        export_camera(&mut ctx, &scene, &ExportSettings::default()).unwrap();

        let statements = log.statements();
        assert_eq!(statements.len(), 2);
        match &statements[0] {
            Statement::LookAt { eye, target, .. } => {
                assert_eq!(*eye, [0.0, 0.0, 5.0]);
                assert_eq!(*target, [0.0, 0.0, 4.0]);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &statements[1] {
            Statement::Camera { kind, params } => {
                assert_eq!(kind, "perspective");
                let Some(ParamValue::Float(w)) = params.get("screenwindow") else {
                    panic!("missing screenwindow");
                };
                approx(w, &[-1.0, 1.0, -0.5625, 0.5625]);
                assert!(!params.contains("endtransform"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn moving_camera_writes_end_transform() {
        let scene = scene_with_camera(true);
        let (api, log) = RecordingApi::new();
        let mut ctx = Context::Api(ApiContext::new(Box::new(api)));
        let settings = ExportSettings {
            motion_blur: true,
            ..ExportSettings::default()
        };
        export_camera(&mut ctx, &scene, &settings).unwrap();
        assert_eq!(log.count_keyword("CoordinateSystem"), 1);
        assert_eq!(log.count_keyword("LookAt"), 2);
        let camera = log.statements().pop();
        assert!(matches!(
            camera,
            Some(Statement::Camera { params, .. }) if params.contains("endtransform")
        ));
    }

    #[test]
    fn missing_camera() {
        let scene = MemoryScene::new("empty");
        let (api, _log) = RecordingApi::new();
        let mut ctx = Context::Api(ApiContext::new(Box::new(api)));
        assert!(matches!(
            export_camera(&mut ctx, &scene, &ExportSettings::default()),
            Err(ExportError::NoCamera)
        ));
    }
}
