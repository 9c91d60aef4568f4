//! Text scene-file writer.
//!
//! Layout relative to the output directory:
//! ```text
//! <name>.lxs                                  - main file (camera, film, world, lights)
//! <name>/Scene/<frame>/LuxRender-Volumes.lxv  - named volumes
//! <name>/Scene/<frame>/LuxRender-Materials.lxm - textures and named materials
//! <name>/Scene/<frame>/LuxRender-Geometry.lxo  - primitive definitions and placements
//! <name>/Scene/<frame>/meshes/*.ply           - binary PLY side files
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use luxport_common::{ParamSet, ParamValue};
use serde::{Deserialize, Serialize};

use crate::ply::{PlyMesh, write_ply};
use crate::sink::ContextError;
use crate::statement::{LogicalFile, Statement};

/// Which logical files an export actually writes.
///
/// Statements routed to a disabled file are discarded, but the main file still
/// includes it so that a previously exported copy is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSubset {
    pub main: bool,
    pub materials: bool,
    pub geometry: bool,
}

impl Default for FileSubset {
    fn default() -> Self {
        Self {
            main: true,
            materials: true,
            geometry: true,
        }
    }
}

impl FileSubset {
    fn writes(&self, file: LogicalFile) -> bool {
        match file {
            LogicalFile::Main => self.main,
            LogicalFile::Materials | LogicalFile::Volumes => self.materials,
            LogicalFile::Geometry => self.geometry,
        }
    }
}

/// Scene-file writer with one buffered writer per enabled logical file.
pub struct FileContext {
    main_path: PathBuf,
    partition_dir: PathBuf,
    /// Partition directory relative to the main file, used for `Include` paths.
    partition_rel: PathBuf,
    writers: BTreeMap<LogicalFile, Option<BufWriter<File>>>,
    current: LogicalFile,
}

impl FileContext {
    /// Create the output files for scene `name` at `frame` inside `dir`.
    ///
    /// Fails with an IO error when the directory cannot be created or written.
    pub fn create(
        dir: impl AsRef<Path>,
        name: &str,
        frame: i32,
        subset: FileSubset,
    ) -> Result<Self, ContextError> {
        let dir = dir.as_ref();
        let partition_rel = PathBuf::from(name)
            .join("Scene")
            .join(format!("{frame:05}"));
        let partition_dir = dir.join(&partition_rel);
        std::fs::create_dir_all(&partition_dir)?;

        let main_path = dir.join(format!("{name}.lxs"));
        let mut writers = BTreeMap::new();
        for file in [
            LogicalFile::Main,
            LogicalFile::Volumes,
            LogicalFile::Materials,
            LogicalFile::Geometry,
        ] {
            let writer = if subset.writes(file) {
                let path = match file {
                    LogicalFile::Main => main_path.clone(),
                    other => partition_dir.join(partition_file_name(other)),
                };
                Some(BufWriter::new(File::create(path)?))
            } else {
                None
            };
            writers.insert(file, writer);
        }

        tracing::debug!(main = %main_path.display(), "scene files created");
        Ok(Self {
            main_path,
            partition_dir,
            partition_rel,
            writers,
            current: LogicalFile::Main,
        })
    }

    pub fn main_path(&self) -> &Path {
        &self.main_path
    }

    pub fn current_file(&self) -> LogicalFile {
        self.current
    }

    /// Redirect subsequent statements to another logical file.
    pub fn set_output_file(&mut self, file: LogicalFile) {
        self.current = file;
    }

    pub fn emit(&mut self, statement: &Statement) -> Result<(), ContextError> {
        let text = format_statement(statement);
        self.write_line(self.current, &text)?;
        if matches!(statement, Statement::WorldBegin) && self.current == LogicalFile::Main {
            for file in LogicalFile::PARTITIONS {
                let rel = self.partition_rel.join(partition_file_name(file));
                let include = format!("Include \"{}\"", rel.to_string_lossy().replace('\\', "/"));
                self.write_line(LogicalFile::Main, &include)?;
            }
        }
        Ok(())
    }

    /// Write a PLY side file and return its path relative to the main file.
    pub fn write_ply(&mut self, name: &str, mesh: &PlyMesh<'_>) -> Result<String, ContextError> {
        let mesh_dir = self.partition_dir.join("meshes");
        std::fs::create_dir_all(&mesh_dir)?;
        let file_name = format!("{name}.ply");
        let mut out = BufWriter::new(File::create(mesh_dir.join(&file_name))?);
        write_ply(&mut out, mesh)?;
        out.flush()?;
        let rel = self.partition_rel.join("meshes").join(file_name);
        Ok(rel.to_string_lossy().replace('\\', "/"))
    }

    pub fn close(&mut self) -> Result<(), ContextError> {
        for writer in self.writers.values_mut().flatten() {
            writer.flush()?;
        }
        self.writers.clear();
        Ok(())
    }

    fn write_line(&mut self, file: LogicalFile, text: &str) -> Result<(), ContextError> {
        match self.writers.get_mut(&file) {
            Some(Some(w)) => {
                w.write_all(text.as_bytes())?;
                w.write_all(b"\n")?;
                Ok(())
            }
            Some(None) => Ok(()),
            None => Err(ContextError::Closed),
        }
    }
}

fn partition_file_name(file: LogicalFile) -> &'static str {
    match file {
        LogicalFile::Main => "main.lxs",
        LogicalFile::Volumes => "LuxRender-Volumes.lxv",
        LogicalFile::Materials => "LuxRender-Materials.lxm",
        LogicalFile::Geometry => "LuxRender-Geometry.lxo",
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

fn join_numbers<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a parameter list, one parameter per indented line.
pub fn format_params(params: &ParamSet) -> String {
    let mut out = String::new();
    for p in params {
        let values = match &p.value {
            ParamValue::Float(v)
            | ParamValue::Point(v)
            | ParamValue::Vector(v)
            | ParamValue::Normal(v)
            | ParamValue::Color(v) => join_numbers(v),
            ParamValue::Integer(v) => join_numbers(v),
            ParamValue::Bool(v) => v
                .iter()
                .map(|b| quote(if *b { "true" } else { "false" }))
                .collect::<Vec<_>>()
                .join(" "),
            ParamValue::String(v) => v.iter().map(|s| quote(s)).collect::<Vec<_>>().join(" "),
            ParamValue::Texture(t) => quote(t),
        };
        out.push_str(&format!(
            "\n\t\"{} {}\" [{}]",
            p.value.type_name(),
            p.name,
            values
        ));
    }
    out
}

/// Render one statement in scene-file syntax.
pub fn format_statement(statement: &Statement) -> String {
    let kw = statement.keyword();
    match statement {
        Statement::AttributeBegin
        | Statement::AttributeEnd
        | Statement::TransformBegin
        | Statement::TransformEnd
        | Statement::Identity
        | Statement::WorldBegin
        | Statement::WorldEnd
        | Statement::ObjectEnd => kw.to_string(),
        Statement::Transform(m) | Statement::ConcatTransform(m) => {
            format!("{kw} [{}]", join_numbers(&m[..]))
        }
        Statement::LookAt { eye, target, up } => format!(
            "{kw} {} {} {}",
            join_numbers(&eye[..]),
            join_numbers(&target[..]),
            join_numbers(&up[..])
        ),
        Statement::CoordinateSystem(n)
        | Statement::CoordSysTransform(n)
        | Statement::NamedMaterial(n)
        | Statement::Interior(n)
        | Statement::Exterior(n)
        | Statement::ObjectBegin(n)
        | Statement::ObjectInstance(n)
        | Statement::PortalInstance(n) => format!("{kw} {}", quote(n)),
        Statement::Camera { kind, params }
        | Statement::Film { kind, params }
        | Statement::Sampler { kind, params }
        | Statement::SurfaceIntegrator { kind, params }
        | Statement::VolumeIntegrator { kind, params }
        | Statement::PixelFilter { kind, params }
        | Statement::Accelerator { kind, params }
        | Statement::Material { kind, params }
        | Statement::LightSource { kind, params }
        | Statement::AreaLightSource { kind, params }
        | Statement::Shape { kind, params } => {
            format!("{kw} {}{}", quote(kind), format_params(params))
        }
        Statement::MakeNamedMaterial { name, params } | Statement::LightGroup { name, params } => {
            format!("{kw} {}{}", quote(name), format_params(params))
        }
        Statement::Texture {
            name,
            variant,
            kind,
            params,
        } => format!(
            "{kw} {} {} {}{}",
            quote(name),
            quote(variant),
            quote(kind),
            format_params(params)
        ),
        Statement::MakeNamedVolume { name, kind, params } => format!(
            "{kw} {} {}{}",
            quote(name),
            quote(kind),
            format_params(params)
        ),
        Statement::MotionInstance {
            name,
            start,
            stop,
            to,
        } => format!("{kw} {} {start} {stop} {}", quote(name), quote(to)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn formats_shape_with_params() {
        let s = Statement::Shape {
            kind: "trianglemesh".into(),
            params: ParamSet::new()
                .add_integers("indices", vec![0, 1, 2])
                .add_bool("smooth", true),
        };
        assert_eq!(
            format_statement(&s),
            "Shape \"trianglemesh\"\n\t\"integer indices\" [0 1 2]\n\t\"bool smooth\" [\"true\"]"
        );
    }

    #[test]
    fn formats_motion_instance() {
        let s = Statement::MotionInstance {
            name: "mesh".into(),
            start: 0.0,
            stop: 1.0,
            to: "mesh_motion".into(),
        };
        assert_eq!(
            format_statement(&s),
            "MotionInstance \"mesh\" 0 1 \"mesh_motion\""
        );
    }

    #[test]
    fn partitions_are_included_and_routed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = FileContext::create(tmp.path(), "scene", 1, FileSubset::default()).unwrap();
        ctx.emit(&Statement::WorldBegin).unwrap();
        ctx.set_output_file(LogicalFile::Geometry);
        ctx.emit(&Statement::ObjectBegin("Cube".into())).unwrap();
        ctx.emit(&Statement::ObjectEnd).unwrap();
        ctx.set_output_file(LogicalFile::Main);
        ctx.emit(&Statement::WorldEnd).unwrap();
        ctx.close().unwrap();

        let main = read(&tmp.path().join("scene.lxs"));
        assert!(main.contains("Include \"scene/Scene/00001/LuxRender-Geometry.lxo\""));
        assert!(main.contains("Include \"scene/Scene/00001/LuxRender-Materials.lxm\""));
        assert!(!main.contains("ObjectBegin"));
        let geom = read(&tmp.path().join("scene/Scene/00001/LuxRender-Geometry.lxo"));
        assert_eq!(geom, "ObjectBegin \"Cube\"\nObjectEnd\n");
    }

    #[test]
    fn disabled_partition_is_discarded_but_included() {
        let tmp = tempfile::tempdir().unwrap();
        let subset = FileSubset {
            geometry: false,
            ..FileSubset::default()
        };
        let mut ctx = FileContext::create(tmp.path(), "s", 3, subset).unwrap();
        ctx.emit(&Statement::WorldBegin).unwrap();
        ctx.set_output_file(LogicalFile::Geometry);
        ctx.emit(&Statement::ObjectEnd).unwrap();
        ctx.close().unwrap();

        assert!(!tmp.path().join("s/Scene/00003/LuxRender-Geometry.lxo").exists());
        assert!(read(&tmp.path().join("s.lxs")).contains("LuxRender-Geometry.lxo"));
    }

    #[test]
    fn emit_after_close_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = FileContext::create(tmp.path(), "s", 1, FileSubset::default()).unwrap();
        ctx.close().unwrap();
        assert!(matches!(
            ctx.emit(&Statement::WorldEnd),
            Err(ContextError::Closed)
        ));
    }

    #[test]
    fn ply_side_file_path_is_relative() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = FileContext::create(tmp.path(), "s", 1, FileSubset::default()).unwrap();
        let mesh = PlyMesh {
            points: &[0.0; 9],
            normals: &[0.0; 9],
            uvs: &[],
            indices: &[0, 1, 2],
        };
        let rel = ctx.write_ply("Cube_m000", &mesh).unwrap();
        assert_eq!(rel, "s/Scene/00001/meshes/Cube_m000.ply");
        assert!(tmp.path().join(&rel).is_file());
    }

    #[test]
    fn unwritable_directory_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let result = FileContext::create(&blocker, "s", 1, FileSubset::default());
        assert!(matches!(result, Err(ContextError::Io(_))));
    }
}
