//! Compiled scenes and the scene file loader.

use std::path::{Path, PathBuf};

use crate::camera::Camera;
use crate::error::{SceneError, SceneResult};
use crate::object::{ObjectKind, SceneObject};
use crate::parser::SceneParser;
use crate::registry::{FileDecoder, ResourceRegistry};

/// Required scene file extension.
pub const SCENE_EXTENSION: &str = "json";

/// A compiled scene: flat primitive list plus cameras.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Primitives in id order
    pub objects: Vec<SceneObject>,

    /// Cameras in declaration order; never empty after parsing
    pub cameras: Vec<Camera>,

    /// Texture names as declared (duplicates included)
    pub texture_names: Vec<String>,

    /// Normal-map names as declared (duplicates included)
    pub normal_names: Vec<String>,
}

impl Scene {
    /// Number of primitives.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of primitives of a given kind.
    pub fn count_of(&self, kind: ObjectKind) -> usize {
        self.objects.iter().filter(|o| o.kind() == kind).count()
    }

    /// Number of light-emitting primitives.
    pub fn emitter_count(&self) -> usize {
        self.objects.iter().filter(|o| o.surface.is_emissive()).count()
    }
}

/// Where a scene's resources live and what it renders into.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Texture directory, relative to the scene file's directory
    pub texture_dir: PathBuf,

    /// Normal-map directory, relative to the scene file's directory
    pub normal_dir: PathBuf,

    /// Render target size used to configure cameras
    pub frame_size: (u32, u32),
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            texture_dir: PathBuf::from("textures"),
            normal_dir: PathBuf::from("normals"),
            frame_size: (800, 600),
        }
    }
}

/// A scene together with the registries holding its decoded images.
pub struct LoadedScene {
    pub path: PathBuf,
    pub scene: Scene,
    pub textures: ResourceRegistry,
    pub normals: ResourceRegistry,
}

/// Check that `path` names a `.json` file.
pub fn check_extension(path: &Path) -> SceneResult<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(SCENE_EXTENSION) => Ok(()),
        _ => Err(SceneError::WrongExtension(path.to_path_buf())),
    }
}

/// Load and compile a scene file.
///
/// Relative resource directories are resolved against the scene file's
/// directory.
pub fn load_scene<P: AsRef<Path>>(path: P, options: &LoadOptions) -> SceneResult<LoadedScene> {
    let path = path.as_ref();
    check_extension(path)?;

    let content = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut textures =
        ResourceRegistry::textures(Box::new(FileDecoder::new(base_dir.join(&options.texture_dir))));
    let mut normals =
        ResourceRegistry::normals(Box::new(FileDecoder::new(base_dir.join(&options.normal_dir))));

    let scene = SceneParser::new(&mut textures, &mut normals, options.frame_size).parse_str(&content)?;

    log::info!(
        "Loaded scene {}: {} objects, {} cameras, {} textures, {} normal maps",
        path.display(),
        scene.object_count(),
        scene.cameras.len(),
        textures.len() - 1,
        normals.len() - 1
    );

    Ok(LoadedScene {
        path: path.to_path_buf(),
        scene,
        textures,
        normals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lumen_scene_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_check_extension() {
        assert!(check_extension(Path::new("scene.json")).is_ok());
        assert!(matches!(
            check_extension(Path::new("scene.txt")),
            Err(SceneError::WrongExtension(_))
        ));
        assert!(check_extension(Path::new("scene.JSON")).is_err());
        assert!(check_extension(Path::new("scene")).is_err());
    }

    #[test]
    fn test_wrong_extension_is_rejected_before_reading() {
        let err = load_scene("does/not/exist.yaml", &LoadOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, SceneError::WrongExtension(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_scene("does/not/exist.json", &LoadOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, SceneError::Io { .. }));
    }

    #[test]
    fn test_load_scene_from_disk() {
        let path = write_temp(
            "simple.json",
            r#"{
                "objects": [
                    { "type": "sphere", "position": [0, 1, 0], "color": [1, 0, 0], "radius": 1,
                      "emition": [2, 2, 2] },
                    { "type": "plane", "position": [0, 0, 0], "dir": [0, 1, 0], "color": [1, 1, 1] }
                ],
                "cameras": [{ "position": [0, 1, 5], "dir": [0, 0, -1] }]
            }"#,
        );

        let options = LoadOptions {
            frame_size: (320, 240),
            ..Default::default()
        };
        let loaded = load_scene(&path, &options).unwrap();

        assert_eq!(loaded.scene.object_count(), 2);
        assert_eq!(loaded.scene.count_of(ObjectKind::Plane), 1);
        assert_eq!(loaded.scene.emitter_count(), 1);
        assert_eq!(loaded.scene.cameras[0].resolution, (320, 240));
        assert!(loaded.textures.is_empty());
        assert!(loaded.normals.is_empty());
    }

    #[test]
    fn test_missing_texture_file_is_fatal() {
        let path = write_temp(
            "textured.json",
            r#"{ "textures": ["missing.png"],
                 "cameras": [{ "position": [0, 0, 0], "dir": [0, 0, -1] }] }"#,
        );

        let err = load_scene(&path, &LoadOptions::default()).err().unwrap();
        assert!(matches!(err, SceneError::Resource(_)));
    }
}
