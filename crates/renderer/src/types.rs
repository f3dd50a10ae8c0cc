use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::sensor::OrientationFeed;

const VERTEX_SHADER: &str = include_str!("../shaders/vertex.glsl");
const FRAGMENT_SHADER: &str = include_str!("../shaders/fragment.glsl");
const FRAGMENT_BLUR_SHADER: &str = include_str!("../shaders/fragment_blur.glsl");

/// Selects which adapter class wgpu should prefer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Names the three shader sources a depth pipeline is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKey {
    Vertex,
    Fragment,
    FragmentBlur,
}

impl ShaderKey {
    pub const ALL: [ShaderKey; 3] =
        [ShaderKey::Vertex, ShaderKey::Fragment, ShaderKey::FragmentBlur];

    /// File name looked up when shaders are loaded from a directory.
    pub fn file_name(self) -> &'static str {
        match self {
            ShaderKey::Vertex => "vertex.glsl",
            ShaderKey::Fragment => "fragment.glsl",
            ShaderKey::FragmentBlur => "fragment_blur.glsl",
        }
    }
}

impl fmt::Display for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// GLSL text for every [`ShaderKey`].
///
/// The built-in set ships inside the binary; a directory may override any
/// subset of the files.
#[derive(Clone, Debug)]
pub struct ShaderSources {
    vertex: String,
    fragment: String,
    fragment_blur: String,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ShaderSources {
    pub fn builtin() -> Self {
        Self {
            vertex: VERTEX_SHADER.to_string(),
            fragment: FRAGMENT_SHADER.to_string(),
            fragment_blur: FRAGMENT_BLUR_SHADER.to_string(),
        }
    }

    /// Loads overrides from `dir`; files that do not exist keep the built-in text.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("shader directory {} does not exist", dir.display());
        }

        let mut sources = Self::builtin();
        for key in ShaderKey::ALL {
            let path = dir.join(key.file_name());
            if !path.is_file() {
                tracing::debug!(shader = %key, dir = %dir.display(), "using built-in shader");
                continue;
            }
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read shader at {}", path.display()))?;
            tracing::info!(shader = %key, path = %path.display(), "loaded shader override");
            sources = sources.with(key, text);
        }
        Ok(sources)
    }

    pub fn with(mut self, key: ShaderKey, text: impl Into<String>) -> Self {
        *self.slot_mut(key) = text.into();
        self
    }

    pub fn get(&self, key: ShaderKey) -> &str {
        match key {
            ShaderKey::Vertex => &self.vertex,
            ShaderKey::Fragment => &self.fragment,
            ShaderKey::FragmentBlur => &self.fragment_blur,
        }
    }

    fn slot_mut(&mut self, key: ShaderKey) -> &mut String {
        match key {
            ShaderKey::Vertex => &mut self.vertex,
            ShaderKey::Fragment => &mut self.fragment,
            ShaderKey::FragmentBlur => &mut self.fragment_blur,
        }
    }
}

/// Decoded colour image and depth map ready for upload.
#[derive(Clone, Debug)]
pub struct PhotoTextures {
    pub colour: RgbaImage,
    pub depth: RgbaImage,
}

impl PhotoTextures {
    /// Dimensions the viewport is fitted against.
    pub fn colour_size(&self) -> (u32, u32) {
        self.colour.dimensions()
    }
}

/// Configuration for the interactive viewer.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub surface_size: (u32, u32),
    pub title: String,
    pub shader_sources: ShaderSources,
    pub gpu_power: GpuPowerPreference,
    pub vsync: bool,
    pub orientation_feed: Option<OrientationFeed>,
    pub start_blurred: bool,
    pub start_showing_depth: bool,
    /// Source path of the photo, shown in the window title.
    pub photo_path: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            title: "depthview".to_string(),
            shader_sources: ShaderSources::builtin(),
            gpu_power: GpuPowerPreference::default(),
            vsync: true,
            orientation_feed: None,
            start_blurred: false,
            start_showing_depth: false,
            photo_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_sources_are_distinct() {
        let sources = ShaderSources::builtin();
        assert!(sources.get(ShaderKey::Vertex).contains("aVertexPosition"));
        assert!(sources.get(ShaderKey::Fragment).contains("uColourTexture"));
        assert_ne!(
            sources.get(ShaderKey::Fragment),
            sources.get(ShaderKey::FragmentBlur)
        );
    }

    #[test]
    fn directory_overrides_only_present_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fragment.glsl"), "// custom").unwrap();

        let sources = ShaderSources::from_dir(dir.path()).unwrap();
        assert_eq!(sources.get(ShaderKey::Fragment), "// custom");
        assert_eq!(sources.get(ShaderKey::Vertex), VERTEX_SHADER);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(ShaderSources::from_dir(&dir.path().join("nope")).is_err());
    }
}
