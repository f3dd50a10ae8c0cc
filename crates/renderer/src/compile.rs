//! CPU-side GLSL compilation, linking, and location reflection.
//!
//! Types:
//!
//! - `ShaderProgramManager` parses and validates a vertex/fragment pair with
//!   naga, checks the stage interface, and resolves every location the draw
//!   path needs.
//! - `ShaderProgram` keeps the validated sources plus its `ProgramLocations`
//!   so the GPU side can build modules, layouts, and vertex buffers from them.
//! - `CompileError` carries the failing stage, the compiler log, and the
//!   offending source text.
//!
//! Locations are never hard-coded on the draw path: the vertex attribute slots,
//! the uniform block offsets, and the texture/sampler bindings all come from
//! reflection of the compiled modules.
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;
use wgpu::naga::{self, front::glsl, valid};

use crate::types::{ShaderKey, ShaderSources};

pub const POSITION_ATTRIBUTE: &str = "aVertexPosition";
pub const TEX_COORD_ATTRIBUTE: &str = "aTexCoordinate";
pub const MVP_UNIFORM: &str = "uMVPMatrix";
pub const SKEW_UNIFORM: &str = "uSkew";
pub const COLOUR_TEXTURE: &str = "uColourTexture";
pub const COLOUR_SAMPLER: &str = "uColourSampler";
pub const DEPTH_TEXTURE: &str = "uDepthTexture";
pub const DEPTH_SAMPLER: &str = "uDepthSampler";

const ENTRY_POINT: &str = "main";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileStage {
    Vertex,
    Fragment,
    Link,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompileStage::Vertex => "vertex",
            CompileStage::Fragment => "fragment",
            CompileStage::Link => "link",
        })
    }
}

#[derive(Debug, Error)]
#[error("{stage} stage of shader program failed:\n{log}")]
pub struct CompileError {
    pub stage: CompileStage,
    pub log: String,
    pub source_text: String,
}

impl CompileError {
    fn link(log: impl Into<String>, source_text: &str) -> Self {
        Self {
            stage: CompileStage::Link,
            log: log.into(),
            source_text: source_text.to_string(),
        }
    }
}

/// Byte offset of a member inside a uniform block bound at `group`/`binding`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformLocation {
    pub group: u32,
    pub binding: u32,
    pub offset: u32,
}

/// A texture and the sampler it is read through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureUnit {
    pub group: u32,
    pub texture_binding: u32,
    pub sampler_binding: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramLocations {
    pub position: u32,
    pub tex_coord: u32,
    pub mvp: UniformLocation,
    pub skew: UniformLocation,
    pub uniform_block_size: u32,
    /// Texture unit 0: the primary image.
    pub colour: TextureUnit,
    /// Texture unit 1: the depth map.
    pub depth: TextureUnit,
}

impl ProgramLocations {
    pub fn uniform_group(&self) -> u32 {
        self.mvp.group
    }

    pub fn texture_group(&self) -> u32 {
        self.colour.group
    }
}

/// A validated and linked vertex/fragment pair.
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    pub label: String,
    pub vertex_source: String,
    pub fragment_source: String,
    pub locations: ProgramLocations,
}

impl ShaderProgram {
    pub(crate) fn vertex_descriptor(&self) -> wgpu::ShaderModuleDescriptor<'_> {
        wgpu::ShaderModuleDescriptor {
            label: Some("depth vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(&self.vertex_source),
                stage: naga::ShaderStage::Vertex,
                defines: &[],
            },
        }
    }

    pub(crate) fn fragment_descriptor(&self) -> wgpu::ShaderModuleDescriptor<'_> {
        wgpu::ShaderModuleDescriptor {
            label: Some(self.label.as_str()),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(&self.fragment_source),
                stage: naga::ShaderStage::Fragment,
                defines: &[],
            },
        }
    }
}

/// The two program variants a session draws with.
#[derive(Clone, Debug)]
pub struct ProgramSet {
    pub plain: ShaderProgram,
    pub blur: ShaderProgram,
}

pub struct ShaderProgramManager {
    frontend: glsl::Frontend,
    validator: valid::Validator,
}

impl Default for ShaderProgramManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderProgramManager {
    pub fn new() -> Self {
        Self {
            frontend: glsl::Frontend::default(),
            validator: valid::Validator::new(
                valid::ValidationFlags::all(),
                valid::Capabilities::all(),
            ),
        }
    }

    /// Compiles the plain and blur programs, which share the vertex stage.
    pub fn compile_variants(
        &mut self,
        sources: &ShaderSources,
    ) -> Result<ProgramSet, CompileError> {
        let vertex = sources.get(ShaderKey::Vertex);
        let plain = self.compile("depth plain", vertex, sources.get(ShaderKey::Fragment))?;
        let blur = self.compile("depth blur", vertex, sources.get(ShaderKey::FragmentBlur))?;
        Ok(ProgramSet { plain, blur })
    }

    pub fn compile(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ShaderProgram, CompileError> {
        let vertex = self.parse_stage(CompileStage::Vertex, vertex_source)?;
        let fragment = self.parse_stage(CompileStage::Fragment, fragment_source)?;
        let locations = link(&vertex, &fragment, vertex_source, fragment_source)?;

        tracing::debug!(program = label, ?locations, "linked shader program");
        Ok(ShaderProgram {
            label: label.to_string(),
            vertex_source: vertex_source.to_string(),
            fragment_source: fragment_source.to_string(),
            locations,
        })
    }

    fn parse_stage(
        &mut self,
        stage: CompileStage,
        source: &str,
    ) -> Result<naga::Module, CompileError> {
        let shader_stage = match stage {
            CompileStage::Vertex => naga::ShaderStage::Vertex,
            CompileStage::Fragment | CompileStage::Link => naga::ShaderStage::Fragment,
        };
        let failure = |log: String| CompileError {
            stage,
            log,
            source_text: source.to_string(),
        };

        let module = self
            .frontend
            .parse(&glsl::Options::from(shader_stage), source)
            .map_err(|errors| failure(error_chain(&errors)))?;
        self.validator
            .validate(&module)
            .map_err(|error| failure(error_chain(&error)))?;
        Ok(module)
    }
}

fn link(
    vertex: &naga::Module,
    fragment: &naga::Module,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ProgramLocations, CompileError> {
    let vertex_entry = entry_point(vertex, naga::ShaderStage::Vertex)
        .ok_or_else(|| CompileError::link("vertex shader has no main entry point", vertex_source))?;
    let fragment_entry = entry_point(fragment, naga::ShaderStage::Fragment).ok_or_else(|| {
        CompileError::link("fragment shader has no main entry point", fragment_source)
    })?;

    let written = output_locations(vertex, vertex_entry);
    for location in input_locations(fragment_entry) {
        if !written.contains(&location) {
            return Err(CompileError::link(
                format!("fragment input at location {location} is not written by the vertex stage"),
                fragment_source,
            ));
        }
    }

    let attribute = |name: &str| {
        input_location(vertex_entry, name).ok_or_else(|| {
            CompileError::link(format!("vertex attribute {name} is not declared"), vertex_source)
        })
    };
    let position = attribute(POSITION_ATTRIBUTE)?;
    let tex_coord = attribute(TEX_COORD_ATTRIBUTE)?;

    let (mvp, mvp_block) = resolve_uniform(vertex, fragment, MVP_UNIFORM, fragment_source)?;
    let (skew, skew_block) = resolve_uniform(vertex, fragment, SKEW_UNIFORM, fragment_source)?;
    if (mvp.group, mvp.binding) != (skew.group, skew.binding) {
        return Err(CompileError::link(
            format!("{MVP_UNIFORM} and {SKEW_UNIFORM} must live in the same uniform block"),
            fragment_source,
        ));
    }

    let colour = texture_unit(fragment, COLOUR_TEXTURE, COLOUR_SAMPLER, fragment_source)?;
    let depth = texture_unit(fragment, DEPTH_TEXTURE, DEPTH_SAMPLER, fragment_source)?;
    if colour.group != depth.group {
        return Err(CompileError::link(
            "colour and depth textures must share one bind group",
            fragment_source,
        ));
    }
    let mut groups = [mvp.group, colour.group];
    groups.sort_unstable();
    if groups != [0, 1] {
        return Err(CompileError::link(
            format!(
                "uniforms and textures must use sets 0 and 1, found {} and {}",
                mvp.group, colour.group
            ),
            fragment_source,
        ));
    }

    Ok(ProgramLocations {
        position,
        tex_coord,
        mvp,
        skew,
        uniform_block_size: mvp_block.max(skew_block),
        colour,
        depth,
    })
}

/// Finds `member` in either stage; when both stages declare it they must agree.
fn resolve_uniform(
    vertex: &naga::Module,
    fragment: &naga::Module,
    member: &str,
    fragment_source: &str,
) -> Result<(UniformLocation, u32), CompileError> {
    match (uniform_member(vertex, member), uniform_member(fragment, member)) {
        (Some(a), Some(b)) if a.0 != b.0 => Err(CompileError::link(
            format!("uniform {member} is laid out differently in the vertex and fragment stages"),
            fragment_source,
        )),
        (Some(found), _) | (None, Some(found)) => Ok(found),
        (None, None) => Err(CompileError::link(
            format!("uniform {member} is not declared in any stage"),
            fragment_source,
        )),
    }
}

fn entry_point(module: &naga::Module, stage: naga::ShaderStage) -> Option<&naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage && entry.name == ENTRY_POINT)
}

fn input_location(entry: &naga::EntryPoint, name: &str) -> Option<u32> {
    entry
        .function
        .arguments
        .iter()
        .find_map(|argument| match (&argument.name, &argument.binding) {
            (Some(arg_name), Some(naga::Binding::Location { location, .. }))
                if arg_name == name =>
            {
                Some(*location)
            }
            _ => None,
        })
}

fn input_locations(entry: &naga::EntryPoint) -> Vec<u32> {
    entry
        .function
        .arguments
        .iter()
        .filter_map(|argument| match &argument.binding {
            Some(naga::Binding::Location { location, .. }) => Some(*location),
            _ => None,
        })
        .collect()
}

fn output_locations(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<u32> {
    let Some(result) = &entry.function.result else {
        return Vec::new();
    };
    if let Some(naga::Binding::Location { location, .. }) = &result.binding {
        return vec![*location];
    }
    match &module.types[result.ty].inner {
        naga::TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|member| match &member.binding {
                Some(naga::Binding::Location { location, .. }) => Some(*location),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Location of `member` inside any uniform block, plus the block's byte size.
fn uniform_member(module: &naga::Module, member: &str) -> Option<(UniformLocation, u32)> {
    module.global_variables.iter().find_map(|(_, variable)| {
        if variable.space != naga::AddressSpace::Uniform {
            return None;
        }
        let binding = variable.binding.as_ref()?;
        let naga::TypeInner::Struct { members, span } = &module.types[variable.ty].inner else {
            return None;
        };
        let field = members
            .iter()
            .find(|candidate| candidate.name.as_deref() == Some(member))?;
        Some((
            UniformLocation {
                group: binding.group,
                binding: binding.binding,
                offset: field.offset,
            },
            *span,
        ))
    })
}

fn handle_binding(module: &naga::Module, name: &str) -> Option<naga::ResourceBinding> {
    module.global_variables.iter().find_map(|(_, variable)| {
        if variable.space == naga::AddressSpace::Handle && variable.name.as_deref() == Some(name) {
            variable.binding.clone()
        } else {
            None
        }
    })
}

fn texture_unit(
    module: &naga::Module,
    texture: &str,
    sampler: &str,
    source: &str,
) -> Result<TextureUnit, CompileError> {
    let missing =
        |name: &str| CompileError::link(format!("sampler {name} is not declared"), source);
    let texture_binding = handle_binding(module, texture).ok_or_else(|| missing(texture))?;
    let sampler_binding = handle_binding(module, sampler).ok_or_else(|| missing(sampler))?;
    if texture_binding.group != sampler_binding.group {
        return Err(CompileError::link(
            format!("{texture} and {sampler} must share one bind group"),
            source,
        ));
    }
    Ok(TextureUnit {
        group: texture_binding.group,
        texture_binding: texture_binding.binding,
        sampler_binding: sampler_binding.binding,
    })
}

fn error_chain(error: &dyn StdError) -> String {
    let mut log = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        log.push_str("\n  caused by: ");
        log.push_str(&cause.to_string());
        source = cause.source();
    }
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMAPPED_VERTEX: &str = r#"#version 450
layout(location = 3) in vec2 aTexCoordinate;
layout(location = 5) in vec3 aVertexPosition;
layout(std140, set = 0, binding = 0) uniform FrameParams {
    vec2 uSkew;
    mat4 uMVPMatrix;
} frame;
layout(location = 0) out vec2 vTexCoordinate;
void main() {
    vTexCoordinate = aTexCoordinate + frame.uSkew * 0.0;
    gl_Position = frame.uMVPMatrix * vec4(aVertexPosition, 1.0);
}
"#;

    const FLAT_FRAGMENT: &str = r#"#version 450
layout(location = 0) in vec2 vTexCoordinate;
layout(location = 0) out vec4 fragColor;
layout(set = 1, binding = 0) uniform texture2D uDepthTexture;
layout(set = 1, binding = 1) uniform sampler uDepthSampler;
layout(set = 1, binding = 2) uniform texture2D uColourTexture;
layout(set = 1, binding = 3) uniform sampler uColourSampler;
void main() {
    float depth = texture(sampler2D(uDepthTexture, uDepthSampler), vTexCoordinate).r;
    fragColor = texture(sampler2D(uColourTexture, uColourSampler), vTexCoordinate) * depth;
}
"#;

    #[test]
    fn builtin_variants_link_with_expected_locations() {
        let mut manager = ShaderProgramManager::new();
        let programs = manager
            .compile_variants(&ShaderSources::builtin())
            .expect("built-in shaders compile");

        for program in [&programs.plain, &programs.blur] {
            let locations = program.locations;
            assert_eq!(locations.position, 0);
            assert_eq!(locations.tex_coord, 1);
            assert_eq!(locations.mvp, UniformLocation { group: 0, binding: 0, offset: 0 });
            assert_eq!(locations.skew, UniformLocation { group: 0, binding: 0, offset: 64 });
            assert!(locations.uniform_block_size >= 72);
            assert_eq!(
                locations.colour,
                TextureUnit { group: 1, texture_binding: 0, sampler_binding: 1 }
            );
            assert_eq!(
                locations.depth,
                TextureUnit { group: 1, texture_binding: 2, sampler_binding: 3 }
            );
        }
    }

    #[test]
    fn locations_follow_the_shader_declarations() {
        let mut manager = ShaderProgramManager::new();
        let program = manager
            .compile("remapped", REMAPPED_VERTEX, FLAT_FRAGMENT)
            .expect("remapped program links");

        let locations = program.locations;
        assert_eq!(locations.position, 5);
        assert_eq!(locations.tex_coord, 3);
        assert_eq!(locations.skew.offset, 0);
        assert_eq!(locations.mvp.offset, 16);
        assert_eq!(locations.colour.texture_binding, 2);
        assert_eq!(locations.depth.sampler_binding, 1);
    }

    #[test]
    fn malformed_fragment_reports_stage_and_source() {
        let broken = "#version 450\nvoid main() { this is not glsl }\n";
        let mut manager = ShaderProgramManager::new();
        let err = manager
            .compile("broken", ShaderSources::builtin().get(ShaderKey::Vertex), broken)
            .expect_err("broken shader must not compile");

        assert_eq!(err.stage, CompileStage::Fragment);
        assert_eq!(err.source_text, broken);
        assert!(!err.log.is_empty());
    }

    #[test]
    fn unwritten_varying_fails_to_link() {
        let fragment = FLAT_FRAGMENT.replace(
            "layout(location = 0) in vec2 vTexCoordinate;",
            "layout(location = 4) in vec2 vTexCoordinate;",
        );
        let mut manager = ShaderProgramManager::new();
        let err = manager
            .compile("unlinked", REMAPPED_VERTEX, &fragment)
            .expect_err("location 4 is never written");

        assert_eq!(err.stage, CompileStage::Link);
        assert!(err.log.contains("location 4"));
    }

    #[test]
    fn missing_depth_sampler_fails_to_link() {
        let fragment = r#"#version 450
layout(location = 0) in vec2 vTexCoordinate;
layout(location = 0) out vec4 fragColor;
layout(set = 1, binding = 0) uniform texture2D uColourTexture;
layout(set = 1, binding = 1) uniform sampler uColourSampler;
void main() {
    fragColor = texture(sampler2D(uColourTexture, uColourSampler), vTexCoordinate);
}
"#;
        let mut manager = ShaderProgramManager::new();
        let err = manager
            .compile("no depth", REMAPPED_VERTEX, fragment)
            .expect_err("depth sampler is required");

        assert_eq!(err.stage, CompileStage::Link);
        assert!(err.log.contains(DEPTH_TEXTURE));
    }
}
