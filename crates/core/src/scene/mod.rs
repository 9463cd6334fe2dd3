//! Minimal view of the host's scene graph: named entities carrying
//! materials, and the typed parameters those materials expose.
//!
//! Hosts implement [`SceneNode`] and [`MaterialSlot`] over their own entity
//! type. [`SceneEntity`] is an in-memory implementation used by the headless
//! renderer.

use std::collections::BTreeMap;

use crate::{media::Rgba, texture::TextureHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Color(Rgba),
    Scalar(f32),
    Texture(TextureHandle),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Color(_) => ParameterKind::Color,
            Self::Scalar(_) => ParameterKind::Scalar,
            Self::Texture(_) => ParameterKind::Texture,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Color,
    Scalar,
    Texture,
}

/// One material on a scene part.
pub trait MaterialSlot {
    /// Whether the material declares an input `name` that takes `kind`.
    fn accepts(&self, name: &str, kind: ParameterKind) -> bool;

    fn set_parameter(&mut self, name: &str, value: ParameterValue);
}

pub trait SceneNode: Sized {
    type Material: MaterialSlot;

    fn name(&self) -> &str;

    fn children_mut(&mut self) -> &mut [Self];

    fn materials_mut(&mut self) -> &mut [Self::Material];

    /// Depth-first search for `name`, starting with `self`.
    fn find_mut(&mut self, name: &str) -> Option<&mut Self> {
        if self.name() == name {
            return Some(self);
        }
        self.find_descendant_mut(name)
    }

    fn find_descendant_mut(&mut self, name: &str) -> Option<&mut Self> {
        self.children_mut()
            .iter_mut()
            .find_map(|child| child.find_mut(name))
    }

    /// Resolves a `/`-separated path. Each segment is searched among all
    /// descendants of the previous match, so intermediate levels may be
    /// skipped.
    fn find_path_mut(&mut self, path: &str) -> Option<&mut Self> {
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let mut current = self.find_mut(segments.next()?)?;
        for segment in segments {
            current = current.find_descendant_mut(segment)?;
        }
        Some(current)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    /// Shader graph material with declared, typed inputs.
    ShaderGraph {
        inputs: BTreeMap<String, ParameterKind>,
        values: BTreeMap<String, ParameterValue>,
    },
    /// Fixed-function material; exposes no parameters.
    Simple { base_color: Rgba },
}

impl Material {
    pub fn shader_graph(inputs: &[(&str, ParameterKind)]) -> Self {
        Self::ShaderGraph {
            inputs: inputs
                .iter()
                .map(|(name, kind)| (name.to_string(), *kind))
                .collect(),
            values: BTreeMap::new(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        match self {
            Self::ShaderGraph { values, .. } => values.get(name),
            Self::Simple { .. } => None,
        }
    }
}

impl MaterialSlot for Material {
    fn accepts(&self, name: &str, kind: ParameterKind) -> bool {
        match self {
            Self::ShaderGraph { inputs, .. } => inputs.get(name) == Some(&kind),
            Self::Simple { .. } => false,
        }
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) {
        if let Self::ShaderGraph { values, .. } = self {
            values.insert(name.to_string(), value);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneEntity {
    pub name: String,
    pub materials: Vec<Material>,
    pub children: Vec<SceneEntity>,
}

impl SceneEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.materials.push(material);
        self
    }

    pub fn with_child(mut self, child: SceneEntity) -> Self {
        self.children.push(child);
        self
    }

    pub fn find(&self, name: &str) -> Option<&SceneEntity> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

impl SceneNode for SceneEntity {
    type Material = Material;

    fn name(&self) -> &str {
        &self.name
    }

    fn children_mut(&mut self) -> &mut [Self] {
        &mut self.children
    }

    fn materials_mut(&mut self) -> &mut [Material] {
        &mut self.materials
    }
}
