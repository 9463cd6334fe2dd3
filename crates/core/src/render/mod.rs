use std::{collections::HashMap, future::Future};

use crate::{
    animation::RotationState,
    error::RenderError,
    media::{MediaCatalog, MediaModel, Rgba},
    scene::{Material, ParameterKind, SceneEntity, SceneNode},
};

/// Signal raised once a refresh cycle has re-bound materials; the host
/// discards and reconstructs the visual entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildRequest {
    pub entity_name: String,
    /// Effective uniform scale (user scale times the model's default factor).
    pub scale_factor: f32,
    /// Generation of the refresh that produced this rebuild.
    pub generation: u64,
}

/// The rendering engine as seen by the viewer controller.
pub trait RenderHost: Send + 'static {
    type Entity: SceneNode;

    /// Loads the named model into the scene. Failures are reported, never
    /// retried, by the caller.
    fn load_entity(&mut self, name: &str) -> impl Future<Output = Result<(), RenderError>> + Send;

    fn entity_mut(&mut self, name: &str) -> Option<&mut Self::Entity>;

    /// Called on every animation tick and drag update, so it must be cheap.
    /// Hosts compose the rotation as X-axis then Y-axis.
    fn set_orientation(&mut self, entity: &str, rotation: RotationState);

    fn request_rebuild(&mut self, rebuild: &RebuildRequest);
}

/// Render host without a GPU. It keeps an in-memory scene and records the
/// calls made against it.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    templates: HashMap<String, SceneEntity>,
    loaded: HashMap<String, SceneEntity>,
    orientations: HashMap<String, RotationState>,
    orientation_updates: usize,
    rebuilds: Vec<RebuildRequest>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer able to load every model in `catalog`.
    pub fn with_catalog(catalog: &MediaCatalog) -> Self {
        let mut renderer = Self::new();
        for model in catalog.models() {
            renderer.register_template(model_template(model));
        }
        renderer
    }

    pub fn register_template(&mut self, entity: SceneEntity) {
        self.templates.insert(entity.name.clone(), entity);
    }

    pub fn entity(&self, name: &str) -> Option<&SceneEntity> {
        self.loaded.get(name)
    }

    pub fn orientation(&self, name: &str) -> Option<RotationState> {
        self.orientations.get(name).copied()
    }

    pub fn orientation_updates(&self) -> usize {
        self.orientation_updates
    }

    pub fn rebuilds(&self) -> &[RebuildRequest] {
        &self.rebuilds
    }
}

impl RenderHost for HeadlessRenderer {
    type Entity = SceneEntity;

    fn load_entity(&mut self, name: &str) -> impl Future<Output = Result<(), RenderError>> + Send {
        let loaded = match self.templates.get(name) {
            Some(template) => {
                self.loaded.insert(name.to_string(), template.clone());
                Ok(())
            }
            None => Err(RenderError::EntityLoadFailed {
                name: name.to_string(),
                reason: "no such model".to_string(),
            }),
        };
        std::future::ready(loaded)
    }

    fn entity_mut(&mut self, name: &str) -> Option<&mut SceneEntity> {
        self.loaded.get_mut(name)
    }

    fn set_orientation(&mut self, entity: &str, rotation: RotationState) {
        self.orientations.insert(entity.to_string(), rotation);
        self.orientation_updates += 1;
    }

    fn request_rebuild(&mut self, rebuild: &RebuildRequest) {
        self.rebuilds.push(rebuild.clone());
    }
}

/// Scene tree shaped like the shipped model: art parts carry an art shader
/// graph, tint parts a color/opacity shader graph, and the body a plain
/// material the restyle leaves alone.
pub fn model_template(model: &MediaModel) -> SceneEntity {
    let mut body = SceneEntity::new("body").with_material(Material::Simple {
        base_color: Rgba::BLACK,
    });

    for part in &model.art_parts {
        body = body.with_child(SceneEntity::new(part.clone()).with_material(
            Material::shader_graph(&[(model.art_parameter.as_str(), ParameterKind::Texture)]),
        ));
    }
    if let Some(tint) = &model.tint {
        for part in &tint.parts {
            body = body.with_child(SceneEntity::new(part.clone()).with_material(
                Material::shader_graph(&[
                    (tint.color_parameter.as_str(), ParameterKind::Color),
                    (tint.opacity_parameter.as_str(), ParameterKind::Scalar),
                ]),
            ));
        }
    }

    SceneEntity::new(model.entity_name.clone()).with_child(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MaterialSlot;

    #[tokio::test]
    async fn loads_registered_templates() {
        let mut renderer = HeadlessRenderer::with_catalog(&MediaCatalog::standard());

        renderer.load_entity("cassette").await.unwrap();

        let cassette = renderer.entity("cassette").unwrap();
        assert!(cassette.find("Cover").is_some());
        assert!(cassette.find("Holder_Glass_1").is_some());
    }

    #[tokio::test]
    async fn unknown_models_fail_to_load() {
        let mut renderer = HeadlessRenderer::new();

        let err = renderer.load_entity("turntable").await.unwrap_err();

        assert!(matches!(err, RenderError::EntityLoadFailed { .. }));
        assert!(renderer.entity_mut("turntable").is_none());
    }

    #[test]
    fn records_orientation_and_rebuilds() {
        let mut renderer = HeadlessRenderer::new();
        let rotation = RotationState {
            x_angle: 0.1,
            y_angle: -0.2,
        };

        renderer.set_orientation("cd", rotation);
        renderer.request_rebuild(&RebuildRequest {
            entity_name: "cd".into(),
            scale_factor: 5.0,
            generation: 1,
        });

        assert_eq!(renderer.orientation("cd"), Some(rotation));
        assert_eq!(renderer.orientation_updates(), 1);
        assert_eq!(renderer.rebuilds()[0].scale_factor, 5.0);
    }

    #[test]
    fn template_exposes_the_model_parameters() {
        let template = model_template(&MediaModel::vinyl_record());
        let plastic = template.find("vinyl_record_jacket_1420_plastic").unwrap();

        assert_eq!(template.name, "vinyl_record");
        assert!(plastic.materials[0].accepts("vinylColor", ParameterKind::Color));
        assert!(plastic.materials[0].accepts("vinylOpacity", ParameterKind::Scalar));
    }
}
