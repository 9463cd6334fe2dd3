use std::collections::BTreeMap;

use tracing::warn;

use crate::{
    error::ApplyError,
    scene::{MaterialSlot, ParameterValue, SceneNode},
};

/// Named parameters to set on every material at and below `entity_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialBinding {
    pub entity_path: String,
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl MaterialBinding {
    pub fn new(entity_path: impl Into<String>) -> Self {
        Self {
            entity_path: entity_path.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: ParameterValue) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }
}

/// Outcome of one apply pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub updated_materials: usize,
    /// Parts and materials that were skipped, in traversal order.
    pub skipped: Vec<ApplyError>,
}

/// Binds textures, colors and scalars onto a scene subtree.
///
/// A material that does not declare every requested input with the matching
/// kind is skipped and reported; its siblings and descendants are still
/// processed. The pass only fails when no material at all was updated.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialApplier;

impl MaterialApplier {
    pub fn new() -> Self {
        Self
    }

    pub fn apply<N: SceneNode>(
        &self,
        root: &mut N,
        bindings: &[MaterialBinding],
    ) -> Result<ApplyReport, ApplyError> {
        let mut report = ApplyReport::default();

        for binding in bindings {
            match root.find_path_mut(&binding.entity_path) {
                Some(part) => apply_to_subtree(part, binding, &mut report),
                None => {
                    warn!(part = %binding.entity_path, "binding target not found, skipping");
                    report
                        .skipped
                        .push(ApplyError::PartNotFound(binding.entity_path.clone()));
                }
            }
        }

        if report.updated_materials == 0 && !bindings.is_empty() {
            return Err(ApplyError::NothingApplied);
        }
        Ok(report)
    }
}

fn apply_to_subtree<N: SceneNode>(node: &mut N, binding: &MaterialBinding, report: &mut ApplyReport) {
    let part = node.name().to_string();

    for (index, material) in node.materials_mut().iter_mut().enumerate() {
        let rejected = binding
            .parameters
            .iter()
            .find(|(name, value)| !material.accepts(name, value.kind()));

        if let Some((parameter, _)) = rejected {
            let error = ApplyError::UnsupportedMaterial {
                part: part.clone(),
                index,
                parameter: parameter.clone(),
            };
            warn!(%error, "skipping material");
            report.skipped.push(error);
            continue;
        }

        for (name, value) in &binding.parameters {
            material.set_parameter(name, value.clone());
        }
        report.updated_materials += 1;
    }

    for child in node.children_mut() {
        apply_to_subtree(child, binding, report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        media::Rgba,
        scene::{Material, ParameterKind, SceneEntity},
    };

    fn tinted() -> Material {
        Material::shader_graph(&[
            ("vinylColor", ParameterKind::Color),
            ("vinylOpacity", ParameterKind::Scalar),
        ])
    }

    fn record() -> SceneEntity {
        SceneEntity::new("vinyl_record").with_child(
            SceneEntity::new("plastic")
                .with_material(Material::Simple {
                    base_color: Rgba::BLACK,
                })
                .with_material(tinted())
                .with_child(SceneEntity::new("rim").with_material(tinted())),
        )
    }

    fn tint_binding(alpha: f32) -> MaterialBinding {
        MaterialBinding::new("plastic")
            .with("vinylColor", ParameterValue::Color(Rgba::new(1.0, 0.0, 0.0, alpha)))
            .with("vinylOpacity", ParameterValue::Scalar(alpha))
    }

    #[test]
    fn skips_unsupported_materials_and_continues_with_siblings() {
        let mut root = record();

        let report = MaterialApplier::new()
            .apply(&mut root, &[tint_binding(0.5)])
            .unwrap();

        assert_eq!(report.updated_materials, 2);
        assert_eq!(
            report.skipped,
            vec![ApplyError::UnsupportedMaterial {
                part: "plastic".into(),
                index: 0,
                parameter: "vinylColor".into(),
            }]
        );
        let rim = root.find("rim").unwrap();
        assert_eq!(
            rim.materials[0].parameter("vinylOpacity"),
            Some(&ParameterValue::Scalar(0.5))
        );
    }

    #[test]
    fn missing_parts_are_reported_not_fatal() {
        let mut root = record();
        let bindings = [MaterialBinding::new("sleeve"), tint_binding(1.0)];

        let report = MaterialApplier::new().apply(&mut root, &bindings).unwrap();

        assert_eq!(report.skipped[0], ApplyError::PartNotFound("sleeve".into()));
        assert_eq!(report.updated_materials, 2);
    }

    #[test]
    fn fails_when_nothing_accepts_the_bindings() {
        let mut root = record();
        let binding = MaterialBinding::new("plastic")
            .with("albumArt", ParameterValue::Scalar(1.0));

        let err = MaterialApplier::new().apply(&mut root, &[binding]).unwrap_err();

        assert_eq!(err, ApplyError::NothingApplied);
    }

    #[test]
    fn applying_twice_yields_the_same_scene() {
        let applier = MaterialApplier::new();
        let mut once = record();
        applier.apply(&mut once, &[tint_binding(0.25)]).unwrap();
        let mut twice = once.clone();
        applier.apply(&mut twice, &[tint_binding(0.25)]).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn empty_binding_list_is_a_no_op() {
        let mut root = record();
        let report = MaterialApplier::new().apply(&mut root, &[]).unwrap();

        assert_eq!(report, ApplyReport::default());
        assert_eq!(root, record());
    }
}
