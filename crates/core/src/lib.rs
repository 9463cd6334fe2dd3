//! Core library for the physical media previews.
//!
//! A preview shows a vinyl record, compact disc or compact cassette that the
//! user can spin by dragging. Each module owns one subsystem: the rotation
//! animator and its timers, the debounced refresh that restyles the model,
//! the texture pipeline, material application against the scene tree, and
//! the viewer controller that ties them together around a render host.

pub mod animation;
pub mod config;
pub mod easing;
pub mod error;
pub mod material;
pub mod media;
pub mod refresh;
pub mod render;
pub mod scene;
pub mod texture;
pub mod timeline;
pub mod viewer;

pub use animation::{AnimationMode, AnimatorInput, ModeKind, RotationAnimator, RotationState};
pub use config::{AnimationConfig, FetchConfig, RefreshConfig, ViewerConfig};
pub use error::{ApplyError, FetchError, PhysicalMediaError, RenderError, Result};
pub use material::{ApplyReport, MaterialApplier, MaterialBinding};
pub use media::{MediaAppearance, MediaCatalog, MediaKind, MediaModel, Rgba};
pub use refresh::{RefreshDebouncer, RefreshRequest};
pub use render::{HeadlessRenderer, RebuildRequest, RenderHost};
pub use scene::{Material, ParameterKind, ParameterValue, SceneEntity, SceneNode};
pub use texture::{DefaultTransport, TextureHandle, TexturePipeline, Transport};
pub use timeline::TimerSlot;
pub use viewer::{ViewerCommand, ViewerController, ViewerHandle, ViewerStatus};
