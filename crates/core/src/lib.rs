//! PDF Annotator Core Library
//!
//! Annotation model, text-anchored placement, coordinate mapping, Arabic
//! shaping and the save pipeline. Nothing here owns a thread; the viewer
//! crate decides where each piece runs.

pub mod annotation;
pub mod arabic;
pub mod error;
pub mod geometry;
pub mod history;
pub mod layout;
pub mod locator;
pub mod overlay;
pub mod placement;
pub mod save;
pub mod session;
pub mod text_layout;
pub mod viewport;

pub use annotation::{Annotation, AnnotationKind, Color};
pub use arabic::{is_arabic, script_runs, shape, ScriptRun};
pub use error::{FontError, SaveError, SaveResult};
pub use geometry::{PagePoint, PageRect};
pub use history::AnnotationStore;
pub use layout::{LayoutConfig, PageFrame, PageLayout};
pub use locator::{LocatorConfig, PointLocator, RangeLocator};
pub use overlay::{DeviceRect, OverlayBuilder, OverlayPrimitive, OverlayStyle};
pub use placement::{Mark, Placement, PlacementConfig};
pub use save::{FontResolver, SaveConfig, SavePipeline};
pub use session::{Session, Tool, ToolColors, UnknownTool};
pub use text_layout::{PageText, TextLayout, Word};
pub use viewport::{PageHit, ViewTransform, ViewportLimits, ViewportState};
