//! Caption layout: wrapping, measuring and shrink-to-fit placement of the
//! subtitle block drawn over each dialogue line.

mod fit;
pub mod measure;
pub mod script;

pub use fit::{CaptionFitter, CaptionLayout, CaptionRequest, PlacedBox, RowKind};
pub use measure::{FontSet, GlyphMeasurer, HeuristicMeasurer, TextMeasurer};
pub use script::ScriptClass;
