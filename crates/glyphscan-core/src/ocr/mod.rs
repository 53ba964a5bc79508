//! Recognition pipeline: preprocessing, segmentation, cascade and layout.

mod cascade;
pub mod preprocessing;
mod reassembly;
pub mod segmenter;

pub use cascade::{
    Cascade, CascadeBuilder, CascadeReport, CascadeStage, Classified, Segmented, TEXT_LABEL, TextFiltered,
};
pub use preprocessing::PageImage;
pub use reassembly::{Layout, LayoutGlyph, reassemble};
pub use segmenter::{Foreground, LabelMap, Segmenter};
