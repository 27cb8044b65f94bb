//! Dynamic glyph atlas built on a MaxRects rectangle allocator.
//!
//! [`BinPacker`] does the geometry, [`compact`] repacks a fragmented bin and
//! [`GlyphCacheRegion`] ties a packer to a single-channel coverage buffer that
//! glyphs are rasterized into.

mod compact;
mod options;
mod pack;
mod region;

pub use compact::*;
pub use options::*;
pub use pack::*;
pub use region::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no space left in the region for a {width}x{height} slot")]
    RegionFull { width: i32, height: i32 },
    #[error("invalid region size {width}x{height}")]
    InvalidSize { width: i64, height: i64 },
    #[error("invalid glyph parameters: padding {padding}, oversample {oversample}")]
    InvalidGlyphParams {
        padding: i32,
        oversample: glam::IVec2,
    },
    #[error("glyph slot {width}x{height} exceeds the coordinate range")]
    GlyphTooLarge { width: i64, height: i64 },
    #[error("compaction could not re-insert a {width}x{height} rectangle")]
    CompactionFailed { width: i32, height: i32 },
    #[error("no redraw recipe for the glyph in {rect:?}")]
    MissingRecipe { rect: Rect },
    #[error("destination {rect:?} lies outside the atlas")]
    OutOfBounds { rect: Rect },
    #[error("invalid region options: {0}")]
    Options(#[from] serde_json::Error),
}
