use glam::{IVec2, Vec2};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::{
    compact, BinPacker, Compaction, Error, Heuristic, Orientation, PackedRect, Rect,
    RegionOptions, Relocation,
};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GlyphId(pub u32);

impl GlyphId {
    /// The missing-glyph outline. Never packed.
    pub const NOTDEF: GlyphId = GlyphId(0);
}

/// The font side of the atlas: scale lookup, measuring and rasterizing glyphs.
///
/// Implemented by the caller's font handle.
pub trait GlyphRasterizer {
    /// Scale that makes the font's ascent-to-descent span `pixels` tall.
    fn scale_for_pixel_height(&self, pixels: f32) -> f32;

    /// Scale that maps one em to `pixels`.
    fn scale_for_em_to_pixels(&self, pixels: f32) -> f32;

    /// Tight bitmap size of `glyph` at `scale`. May be zero.
    fn glyph_box(&self, glyph: GlyphId, scale: Vec2) -> IVec2;

    /// Writes single channel coverage for `glyph` into `target`, which starts
    /// at the top-left pixel of the box. Must stay within `width × height`.
    fn rasterize_into(
        &self,
        glyph: GlyphId,
        scale: Vec2,
        target: &mut [u8],
        stride: usize,
        width: usize,
        height: usize,
    );
}

/// A glyph's slot in the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlyphPlacement {
    /// Scale to rasterize with, oversampling included.
    pub scale: Vec2,
    /// The allocation, rounded up to even dimensions.
    pub slot: PackedRect,
    /// The padded glyph box inside the slot, in atlas space.
    pub content: PackedRect,
}

impl GlyphPlacement {
    /// The same placement moved to `slot`, as reported by a [`Relocation`].
    pub fn relocated(&self, slot: PackedRect) -> Self {
        let shift = |content: i32, from: i32, to: i32| {
            (content as i64 - from as i64 + to as i64) as i32
        };
        let mut content = self.content;
        content.rect.x = shift(content.rect.x, self.slot.rect.x, slot.rect.x);
        content.rect.y = shift(content.rect.y, self.slot.rect.y, slot.rect.y);
        Self {
            scale: self.scale,
            slot,
            content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reservation {
    Placed(GlyphPlacement),
    /// The glyph has no ink, there is nothing to pack or draw.
    Empty,
}

/// What the caller hands back during compaction so a glyph can be redrawn.
pub struct Redraw<'f, F: ?Sized> {
    pub font: &'f F,
    pub glyph: GlyphId,
    pub placement: GlyphPlacement,
}

/// A bin-sized coverage buffer plus the allocator that hands out its space.
#[derive(Debug, Clone)]
pub struct GlyphCacheRegion {
    packer: BinPacker,
    atlas: GrayImage,
    heuristic: Heuristic,
    compaction_threshold: usize,
    scratch: Vec<u8>,
    dirty: Option<Rect>,
}

impl GlyphCacheRegion {
    pub fn new(options: &RegionOptions) -> Result<Self, Error> {
        let (width, height) = (options.width, options.height);
        if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(Error::InvalidSize {
                width: width as i64,
                height: height as i64,
            });
        }

        Ok(Self {
            packer: BinPacker::new(width as i32, height as i32, options.allow_rotations),
            atlas: GrayImage::new(width, height),
            heuristic: options.heuristic,
            compaction_threshold: options.compaction_threshold,
            scratch: Vec::new(),
            dirty: None,
        })
    }

    pub fn with_size(width: u32, height: u32) -> Result<Self, Error> {
        Self::new(&RegionOptions {
            width,
            height,
            ..Default::default()
        })
    }

    pub fn width(&self) -> u32 {
        self.atlas.width()
    }

    pub fn height(&self) -> u32 {
        self.atlas.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.atlas.as_raw()
    }

    pub fn image(&self) -> &GrayImage {
        &self.atlas
    }

    pub fn packer(&self) -> &BinPacker {
        &self.packer
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    pub fn set_heuristic(&mut self, heuristic: Heuristic) {
        self.heuristic = heuristic;
    }

    pub fn occupancy(&self) -> f32 {
        self.packer.occupancy()
    }

    /// True once the free list has grown past the configured threshold.
    pub fn needs_compaction(&self) -> bool {
        self.packer.free_rectangles().len() > self.compaction_threshold
    }

    /// Finds room for `glyph`.
    ///
    /// A positive `font_size` is a pixel height, a negative one maps the em
    /// square to `-font_size` pixels. The slot is the glyph box grown by
    /// `padding + oversample - 1` and rounded up to even dimensions.
    ///
    /// Returns [`Reservation::Empty`] for glyphs without ink and
    /// [`Error::RegionFull`] when the region has no room left; compacting and
    /// retrying may help in the latter case.
    pub fn reserve<F: GlyphRasterizer + ?Sized>(
        &mut self,
        font: &F,
        glyph: GlyphId,
        padding: i32,
        oversample: IVec2,
        font_size: f32,
    ) -> Result<Reservation, Error> {
        if padding < 0 || oversample.x < 1 || oversample.y < 1 {
            return Err(Error::InvalidGlyphParams {
                padding,
                oversample,
            });
        }

        let scale = if font_size > 0.0 {
            font.scale_for_pixel_height(font_size)
        } else {
            font.scale_for_em_to_pixels(-font_size)
        };
        let scale = Vec2::splat(scale) * oversample.as_vec2();

        if glyph == GlyphId::NOTDEF {
            return Ok(Reservation::Empty);
        }
        let glyph_box = font.glyph_box(glyph, scale);
        if glyph_box.x <= 0 || glyph_box.y <= 0 {
            return Ok(Reservation::Empty);
        }

        let padded = |extent: i32, oversample: i32| {
            extent as i64 + padding as i64 + oversample as i64 - 1
        };
        let (padded_width, padded_height) =
            (padded(glyph_box.x, oversample.x), padded(glyph_box.y, oversample.y));
        let (slot_width, slot_height) = (
            next_multiple(padded_width, 2),
            next_multiple(padded_height, 2),
        );
        let (Ok(width), Ok(height)) = (i32::try_from(slot_width), i32::try_from(slot_height))
        else {
            return Err(Error::GlyphTooLarge {
                width: slot_width,
                height: slot_height,
            });
        };
        // Slot dimensions bound the unrounded ones.
        let size = IVec2::new(padded_width as i32, padded_height as i32);

        let slot = self.packer.insert(width, height, self.heuristic);
        if !slot.is_placed() {
            log::warn!(
                "region full: {width}x{height} slot for glyph {} does not fit ({:.1}% used)",
                glyph.0,
                self.packer.occupancy() * 100.0,
            );
            return Err(Error::RegionFull { width, height });
        }

        let content = match slot.orientation {
            Orientation::Unrotated => Rect::new(slot.rect.x, slot.rect.y, size.x, size.y),
            Orientation::Rotated => Rect::new(slot.rect.x, slot.rect.y, size.y, size.x),
        };
        Ok(Reservation::Placed(GlyphPlacement {
            scale,
            slot,
            content: PackedRect::new(content, slot.orientation),
        }))
    }

    /// Rasterizes `glyph` into the atlas at `destination`, transposing the
    /// bitmap when the destination is rotated.
    pub fn draw<F: GlyphRasterizer + ?Sized>(
        &mut self,
        font: &F,
        glyph: GlyphId,
        scale: Vec2,
        destination: PackedRect,
    ) -> Result<(), Error> {
        let rect = destination.rect;
        if rect.is_empty() {
            return Ok(());
        }
        if !rect.is_contained_in(&self.bounds()) {
            return Err(Error::OutOfBounds { rect });
        }

        let stride = self.atlas.width() as usize;
        let (x, y) = (rect.x as usize, rect.y as usize);
        let (width, height) = (rect.width as usize, rect.height as usize);
        let pixels: &mut [u8] = &mut self.atlas;

        match destination.orientation {
            Orientation::Unrotated => {
                let start = y * stride + x;
                let end = (y + height - 1) * stride + x + width;
                font.rasterize_into(glyph, scale, &mut pixels[start..end], stride, width, height);
            }
            Orientation::Rotated => {
                // The rasterizer always produces the upright bitmap.
                let (bitmap_width, bitmap_height) = (height, width);
                self.scratch.clear();
                self.scratch.resize(bitmap_width * bitmap_height, 0);
                font.rasterize_into(
                    glyph,
                    scale,
                    &mut self.scratch,
                    bitmap_width,
                    bitmap_width,
                    bitmap_height,
                );
                for row in 0..bitmap_height {
                    let line = &self.scratch[row * bitmap_width..(row + 1) * bitmap_width];
                    for (col, &coverage) in line.iter().enumerate() {
                        pixels[(y + col) * stride + x + row] = coverage;
                    }
                }
            }
        }

        self.mark_dirty(rect);
        Ok(())
    }

    /// Repacks the region and redraws every glyph at its new location.
    ///
    /// The region keeps no bitmaps, so `recipe` has to say how to regenerate
    /// the pixels of each relocated slot. If it returns `None` for any slot the
    /// packer is put back as it was and nothing is redrawn.
    pub fn compact<'f, F, R>(&mut self, mut recipe: R) -> Result<Compaction, Error>
    where
        F: GlyphRasterizer + ?Sized + 'f,
        R: FnMut(&Relocation) -> Option<Redraw<'f, F>>,
    {
        let snapshot = self.packer.clone();
        let compaction = compact(&mut self.packer)?;

        let mut redraws = Vec::with_capacity(compaction.relocations.len());
        for relocation in &compaction.relocations {
            match recipe(relocation) {
                Some(redraw) => {
                    let placement = redraw.placement.relocated(relocation.new);
                    let content = redraw.placement.content.rect;
                    let fits = content.is_contained_in(&redraw.placement.slot.rect)
                        && placement.content.rect.is_contained_in(&relocation.new.rect);
                    if !fits {
                        log::error!(
                            "glyph content {:?} does not fit slot {:?}, compaction rolled back",
                            content,
                            redraw.placement.slot.rect
                        );
                        self.packer = snapshot;
                        return Err(Error::OutOfBounds {
                            rect: placement.content.rect,
                        });
                    }
                    redraws.push((redraw.font, redraw.glyph, placement));
                }
                None => {
                    log::error!(
                        "no redraw recipe for slot {:?}, compaction rolled back",
                        relocation.old.rect
                    );
                    self.packer = snapshot;
                    return Err(Error::MissingRecipe {
                        rect: relocation.old.rect,
                    });
                }
            }
        }

        let pixels: &mut [u8] = &mut self.atlas;
        pixels.fill(0);
        for (font, glyph, placement) in redraws {
            self.draw(font, glyph, placement.scale, placement.content)?;
        }
        self.dirty = Some(self.bounds());

        Ok(compaction)
    }

    /// Drops every glyph and clears the atlas.
    pub fn reset(&mut self) {
        let allocated = self.packer.used_rectangles().len();
        self.packer.init(
            self.packer.bin_width(),
            self.packer.bin_height(),
            self.packer.allow_rotations(),
        );
        let pixels: &mut [u8] = &mut self.atlas;
        pixels.fill(0);
        self.dirty = Some(self.bounds());
        log::debug!("region reset, dropped {allocated} glyphs");
    }

    /// Bounding box of everything written since the previous call.
    pub fn take_dirty(&mut self) -> Option<Rect> {
        self.dirty.take()
    }

    /// Normalized texture coordinates of `rect`, top-left then bottom-right.
    pub fn uv_bounds(&self, rect: &Rect) -> [Vec2; 2] {
        let size = Vec2::new(self.width() as f32, self.height() as f32);
        [
            Vec2::new(rect.x as f32, rect.y as f32) / size,
            Vec2::new(rect.right() as f32, rect.bottom() as f32) / size,
        ]
    }

    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }

    fn mark_dirty(&mut self, rect: Rect) {
        self.dirty = Some(match self.dirty {
            Some(dirty) => dirty.union(&rect),
            None => rect,
        });
    }
}

fn next_multiple(value: i64, multiple: i64) -> i64 {
    let rounded = value / multiple * multiple;
    if rounded < value {
        rounded + multiple
    } else {
        rounded
    }
}
