//! Streams a large synthetic glyph set through a single atlas region,
//! compacting whenever the free list gets fragmented or the region fills up.

use std::collections::HashMap;

use glam::{IVec2, Vec2};
use glyph_packer::{
    Error, GlyphCacheRegion, GlyphId, GlyphPlacement, GlyphRasterizer, Rect, Redraw,
    RegionOptions, Reservation,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

const GLYPH_COUNT: u32 = 20_000;
const GLYPHS_PER_TICK: usize = 100;
const FONT_SIZE: f32 = 12.0;
const PADDING: i32 = 1;
const SEED: u64 = 0x5eed;

/// Stand-in for a real font: every glyph is an ellipse with a random
/// em-relative box. Every 32nd glyph is blank, like a space.
struct SyntheticFont {
    boxes: Vec<Vec2>,
}

impl SyntheticFont {
    fn new(count: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let boxes = (0..count)
            .map(|id| {
                if id == 0 || id % 32 == 0 {
                    Vec2::ZERO
                } else {
                    Vec2::new(rng.gen_range(0.3..1.0), rng.gen_range(0.4..1.0))
                }
            })
            .collect();
        Self { boxes }
    }
}

impl GlyphRasterizer for SyntheticFont {
    fn scale_for_pixel_height(&self, pixels: f32) -> f32 {
        // Ascent to descent spans 1.2 em.
        pixels / 1.2
    }

    fn scale_for_em_to_pixels(&self, pixels: f32) -> f32 {
        pixels
    }

    fn glyph_box(&self, glyph: GlyphId, scale: Vec2) -> IVec2 {
        let size = self.boxes.get(glyph.0 as usize).copied().unwrap_or(Vec2::ZERO);
        (size * scale).ceil().as_ivec2()
    }

    fn rasterize_into(
        &self,
        _glyph: GlyphId,
        _scale: Vec2,
        target: &mut [u8],
        stride: usize,
        width: usize,
        height: usize,
    ) {
        let radius = Vec2::new(width as f32, height as f32) * 0.5;
        for row in 0..height {
            for col in 0..width {
                let p = (Vec2::new(col as f32 + 0.5, row as f32 + 0.5) - radius) / radius;
                let coverage = (1.0 - p.length_squared()).clamp(0.0, 1.0);
                target[row * stride + col] = (coverage.sqrt() * 255.0) as u8;
            }
        }
    }
}

/// What the driver keeps per packed glyph so it can be redrawn.
#[derive(Debug, Clone, Copy)]
struct Entry {
    glyph: GlyphId,
    placement: GlyphPlacement,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    processed: u32,
    packed: usize,
    blank: u32,
    compactions: u32,
    ticks: u32,
    free_rectangles: usize,
    occupancy: f32,
    atlas_full: bool,
}

fn compact(
    region: &mut GlyphCacheRegion,
    font: &SyntheticFont,
    cache: &mut HashMap<Rect, Entry>,
) -> Result<(), Error> {
    let compaction = region.compact(|relocation| {
        cache.get(&relocation.old.rect).map(|entry| Redraw {
            font,
            glyph: entry.glyph,
            placement: entry.placement,
        })
    })?;

    let mut moved = HashMap::with_capacity(cache.len());
    for relocation in &compaction.relocations {
        if let Some(entry) = cache.remove(&relocation.old.rect) {
            moved.insert(
                relocation.new.rect,
                Entry {
                    glyph: entry.glyph,
                    placement: entry.placement.relocated(relocation.new),
                },
            );
        }
    }
    *cache = moved;

    log::info!(
        "compacted {} glyphs: free list {} -> {}, {:.1}% used",
        compaction.relocations.len(),
        compaction.free_before,
        compaction.free_after,
        compaction.occupancy * 100.0,
    );
    Ok(())
}

fn reserve(
    region: &mut GlyphCacheRegion,
    font: &SyntheticFont,
    glyph: GlyphId,
) -> Result<Reservation, Error> {
    region.reserve(font, glyph, PADDING, IVec2::ONE, FONT_SIZE)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match std::env::args().nth(1) {
        Some(path) => RegionOptions::from_json(&std::fs::read_to_string(&path)?)?,
        None => RegionOptions::default(),
    };
    log::info!(
        "region {}x{}, {:?}, rotations {}",
        options.width,
        options.height,
        options.heuristic,
        options.allow_rotations
    );

    let font = SyntheticFont::new(GLYPH_COUNT, SEED);
    let mut region = GlyphCacheRegion::new(&options)?;
    let mut cache = HashMap::new();
    let mut summary = Summary::default();
    let mut next = 0;

    'ticks: while next < GLYPH_COUNT {
        summary.ticks += 1;
        for _ in 0..GLYPHS_PER_TICK {
            if next >= GLYPH_COUNT {
                break;
            }
            if region.needs_compaction() {
                compact(&mut region, &font, &mut cache)?;
                summary.compactions += 1;
            }

            let glyph = GlyphId(next);
            let reservation = match reserve(&mut region, &font, glyph) {
                Err(Error::RegionFull { .. }) => {
                    compact(&mut region, &font, &mut cache)?;
                    summary.compactions += 1;
                    match reserve(&mut region, &font, glyph) {
                        Err(Error::RegionFull { width, height }) => {
                            log::warn!(
                                "atlas full after {} glyphs, {width}x{height} slot does not fit",
                                cache.len()
                            );
                            summary.atlas_full = true;
                            break 'ticks;
                        }
                        other => other?,
                    }
                }
                other => other?,
            };

            match reservation {
                Reservation::Placed(placement) => {
                    region.draw(&font, glyph, placement.scale, placement.content)?;
                    cache.insert(placement.slot.rect, Entry { glyph, placement });
                }
                Reservation::Empty => summary.blank += 1,
            }
            summary.processed += 1;
            next += 1;
        }

        if let Some(dirty) = region.take_dirty() {
            log::debug!("tick {}: upload {:?}", summary.ticks, dirty);
        }
    }

    summary.packed = cache.len();
    summary.free_rectangles = region.packer().free_rectangles().len();
    summary.occupancy = region.occupancy();
    log::info!(
        "processed {} | used {} | free {} | {:.0}%",
        summary.processed,
        summary.packed,
        summary.free_rectangles,
        summary.occupancy * 100.0
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
