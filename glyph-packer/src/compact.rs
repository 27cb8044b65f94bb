use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{BinPacker, Error, Heuristic, PackedRect};

/// Where a used rectangle moved to during compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    pub old: PackedRect,
    pub new: PackedRect,
}

impl Relocation {
    pub fn moved(&self) -> bool {
        self.old.rect != self.new.rect
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Compaction {
    /// One entry per used rectangle, in re-insertion order.
    pub relocations: Vec<Relocation>,
    pub free_before: usize,
    pub free_after: usize,
    pub occupancy: f32,
}

/// Biggest first: height, then width, then area, all descending.
pub fn compaction_order(a: &PackedRect, b: &PackedRect) -> Ordering {
    b.rect
        .height
        .cmp(&a.rect.height)
        .then_with(|| b.rect.width.cmp(&a.rect.width))
        .then_with(|| b.rect.area().cmp(&a.rect.area()))
}

/// Repacks every used rectangle of `packer` into the same, freshly reset bin.
///
/// Rectangles are re-inserted with their placed dimensions using
/// [`Heuristic::BottomLeftRule`] and no rotation, so an entry that was stored
/// rotated stays rotated. If anything fails to fit the packer is restored and
/// [`Error::CompactionFailed`] is returned; this means the used set was broken
/// and must not be retried.
pub fn compact(packer: &mut BinPacker) -> Result<Compaction, Error> {
    let snapshot = packer.clone();
    let free_before = packer.free_rectangles().len();
    let allow_rotations = packer.allow_rotations();

    let mut order = packer.used_rectangles().to_vec();
    order.sort_by(compaction_order);

    packer.init(packer.bin_width(), packer.bin_height(), false);

    let mut relocations = Vec::with_capacity(order.len());
    for old in order {
        let new = packer.insert_preserving(&old, Heuristic::BottomLeftRule);
        if !new.is_placed() {
            log::error!(
                "compaction failed to re-insert {}x{} after {} of {} rectangles",
                old.rect.width,
                old.rect.height,
                relocations.len(),
                snapshot.used_rectangles().len(),
            );
            *packer = snapshot;
            return Err(Error::CompactionFailed {
                width: old.rect.width,
                height: old.rect.height,
            });
        }
        relocations.push(Relocation { old, new });
    }

    packer.set_allow_rotations(allow_rotations);

    let compaction = Compaction {
        relocations,
        free_before,
        free_after: packer.free_rectangles().len(),
        occupancy: packer.occupancy(),
    };
    log::debug!(
        "compacted {} rectangles, free list {} -> {}",
        compaction.relocations.len(),
        compaction.free_before,
        compaction.free_after,
    );
    Ok(compaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Orientation, Rect};

    fn sizes() -> Vec<(i32, i32)> {
        (0..40)
            .map(|i| (2 + (i * 7) % 13, 3 + (i * 11) % 17))
            .collect()
    }

    fn dims(packed: &PackedRect) -> (i32, i32) {
        (packed.rect.width, packed.rect.height)
    }

    #[test]
    fn order_is_biggest_first() {
        let mut rects = vec![
            PackedRect::new(Rect::new(0, 0, 3, 2), Orientation::Unrotated),
            PackedRect::new(Rect::new(0, 0, 2, 5), Orientation::Unrotated),
            PackedRect::new(Rect::new(0, 0, 4, 2), Orientation::Unrotated),
            PackedRect::new(Rect::new(0, 0, 9, 1), Orientation::Unrotated),
        ];
        rects.sort_by(compaction_order);
        let sorted = rects.iter().map(dims).collect::<Vec<_>>();
        assert_eq!(sorted, vec![(2, 5), (4, 2), (3, 2), (9, 1)]);
    }

    #[test]
    fn repacks_everything_that_was_packed() {
        let heuristics = [
            Heuristic::BestShortSideFit,
            Heuristic::BestLongSideFit,
            Heuristic::BestAreaFit,
            Heuristic::BottomLeftRule,
            Heuristic::ContactPointRule,
        ];
        for heuristic in heuristics {
            for allow_rotations in [false, true] {
                let mut packer = BinPacker::new(96, 96, allow_rotations);
                for (w, h) in sizes() {
                    assert!(packer.insert(w, h, heuristic).is_placed());
                }
                let occupancy = packer.occupancy();
                let mut before = packer.used_rectangles().iter().map(dims).collect::<Vec<_>>();

                let compaction = compact(&mut packer).expect("compaction must succeed");

                assert_eq!(compaction.relocations.len(), before.len());
                assert_eq!(packer.occupancy(), occupancy);
                assert_eq!(packer.allow_rotations(), allow_rotations);

                let mut after = packer.used_rectangles().iter().map(dims).collect::<Vec<_>>();
                before.sort();
                after.sort();
                assert_eq!(before, after);

                let used = packer.used_rectangles();
                for (i, a) in used.iter().enumerate() {
                    assert!(a.rect.right() <= 96 && a.rect.bottom() <= 96);
                    for b in &used[i + 1..] {
                        assert!(!a.rect.intersects(&b.rect));
                    }
                }
                for relocation in &compaction.relocations {
                    assert_eq!(dims(&relocation.old), dims(&relocation.new));
                    assert_eq!(relocation.old.orientation, relocation.new.orientation);
                }
            }
        }
    }

    #[test]
    fn keeps_orientation_of_rotated_entries() {
        let mut packer = BinPacker::new(4, 4, true);
        packer.insert(1, 4, Heuristic::BestAreaFit);
        let rotated = packer.insert(4, 1, Heuristic::BestAreaFit);
        assert!(rotated.is_rotated());

        let compaction = compact(&mut packer).unwrap();
        let relocation = compaction
            .relocations
            .iter()
            .find(|r| r.old == rotated)
            .unwrap();
        assert!(relocation.new.is_rotated());
        assert_eq!(dims(&relocation.new), (1, 4));
        assert!(packer.allow_rotations());
    }

    #[test]
    fn reduces_fragmentation() {
        let mut packer = BinPacker::new(10, 10, false);
        packer.insert(2, 2, Heuristic::BottomLeftRule);
        packer.insert(4, 6, Heuristic::BottomLeftRule);
        packer.insert(2, 4, Heuristic::BottomLeftRule);

        let compaction = compact(&mut packer).unwrap();
        let new = compaction
            .relocations
            .iter()
            .map(|r| r.new.rect)
            .collect::<Vec<_>>();
        assert_eq!(
            new,
            vec![
                Rect::new(0, 0, 4, 6),
                Rect::new(4, 0, 2, 4),
                Rect::new(6, 0, 2, 2),
            ]
        );
        assert!(compaction.relocations.iter().any(Relocation::moved));
    }

    #[test]
    fn failure_restores_packer() {
        let mut packer = BinPacker::new(10, 10, false);
        let placed = packer.insert(6, 6, Heuristic::BottomLeftRule);
        // A second, overlapping entry can never be repacked next to the first.
        packer.used_mut().push(placed);
        let free = packer.free_rectangles().to_vec();

        let err = compact(&mut packer).unwrap_err();
        assert!(matches!(
            err,
            Error::CompactionFailed {
                width: 6,
                height: 6
            }
        ));
        assert_eq!(packer.used_rectangles().len(), 2);
        assert_eq!(packer.free_rectangles(), free.as_slice());
    }
}
