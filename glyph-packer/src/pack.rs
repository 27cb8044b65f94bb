use serde::{Deserialize, Serialize};

/// Axis-aligned integer rectangle covering `[x, x + width) × [y, y + height)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when the interiors overlap. Rectangles that only share an edge do
    /// not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Compared in `i64` so rectangles near the `i32` limits do not overflow.
    pub fn is_contained_in(&self, other: &Rect) -> bool {
        let right = |r: &Rect| r.x as i64 + r.width as i64;
        let bottom = |r: &Rect| r.y as i64 + r.height as i64;
        self.x >= other.x
            && self.y >= other.y
            && right(self) <= right(other)
            && bottom(self) <= bottom(other)
    }

    /// Smallest rectangle covering both. Empty rectangles are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Unrotated,
    /// The requested `(w, h)` was placed as `(h, w)`. Pixel data copied into
    /// the slot has to be transposed.
    Rotated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackedRect {
    pub rect: Rect,
    pub orientation: Orientation,
}

impl PackedRect {
    /// Returned by [`BinPacker::insert`] when the request does not fit.
    pub const UNPLACED: PackedRect = PackedRect {
        rect: Rect::new(0, 0, 0, 0),
        orientation: Orientation::Unrotated,
    };

    pub fn new(rect: Rect, orientation: Orientation) -> Self {
        Self { rect, orientation }
    }

    #[inline]
    pub fn is_placed(&self) -> bool {
        self.rect.height != 0
    }

    #[inline]
    pub fn is_rotated(&self) -> bool {
        self.orientation == Orientation::Rotated
    }
}

/// Rule used to pick a free rectangle for a new placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heuristic {
    /// Smallest leftover on the short side, then on the long side.
    BestShortSideFit,
    /// Smallest leftover on the long side, then on the short side.
    BestLongSideFit,
    /// Smallest leftover area, then the short side leftover.
    BestAreaFit,
    /// Tetris placement: lowest resulting top edge, then leftmost.
    #[default]
    BottomLeftRule,
    /// Touch the bin edges and already placed rectangles as much as possible.
    ContactPointRule,
}

/// Lexicographic placement score. Lower is better for every heuristic.
type Score = (i64, i64);

/// MaxRects allocator over a single fixed-size bin.
///
/// The free list may contain overlapping rectangles; only rectangles fully
/// contained in another one are pruned.
#[derive(Debug, Clone)]
pub struct BinPacker {
    bin_width: i32,
    bin_height: i32,
    allow_rotations: bool,
    used: Vec<PackedRect>,
    free: Vec<Rect>,
}

impl BinPacker {
    pub fn new(width: i32, height: i32, allow_rotations: bool) -> Self {
        let mut packer = Self {
            bin_width: 0,
            bin_height: 0,
            allow_rotations,
            used: Vec::new(),
            free: Vec::new(),
        };
        packer.init(width, height, allow_rotations);
        packer
    }

    /// Resets the bin to a single free rectangle and no allocations.
    pub fn init(&mut self, width: i32, height: i32, allow_rotations: bool) {
        self.bin_width = width;
        self.bin_height = height;
        self.allow_rotations = allow_rotations;

        self.used.clear();
        self.free.clear();
        self.free.push(Rect::new(0, 0, width, height));
    }

    pub fn bin_width(&self) -> i32 {
        self.bin_width
    }

    pub fn bin_height(&self) -> i32 {
        self.bin_height
    }

    pub fn allow_rotations(&self) -> bool {
        self.allow_rotations
    }

    pub(crate) fn set_allow_rotations(&mut self, allow_rotations: bool) {
        self.allow_rotations = allow_rotations;
    }

    pub fn used_rectangles(&self) -> &[PackedRect] {
        &self.used
    }

    pub fn free_rectangles(&self) -> &[Rect] {
        &self.free
    }

    #[cfg(test)]
    pub(crate) fn used_mut(&mut self) -> &mut Vec<PackedRect> {
        &mut self.used
    }

    /// Places a `width × height` rectangle. Returns [`PackedRect::UNPLACED`]
    /// (zero height) if it does not fit anywhere.
    pub fn insert(&mut self, width: i32, height: i32, heuristic: Heuristic) -> PackedRect {
        if width <= 0 || height <= 0 {
            log::warn!("rejected degenerate insert of {width}x{height}");
            return PackedRect::UNPLACED;
        }

        match self.find_position(width, height, heuristic) {
            Some((node, _)) => {
                self.place(node);
                node
            }
            None => PackedRect::UNPLACED,
        }
    }

    /// Packs as many of `sizes` as possible, always placing the request that
    /// scores best against the current free space next. Stops once none of the
    /// remaining requests fit. The result is indexed like `sizes`.
    pub fn insert_batch(
        &mut self,
        sizes: &[(i32, i32)],
        heuristic: Heuristic,
    ) -> Vec<Option<PackedRect>> {
        let mut placed = vec![None; sizes.len()];
        let mut pending = sizes
            .iter()
            .enumerate()
            .filter(|(_, (w, h))| *w > 0 && *h > 0)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        while !pending.is_empty() {
            let mut best: Option<(usize, PackedRect, Score)> = None;
            for (slot, &index) in pending.iter().enumerate() {
                let (width, height) = sizes[index];
                if let Some((node, score)) = self.find_position(width, height, heuristic) {
                    if best.map_or(true, |(_, _, best_score)| score < best_score) {
                        best = Some((slot, node, score));
                    }
                }
            }

            let Some((slot, node, _)) = best else {
                break;
            };
            self.place(node);
            placed[pending.remove(slot)] = Some(node);
        }

        placed
    }

    /// Inserts a rectangle of the same placed size as `packed`, keeping its
    /// orientation tag. Used when replaying placements after compaction.
    pub(crate) fn insert_preserving(
        &mut self,
        packed: &PackedRect,
        heuristic: Heuristic,
    ) -> PackedRect {
        let node = self.insert(packed.rect.width, packed.rect.height, heuristic);
        if !node.is_placed() {
            return node;
        }
        let node = PackedRect::new(node.rect, packed.orientation);
        if let Some(last) = self.used.last_mut() {
            *last = node;
        }
        node
    }

    /// Ratio of used surface area to the bin area.
    pub fn occupancy(&self) -> f32 {
        let bin_area = self.bin_width as i64 * self.bin_height as i64;
        if bin_area <= 0 {
            return 0.0;
        }
        let used_area: i64 = self.used.iter().map(|u| u.rect.area()).sum();
        used_area as f32 / bin_area as f32
    }

    fn place(&mut self, node: PackedRect) {
        let used = node.rect;
        let mut residuals = Vec::new();
        self.free.retain(|free| {
            if !free.intersects(&used) {
                return true;
            }
            split_free_node(free, &used, &mut residuals);
            false
        });
        self.free.extend(residuals);

        self.prune_free_list();
        self.used.push(node);
    }

    fn find_position(
        &self,
        width: i32,
        height: i32,
        heuristic: Heuristic,
    ) -> Option<(PackedRect, Score)> {
        let mut best: Option<(PackedRect, Score)> = None;

        for free in &self.free {
            if free.width >= width && free.height >= height {
                let rect = Rect::new(free.x, free.y, width, height);
                let score = self.score(free, &rect, heuristic);
                if best.map_or(true, |(_, best_score)| score < best_score) {
                    best = Some((PackedRect::new(rect, Orientation::Unrotated), score));
                }
            }
            if self.allow_rotations && free.width >= height && free.height >= width {
                let rect = Rect::new(free.x, free.y, height, width);
                let score = self.score(free, &rect, heuristic);
                if best.map_or(true, |(_, best_score)| score < best_score) {
                    best = Some((PackedRect::new(rect, Orientation::Rotated), score));
                }
            }
        }

        best
    }

    fn score(&self, free: &Rect, placed: &Rect, heuristic: Heuristic) -> Score {
        let leftover_horiz = (free.width - placed.width).abs() as i64;
        let leftover_vert = (free.height - placed.height).abs() as i64;
        let short_side = leftover_horiz.min(leftover_vert);
        let long_side = leftover_horiz.max(leftover_vert);

        match heuristic {
            Heuristic::BottomLeftRule => (placed.bottom() as i64, placed.x as i64),
            Heuristic::BestShortSideFit => (short_side, long_side),
            Heuristic::BestLongSideFit => (long_side, short_side),
            Heuristic::BestAreaFit => (free.area() - placed.area(), short_side),
            // Contact is maximised.
            Heuristic::ContactPointRule => (-self.contact_point_score(placed), 0),
        }
    }

    fn contact_point_score(&self, placed: &Rect) -> i64 {
        let mut score = 0i64;

        if placed.x == 0 || placed.right() == self.bin_width {
            score += placed.height as i64;
        }
        if placed.y == 0 || placed.bottom() == self.bin_height {
            score += placed.width as i64;
        }

        for used in &self.used {
            let used = &used.rect;
            if used.x == placed.right() || used.right() == placed.x {
                score += common_interval_length(used.y, used.bottom(), placed.y, placed.bottom());
            }
            if used.y == placed.bottom() || used.bottom() == placed.y {
                score += common_interval_length(used.x, used.right(), placed.x, placed.right());
            }
        }
        score
    }

    fn prune_free_list(&mut self) {
        let count = self.free.len();
        let mut pruned = vec![false; count];

        for i in 0..count {
            if pruned[i] {
                continue;
            }
            for j in (i + 1)..count {
                if pruned[j] {
                    continue;
                }
                if self.free[i].is_contained_in(&self.free[j]) {
                    pruned[i] = true;
                    break;
                }
                if self.free[j].is_contained_in(&self.free[i]) {
                    pruned[j] = true;
                }
            }
        }

        let mut index = 0;
        self.free.retain(|_| {
            let keep = !pruned[index];
            index += 1;
            keep
        });
    }
}

/// Length of the overlap of `[a_start, a_end)` and `[b_start, b_end)`.
fn common_interval_length(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> i64 {
    if a_end < b_start || b_end < a_start {
        return 0;
    }
    (a_end.min(b_end) - a_start.max(b_start)) as i64
}

/// Pushes the parts of `free` not covered by `used` as maximal slivers.
/// The caller guarantees that the two rectangles intersect.
fn split_free_node(free: &Rect, used: &Rect, out: &mut Vec<Rect>) {
    // top
    if used.y > free.y && used.y < free.bottom() {
        out.push(Rect::new(free.x, free.y, free.width, used.y - free.y));
    }
    // bottom
    if used.bottom() < free.bottom() {
        out.push(Rect::new(
            free.x,
            used.bottom(),
            free.width,
            free.bottom() - used.bottom(),
        ));
    }
    // left
    if used.x > free.x && used.x < free.right() {
        out.push(Rect::new(free.x, free.y, used.x - free.x, free.height));
    }
    // right
    if used.right() < free.right() {
        out.push(Rect::new(
            used.right(),
            free.y,
            free.right() - used.right(),
            free.height,
        ));
    }
}
