//! Multi-dimensional shapes, boxes and linearisation.
//!
//! Boxes describe axis-aligned hyper-rectangles by per-dimension start and
//! count. They express both a stored block's extent and a caller selection.

use smallvec::SmallVec;

/// Per-dimension sizes or coordinates. Inline storage covers the common
/// case of up to four dimensions.
pub type Dims = SmallVec<[usize; 4]>;

/// Array orientation established by the process-group index.
///
/// Computed once per metadata parse and passed by value into every
/// resolve and clip call afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutState {
    /// Data in the file is laid out with the last dimension fastest.
    pub row_major: bool,
    /// File and host disagree on orientation, so dimension order flips.
    pub reverse_dimensions: bool,
}

impl LayoutState {
    /// Layout of a file written in `row_major` order and read by a host
    /// expecting `host_row_major` order.
    pub const fn new(row_major: bool, host_row_major: bool) -> Self {
        Self { row_major, reverse_dimensions: row_major != host_row_major }
    }

    /// Translate dimensions given in host order into file order.
    pub fn to_file_order(&self, dims: &[usize]) -> Dims {
        if self.reverse_dimensions {
            dims.iter().rev().copied().collect()
        } else {
            Dims::from_slice(dims)
        }
    }
}

impl Default for LayoutState {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// Product of all dimensions; 1 for rank 0.
#[inline]
pub fn volume(dims: &[usize]) -> usize {
    dims.iter().product()
}

/// Axis-aligned hyper-rectangle: `start[i] .. start[i] + count[i]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoxDims {
    pub start: Dims,
    pub count: Dims,
}

impl BoxDims {
    /// Create a box, panicking in debug builds if ranks differ.
    pub fn new(start: impl Into<Dims>, count: impl Into<Dims>) -> Self {
        let (start, count) = (start.into(), count.into());
        debug_assert_eq!(start.len(), count.len());
        Self { start, count }
    }

    /// Box anchored at the origin.
    pub fn from_count(count: &[usize]) -> Self {
        Self { start: smallvec::smallvec![0; count.len()], count: Dims::from_slice(count) }
    }

    /// Rank-0 box (a single value).
    pub fn scalar() -> Self {
        Self::default()
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.start.len()
    }

    /// Number of elements covered.
    #[inline]
    pub fn volume(&self) -> usize {
        volume(&self.count)
    }

    /// Number of elements covered, `None` if it overflows `usize`.
    pub fn checked_volume(&self) -> Option<usize> {
        self.count.iter().try_fold(1usize, |acc, &c| acc.checked_mul(c))
    }

    /// Exclusive end coordinate per dimension, `None` if any overflows.
    pub fn checked_end(&self) -> Option<Dims> {
        self.start.iter().zip(&self.count).map(|(s, c)| s.checked_add(*c)).collect()
    }

    /// True if every end coordinate and the volume fit in `usize`.
    pub fn is_addressable(&self) -> bool {
        self.checked_end().is_some() && self.checked_volume().is_some()
    }

    /// Overlap of two boxes of equal rank, `None` if they are disjoint or the
    /// ranks differ. Two rank-0 boxes intersect in the rank-0 box.
    pub fn intersection(&self, other: &BoxDims) -> Option<BoxDims> {
        if self.rank() != other.rank() {
            return None;
        }

        let mut start = Dims::with_capacity(self.rank());
        let mut count = Dims::with_capacity(self.rank());
        for d in 0..self.rank() {
            let lo = self.start[d].max(other.start[d]);
            let hi = self.start[d]
                .saturating_add(self.count[d])
                .min(other.start[d].saturating_add(other.count[d]));
            if hi <= lo {
                return None;
            }
            start.push(lo);
            count.push(hi - lo);
        }
        Some(BoxDims { start, count })
    }

    /// True if `inner` lies entirely within this box. False when either
    /// box has an end coordinate past `usize::MAX`.
    pub fn contains(&self, inner: &BoxDims) -> bool {
        let (Some(outer_end), Some(inner_end)) = (self.checked_end(), inner.checked_end()) else {
            return false;
        };
        self.rank() == inner.rank()
            && (0..self.rank()).all(|d| inner.start[d] >= self.start[d] && inner_end[d] <= outer_end[d])
    }

    /// Same box with dimension order flipped.
    pub fn reversed(&self) -> BoxDims {
        BoxDims {
            start: self.start.iter().rev().copied().collect(),
            count: self.count.iter().rev().copied().collect(),
        }
    }
}

/// Linear element index of `point` inside the box `start`/`count`.
///
/// Row-major makes the last dimension fastest, column-major the first.
pub fn linear_index(start: &[usize], count: &[usize], point: &[usize], row_major: bool) -> usize {
    let mut index = 0;
    let mut stride = 1;
    let mut step = |d: usize| {
        index += (point[d] - start[d]) * stride;
        stride *= count[d];
    };
    if row_major {
        (0..point.len()).rev().for_each(&mut step);
    } else {
        (0..point.len()).for_each(&mut step);
    }
    index
}

/// Half-open element interval inside `block` spanning the first through the
/// last element of `intersection` in the block's linear order.
pub fn linear_interval(block: &BoxDims, intersection: &BoxDims, row_major: bool) -> (usize, usize) {
    if intersection.rank() == 0 {
        return (0, 1);
    }
    let last: Dims = intersection
        .start
        .iter()
        .zip(&intersection.count)
        .map(|(s, c)| s + c - 1)
        .collect();
    let first = linear_index(&block.start, &block.count, &intersection.start, row_major);
    let end = linear_index(&block.start, &block.count, &last, row_major) + 1;
    (first, end)
}
