//! Strided copy of a block/selection overlap into caller memory.
//!
//! Source and destination are both dense arrays. The source covers one
//! stored block, the destination covers the caller's selection. Only the
//! elements inside the intersection are touched.

use super::operator::BlockOperationInfo;
use crate::util::{linear_index, linear_interval, BoxDims, DataKind, Dims, Element, Error, LayoutState, Result};

/// Byte layout of one element for clipping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementSpec {
    /// Bytes per element.
    pub size: usize,
    /// Width of each unit to byte-swap, `None` to copy verbatim.
    pub swap_width: Option<usize>,
}

impl ElementSpec {
    /// Verbatim copy of `size`-byte elements.
    pub const fn plain(size: usize) -> Self {
        Self { size, swap_width: None }
    }

    /// Element layout of a fixed-size kind, swapping when `swap` is set.
    /// `None` for kinds without a fixed element size.
    pub fn for_kind(kind: DataKind, swap: bool) -> Option<Self> {
        let size = kind.element_size()?;
        Some(Self { size, swap_width: if swap { kind.swap_width() } else { None } })
    }

    /// Element layout of the pre-transform elements of a decoded block.
    pub fn for_operation(info: &BlockOperationInfo, swap: bool) -> Self {
        Self {
            size: info.pre_size_of,
            swap_width: if swap { info.pre_kind.swap_width() } else { None },
        }
    }
}

/// Copy the `intersection` of a stored block into `dest`.
///
/// `block_box` and `intersection` are in file order. `dest_box` is in host
/// order and flipped here when the layout reverses dimensions. `src` holds
/// the whole block and `dest` the whole destination box, both dense in the
/// file orientation.
pub fn clip_contiguous_memory(
    dest: &mut [u8],
    dest_box: &BoxDims,
    src: &[u8],
    block_box: &BoxDims,
    intersection: &BoxDims,
    layout: LayoutState,
    element: ElementSpec,
) -> Result<()> {
    let len = block_box
        .checked_volume()
        .ok_or_else(|| Error::selection(format!("block {block_box:?} is too large to address")))?;
    clip_strided(dest, dest_box, src, 0, len, block_box, intersection, layout, element)
}

/// Like [`clip_contiguous_memory`], but `src` holds only the elements of
/// the block's linear interval over `intersection`, which is what a
/// subfile read of an untransformed block fetches.
pub fn clip_interval(
    dest: &mut [u8],
    dest_box: &BoxDims,
    src: &[u8],
    block_box: &BoxDims,
    intersection: &BoxDims,
    layout: LayoutState,
    element: ElementSpec,
) -> Result<()> {
    if !block_box.contains(intersection) {
        return Err(Error::selection(format!(
            "intersection {intersection:?} lies outside block {block_box:?}"
        )));
    }
    let (first, end) = linear_interval(block_box, intersection, layout.row_major);
    clip_strided(dest, dest_box, src, first, end - first, block_box, intersection, layout, element)
}

/// `src` holds `src_len` elements starting at block element `src_first`.
#[allow(clippy::too_many_arguments)]
fn clip_strided(
    dest: &mut [u8],
    dest_box: &BoxDims,
    src: &[u8],
    src_first: usize,
    src_len: usize,
    block_box: &BoxDims,
    intersection: &BoxDims,
    layout: LayoutState,
    element: ElementSpec,
) -> Result<()> {
    let dest_box = if layout.reverse_dimensions { dest_box.reversed() } else { dest_box.clone() };
    let size = element.size;

    if !block_box.contains(intersection) {
        return Err(Error::selection(format!(
            "intersection {intersection:?} lies outside block {block_box:?}"
        )));
    }
    if !dest_box.contains(intersection) {
        return Err(Error::selection(format!(
            "intersection {intersection:?} lies outside destination {dest_box:?}"
        )));
    }

    let src_bytes = src_len
        .checked_mul(size)
        .ok_or_else(|| Error::selection(format!("block {block_box:?} is too large to address")))?;
    if src.len() < src_bytes {
        return Err(Error::TruncatedBuffer { position: 0, needed: src_bytes, len: src.len() });
    }
    let dest_bytes = dest_box
        .checked_volume()
        .and_then(|n| n.checked_mul(size))
        .ok_or_else(|| Error::selection(format!("destination {dest_box:?} is too large to address")))?;
    if dest.len() < dest_bytes {
        return Err(Error::selection(format!(
            "destination holds {} bytes, selection needs {dest_bytes}",
            dest.len()
        )));
    }

    let rank = intersection.rank();
    if rank == 0 {
        copy_run(&mut dest[..size], &src[..size], element);
        return Ok(());
    }

    let row_major = layout.row_major;
    let fast = if row_major { rank - 1 } else { 0 };
    let run = intersection.count[fast] * size;
    let outer: Dims = if row_major { (0..fast).rev().collect() } else { (1..rank).collect() };

    let mut point = intersection.start.clone();
    loop {
        let s = (linear_index(&block_box.start, &block_box.count, &point, row_major) - src_first) * size;
        let d = linear_index(&dest_box.start, &dest_box.count, &point, row_major) * size;
        copy_run(&mut dest[d..d + run], &src[s..s + run], element);

        if !advance(&mut point, intersection, &outer) {
            break;
        }
    }
    Ok(())
}

/// Odometer step over the non-contiguous axes. False once every run is done.
fn advance(point: &mut Dims, bounds: &BoxDims, axes: &[usize]) -> bool {
    for &axis in axes {
        point[axis] += 1;
        if point[axis] < bounds.start[axis] + bounds.count[axis] {
            return true;
        }
        point[axis] = bounds.start[axis];
    }
    false
}

fn copy_run(dest: &mut [u8], src: &[u8], element: ElementSpec) {
    dest.copy_from_slice(src);
    if let Some(width) = element.swap_width.filter(|&w| w > 1) {
        for unit in dest.chunks_exact_mut(width) {
            unit.reverse();
        }
    }
}

/// Typed front end to [`clip_contiguous_memory`].
pub fn clip_typed<T: Element>(
    dest: &mut [T],
    dest_box: &BoxDims,
    src: &[T],
    block_box: &BoxDims,
    intersection: &BoxDims,
    layout: LayoutState,
    swap: bool,
) -> Result<()> {
    let element = ElementSpec { size: T::SIZE, swap_width: if swap { T::KIND.swap_width() } else { None } };
    clip_contiguous_memory(
        bytemuck::cast_slice_mut(dest),
        dest_box,
        bytemuck::cast_slice(src),
        block_box,
        intersection,
        layout,
        element,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(start: &[usize], count: &[usize]) -> BoxDims {
        BoxDims::new(Dims::from_slice(start), Dims::from_slice(count))
    }

    #[test]
    fn test_row_major_interior() {
        let block = boxed(&[0, 0], &[4, 4]);
        let inter = boxed(&[1, 1], &[2, 2]);
        let src: Vec<u8> = (100..116).collect();
        let mut dest = vec![0u8; 16];

        clip_contiguous_memory(&mut dest, &block, &src, &block, &inter, LayoutState::default(), ElementSpec::plain(1))
            .unwrap();

        for (i, &b) in dest.iter().enumerate() {
            if [5, 6, 9, 10].contains(&i) {
                assert_eq!(b, src[i], "offset {i}");
            } else {
                assert_eq!(b, 0, "offset {i} must be untouched");
            }
        }
    }

    #[test]
    fn test_column_major_runs() {
        // File is column-major and the host agrees, so no reversal
        let layout = LayoutState::new(false, false);
        let block = boxed(&[0, 0], &[3, 2]);
        let inter = boxed(&[1, 0], &[2, 2]);
        let src: Vec<u16> = (0..6).collect();
        let mut dest = vec![u16::MAX; 4];

        clip_typed(&mut dest, &inter, &src, &block, &inter, layout, false).unwrap();
        // Column-major: element (r, c) at r + 3c in the block, r - 1 + 2c in dest
        assert_eq!(dest, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_reversed_destination() {
        // Column-major file read by a row-major host: dest box arrives
        // in host order and is flipped before copying
        let layout = LayoutState::new(false, true);
        let block = boxed(&[0, 0], &[2, 3]);
        let src: Vec<i32> = (0..6).collect();
        let mut dest = vec![-1i32; 6];
        let host_box = boxed(&[0, 0], &[3, 2]);

        clip_typed(&mut dest, &host_box, &src, &block, &block, layout, false).unwrap();
        assert_eq!(dest, src);
    }

    #[test]
    fn test_destination_offset() {
        let block = boxed(&[4], &[4]);
        let dest_box = boxed(&[2], &[6]);
        let inter = block.intersection(&dest_box).unwrap();
        let src = [1.0f64, 2.0, 3.0, 4.0];
        let mut dest = [0.0f64; 6];
        clip_typed(&mut dest, &dest_box, &src, &block, &inter, LayoutState::default(), false).unwrap();
        assert_eq!(dest, [0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_byte_swap() {
        let block = boxed(&[0], &[2]);
        let src = [0x0102u16.to_be(), 0x0304u16.to_be()];
        let mut dest = [0u16; 2];
        clip_typed(&mut dest, &block, &src, &block, &block, LayoutState::default(), true).unwrap();
        assert_eq!(dest, [0x0102u16.to_be().swap_bytes(), 0x0304u16.to_be().swap_bytes()]);

        let spec = ElementSpec::for_kind(DataKind::ComplexFloat64, true).unwrap();
        assert_eq!(spec, ElementSpec { size: 16, swap_width: Some(8) });
        assert!(ElementSpec::for_kind(DataKind::String, false).is_none());
    }

    #[test]
    fn test_interval_source() {
        let block = boxed(&[0, 0], &[4, 4]);
        let inter = boxed(&[1, 1], &[2, 2]);
        // Elements 5 .. 11 of the block, as fetched from the subfile
        let fetched: Vec<u8> = (105..111).collect();
        let mut dest = [0u8; 4];
        clip_interval(&mut dest, &inter, &fetched, &block, &inter, LayoutState::default(), ElementSpec::plain(1)).unwrap();
        assert_eq!(dest, [105, 106, 109, 110]);

        let err = clip_interval(&mut dest, &inter, &fetched[..5], &block, &inter, LayoutState::default(), ElementSpec::plain(1))
            .unwrap_err();
        assert!(matches!(err, Error::TruncatedBuffer { needed: 6, .. }));
    }

    #[test]
    fn test_scalar_copy() {
        let mut dest = [0u8; 4];
        let scalar = BoxDims::scalar();
        clip_contiguous_memory(&mut dest, &scalar, &[9, 8, 7, 6], &scalar, &scalar, LayoutState::default(), ElementSpec::plain(4))
            .unwrap();
        assert_eq!(dest, [9, 8, 7, 6]);
    }

    #[test]
    fn test_bounds_checks() {
        let block = boxed(&[0, 0], &[2, 2]);
        let outside = boxed(&[1, 1], &[2, 2]);
        let mut dest = [0u8; 16];
        let err = clip_contiguous_memory(&mut dest, &boxed(&[0, 0], &[4, 4]), &[0; 4], &block, &outside, LayoutState::default(), ElementSpec::plain(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));

        let err = clip_contiguous_memory(&mut dest, &block, &[0; 3], &block, &block, LayoutState::default(), ElementSpec::plain(1))
            .unwrap_err();
        assert!(matches!(err, Error::TruncatedBuffer { needed: 4, len: 3, .. }));

        let err = clip_contiguous_memory(&mut dest[..2], &block, &[0; 4], &block, &block, LayoutState::default(), ElementSpec::plain(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));
    }

    #[test]
    fn test_unaddressable_block() {
        let block = boxed(&[0, 0], &[usize::MAX, 4]);
        let inter = boxed(&[0, 0], &[1, 1]);
        let mut dest = [0u8; 8];
        let err = clip_contiguous_memory(&mut dest, &inter, &[0; 8], &block, &inter, LayoutState::default(), ElementSpec::plain(8))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));

        let shifted = boxed(&[usize::MAX - 1], &[4]);
        let err = clip_interval(&mut dest, &boxed(&[0], &[1]), &[0; 8], &shifted, &boxed(&[usize::MAX - 1], &[1]), LayoutState::default(), ElementSpec::plain(8))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));
    }
}
