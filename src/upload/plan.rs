//! Slice planning / 分片规划

/// One planned byte range / 一个分片范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlicePlan {
    pub offset: u64,
    pub length: u64,
}

impl SlicePlan {
    /// Exclusive end offset / 结束偏移(不含)
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Split `file_size` bytes into contiguous slices of `slice_size` / 计算分片
///
/// Every slice but the last is exactly `slice_size` long; an empty file has no
/// slices.
///
/// # Panics
///
/// Panics if `slice_size` is zero; callers validate it beforehand.
pub fn plan_slices(file_size: u64, slice_size: u64) -> Vec<SlicePlan> {
    assert!(slice_size > 0, "slice_size must be positive");

    let count = file_size.div_ceil(slice_size);
    (0..count)
        .map(|i| {
            let offset = i * slice_size;
            SlicePlan {
                offset,
                length: slice_size.min(file_size - offset),
            }
        })
        .collect()
}
