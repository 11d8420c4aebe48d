//! Global rank arithmetic.
//!
//! Ranks are page-local: each page uses its own declared item count, falling
//! back to the configured page size when the page declares none.

/// Item count used for rank arithmetic on one page.
#[must_use]
pub const fn per_page_count(declared: u32, default_count: u32) -> u32 {
    if declared > 0 { declared } else { default_count }
}

/// 1-based rank of the result at `position` (0-based) on page `page_index` (1-based).
///
/// Returns `None` for an unresolved page index, where rank is undefined.
#[must_use]
pub fn rank(page_index: i32, position: u32, per_page_count: u32) -> Option<u64> {
    let page = u64::try_from(page_index).ok().filter(|p| *p > 0)?;
    Some(u64::from(position) + 1 + u64::from(per_page_count) * (page - 1))
}
