use serde::Serialize;
use std::cmp::Ordering;

/// Total order over acquisition ids
///
/// All-digit ids compare numerically and sort before any other id; the rest
/// compare lexicographically. Numeric ties ("007" vs "7") fall back to the
/// lexicographic order so the ordering stays total.
pub fn compare_acquisitions(a: &str, b: &str) -> Ordering {
    fn is_numeric(id: &str) -> bool {
        !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
    }

    match (is_numeric(a), is_numeric(b)) {
        (true, true) => {
            let (ta, tb) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
            ta.len()
                .cmp(&tb.len())
                .then_with(|| ta.cmp(tb))
                .then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

/// Sort and deduplicate acquisition ids in place
pub fn sort_acquisitions<S: AsRef<str>>(ids: &mut Vec<S>) {
    ids.sort_by(|a, b| compare_acquisitions(a.as_ref(), b.as_ref()));
    ids.dedup_by(|a, b| (*a).as_ref() == (*b).as_ref());
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: u32,
    pub per_page: u32,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
}

impl PageInfo {
    /// Page info for an empty result
    pub fn empty(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            has_more: false,
            total: Some(0),
            total_pages: Some(0),
        }
    }
}

/// One page of an ordered sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub info: PageInfo,
}

/// Slice `ordered` to the requested page
///
/// Pages past the end are empty with `has_more = false`.
pub fn paginate<T: Clone>(ordered: &[T], page: u32, per_page: u32) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let total = ordered.len() as u64;

    let start = (page as u64 - 1) * per_page as u64;
    let end = (start + per_page as u64).min(total);

    let items = if start < total {
        ordered[start as usize..end as usize].to_vec()
    } else {
        Vec::new()
    };

    Page {
        items,
        info: PageInfo {
            page,
            per_page,
            has_more: (page as u64) * (per_page as u64) < total,
            total: Some(total),
            total_pages: Some(total.div_ceil(per_page as u64)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_page() {
        let ids = vec!["A", "B", "C"];
        let page = paginate(&ids, 2, 1);

        assert_eq!(page.items, vec!["B"]);
        assert!(page.info.has_more);
        assert_eq!(page.info.total, Some(3));
        assert_eq!(page.info.total_pages, Some(3));
    }

    #[test]
    fn test_last_page_partial() {
        let ids: Vec<u32> = (0..7).collect();
        let page = paginate(&ids, 3, 3);

        assert_eq!(page.items, vec![6]);
        assert!(!page.info.has_more);
        assert_eq!(page.info.total_pages, Some(3));
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let ids = vec!["A", "B"];
        let page = paginate(&ids, 9, 10);

        assert!(page.items.is_empty());
        assert!(!page.info.has_more);
        assert_eq!(page.info.total, Some(2));
    }

    #[test]
    fn test_repeated_request_identical() {
        let ids: Vec<u32> = (0..25).collect();
        assert_eq!(paginate(&ids, 2, 10), paginate(&ids, 2, 10));
    }

    #[test]
    fn test_numeric_ids_sort_numerically() {
        let mut ids = vec!["10", "9", "abc", "100", "2", "Abc", "09"];
        sort_acquisitions(&mut ids);

        assert_eq!(ids, vec!["2", "09", "9", "10", "100", "Abc", "abc"]);
    }

    #[test]
    fn test_sort_dedups() {
        let mut ids = vec!["3".to_string(), "1".to_string(), "3".to_string()];
        sort_acquisitions(&mut ids);

        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_empty_page_info_serialization() {
        let json = serde_json::to_value(PageInfo::empty(1, 50)).unwrap();
        assert_eq!(json["total"], 0);
        assert_eq!(json["has_more"], false);
    }
}
