use chrono::{Duration, NaiveDateTime};

/// A run of contiguous slots booked as one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGroup {
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
}

/// Sort the requested starts and fold each one that begins exactly where the
/// running group ends into that group. Duplicate starts collapse to one slot.
pub fn merge_contiguous(starts: &[NaiveDateTime], slot_minutes: u32) -> Vec<SlotGroup> {
    let mut sorted = starts.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut groups = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return groups;
    };

    let mut current = SlotGroup {
        start: first,
        duration_minutes: slot_minutes,
    };
    for next in iter {
        if next == current.start + Duration::minutes(i64::from(current.duration_minutes)) {
            current.duration_minutes += slot_minutes;
        } else {
            groups.push(current);
            current = SlotGroup {
                start: next,
                duration_minutes: slot_minutes,
            };
        }
    }
    groups.push(current);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2031, 2, 2).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn empty_input() {
        assert!(merge_contiguous(&[], 30).is_empty());
    }

    #[test]
    fn order_does_not_matter() {
        let a = merge_contiguous(&[at(10, 30), at(10, 0)], 30);
        let b = merge_contiguous(&[at(10, 0), at(10, 30)], 30);
        assert_eq!(a, b);
        assert_eq!(
            a,
            vec![SlotGroup {
                start: at(10, 0),
                duration_minutes: 60
            }]
        );
    }

    #[test]
    fn gaps_split_groups() {
        let groups = merge_contiguous(&[at(14, 0), at(10, 0), at(10, 30), at(11, 0), at(15, 0), at(14, 30)], 30);
        assert_eq!(
            groups,
            vec![
                SlotGroup { start: at(10, 0), duration_minutes: 90 },
                SlotGroup { start: at(14, 0), duration_minutes: 90 },
            ]
        );
    }

    #[test]
    fn non_contiguous_singletons() {
        let groups = merge_contiguous(&[at(9, 0), at(12, 0)], 30);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.duration_minutes == 30));
    }

    #[test]
    fn duplicates_collapse() {
        let groups = merge_contiguous(&[at(9, 0), at(9, 0), at(9, 30)], 30);
        assert_eq!(groups, vec![SlotGroup { start: at(9, 0), duration_minutes: 60 }]);
    }
}
