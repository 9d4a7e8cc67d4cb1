use crate::domain::TimeWindow;

/// Outcome of evaluating a window list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMatch<'a> {
    pub value: f64,
    pub label: &'a str,
    /// No window covered the minute; the last window's value was used.
    pub fallback: bool,
}

/// First window whose day filter and time range both admit the minute, if any.
pub fn first_match(minute_of_day: u16, weekday: u8, windows: &[TimeWindow]) -> Option<&TimeWindow> {
    windows
        .iter()
        .find(|w| w.day_filter.admits(weekday) && w.contains(minute_of_day))
}

/// First-match-wins lookup that never fails on incomplete coverage.
///
/// Returns `None` only when `windows` is empty.
pub fn match_window(minute_of_day: u16, weekday: u8, windows: &[TimeWindow]) -> Option<WindowMatch<'_>> {
    if let Some(w) = first_match(minute_of_day, weekday, windows) {
        return Some(WindowMatch {
            value: w.value,
            label: &w.label,
            fallback: false,
        });
    }

    let last = windows.last()?;
    tracing::debug!(minute_of_day, weekday, label = %last.label, "no window matched, using last window");
    Some(WindowMatch {
        value: last.value,
        label: &last.label,
        fallback: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DayFilter;

    fn tou() -> Vec<TimeWindow> {
        vec![
            TimeWindow::new(1320, 420, DayFilter::All, 0.18, "Off-peak"),
            TimeWindow::new(420, 1140, DayFilter::Weekdays, 0.28, "Peak (WD)"),
            TimeWindow::new(1140, 1320, DayFilter::Weekdays, 0.24, "Evening (WD)"),
            TimeWindow::new(420, 1320, DayFilter::Weekends, 0.22, "Day (WE)"),
        ]
    }

    #[test]
    fn non_wrapping_bounds() {
        let windows = vec![
            TimeWindow::new(420, 1140, DayFilter::All, 1.0, "inner"),
            TimeWindow::new(0, 1440, DayFilter::All, 9.0, "rest"),
        ];
        assert_eq!(match_window(420, 3, &windows).unwrap().label, "inner");
        assert_eq!(match_window(1139, 3, &windows).unwrap().label, "inner");
        assert_eq!(match_window(1140, 3, &windows).unwrap().label, "rest");
    }

    #[test]
    fn wrapping_bounds() {
        let windows = vec![
            TimeWindow::new(1320, 420, DayFilter::All, 1.0, "night"),
            TimeWindow::new(0, 1440, DayFilter::All, 9.0, "rest"),
        ];
        for (minute, expected) in [(1320, "night"), (419, "night"), (420, "rest"), (700, "rest")] {
            assert_eq!(match_window(minute, 2, &windows).unwrap().label, expected, "minute {minute}");
        }
    }

    #[test]
    fn day_filter_is_applied_before_containment() {
        let windows = tou();
        // Tuesday noon vs Saturday noon.
        assert_eq!(match_window(720, 2, &windows).unwrap().label, "Peak (WD)");
        assert_eq!(match_window(720, 6, &windows).unwrap().label, "Day (WE)");
        assert_eq!(match_window(720, 0, &windows).unwrap().value, 0.22);
    }

    #[test]
    fn first_match_wins_on_overlap() {
        let windows = vec![
            TimeWindow::new(0, 1440, DayFilter::Weekends, 0.1, "weekend flat"),
            TimeWindow::new(0, 1440, DayFilter::All, 0.3, "flat"),
        ];
        assert_eq!(match_window(600, 6, &windows).unwrap().value, 0.1);
        assert_eq!(match_window(600, 4, &windows).unwrap().value, 0.3);
    }

    #[test]
    fn uncovered_minute_falls_back_to_last_window() {
        let windows = vec![
            TimeWindow::new(0, 600, DayFilter::All, 0.1, "early"),
            TimeWindow::new(600, 1200, DayFilter::Weekdays, 0.2, "late (WD)"),
        ];
        for minute in [1200, 1300, 1439] {
            let m = match_window(minute, 3, &windows).unwrap();
            assert!(m.fallback);
            assert_eq!(m.value, 0.2);
        }
        // Weekend daytime is only covered by the fallback too.
        let m = match_window(700, 0, &windows).unwrap();
        assert!(m.fallback);
        assert_eq!(m.label, "late (WD)");
    }

    #[test]
    fn empty_list_has_no_match() {
        assert!(match_window(0, 0, &[]).is_none());
    }

    #[test]
    fn tou_tariff_covers_every_minute_on_every_day() {
        let windows = tou();
        for weekday in 0..7u8 {
            for minute in 0..1440u16 {
                assert!(first_match(minute, weekday, &windows).is_some(), "{weekday} {minute}");
            }
        }
    }
}
