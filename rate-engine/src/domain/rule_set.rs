use serde::{Deserialize, Serialize};

use crate::window;

pub const MINUTES_PER_DAY: u16 = 1440;

/// Which local weekdays a window applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayFilter {
    All,
    Weekdays,
    Weekends,
}

impl DayFilter {
    /// `weekday` counts from Sunday = 0.
    pub fn admits(self, weekday: u8) -> bool {
        let weekend = weekday == 0 || weekday == 6;
        match self {
            Self::All => true,
            Self::Weekdays => !weekend,
            Self::Weekends => weekend,
        }
    }
}

/// A local time-of-day interval carrying one rate or intensity.
///
/// `end_minute < start_minute` means the window wraps past midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(rename = "start", with = "hhmm")]
    pub start_minute: u16,
    #[serde(rename = "end", with = "hhmm")]
    pub end_minute: u16,
    #[serde(rename = "days", default = "default_day_filter")]
    pub day_filter: DayFilter,
    pub value: f64,
    pub label: String,
}

fn default_day_filter() -> DayFilter {
    DayFilter::All
}

impl TimeWindow {
    pub fn new(start_minute: u16, end_minute: u16, day_filter: DayFilter, value: f64, label: impl Into<String>) -> Self {
        Self {
            start_minute,
            end_minute,
            day_filter,
            value,
            label: label.into(),
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start_minute > self.end_minute
    }

    /// Half-open containment test on the local minute of day.
    pub fn contains(&self, minute: u16) -> bool {
        if self.wraps_midnight() {
            minute >= self.start_minute || minute < self.end_minute
        } else {
            self.start_minute <= minute && minute < self.end_minute
        }
    }
}

/// A tariff or carbon profile: ordered windows, first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: String,
    pub name: String,
    pub windows: Vec<TimeWindow>,
    /// Flat per-day figure. Exposed, never prorated.
    #[serde(default)]
    pub daily_charge: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayClass {
    Weekday,
    Weekend,
}

impl DayClass {
    fn representative(self) -> u8 {
        match self {
            Self::Weekday => 1,
            Self::Weekend => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    Degenerate { index: usize, label: String },
    OutOfRange { index: usize, label: String },
    /// Minutes `[from, to)` on `day_class` days are matched by no window.
    CoverageGap { day_class: DayClass, from: u16, to: u16 },
}

impl RuleSet {
    /// Reports problems the matcher would otherwise hide behind its fallback.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (index, w) in self.windows.iter().enumerate() {
            if w.start_minute >= MINUTES_PER_DAY || w.end_minute > MINUTES_PER_DAY {
                issues.push(ValidationIssue::OutOfRange { index, label: w.label.clone() });
            } else if w.start_minute == w.end_minute {
                issues.push(ValidationIssue::Degenerate { index, label: w.label.clone() });
            }
        }

        for day_class in [DayClass::Weekday, DayClass::Weekend] {
            let weekday = day_class.representative();
            let mut gap_start: Option<u16> = None;
            for minute in 0..MINUTES_PER_DAY {
                let covered = window::first_match(minute, weekday, &self.windows).is_some();
                match (covered, gap_start) {
                    (false, None) => gap_start = Some(minute),
                    (true, Some(from)) => {
                        issues.push(ValidationIssue::CoverageGap { day_class, from, to: minute });
                        gap_start = None;
                    }
                    _ => {}
                }
            }
            if let Some(from) = gap_start {
                issues.push(ValidationIssue::CoverageGap { day_class, from, to: MINUTES_PER_DAY });
            }
        }

        issues
    }
}

/// `"HH:MM"` (de)serialization for minute-of-day fields; `"24:00"` is accepted as an end.
mod hhmm {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::MINUTES_PER_DAY;

    pub fn serialize<S: Serializer>(minute: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:02}:{:02}", minute / 60, minute % 60))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| de::Error::custom(format!("invalid time of day '{s}', expected HH:MM")))
    }

    pub(super) fn parse(s: &str) -> Option<u16> {
        let (h, m) = s.trim().split_once(':')?;
        let h: u16 = h.parse().ok()?;
        let m: u16 = m.parse().ok()?;
        if m >= 60 {
            return None;
        }
        let minute = h.checked_mul(60)?.checked_add(m)?;
        (minute <= MINUTES_PER_DAY).then_some(minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_filter_matches_weekday_classes() {
        for weekday in 0..7u8 {
            let weekend = weekday == 0 || weekday == 6;
            assert!(DayFilter::All.admits(weekday));
            assert_eq!(DayFilter::Weekends.admits(weekday), weekend, "weekday {weekday}");
            assert_eq!(DayFilter::Weekdays.admits(weekday), !weekend, "weekday {weekday}");
        }
    }

    #[test]
    fn plain_window_is_half_open() {
        let w = TimeWindow::new(420, 1140, DayFilter::All, 0.28, "Peak");
        assert!(w.contains(420));
        assert!(w.contains(1139));
        assert!(!w.contains(1140));
        assert!(!w.contains(419));
    }

    #[test]
    fn wrapping_window_spans_midnight() {
        let w = TimeWindow::new(1320, 420, DayFilter::All, 0.18, "Off-peak");
        assert!(w.contains(1320));
        assert!(w.contains(0));
        assert!(w.contains(419));
        assert!(!w.contains(420));
        assert!(!w.contains(700));
    }

    #[test]
    fn hhmm_parses_and_bounds_check() {
        assert_eq!(hhmm::parse("07:00"), Some(420));
        assert_eq!(hhmm::parse("24:00"), Some(1440));
        assert_eq!(hhmm::parse("24:01"), None);
        assert_eq!(hhmm::parse("12:60"), None);
        assert_eq!(hhmm::parse("noon"), None);
    }

    #[test]
    fn validate_reports_gaps_and_degenerate_windows() {
        let rs = RuleSet {
            id: "t".to_string(),
            name: "t".to_string(),
            windows: vec![
                TimeWindow::new(0, 720, DayFilter::All, 1.0, "Morning"),
                TimeWindow::new(720, 1440, DayFilter::Weekdays, 2.0, "Afternoon (WD)"),
                TimeWindow::new(600, 600, DayFilter::All, 3.0, "Empty"),
            ],
            daily_charge: None,
        };

        let issues = rs.validate();
        assert!(issues.contains(&ValidationIssue::Degenerate { index: 2, label: "Empty".to_string() }));
        assert!(issues.contains(&ValidationIssue::CoverageGap { day_class: DayClass::Weekend, from: 720, to: 1440 }));
        assert!(!issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::CoverageGap { day_class: DayClass::Weekday, .. })));
    }

    #[test]
    fn window_deserializes_from_hhmm_strings() {
        let w: TimeWindow = parse_window(r#"{"start":"22:00","end":"07:00","days":"weekends","value":0.18,"label":"Off-peak"}"#);
        assert_eq!(w.start_minute, 1320);
        assert_eq!(w.end_minute, 420);
        assert_eq!(w.day_filter, DayFilter::Weekends);
        assert!(w.wraps_midnight());
    }

    fn parse_window(json: &str) -> TimeWindow {
        serde_json::from_str(json).unwrap()
    }
}
