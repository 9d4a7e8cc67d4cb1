pub mod meter;
pub mod reading;
pub mod rule_set;

pub use meter::{Meter, Site, Utility};
pub use reading::{DerivedRecord, Reading};
pub use rule_set::{DayClass, DayFilter, RuleSet, TimeWindow, ValidationIssue, MINUTES_PER_DAY};
