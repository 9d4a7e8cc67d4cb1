use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{DayFilter, Meter, RuleSet, Site, TimeWindow, Utility},
    error::{EngineError, Result},
};

/// Immutable fixture data the engine resolves joins and rule sets against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub meters: Vec<Meter>,
    #[serde(default)]
    pub tariffs: Vec<RuleSet>,
    #[serde(default)]
    pub carbon_profiles: Vec<RuleSet>,
}

impl Catalog {
    pub fn site(&self, id: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.id == id)
    }

    pub fn meter(&self, id: &str) -> Option<&Meter> {
        self.meters.iter().find(|m| m.id == id)
    }

    /// The site a meter belongs to, if both exist.
    pub fn site_of_meter(&self, meter_id: &str) -> Option<&Site> {
        self.meter(meter_id).and_then(|m| self.site(&m.site_id))
    }

    pub fn tariff(&self, id: &str) -> Result<&RuleSet> {
        self.tariffs
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| EngineError::UnknownRuleSetId(id.to_string()))
    }

    pub fn carbon_profile(&self, id: &str) -> Result<&RuleSet> {
        self.carbon_profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| EngineError::UnknownRuleSetId(id.to_string()))
    }

    /// Meter id to (site id, utility), for joins during aggregation.
    pub fn meter_index(&self) -> BTreeMap<String, (String, Utility)> {
        self.meters
            .iter()
            .filter(|m| self.site(&m.site_id).is_some())
            .map(|m| (m.id.clone(), (m.site_id.clone(), m.utility)))
            .collect()
    }

    /// Built-in demo dataset.
    pub fn demo() -> Self {
        let h = |hour: u16| hour * 60;

        let tou_elec = RuleSet {
            id: "tou_elec_v1".to_string(),
            name: "Time of use electricity".to_string(),
            windows: vec![
                TimeWindow::new(h(22), h(7), DayFilter::All, 0.18, "Off-peak"),
                TimeWindow::new(h(7), h(19), DayFilter::Weekdays, 0.28, "Peak (WD)"),
                TimeWindow::new(h(19), h(22), DayFilter::Weekdays, 0.24, "Evening (WD)"),
                TimeWindow::new(h(7), h(22), DayFilter::Weekends, 0.22, "Day (WE)"),
            ],
            daily_charge: Some(0.45),
        };

        let flat_gas = RuleSet {
            id: "flat_gas_v1".to_string(),
            name: "Flat gas".to_string(),
            windows: vec![TimeWindow::new(0, h(24), DayFilter::All, 0.07, "Flat")],
            daily_charge: Some(0.30),
        };

        let uk_grid = RuleSet {
            id: "uk_grid_profile_v1".to_string(),
            name: "UK grid average intensity".to_string(),
            windows: vec![
                TimeWindow::new(0, h(6), DayFilter::All, 150.0, "Overnight"),
                TimeWindow::new(h(6), h(16), DayFilter::All, 200.0, "Daytime"),
                TimeWindow::new(h(16), h(20), DayFilter::All, 260.0, "Evening peak"),
                TimeWindow::new(h(20), h(24), DayFilter::All, 180.0, "Late evening"),
            ],
            daily_charge: None,
        };

        let site = |id: &str, name: &str| Site {
            id: id.to_string(),
            name: name.to_string(),
        };
        let meter = |id: &str, site_id: &str, utility: Utility, label: &str| Meter {
            id: id.to_string(),
            site_id: site_id.to_string(),
            utility,
            label: Some(label.to_string()),
        };

        Self {
            sites: vec![site("site_london", "London HQ"), site("site_leeds", "Leeds Depot")],
            meters: vec![
                meter("m1", "site_london", Utility::Electricity, "HQ main incomer"),
                meter("m2", "site_london", Utility::Gas, "HQ boiler house"),
                meter("m3", "site_leeds", Utility::Electricity, "Depot supply"),
                meter("m4", "site_leeds", Utility::Water, "Depot water"),
            ],
            tariffs: vec![tou_elec, flat_gas],
            carbon_profiles: vec![uk_grid],
        }
    }
}
