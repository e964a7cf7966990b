use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::api::AgriRecord;

pub const TOTAL_RECORDS: &str = "total_records";
pub const COUNTIES_COVERED: &str = "counties_covered";
pub const CROPS_TRACKED: &str = "crops_tracked";
pub const LATEST_YEAR: &str = "latest_year";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MetricCard {
    pub id: String,
    pub label: String,
    pub value: String,
    pub unit: String,
}

impl MetricCard {
    fn new(id: &str, label: &str, value: impl ToString, unit: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            value: value.to_string(),
            unit: unit.to_string(),
        }
    }
}

/// A crop recommendation card as supplied by the host page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Recommendation {
    pub crop: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reason: String,
}

/// Everything the metric detail modal shows.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct MetricDetail {
    pub metric: MetricCard,
    pub trend: &'static str,
    pub recommendation: &'static str,
}

/// Summary cards derived from the retained records.
pub fn summarize(records: &[AgriRecord]) -> Vec<MetricCard> {
    let counties: BTreeSet<&str> = records.iter().filter_map(|r| r.county.as_deref()).collect();
    let crops: BTreeSet<&str> = records.iter().filter_map(|r| r.crop.as_deref()).collect();
    let latest_year = records
        .iter()
        .map(|r| r.year)
        .max()
        .map(|y| y.to_string())
        .unwrap_or_else(|| "-".to_string());

    vec![
        MetricCard::new(TOTAL_RECORDS, "Data records", records.len(), "records"),
        MetricCard::new(COUNTIES_COVERED, "Counties covered", counties.len(), "counties"),
        MetricCard::new(CROPS_TRACKED, "Crops tracked", crops.len(), "crops"),
        MetricCard::new(LATEST_YEAR, "Latest data year", latest_year, ""),
    ]
}

/// Static trend and advice text for a metric; not personalised.
pub fn detail_for(metric: MetricCard) -> MetricDetail {
    let (trend, recommendation) = match metric.id.as_str() {
        TOTAL_RECORDS => (
            "Record volume grows with each KilimoSTAT and KNBS import.",
            "Refresh regularly so insights reflect the latest figures.",
        ),
        COUNTIES_COVERED => (
            "Coverage is widest for the high-production counties.",
            "Compare your county with its neighbours before choosing crops.",
        ),
        CROPS_TRACKED => (
            "Staples such as maize, beans and tea dominate the series.",
            "Diversify into a second crop to spread market and weather risk.",
        ),
        LATEST_YEAR => (
            "Official statistics usually lag the current season by a year.",
            "Pair these figures with local market prices before selling.",
        ),
        _ => (
            "No trend information is available for this metric.",
            "Check with your local extension officer for guidance.",
        ),
    };
    MetricDetail {
        metric,
        trend,
        recommendation,
    }
}
