use serde::Serialize;
use std::collections::BTreeMap;

use crate::api::AgriRecord;

pub const PRODUCTION_CHART_ID: &str = "productionChart";
pub const PRICE_CHART_ID: &str = "priceChart";

/// Something the registry can re-flow and tear down.
pub trait ChartHandle: Send {
    fn resize(&mut self, width: usize);
    fn destroy(&mut self);
}

/// Registry of live charts keyed by element id.
#[derive(Debug)]
pub struct ChartRegistry<H: ChartHandle> {
    charts: BTreeMap<String, H>,
}

impl<H: ChartHandle> Default for ChartRegistry<H> {
    fn default() -> Self {
        Self {
            charts: BTreeMap::new(),
        }
    }
}

impl<H: ChartHandle> ChartRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `id`. A chart already holding that id is
    /// destroyed first so ids stay unique.
    pub fn register(&mut self, id: impl Into<String>, handle: H) {
        if let Some(mut previous) = self.charts.insert(id.into(), handle) {
            previous.destroy();
        }
    }

    pub fn get(&self, id: &str) -> Option<&H> {
        self.charts.get(id)
    }

    /// Destroy and forget one chart. Absent ids are ignored.
    pub fn destroy(&mut self, id: &str) -> bool {
        match self.charts.remove(id) {
            Some(mut chart) => {
                chart.destroy();
                true
            }
            None => false,
        }
    }

    pub fn destroy_all(&mut self) {
        for (_, mut chart) in std::mem::take(&mut self.charts) {
            chart.destroy();
        }
    }

    pub fn resize_all(&mut self, width: usize) {
        for chart in self.charts.values_mut() {
            chart.resize(width);
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.charts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &H)> {
        self.charts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}

/// Exported series data of a chart.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChartSeries {
    pub id: String,
    pub title: String,
    pub unit: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Horizontal bar chart drawn with block characters.
#[derive(Debug, Clone)]
pub struct BarChart {
    series: ChartSeries,
    width: usize,
    destroyed: bool,
}

impl BarChart {
    pub fn new(series: ChartSeries, width: usize) -> Self {
        Self {
            series,
            width,
            destroyed: false,
        }
    }

    pub fn series(&self) -> &ChartSeries {
        &self.series
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// One line per label: padded label, bar scaled to the chart width, value.
    pub fn render_lines(&self) -> Vec<String> {
        if self.destroyed {
            return Vec::new();
        }
        let label_width = self
            .series
            .labels
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0);
        let max = self.series.values.iter().cloned().fold(0.0_f64, f64::max);

        self.series
            .labels
            .iter()
            .zip(&self.series.values)
            .map(|(label, value)| {
                let bar_len = if max > 0.0 {
                    ((value / max) * self.width as f64).round() as usize
                } else {
                    0
                };
                format!(
                    "{:<lw$} {} {:.1} {}",
                    label,
                    "█".repeat(bar_len),
                    value,
                    self.series.unit,
                    lw = label_width
                )
            })
            .collect()
    }
}

impl ChartHandle for BarChart {
    fn resize(&mut self, width: usize) {
        self.width = width;
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }
}

/// Total `tonnes` per crop.
pub fn production_series(records: &[AgriRecord]) -> ChartSeries {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for (crop, value) in records
        .iter()
        .filter(|r| r.is_production())
        .filter_map(AgriRecord::crop_value)
    {
        *totals.entry(crop).or_default() += value;
    }
    ChartSeries {
        id: PRODUCTION_CHART_ID.to_string(),
        title: "Production by crop".to_string(),
        unit: "tonnes".to_string(),
        labels: totals.keys().map(|k| k.to_string()).collect(),
        values: totals.values().cloned().collect(),
    }
}

/// Mean market price per crop, over every `KES*` row.
pub fn price_series(records: &[AgriRecord]) -> ChartSeries {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (crop, value) in records
        .iter()
        .filter(|r| r.is_price())
        .filter_map(AgriRecord::crop_value)
    {
        let slot = sums.entry(crop).or_default();
        slot.0 += value;
        slot.1 += 1;
    }
    ChartSeries {
        id: PRICE_CHART_ID.to_string(),
        title: "Average price by crop".to_string(),
        unit: "KES".to_string(),
        labels: sums.keys().map(|k| k.to_string()).collect(),
        values: sums.values().map(|(sum, n)| sum / *n as f64).collect(),
    }
}
