use crate::country::Country;
use crate::domain::Metric;
use crate::table::{format_decimal, group_thousands};

pub const CHART_SIZE: usize = 10;
pub const CHART_HEADING: &str = "Country Statistics";

#[derive(Debug, Clone, PartialEq)]
pub struct ChartEntry {
    pub label: String,
    pub value: u64,
    pub text: String,
}

pub fn metric_value(country: &Country, metric: Metric) -> f64 {
    match metric {
        Metric::Population => country.population as f64,
        Metric::Area => country.area,
    }
}

/// The `CHART_SIZE` largest countries by `metric`, largest first.
pub fn top_countries<'a>(
    countries: impl IntoIterator<Item = &'a Country>,
    metric: Metric,
) -> Vec<&'a Country> {
    let mut ranked: Vec<&Country> = countries.into_iter().collect();
    ranked.sort_unstable_by(|a, b| metric_value(b, metric).total_cmp(&metric_value(a, metric)));
    ranked.truncate(CHART_SIZE);
    ranked
}

pub fn chart_entries<'a>(
    countries: impl IntoIterator<Item = &'a Country>,
    metric: Metric,
) -> Vec<ChartEntry> {
    top_countries(countries, metric)
        .into_iter()
        .map(|c| {
            let value = metric_value(c, metric);
            ChartEntry {
                label: c.display_name.clone(),
                value: value.round() as u64,
                text: format_value(metric, value),
            }
        })
        .collect()
}

/// Compact magnitude with unit suffix.
pub fn format_value(metric: Metric, value: f64) -> String {
    match metric {
        Metric::Population => {
            if value >= 1e9 {
                format!("{:.1}B", value / 1e9)
            } else if value >= 1e6 {
                format!("{:.1}M", value / 1e6)
            } else if value >= 1e3 {
                format!("{:.1}K", value / 1e3)
            } else {
                group_thousands(value.round() as u64)
            }
        }
        Metric::Area => {
            if value >= 1e6 {
                format!("{:.2}M km²", value / 1e6)
            } else if value >= 1e3 {
                format!("{:.2}K km²", value / 1e3)
            } else {
                format!("{} km²", format_decimal(value))
            }
        }
    }
}

pub fn chart_title(metric: Metric) -> String {
    format!("Top {CHART_SIZE} Countries by {}", metric.name())
}

pub fn dataset_label(metric: Metric) -> &'static str {
    match metric {
        Metric::Population => "Population",
        Metric::Area => "Area (km²)",
    }
}
