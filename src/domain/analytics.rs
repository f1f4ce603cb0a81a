//! Aggregate analytics computed over the live incident set.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::{IncidentReport, IncidentType, MAX_SEVERITY, MIN_SEVERITY};

/// Number of categories reported in `top_categories`.
pub const TOP_CATEGORY_LIMIT: usize = 5;
/// Number of hotspots reported.
pub const HOTSPOT_LIMIT: usize = 5;
/// Days covered by the daily time series.
pub const TIME_SERIES_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_average_severity(avg: f64) -> Self {
        if avg >= 4.5 {
            Self::Critical
        } else if avg >= 3.5 {
            Self::High
        } else if avg >= 2.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub all: usize,
    pub today: usize,
    pub last_7_days: usize,
    pub last_30_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityCount {
    pub severity: u8,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: IncidentType,
    pub count: usize,
    /// Share of all incidents, 0-100, one decimal place.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub latitude: f64,
    pub longitude: f64,
    pub count: usize,
    pub average_severity: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub totals: Totals,
    pub average_severity: f64,
    pub severity_breakdown: Vec<SeverityCount>,
    pub category_breakdown: Vec<CategoryCount>,
    pub top_categories: Vec<CategoryCount>,
    pub daily: Vec<DailyCount>,
    pub hourly: Vec<HourlyCount>,
    pub with_media: usize,
    pub flagged_synthetic: usize,
    pub hotspots: Vec<Hotspot>,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl AnalyticsReport {
    pub fn compute<'a, I>(incidents: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a IncidentReport>,
    {
        let today = now.date_naive();
        let week_ago = now - Duration::days(7);
        let month_ago = now - Duration::days(TIME_SERIES_DAYS);
        let series_start = today - Duration::days(TIME_SERIES_DAYS - 1);

        let mut totals = Totals::default();
        let mut severity_sum = 0u64;
        let mut by_severity: BTreeMap<u8, usize> = BTreeMap::new();
        let mut by_category: HashMap<IncidentType, usize> = HashMap::new();
        let mut by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        let mut by_hour = [0usize; 24];
        let mut cells: HashMap<(i64, i64), (usize, u64)> = HashMap::new();
        let mut with_media = 0;
        let mut flagged_synthetic = 0;

        for incident in incidents {
            let ts = incident.timestamp;
            let severity = incident.severity.value();

            totals.all += 1;
            if ts.date_naive() == today {
                totals.today += 1;
            }
            if ts >= week_ago {
                totals.last_7_days += 1;
            }
            if ts >= month_ago {
                totals.last_30_days += 1;
            }

            severity_sum += u64::from(severity);
            *by_severity.entry(severity).or_default() += 1;
            *by_category.entry(incident.incident_type).or_default() += 1;

            let day = ts.date_naive();
            if day >= series_start && day <= today {
                *by_day.entry(day).or_default() += 1;
            }
            by_hour[ts.hour() as usize] += 1;

            if incident.has_media() {
                with_media += 1;
            }
            if incident.media_flagged_synthetic() {
                flagged_synthetic += 1;
            }

            if let Some(coords) = incident.coordinates {
                let cell = cells.entry(coords.grid_cell()).or_default();
                cell.0 += 1;
                cell.1 += u64::from(severity);
            }
        }

        let average_severity = if totals.all == 0 {
            0.0
        } else {
            round1(severity_sum as f64 / totals.all as f64)
        };

        let severity_breakdown = (MIN_SEVERITY..=MAX_SEVERITY)
            .map(|severity| SeverityCount {
                severity,
                count: by_severity.get(&severity).copied().unwrap_or(0),
            })
            .collect();

        let percentage = |count: usize| {
            if totals.all == 0 {
                0.0
            } else {
                round1(count as f64 * 100.0 / totals.all as f64)
            }
        };

        let category_breakdown: Vec<CategoryCount> = IncidentType::ALL
            .iter()
            .map(|category| {
                let count = by_category.get(category).copied().unwrap_or(0);
                CategoryCount {
                    category: *category,
                    count,
                    percentage: percentage(count),
                }
            })
            .collect();

        let mut top_categories: Vec<CategoryCount> = category_breakdown
            .iter()
            .filter(|c| c.count > 0)
            .cloned()
            .collect();
        // Stable sort keeps vocabulary order among ties.
        top_categories.sort_by(|a, b| b.count.cmp(&a.count));
        top_categories.truncate(TOP_CATEGORY_LIMIT);

        let daily = (0..TIME_SERIES_DAYS)
            .map(|offset| {
                let date = series_start + Duration::days(offset);
                DailyCount {
                    date,
                    count: by_day.get(&date).copied().unwrap_or(0),
                }
            })
            .collect();

        let hourly = by_hour
            .iter()
            .enumerate()
            .map(|(hour, count)| HourlyCount {
                hour: hour as u32,
                count: *count,
            })
            .collect();

        let mut hotspots: Vec<Hotspot> = cells
            .into_iter()
            .map(|((lat, lon), (count, sum))| {
                let avg = sum as f64 / count as f64;
                Hotspot {
                    latitude: lat as f64 / 100.0,
                    longitude: lon as f64 / 100.0,
                    count,
                    average_severity: round1(avg),
                    risk_level: RiskLevel::from_average_severity(avg),
                }
            })
            .collect();
        hotspots.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.average_severity.total_cmp(&a.average_severity))
                .then_with(|| a.latitude.total_cmp(&b.latitude))
                .then_with(|| a.longitude.total_cmp(&b.longitude))
        });
        hotspots.truncate(HOTSPOT_LIMIT);

        Self {
            generated_at: now,
            totals,
            average_severity,
            severity_breakdown,
            category_breakdown,
            top_categories,
            daily,
            hourly,
            with_media,
            flagged_synthetic,
            hotspots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinates, Severity};
    use chrono::TimeZone;

    fn incident(kind: IncidentType, severity: i64, ts: DateTime<Utc>, coords: Option<(f64, f64)>) -> IncidentReport {
        IncidentReport {
            incident_type: kind,
            severity: Severity::new(severity).unwrap(),
            location: "somewhere".into(),
            coordinates: coords.and_then(|(lat, lon)| Coordinates::new(lat, lon)),
            description: "desc".into(),
            language: "en".into(),
            media_hash: None,
            media_analysis: None,
            text_analysis: None,
            timestamp: ts,
        }
    }

    #[test]
    fn test_empty_set() {
        let now = Utc::now();
        let report = AnalyticsReport::compute(&[], now);
        assert_eq!(report.totals, Totals::default());
        assert_eq!(report.average_severity, 0.0);
        assert_eq!(report.daily.len(), TIME_SERIES_DAYS as usize);
        assert_eq!(report.hourly.len(), 24);
        assert!(report.top_categories.is_empty());
        assert!(report.hotspots.is_empty());
    }

    #[test]
    fn test_totals_and_breakdowns() {
        let now = Utc.with_ymd_and_hms(2024, 11, 5, 18, 0, 0).unwrap();
        let incidents = vec![
            incident(IncidentType::VoteBuying, 3, now - Duration::hours(2), None),
            incident(IncidentType::VoteBuying, 5, now - Duration::days(3), None),
            incident(IncidentType::Intimidation, 4, now - Duration::days(20), None),
            incident(IncidentType::Tampering, 2, now - Duration::days(60), None),
        ];
        let report = AnalyticsReport::compute(&incidents, now);

        assert_eq!(report.totals.all, 4);
        assert_eq!(report.totals.today, 1);
        assert_eq!(report.totals.last_7_days, 2);
        assert_eq!(report.totals.last_30_days, 3);
        assert_eq!(report.average_severity, 3.5);

        assert_eq!(report.top_categories[0].category, IncidentType::VoteBuying);
        assert_eq!(report.top_categories[0].percentage, 50.0);
        assert_eq!(report.top_categories.len(), 3);

        let daily_total: usize = report.daily.iter().map(|d| d.count).sum();
        assert_eq!(daily_total, 3);
        assert_eq!(report.daily.last().unwrap().date, now.date_naive());
        assert_eq!(report.hourly[16].count, 1);
    }

    #[test]
    fn test_hotspots_grouped_by_cell() {
        let now = Utc::now();
        let incidents = vec![
            incident(IncidentType::Intimidation, 5, now, Some((6.5244, 3.3792))),
            incident(IncidentType::Intimidation, 4, now, Some((6.5241, 3.3789))),
            incident(IncidentType::Other, 1, now, Some((9.0765, 7.3986))),
        ];
        let report = AnalyticsReport::compute(&incidents, now);
        assert_eq!(report.hotspots.len(), 2);
        assert_eq!(report.hotspots[0].count, 2);
        assert_eq!(report.hotspots[0].risk_level, RiskLevel::Critical);
        assert_eq!(report.hotspots[1].risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_average_severity(4.5), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_average_severity(3.5), RiskLevel::High);
        assert_eq!(RiskLevel::from_average_severity(2.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_average_severity(2.49), RiskLevel::Low);
    }
}
