/**
 * ANALYTICS - Rééchantillonnage et vues tabulaires d'une journée
 *
 * RÔLE :
 * - `aggregate` : séries co-indexées (labels, eau, flamme, gaz, temp,
 *   mouvement) à la résolution brute / minute / heure / jour
 * - `summarize` : compteurs d'alertes de la journée
 * - `table_rows` : lignes par capteur, plus récentes d'abord, filtrables
 *
 * Les clés de regroupement viennent de l'horodatage du point (heure et
 * minute dans le décalage enregistré à la capture), jamais d'une chaîne
 * d'affichage.
 */

use crate::clock;
use crate::models::DataPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DAY_AVERAGE_LABEL: &str = "Day average";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Raw,
    Minute,
    Hour,
    Day,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Resolution::Raw),
            "minute" => Ok(Resolution::Minute),
            "hour" => Ok(Resolution::Hour),
            "day" => Ok(Resolution::Day),
            other => Err(format!("unknown resolution: {other}")),
        }
    }
}

/// Séries prêtes pour les graphes. Un canal vaut `None` quand aucun point
/// du groupe ne portait de valeur pour lui.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub water: Vec<Option<f64>>,
    pub flame: Vec<Option<f64>>,
    pub gas: Vec<Option<f64>>,
    pub temp: Vec<Option<f64>>,
    pub motion: Vec<Option<f64>>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn push(&mut self, label: String, values: [Option<f64>; 5]) {
        let [water, flame, gas, temp, motion] = values;
        self.labels.push(label);
        self.water.push(water);
        self.flame.push(flame);
        self.gas.push(gas);
        self.temp.push(temp);
        self.motion.push(motion);
    }
}

fn channels(p: &DataPoint) -> [Option<f64>; 5] {
    [p.water, p.flame, p.gas, p.temperature, p.motion]
}

/// Moyennes par canal, en ignorant les valeurs absentes
#[derive(Default)]
struct Accumulator {
    sums: [f64; 5],
    counts: [u32; 5],
}

impl Accumulator {
    fn add(&mut self, values: [Option<f64>; 5]) {
        for (i, value) in values.into_iter().enumerate() {
            if let Some(v) = value {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
    }

    fn means(&self) -> [Option<f64>; 5] {
        let mut out = [None; 5];
        for i in 0..5 {
            if self.counts[i] > 0 {
                out[i] = Some(self.sums[i] / f64::from(self.counts[i]));
            }
        }
        out
    }
}

fn group_key(p: &DataPoint, resolution: Resolution) -> String {
    let at = &p.timestamp;
    match resolution {
        Resolution::Raw => clock::time_label(at),
        Resolution::Minute => format!("{:02}:{:02}", at.hour(), at.minute()),
        Resolution::Hour => format!("{:02}:00", at.hour()),
        Resolution::Day => DAY_AVERAGE_LABEL.to_string(),
    }
}

pub fn aggregate(points: &[DataPoint], resolution: Resolution) -> Series {
    let mut series = Series::default();

    if resolution == Resolution::Raw {
        for p in points {
            series.push(group_key(p, resolution), channels(p));
        }
        return series;
    }

    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for p in points {
        groups.entry(group_key(p, resolution)).or_default().add(channels(p));
    }
    for (label, acc) in groups {
        series.push(label, acc.means());
    }
    series
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub samples: usize,
    pub water_alerts: usize,
    pub flame_alerts: usize,
    pub gas_alerts: usize,
    pub motion_events: usize,
}

pub fn summarize(points: &[DataPoint]) -> DailySummary {
    points.iter().fold(DailySummary::default(), |mut s, p| {
        s.samples += 1;
        s.water_alerts += usize::from(p.water_leak == Some(true));
        s.flame_alerts += usize::from(p.flame_leak == Some(true));
        s.gas_alerts += usize::from(p.gas_leak == Some(true));
        s.motion_events += usize::from(p.motion_detected());
        s
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Water,
    Flame,
    Gas,
    Temperature,
    Motion,
}

impl Channel {
    const ALL: [Channel; 5] = [
        Channel::Water,
        Channel::Flame,
        Channel::Gas,
        Channel::Temperature,
        Channel::Motion,
    ];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Water => "WATER",
            Channel::Flame => "FLAME",
            Channel::Gas => "GAS",
            Channel::Temperature => "TEMPERATURE",
            Channel::Motion => "MOTION",
        };
        f.write_str(name)
    }
}

/// Filtre de la vue tabulaire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFilter {
    #[default]
    All,
    Alerts,
    Water,
    Flame,
    Gas,
    Temperature,
    Motion,
}

impl FromStr for DataFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DataFilter::All),
            "alerts" => Ok(DataFilter::Alerts),
            "water" => Ok(DataFilter::Water),
            "flame" => Ok(DataFilter::Flame),
            "gas" => Ok(DataFilter::Gas),
            "temperature" | "temp" => Ok(DataFilter::Temperature),
            "motion" => Ok(DataFilter::Motion),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub time: String,
    pub channel: Channel,
    pub value: Option<f64>,
    pub status: &'static str,
    pub alert: bool,
}

fn row_for(p: &DataPoint, channel: Channel) -> TableRow {
    let (value, status, alert) = match channel {
        Channel::Water => {
            let leak = p.water_leak == Some(true);
            (p.water, if leak { "LEAK" } else { "Normal" }, leak)
        }
        Channel::Flame => {
            let fire = p.flame_leak == Some(true);
            (p.flame, if fire { "FIRE" } else { "Normal" }, fire)
        }
        Channel::Gas => {
            let leak = p.gas_leak == Some(true);
            (p.gas, if leak { "LEAK" } else { "Normal" }, leak)
        }
        Channel::Temperature => {
            let label = if p.fan == Some(true) { "FAN ON" } else { "Normal" };
            (p.temperature, label, false)
        }
        Channel::Motion => {
            let label = if p.motion_detected() { "Detected" } else { "No Motion" };
            (p.motion, label, p.intrusion())
        }
    };
    TableRow { time: p.time.clone(), channel, value, status, alert }
}

/// Lignes plus récentes d'abord; `Alerts` ne garde que les lignes en alerte
pub fn table_rows(points: &[DataPoint], filter: DataFilter) -> Vec<TableRow> {
    let channels: &[Channel] = match filter {
        DataFilter::All | DataFilter::Alerts => &Channel::ALL,
        DataFilter::Water => &[Channel::Water],
        DataFilter::Flame => &[Channel::Flame],
        DataFilter::Gas => &[Channel::Gas],
        DataFilter::Temperature => &[Channel::Temperature],
        DataFilter::Motion => &[Channel::Motion],
    };

    let mut rows = Vec::with_capacity(points.len() * channels.len());
    for p in points.iter().rev() {
        for channel in channels {
            let row = row_for(p, *channel);
            if filter != DataFilter::Alerts || row.alert {
                rows.push(row);
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceStatus;
    use time::macros::datetime;
    use time::OffsetDateTime;

    fn gas_point(gas: f64, at: OffsetDateTime) -> DataPoint {
        DataPoint::capture(&DeviceStatus { gas: Some(gas), ..Default::default() }, at)
    }

    fn morning() -> Vec<DataPoint> {
        vec![
            gas_point(10.0, datetime!(2026-10-19 09:00:00 UTC)),
            gas_point(20.0, datetime!(2026-10-19 09:00:30 UTC)),
            gas_point(40.0, datetime!(2026-10-19 09:05:00 UTC)),
        ]
    }

    #[test]
    fn test_minute_resolution_averages() {
        let series = aggregate(&morning(), Resolution::Minute);
        assert_eq!(series.labels, vec!["09:00", "09:05"]);
        assert_eq!(series.gas, vec![Some(15.0), Some(40.0)]);
        assert_eq!(series.water, vec![None, None]);
    }

    #[test]
    fn test_raw_is_identity() {
        let points = morning();
        let series = aggregate(&points, Resolution::Raw);
        assert_eq!(series.labels, vec!["09:00:00", "09:00:30", "09:05:00"]);
        assert_eq!(series.gas, vec![Some(10.0), Some(20.0), Some(40.0)]);
        assert_eq!(series.len(), points.len());
    }

    #[test]
    fn test_empty_input() {
        for resolution in [Resolution::Raw, Resolution::Minute, Resolution::Hour, Resolution::Day] {
            let series = aggregate(&[], resolution);
            assert!(series.is_empty());
            assert!(series.water.is_empty() && series.motion.is_empty());
        }
    }

    #[test]
    fn test_hour_and_day_groups_sorted() {
        let points = vec![
            gas_point(8.0, datetime!(2026-10-19 14:10:00 UTC)),
            gas_point(2.0, datetime!(2026-10-19 09:59:59 UTC)),
            gas_point(4.0, datetime!(2026-10-19 09:00:00 UTC)),
        ];
        let hourly = aggregate(&points, Resolution::Hour);
        assert_eq!(hourly.labels, vec!["09:00", "14:00"]);
        assert_eq!(hourly.gas, vec![Some(3.0), Some(8.0)]);

        let daily = aggregate(&points, Resolution::Day);
        assert_eq!(daily.labels, vec![DAY_AVERAGE_LABEL]);
        assert_eq!(daily.gas, vec![Some(14.0 / 3.0)]);
    }

    #[test]
    fn test_grouping_uses_recorded_offset() {
        let points = vec![gas_point(1.0, datetime!(2026-10-19 23:15:00 +02:00))];
        let series = aggregate(&points, Resolution::Hour);
        assert_eq!(series.labels, vec!["23:00"]);
    }

    #[test]
    fn test_missing_channel_values_are_skipped() {
        let mut with_water = gas_point(10.0, datetime!(2026-10-19 10:00:00 UTC));
        with_water.water = Some(6.0);
        let without = gas_point(30.0, datetime!(2026-10-19 10:00:20 UTC));
        let series = aggregate(&[with_water, without], Resolution::Minute);
        assert_eq!(series.water, vec![Some(6.0)]);
        assert_eq!(series.gas, vec![Some(20.0)]);
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("Hour".parse::<Resolution>(), Ok(Resolution::Hour));
        assert!("week".parse::<Resolution>().is_err());
    }

    fn alarm_day() -> Vec<DataPoint> {
        let quiet = DeviceStatus {
            water: Some(1.0),
            flame: Some(0.0),
            gas: Some(2.0),
            temp: Some(21.0),
            motion: Some(0.0),
            water_leak: Some(false),
            flame_leak: Some(false),
            gas_leak: Some(false),
            pir_armed: Some(true),
            fan: Some(false),
            ..Default::default()
        };
        let leak = DeviceStatus { water_leak: Some(true), ..quiet.clone() };
        let intruder = DeviceStatus { motion: Some(1.0), ..quiet.clone() };
        let motion_disarmed = DeviceStatus { motion: Some(1.0), pir_armed: Some(false), ..quiet.clone() };
        vec![
            DataPoint::capture(&quiet, datetime!(2026-10-19 08:00:00 UTC)),
            DataPoint::capture(&leak, datetime!(2026-10-19 08:01:00 UTC)),
            DataPoint::capture(&intruder, datetime!(2026-10-19 08:02:00 UTC)),
            DataPoint::capture(&motion_disarmed, datetime!(2026-10-19 08:03:00 UTC)),
        ]
    }

    #[test]
    fn test_summary_counts() {
        let summary = summarize(&alarm_day());
        assert_eq!(
            summary,
            DailySummary { samples: 4, water_alerts: 1, flame_alerts: 0, gas_alerts: 0, motion_events: 2 }
        );
    }

    #[test]
    fn test_table_rows_newest_first() {
        let rows = table_rows(&alarm_day(), DataFilter::All);
        assert_eq!(rows.len(), 4 * 5);
        assert_eq!(rows[0].time, "08:03:00");
        assert_eq!(rows[0].channel, Channel::Water);
    }

    #[test]
    fn test_table_rows_alert_filter() {
        let rows = table_rows(&alarm_day(), DataFilter::Alerts);
        let described: Vec<_> = rows.iter().map(|r| (r.time.as_str(), r.channel, r.status)).collect();
        assert_eq!(
            described,
            vec![("08:02:00", Channel::Motion, "Detected"), ("08:01:00", Channel::Water, "LEAK")]
        );
    }

    #[test]
    fn test_table_rows_single_channel() {
        let rows = table_rows(&alarm_day(), DataFilter::Motion);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].status, "Detected");
        assert!(!rows[0].alert);
        assert_eq!(rows[3].status, "No Motion");
    }
}
