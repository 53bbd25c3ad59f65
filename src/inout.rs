use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::DateTime;
use log::info;
use serde::{Deserialize, Serialize};

use crate::address;
use crate::energy::Energy;
use crate::error::{ShardError, ShardErrorKind};
use crate::timebucket::{week_start, TimeBucketer, Timed};

pub const INPUT_SUFFIX: &str = ".csv";

/// One test as found in the input CSV; written back unchanged to slice files.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MeasurementRecord {
    #[serde(rename = "server_ip_v4")]
    pub server_ip_v4: String,
    #[serde(rename = "client_ip_v4")]
    pub client_ip_v4: String,
    // Microseconds since the epoch.
    #[serde(rename = "start_time")]
    pub start_time: i64,
    #[serde(rename = "Duration")]
    pub duration: Option<f64>,
    #[serde(rename = "download_mbps")]
    pub download_mbps: Option<f64>,
    #[serde(rename = "min_rtt")]
    pub min_rtt: Option<f64>,
    #[serde(rename = "avg_rtt")]
    pub avg_rtt: Option<f64>,
    #[serde(rename = "retran_per_DataSegsOut")]
    pub retran_per_data_segs_out: Option<f64>,
    #[serde(rename = "retran_per_CongSignals")]
    pub retran_per_cong_signals: Option<f64>,
}

/// The measurement column scored for diurnal structure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Metric {
    Duration,
    DownloadMbps,
    MinRtt,
    AvgRtt,
    RetranPerDataSegsOut,
    RetranPerCongSignals,
}

impl Metric {
    pub fn select(self, rec: &MeasurementRecord) -> Option<f64> {
        let v = match self {
            Metric::Duration => rec.duration,
            Metric::DownloadMbps => rec.download_mbps,
            Metric::MinRtt => rec.min_rtt,
            Metric::AvgRtt => rec.avg_rtt,
            Metric::RetranPerDataSegsOut => rec.retran_per_data_segs_out,
            Metric::RetranPerCongSignals => rec.retran_per_cong_signals,
        };
        v.filter(|x| x.is_finite())
    }
}

impl Default for Metric {
    fn default() -> Self {
        Metric::DownloadMbps
    }
}

impl FromStr for Metric {
    type Err = ShardError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Duration" => Ok(Metric::Duration),
            "download_mbps" => Ok(Metric::DownloadMbps),
            "min_rtt" => Ok(Metric::MinRtt),
            "avg_rtt" => Ok(Metric::AvgRtt),
            "retran_per_DataSegsOut" => Ok(Metric::RetranPerDataSegsOut),
            "retran_per_CongSignals" => Ok(Metric::RetranPerCongSignals),
            _ => Err(ShardError::config(format!("unknown metric column: {}", s))),
        }
    }
}

/// A record plus the fields derived from it at load time.
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichedRow {
    pub record: MeasurementRecord,
    pub client_ip: u32,
    pub time: i64,
    pub week: i64,
    pub value: Option<f64>,
    pub bucket: usize,
}

impl EnrichedRow {
    pub fn enrich(
        record: MeasurementRecord,
        metric: Metric,
        bucketer: &TimeBucketer,
    ) -> Result<EnrichedRow, ShardError> {
        let client_ip = address::to_int(&record.client_ip_v4)?;
        let time = record.start_time.div_euclid(1_000_000);
        let value = metric.select(&record);
        Ok(EnrichedRow {
            client_ip,
            time,
            week: week_start(time),
            value,
            bucket: bucketer.label(time),
            record,
        })
    }
}

impl Timed for EnrichedRow {
    fn get_time(&self) -> i64 {
        self.time
    }
}

#[derive(Debug, Default)]
pub struct Table {
    pub rows: Vec<EnrichedRow>,
    pub rows_read: u64,
}

impl Table {
    pub fn from_csv_reader<R: io::Read>(
        reader: &mut csv::Reader<R>,
        downsample: usize,
        metric: Metric,
        bucketer: &TimeBucketer,
    ) -> Result<Table, ShardError> {
        let downsample = downsample.max(1);
        let mut table = Table::default();
        for (i, result) in reader.deserialize().enumerate() {
            let record: MeasurementRecord = result?;
            table.rows_read += 1;
            if (table.rows_read % 100_000) == 0 {
                info!("{} rows", table.rows_read);
            }
            if i % downsample != 0 {
                continue;
            }
            table.rows.push(EnrichedRow::enrich(record, metric, bucketer)?);
        }
        info!("loaded {} rows, kept {}", table.rows_read, table.rows.len());
        Ok(table)
    }

    pub fn from_file(
        input: &Path,
        downsample: usize,
        metric: Metric,
        bucketer: &TimeBucketer,
    ) -> Result<Table, ShardError> {
        let f = File::open(input)?;
        let mut csvrdr = csv::Reader::from_reader(io::BufReader::new(f));
        Table::from_csv_reader(&mut csvrdr, downsample, metric, bucketer)
    }

    /// Earliest and latest test time, in seconds.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        let min = self.rows.iter().map(|r| r.time).min()?;
        let max = self.rows.iter().map(|r| r.time).max()?;
        Some((min, max))
    }
}

/// `data/foo.csv` becomes `data/foo.slice.`; anything not ending in `.csv` is rejected.
pub fn slice_basename(input: &Path) -> Result<String, ShardError> {
    let name = input.to_string_lossy();
    match name.strip_suffix(INPUT_SUFFIX) {
        Some(stem) => Ok(format!("{}.slice.", stem)),
        None => Err(ShardError::new(
            ShardErrorKind::InputExtension,
            format!("Input file must be {}: {}", INPUT_SUFFIX, name),
        )),
    }
}

pub fn slice_path(basename: &str, tag: &str) -> PathBuf {
    PathBuf::from(format!("{}{}.csv", basename, tag))
}

pub fn showtime(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => format!("{}s", secs),
    }
}

pub fn dump_slice<'a, I>(path: &Path, rows: I) -> Result<(), ShardError>
where
    I: IntoIterator<Item = &'a EnrichedRow>,
{
    let mut writer = csv::Writer::from_path(path)?;
    let mut empty = true;
    for row in rows {
        writer.serialize(&row.record)?;
        empty = false;
    }
    if empty {
        writer.write_record(MEASUREMENT_COLUMNS.iter())?;
    }
    writer.flush()?;
    Ok(())
}

const MEASUREMENT_COLUMNS: [&str; 9] = [
    "server_ip_v4",
    "client_ip_v4",
    "start_time",
    "Duration",
    "download_mbps",
    "min_rtt",
    "avg_rtt",
    "retran_per_DataSegsOut",
    "retran_per_CongSignals",
];

#[derive(Clone, Debug, PartialEq)]
pub struct SummaryRecord {
    pub subnet: String,
    pub rank: f64,
    pub energy: Energy,
}

impl SummaryRecord {
    fn header(bucket_count: usize) -> Vec<String> {
        let mut header: Vec<String> =
            ["subnet", "nrows", "nan", "mean"].iter().map(|s| s.to_string()).collect();
        header.extend((0..bucket_count).map(|b| format!("sum24_{:02}", b)));
        header.extend(["tsig", "ratio", "nratio", "rank"].iter().map(|s| s.to_string()));
        header
    }

    fn fields(&self, bucket_count: usize) -> Vec<String> {
        let e = &self.energy;
        let mut fields =
            vec![self.subnet.clone(), e.nrows.to_string(), e.nan.to_string(), fmt_opt(e.mean)];
        fields.extend((0..bucket_count).map(|b| fmt_opt(e.sum_buckets.get(b).copied().flatten())));
        fields.push(fmt_opt(e.tsig));
        fields.push(fmt_opt(e.ratio));
        fields.push(fmt_opt(e.nratio));
        fields.push(self.rank.to_string());
        fields
    }
}

/// Write `summary` in the given order; undefined values are empty fields.
pub fn dump_summary(
    path: &Path,
    summary: &[SummaryRecord],
    bucket_count: usize,
) -> Result<(), ShardError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(SummaryRecord::header(bucket_count))?;
    for rec in summary {
        writer.write_record(rec.fields(bucket_count))?;
    }
    writer.flush()?;
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}
