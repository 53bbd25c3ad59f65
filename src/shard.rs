use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::address::{Subnet, DEFAULT_MASK_WIDTH};
use crate::energy::EnergyScorer;
use crate::error::ShardError;
use crate::inout::{self, EnrichedRow, Metric, SummaryRecord, Table};
use crate::netblock::queue::BlockQueue;
use crate::netblock::Block;
use crate::timebucket::{TimeBucketer, DEFAULT_BUCKET_COUNT};

#[derive(Clone, Copy, Debug)]
pub struct ShardConfig {
    pub bucket_count: u32,
    pub width: u8,
    pub downsample: usize,
    pub metric: Metric,
}

impl Default for ShardConfig {
    fn default() -> Self {
        ShardConfig {
            bucket_count: DEFAULT_BUCKET_COUNT,
            width: DEFAULT_MASK_WIDTH,
            downsample: 1,
            metric: Metric::default(),
        }
    }
}

impl ShardConfig {
    pub fn validate(&self) -> Result<(), ShardError> {
        if self.width > 32 {
            return Err(ShardError::config(format!("mask width {} exceeds 32", self.width)));
        }
        if self.downsample == 0 {
            return Err(ShardError::config("downsample factor must be at least 1"));
        }
        TimeBucketer::new(self.bucket_count)?;
        Ok(())
    }

    pub fn scorer(&self) -> Result<EnergyScorer, ShardError> {
        Ok(EnergyScorer::new(TimeBucketer::new(self.bucket_count)?))
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub rows: usize,
    pub blocks: usize,
    pub test_range: Option<(i64, i64)>,
    pub summary_path: PathBuf,
}

/// Split `rows` into one block per client subnet of `width` bits, queued by rank.
///
/// Each round takes the subnet of the first remaining row, so every round removes
/// at least one row.
pub fn partition(
    rows: Vec<EnrichedRow>,
    width: u8,
    scorer: &EnergyScorer,
) -> Result<BlockQueue, ShardError> {
    let total = rows.len();
    let mut queue = BlockQueue::new();
    let mut remain = rows;
    let mut rounds: usize = 0;
    while !remain.is_empty() {
        let subnet = Subnet::of(remain[0].client_ip, width)?;
        let rowmask: Vec<bool> = remain.iter().map(|r| subnet.matches(r.client_ip)).collect();
        let before = remain.len();
        let (blk, rest) = Block::fork(remain, &rowmask, subnet, scorer);
        debug_assert!(!blk.is_empty());
        info!(
            "Found: {} {} {} {} {}",
            blk.subnet,
            before,
            blk.len(),
            blk.energy.ratio.map_or_else(|| String::from("nan"), |r| r.to_string()),
            blk.rank
        );
        queue.push(blk);
        remain = rest;
        rounds += 1;
    }
    debug_assert!(rounds <= total);
    debug!("partitioned {} rows into {} blocks", total, queue.len());
    Ok(queue)
}

/// Pop every block lowest rank first, handing each to `emit`, and collect the
/// summary records in pop order.
pub fn drain<F>(queue: &mut BlockQueue, mut emit: F) -> Result<Vec<SummaryRecord>, ShardError>
where
    F: FnMut(&Block) -> Result<(), ShardError>,
{
    let mut summary: Vec<SummaryRecord> = Vec::with_capacity(queue.len());
    for blk in queue.drain() {
        emit(&blk)?;
        summary.push(SummaryRecord {
            subnet: blk.subnet.to_string(),
            rank: blk.rank,
            energy: blk.energy,
        });
    }
    Ok(summary)
}

/// Descending by rank, then by row count.
pub fn sort_summary(summary: &mut [SummaryRecord]) {
    summary.sort_by(|a, b| {
        b.rank.total_cmp(&a.rank).then(b.energy.nrows.cmp(&a.energy.nrows))
    });
}

pub fn run(input: &Path, config: &ShardConfig) -> Result<RunReport, ShardError> {
    config.validate()?;
    let basename = inout::slice_basename(input)?;
    let scorer = config.scorer()?;

    let table = Table::from_file(input, config.downsample, config.metric, scorer.bucketer())?;
    let test_range = table.time_range();
    if let Some((first, last)) = test_range {
        println!("Test range: {} through {}", inout::showtime(first), inout::showtime(last));
    }
    let rows = table.rows.len();

    let mut queue = partition(table.rows, config.width, &scorer)?;
    let blocks = queue.len();
    let mut summary = drain(&mut queue, |blk| {
        let path = inout::slice_path(&basename, &blk.subnet.file_tag());
        debug!("writing {} rows to {}", blk.len(), path.display());
        inout::dump_slice(&path, blk.rows.iter())
    })?;

    sort_summary(&mut summary);
    let summary_path = inout::slice_path(&basename, "summary");
    inout::dump_summary(&summary_path, &summary, scorer.bucket_count())?;
    info!("wrote {} blocks, summary in {}", blocks, summary_path.display());

    Ok(RunReport {
        rows,
        blocks,
        test_range,
        summary_path,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;

    use super::*;
    use crate::energy::Energy;
    use crate::error::ShardErrorKind;
    use crate::inout::tests::make_row;
    use crate::netblock::tests::make_scorer;
    use crate::netblock::UNINTERESTING_RANK;

    // Deterministic pseudo-random client addresses.
    fn make_rows(n: usize) -> Vec<EnrichedRow> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        (0..n)
            .map(|i| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                let addr = (state >> 32) as u32 & 0x0f0f_ffff;
                let client = std::net::Ipv4Addr::from(addr).to_string();
                make_row(&client, (i as i64) * 1800, Some((i % 17) as f64))
            })
            .collect()
    }

    #[test]
    fn test_round_trip_three_rows() {
        let rows = vec![
            make_row("10.0.0.1", 0, Some(1.0)),
            make_row("10.0.0.2", 60, Some(2.0)),
            make_row("192.168.1.1", 120, Some(3.0)),
        ];
        let mut queue = partition(rows, 8, &make_scorer(24)).unwrap();
        assert_eq!(queue.len(), 2);
        let blocks: Vec<Block> = queue.drain().collect();
        // Both blocks carry the sentinel rank, so they pop in insertion order.
        assert_eq!(blocks[0].subnet.to_string(), "10.0.0.0/8");
        assert_eq!(blocks[0].len(), 2);
        assert_eq!(blocks[0].rows[0].record.client_ip_v4, "10.0.0.1");
        assert_eq!(blocks[0].rows[1].record.client_ip_v4, "10.0.0.2");
        assert_eq!(blocks[1].subnet.to_string(), "192.0.0.0/8");
        assert_eq!(blocks[1].len(), 1);
        assert!(blocks.iter().all(|b| b.rank == UNINTERESTING_RANK));
    }

    #[test]
    fn test_partition_complete_disjoint_consistent() {
        for &width in [0u8, 4, 8, 12, 16, 32].iter() {
            let rows = make_rows(500);
            let all: HashSet<i64> = rows.iter().map(|r| r.record.start_time).collect();
            let mut queue = partition(rows, width, &make_scorer(24)).unwrap();
            assert!(queue.len() <= 500);
            let blocks: Vec<Block> = queue.drain().collect();

            let mut seen: HashSet<i64> = HashSet::new();
            let mut subnets: HashSet<Subnet> = HashSet::new();
            for blk in blocks.iter() {
                assert!(subnets.insert(blk.subnet));
                assert_eq!(blk.subnet.width(), width);
                for row in blk.rows.iter() {
                    assert!(blk.subnet.matches(row.client_ip));
                    assert!(seen.insert(row.record.start_time));
                }
                for other in blocks.iter().filter(|o| o.subnet != blk.subnet) {
                    assert!(other.rows.iter().all(|r| !blk.subnet.matches(r.client_ip)));
                }
            }
            assert_eq!(seen, all);
            assert!(blocks.windows(2).all(|w| w[0].rank <= w[1].rank));
        }
    }

    #[test]
    fn test_partition_empty() {
        let queue = partition(Vec::new(), 8, &make_scorer(24)).unwrap();
        assert!(queue.is_empty());
    }

    fn make_block(octet: u8, rank: f64, nrows: usize) -> Block {
        Block {
            subnet: Subnet::of(u32::from(octet) << 24, 8).unwrap(),
            rows: Vec::new(),
            energy: Energy {
                nrows,
                nan: 0,
                mean: None,
                sum_buckets: Vec::new(),
                tsig: None,
                ratio: None,
                nratio: None,
            },
            rank,
        }
    }

    #[test]
    fn test_emission_and_summary_order() {
        let mut queue = BlockQueue::new();
        queue.push(make_block(5, 5.0, 10));
        queue.push(make_block(1, 1.0, 10));
        queue.push(make_block(3, 3.0, 10));
        let mut emitted: Vec<f64> = Vec::new();
        let mut summary = drain(&mut queue, |blk| {
            emitted.push(blk.rank);
            Ok(())
        })
        .unwrap();
        assert_eq!(emitted, vec![1.0, 3.0, 5.0]);
        sort_summary(&mut summary);
        let ranks: Vec<f64> = summary.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn test_summary_ties_by_nrows() {
        let mut queue = BlockQueue::new();
        queue.push(make_block(1, 1000.0, 3));
        queue.push(make_block(2, 1000.0, 30));
        queue.push(make_block(3, 2.0, 300));
        let mut summary = drain(&mut queue, |_| Ok(())).unwrap();
        sort_summary(&mut summary);
        let subnets: Vec<&str> = summary.iter().map(|s| s.subnet.as_str()).collect();
        assert_eq!(subnets, vec!["2.0.0.0/8", "1.0.0.0/8", "3.0.0.0/8"]);
    }

    #[test]
    fn test_drain_stops_on_emit_error() {
        let mut queue = BlockQueue::new();
        queue.push(make_block(1, 1.0, 10));
        queue.push(make_block(2, 2.0, 10));
        let err = drain(&mut queue, |_| Err(ShardError::new(ShardErrorKind::Io, "disk full")))
            .unwrap_err();
        assert_eq!(err.kind, ShardErrorKind::Io);
    }

    #[test]
    fn test_config_validate() {
        assert!(ShardConfig::default().validate().is_ok());
        let bad_width = ShardConfig { width: 33, ..Default::default() };
        assert_eq!(bad_width.validate().unwrap_err().kind, ShardErrorKind::Config);
        let bad_size = ShardConfig { bucket_count: 7, ..Default::default() };
        assert_eq!(bad_size.validate().unwrap_err().kind, ShardErrorKind::Config);
        let bad_downsample = ShardConfig { downsample: 0, ..Default::default() };
        assert_eq!(bad_downsample.validate().unwrap_err().kind, ShardErrorKind::Config);
    }

    #[test]
    fn test_run_rejects_extension() {
        let err = run(Path::new("measurements.txt"), &ShardConfig::default()).unwrap_err();
        assert_eq!(err.kind, ShardErrorKind::InputExtension);
    }

    #[test]
    fn test_run_writes_slices_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("lga02.csv");
        let mut writer = csv::Writer::from_path(&input).unwrap();
        // 10.0.0.0/8 follows the clock for three days; 192.0.0.0/8 is flat.
        for h in 0..72i64 {
            let rec = crate::inout::tests::make_record("10.1.2.3", h * 3600, Some((h % 24) as f64));
            writer.serialize(rec).unwrap();
            let rec = crate::inout::tests::make_record("192.168.1.1", h * 3600, Some(4.0));
            writer.serialize(rec).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        let report = run(&input, &ShardConfig::default()).unwrap();
        assert_eq!(report.rows, 144);
        assert_eq!(report.blocks, 2);
        assert_eq!(report.test_range, Some((0, 71 * 3600)));

        let slice = dir.path().join("lga02.slice.10-0-0-0_8.csv");
        let mut rdr = csv::Reader::from_path(&slice).unwrap();
        assert_eq!(rdr.records().count(), 72);
        assert!(dir.path().join("lga02.slice.192-0-0-0_8.csv").exists());

        let text = fs::read_to_string(&report.summary_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("192.0.0.0/8,72,0,4,"));
        assert!(lines[1].ends_with(",1000"));
        assert!(lines[2].starts_with("10.0.0.0/8,72,0,"));
    }
}
