//! Recognizers that turn transfer-tool output lines into progress signals.

use once_cell::sync::Lazy;
use regex::Regex;

/// Signal extracted from one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSignal {
    /// Intermediate progress.
    Progress {
        /// Completion percentage.
        percent: u8,
        /// Bytes moved so far.
        bytes_transferred: u64,
    },
    /// The tool printed its final summary.
    Completed {
        /// Total payload size.
        total_bytes: u64,
    },
}

/// Parses one tool's output format.
pub trait OutputRecognizer: Send {
    /// Whether a line is a known harmless warning that must not influence progress or failure detail.
    fn is_benign(&self, line: &str) -> bool;

    /// Inspect a non-benign line.
    fn recognize(&mut self, line: &str) -> Option<ProgressSignal>;

    /// Whether a non-zero exit code still means the payload arrived.
    fn is_benign_exit(&self, code: i32) -> bool {
        let _ = code;
        false
    }
}

static RSYNC_PROGRESS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*([\d,]+)\s+(\d{1,3})%").ok());
static RSYNC_TOTAL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"total size is\s+([\d,]+)").ok());

const RSYNC_BENIGN: &[&str] = &[
    "some files/attrs were not transferred",
    "some files vanished before they could be transferred",
    "symlink has no referent",
    "skipping non-regular file",
];

/// rsync exit code for source files that vanished mid-transfer.
const RSYNC_VANISHED: i32 = 24;

/// Recognizer for `rsync --info=progress2 -v` output.
#[derive(Debug, Default)]
pub struct RsyncRecognizer {
    saw_traffic_summary: bool,
}

impl OutputRecognizer for RsyncRecognizer {
    fn is_benign(&self, line: &str) -> bool {
        RSYNC_BENIGN.iter().any(|needle| line.contains(needle))
    }

    fn recognize(&mut self, line: &str) -> Option<ProgressSignal> {
        if line.contains("sent") && line.contains("received") {
            self.saw_traffic_summary = true;
            return None;
        }
        if self.saw_traffic_summary {
            if let Some(total) = RSYNC_TOTAL
                .as_ref()
                .and_then(|re| re.captures(line))
                .and_then(|caps| parse_grouped(&caps[1]))
            {
                return Some(ProgressSignal::Completed { total_bytes: total });
            }
        }
        let caps = RSYNC_PROGRESS.as_ref()?.captures(line)?;
        let bytes_transferred = parse_grouped(&caps[1])?;
        let percent = caps[2].parse::<u8>().ok()?.min(100);
        Some(ProgressSignal::Progress {
            percent,
            bytes_transferred,
        })
    }

    fn is_benign_exit(&self, code: i32) -> bool {
        code == RSYNC_VANISHED
    }
}

static CLOUD_STATS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"([\d.]+)\s*([KMGTP]?i?B)\s*/\s*([\d.]+)\s*([KMGTP]?i?B),\s*(\d{1,3})%").ok()
});

/// Recognizer for the cloud tool's `--stats-one-line` output,
/// e.g. `1.500 MiB / 10 MiB, 15%, 1.2 MiB/s, ETA 7s`.
#[derive(Debug, Default)]
pub struct CloudToolRecognizer;

impl OutputRecognizer for CloudToolRecognizer {
    fn is_benign(&self, line: &str) -> bool {
        line.contains("Can't follow symlink") || line.contains("Duplicate object found")
    }

    fn recognize(&mut self, line: &str) -> Option<ProgressSignal> {
        let caps = CLOUD_STATS.as_ref()?.captures(line)?;
        let transferred = scaled_bytes(&caps[1], &caps[2])?;
        let total = scaled_bytes(&caps[3], &caps[4])?;
        let percent = caps[5].parse::<u8>().ok()?.min(100);
        if percent == 100 && total > 0 && transferred >= total {
            return Some(ProgressSignal::Completed { total_bytes: total });
        }
        Some(ProgressSignal::Progress {
            percent,
            bytes_transferred: transferred,
        })
    }
}

fn parse_grouped(raw: &str) -> Option<u64> {
    raw.chars()
        .filter(|ch| *ch != ',')
        .collect::<String>()
        .parse()
        .ok()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_bytes(value: &str, unit: &str) -> Option<u64> {
    let value: f64 = value.parse().ok()?;
    let exponent = match unit.chars().next()? {
        'B' => 0,
        'K' => 1,
        'M' => 2,
        'G' => 3,
        'T' => 4,
        'P' => 5,
        _ => return None,
    };
    let base: f64 = if unit.contains('i') { 1024.0 } else { 1000.0 };
    Some((value * base.powi(exponent)).round() as u64)
}
