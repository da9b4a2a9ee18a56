//! Summary statistics for migration runs

use modlink_engine::{MigrationReport, PairState};

/// Pair counts folded from a [`MigrationReport`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStats {
    applications: usize,
    failed_applications: usize,
    symlinked: usize,
    skipped: usize,
    validated: usize,
    failed: usize,
    moved: usize,
    bytes: u64,
}

impl MigrationStats {
    /// Count every pair outcome of `report`
    pub fn from_report(report: &MigrationReport) -> Self {
        let mut stats = Self {
            applications: report.applications.len(),
            failed_applications: report.failed_applications(),
            ..Self::default()
        };
        for outcome in report.applications.values().flat_map(|a| &a.outcomes) {
            match outcome.state {
                PairState::SymlinkOk => stats.symlinked += 1,
                PairState::SourceMissingSkipped => stats.skipped += 1,
                PairState::Validated | PairState::Unvalidated => stats.validated += 1,
                PairState::Failed => stats.failed += 1,
            }
            stats.moved += outcome.moved;
            stats.bytes += outcome.bytes;
        }
        stats
    }

    pub fn applications(&self) -> usize {
        self.applications
    }

    pub fn failed_applications(&self) -> usize {
        self.failed_applications
    }

    pub fn symlinked(&self) -> usize {
        self.symlinked
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Pairs that ended without error
    pub fn succeeded(&self) -> usize {
        self.symlinked + self.skipped + self.validated
    }

    pub fn print_summary(&self, dry_run: bool) {
        use owo_colors::OwoColorize;

        let succeeded = self.succeeded();
        let failed = self.failed;

        if dry_run {
            println!(
                "{} {} pairs would be migrated",
                "●".bright_green(),
                succeeded.to_string().bright_white().bold()
            );
        } else if failed > 0 {
            println!(
                "{} {} | {} {}",
                "●".bright_green(),
                succeeded.to_string().bright_green().bold(),
                "●".bright_red(),
                failed.to_string().bright_red().bold(),
            );
        } else {
            println!(
                "{} {} pairs migrated",
                "●".bright_green(),
                succeeded.to_string().bright_green().bold()
            );
        }

        let mut parts = Vec::new();
        if self.symlinked > 0 {
            parts.push(format!("{} symlinked", self.symlinked));
        }
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if self.validated > 0 {
            parts.push(format!("{} validated only", self.validated));
        }
        if self.moved > 0 {
            parts.push(format!("{} items moved ({})", self.moved, format_bytes(self.bytes)));
        }
        if !parts.is_empty() {
            println!("  {}", parts.join(", ").dimmed());
        }
    }
}

/// Human-readable byte count
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use modlink_engine::{ApplicationReport, PairOutcome, PairRole};

    fn outcome(state: PairState, moved: usize, bytes: u64) -> PairOutcome {
        PairOutcome {
            role: PairRole::Base,
            source: "/apps/models".into(),
            target: "/lib".into(),
            state,
            errors: Vec::new(),
            warnings: Vec::new(),
            moved,
            bytes,
            rollback_folder: None,
        }
    }

    #[test]
    fn test_from_report_counts_states() {
        let mut report = MigrationReport::default();
        report.applications.insert(
            "App1".into(),
            ApplicationReport {
                name: "App1".into(),
                outcomes: vec![
                    outcome(PairState::SymlinkOk, 3, 2048),
                    outcome(PairState::SourceMissingSkipped, 0, 0),
                ],
                backup: None,
            },
        );
        report.applications.insert(
            "App2".into(),
            ApplicationReport {
                name: "App2".into(),
                outcomes: vec![outcome(PairState::Failed, 1, 10)],
                backup: None,
            },
        );

        let stats = MigrationStats::from_report(&report);
        assert_eq!(stats.applications(), 2);
        assert_eq!(stats.failed_applications(), 1);
        assert_eq!(stats.symlinked(), 1);
        assert_eq!(stats.skipped(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.succeeded(), 2);
        assert_eq!(stats.bytes(), 2058);
    }

    #[test]
    fn test_empty_report() {
        let stats = MigrationStats::from_report(&MigrationReport::default());
        assert_eq!(stats, MigrationStats::default());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
