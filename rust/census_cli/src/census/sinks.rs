// src/census/sinks.rs
#![forbid(unsafe_code)]

use std::io::Write;

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;

use census_engine::estimate::{ClassEstimate, GlobalEstimate};

/// Receives each class as it finishes (live reporting only).
pub trait ClassSink {
    fn on_class(&mut self, est: &ClassEstimate, pb: Option<&ProgressBar>);
}

pub struct NoopSink;

impl ClassSink for NoopSink {
    fn on_class(&mut self, _est: &ClassEstimate, _pb: Option<&ProgressBar>) {}
}

/// Prints one row per finished class, repeating the header every `header_every` rows.
pub struct TableSink {
    header_every: u64,
    rows: u64,
}

impl TableSink {
    pub fn new(header_every: u64) -> Self {
        Self {
            header_every: header_every.max(1),
            rows: 0,
        }
    }
}

impl ClassSink for TableSink {
    fn on_class(&mut self, est: &ClassEstimate, pb: Option<&ProgressBar>) {
        let mut lines = Vec::with_capacity(2);
        if self.rows % self.header_every == 0 {
            lines.push(table_header());
        }
        lines.push(table_row(est));
        self.rows += 1;

        for line in lines {
            match pb {
                Some(pb) => pb.println(line),
                None => println!("{line}"),
            }
        }
    }
}

fn table_header() -> String {
    format!(
        "{:>7} {:<22} {:>12} {:>10} {:>9} {:>9} {:>9} {:>6} {}",
        "index", "class", "diagrams", "ratio", "lower", "upper", "trials", "faults", "flags"
    )
}

fn table_row(est: &ClassEstimate) -> String {
    let mut flags = String::new();
    if est.method == census_engine::estimate::EstimateMethod::Exhaustive {
        flags.push_str("exact");
    }
    if est.insufficient_trials {
        flags.push_str("capped");
    }
    format!(
        "{:>7} {:<22} {:>12} {:>10.6} {:>9.6} {:>9.6} {:>9} {:>6} {}",
        est.index,
        est.class.descriptor(),
        sci(&est.diagrams.to_string()),
        est.ratio,
        est.lower,
        est.upper,
        est.trials,
        est.faults,
        flags
    )
}

/// Compact scientific rendering of a decimal integer string, four
/// significant digits rounded half up ("1.235e12"). Up to nine digits are
/// printed as is.
pub fn sci(digits: &str) -> String {
    if digits.len() <= 9 || !digits.bytes().all(|d| d.is_ascii_digit()) {
        return digits.to_string();
    }
    let b = digits.as_bytes();
    let mut lead = b[..4]
        .iter()
        .fold(0u32, |acc, &d| acc * 10 + u32::from(d - b'0'));
    if b[4] >= b'5' {
        lead += 1;
    }
    let mut exp = digits.len() - 1;
    if lead == 10_000 {
        lead = 1_000;
        exp += 1;
    }
    format!("{}.{:03}e{exp}", lead / 1000, lead % 1000)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn from_cli(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" | "txt" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => bail!("unknown output format '{other}' (table | csv | json)"),
        }
    }
}

/// Writes the per-class results plus the global estimate.
pub fn write_results(
    out: &mut dyn Write,
    format: OutputFormat,
    estimates: &[ClassEstimate],
    global: &GlobalEstimate,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            writeln!(out, "{}", table_header())?;
            for est in estimates {
                writeln!(out, "{}", table_row(est))?;
            }
            writeln!(out)?;
            writeln!(out, "{}", summary_line(global))?;
        }
        OutputFormat::Csv => {
            writeln!(
                out,
                "index,class,diagrams,method,trials,legal,faults,ratio,variance,lower,upper,interval,insufficient_trials"
            )?;
            for e in estimates {
                writeln!(
                    out,
                    "{},{},{},{:?},{},{},{},{},{},{},{},{:?},{}",
                    e.index,
                    e.class,
                    e.diagrams,
                    e.method,
                    e.trials,
                    e.legal,
                    e.faults,
                    e.ratio,
                    e.variance,
                    e.lower,
                    e.upper,
                    e.interval,
                    e.insufficient_trials
                )?;
            }
        }
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "global": global,
                "classes": estimates,
            });
            serde_json::to_writer_pretty(&mut *out, &doc).context("serializing results")?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// One-line summary (useful for logs / grep).
pub fn summary_line(g: &GlobalEstimate) -> String {
    format!(
        "ESTIMATE: legal_diagrams={:.6e} ci=[{:.6e}, {:.6e}] rel_err={:.3}% std_err={:.3e} raw_diagrams={} legal_fraction={:.6e} classes={} exhaustive={} capped={} empty={} unjudged={} trials={} faults={}",
        g.total_f64,
        g.lower,
        g.upper,
        g.relative_error_pct,
        g.std_error,
        sci(&g.raw_diagrams.to_string()),
        g.legal_fraction,
        g.classes,
        g.exhaustive_classes,
        g.capped_classes,
        g.empty_classes,
        sci(&g.unjudged_diagrams.to_string()),
        g.trials,
        g.faults,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sci_keeps_short_numbers() {
        assert_eq!(sci("4032"), "4032");
        assert_eq!(sci("123456789"), "123456789");
    }

    #[test]
    fn sci_rounds_the_mantissa() {
        assert_eq!(sci("1234567890123"), "1.235e12");
        assert_eq!(sci("1234900000000"), "1.235e12");
        assert_eq!(sci("1234490000000"), "1.234e12");
        assert_eq!(sci("9999600000"), "1.000e10");
        assert_eq!(sci("4032000000"), "4.032e9");
    }

    #[test]
    fn format_parsing() {
        assert_eq!(OutputFormat::from_cli("CSV").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_cli("xml").is_err());
    }
}
