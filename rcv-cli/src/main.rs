use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rcv_ingest::{
    validate_file, IngestSummary, LedgerReader, Normalizer, ReadOptions, TextEncoding, TotalPolicy,
};
use rcv_store::{SupabaseStore, UpsertOutcome};

#[derive(Parser, Debug)]
#[command(name = "rcv", version, about = "SII purchase-ledger (RCV) importer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize a ledger export and upsert it into Supabase
    Import {
        /// Path to the SII export (CSV or TSV)
        file: PathBuf,

        #[command(flatten)]
        format: FormatArgs,

        /// Total-amount policy: trust the file's Monto Total, or recompute
        /// net + IVA + exempt. No default; the two disagree on real exports.
        #[arg(long, value_enum)]
        total_policy: TotalPolicyArg,

        /// Tag recorded in importado_desde
        #[arg(long, default_value = "csv-import")]
        source_tag: String,

        /// Normalize and report only; skip the store entirely
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Check an export's shape without importing anything
    Validate {
        file: PathBuf,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// Show layout, headers, and the first rows of an export
    Inspect {
        file: PathBuf,

        #[command(flatten)]
        format: FormatArgs,

        /// Number of data rows to print
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Field delimiter: a single character, or "tab"
    #[arg(long, default_value = ";")]
    delimiter: String,

    #[arg(long, value_enum, default_value_t = EncodingArg::Latin1)]
    encoding: EncodingArg,

    /// chrono date format of Fecha Docto (the TSV export uses %d-%m-%Y)
    #[arg(long, default_value = "%d/%m/%Y")]
    date_format: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EncodingArg {
    Latin1,
    Utf8,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TotalPolicyArg {
    TrustFile,
    Recompute,
}

impl FormatArgs {
    fn to_options(&self, total_policy: TotalPolicy) -> Result<ReadOptions> {
        let mut opts = ReadOptions::new(total_policy);
        opts.delimiter = parse_delimiter(&self.delimiter)?;
        opts.encoding = match self.encoding {
            EncodingArg::Latin1 => TextEncoding::Latin1,
            EncodingArg::Utf8 => TextEncoding::Utf8,
        };
        opts.date_format = self.date_format.clone();
        Ok(opts)
    }
}

fn parse_delimiter(raw: &str) -> Result<u8> {
    if raw.eq_ignore_ascii_case("tab") || raw == "\\t" {
        return Ok(b'\t');
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => bail!("delimiter must be a single ASCII character or \"tab\", got {raw:?}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Import {
            file,
            format,
            total_policy,
            source_tag,
            dry_run,
        } => {
            let policy = match total_policy {
                TotalPolicyArg::TrustFile => TotalPolicy::TrustFile,
                TotalPolicyArg::Recompute => TotalPolicy::Recompute,
            };
            let opts = format.to_options(policy)?;
            run_import(&file, opts, &source_tag, dry_run).await?;
        }

        Command::Validate { file, format } => {
            let opts = format.to_options(TotalPolicy::Recompute)?;
            run_validate(&file, opts)?;
        }

        Command::Inspect { file, format, limit } => {
            let opts = format.to_options(TotalPolicy::Recompute)?;
            run_inspect(&file, opts, limit)?;
        }
    }

    Ok(())
}

async fn run_import(
    file: &PathBuf,
    opts: ReadOptions,
    source_tag: &str,
    dry_run: bool,
) -> Result<()> {
    if !file.exists() {
        bail!("file not found: {}", file.display());
    }

    let reader = LedgerReader::open(file, &opts)
        .with_context(|| format!("opening {}", file.display()))?;
    let normalizer = Normalizer::for_file(&reader, opts, source_tag)?;
    println!(
        "Importing {} (layout: {:?})",
        file.display(),
        normalizer.layout()
    );

    let store = if dry_run {
        println!("Dry run: records will not be persisted");
        None
    } else {
        let store = SupabaseStore::from_env()?;
        store.check_connection().await.context("Supabase unreachable")?;
        Some(store)
    };

    let mut summary = IngestSummary::new(normalizer.layout());
    let mut inserted = 0usize;
    let mut duplicates = 0usize;

    for outcome in normalizer.records(reader.into_rows()) {
        summary.tally(&outcome);
        match outcome {
            Ok(record) => {
                if let Some(store) = &store {
                    match store.insert(&record).await? {
                        UpsertOutcome::Inserted => inserted += 1,
                        UpsertOutcome::Duplicate => duplicates += 1,
                    }
                }
            }
            Err(rejection) => eprintln!("  skipped {rejection}"),
        }
    }

    println!("\n{summary}");
    if store.is_some() {
        println!("{inserted} inserted, {duplicates} already present");
    }
    Ok(())
}

fn run_validate(file: &PathBuf, opts: ReadOptions) -> Result<()> {
    if !file.exists() {
        bail!("file not found: {}", file.display());
    }

    let report = validate_file(file, &opts)?;
    println!("File: {} (layout: {:?})", file.display(), report.layout);
    println!("Rows: {}", report.rows);
    println!("  RUT Proveedor : {:.1}% valid", report.rut.percent_valid());
    println!("  Fecha Docto   : {:.1}% valid", report.fecha.percent_valid());
    println!("  Montos        : {:.1}% valid", report.monto.percent_valid());

    if !report.dte_distribution.is_empty() {
        println!("\nDocument types:");
        for (kind, count) in &report.dte_distribution {
            println!("  {} ({}): {}", kind.label(), kind.code(), count);
        }
    }

    for w in &report.warnings {
        println!("warning: {w}");
    }
    for e in &report.errors {
        eprintln!("error: {e}");
    }

    if !report.passed() {
        bail!("validation failed; fix the file before importing");
    }
    println!("\nValidation passed; the file is ready to import.");
    Ok(())
}

fn run_inspect(file: &PathBuf, opts: ReadOptions, limit: usize) -> Result<()> {
    if !file.exists() {
        bail!("file not found: {}", file.display());
    }

    let reader = LedgerReader::open(file, &opts)?;
    let headers = reader.headers().to_vec();
    let first = reader.first_row_cells();
    let layout = rcv_ingest::detect_layout(&headers, &first);

    println!("File: {} (layout: {layout:?})", file.display());
    println!("\nColumns ({}):", headers.len());
    for (i, h) in headers.iter().enumerate() {
        println!("  [{i}] {h}");
    }

    println!("\nFirst rows:");
    for (i, row) in reader.into_rows().take(limit).enumerate() {
        match row {
            Ok(record) => {
                let cells: Vec<&str> = record.iter().collect();
                println!("  {i}: {}", cells.join(" | "));
            }
            Err(e) => println!("  {i}: <unreadable: {e}>"),
        }
    }

    let report = validate_file(file, &opts)?;
    if !report.dte_distribution.is_empty() {
        println!("\nDocument types:");
        for (kind, count) in &report.dte_distribution {
            println!("  {} ({}): {}", kind.label(), kind.code(), count);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter(";;").is_err());
    }
}
