//! CLI for nonce reuse key recovery

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::Serialize;
use sigreuse::attack::SolveReport;
use sigreuse::bucket::{Extraction, InputOutcome, PairBucket};
use sigreuse::provider::{load_transactions, CsvSink, MemoryLookup};
use sigreuse::tx::{Transaction, Txid};
use std::fs::File;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sigreuse")]
#[command(about = "Recover ECDSA private keys from nonce reuse in legacy Bitcoin transactions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    Analyze {
        /// Raw transactions to analyze: JSON array or CSV with a rawtx column
        #[arg(default_value = "-")]
        input: String,

        #[arg(long, help = "Transactions used to resolve previous outputs")]
        prevouts: Option<String>,

        #[arg(
            long,
            value_enum,
            default_value = "batch",
            help = "Collect tuples per transaction or across the whole input"
        )]
        scope: Scope,

        #[arg(long, help = "Write every extracted tuple to this CSV file")]
        sink: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scope {
    Tx,
    Batch,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(recovered) => {
            if recovered {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Analyze {
            input,
            prevouts,
            scope,
            sink,
        } => {
            let transactions = load_transactions(&input)?;
            let mut lookup = MemoryLookup::new();
            if let Some(path) = &prevouts {
                lookup.extend(load_transactions(path)?);
            }
            lookup.extend(transactions.iter().cloned());
            info!(
                "loaded {} transactions, {} known for prevout lookup",
                transactions.len(),
                lookup.len()
            );

            let mut sink = match &sink {
                Some(path) => Some(CsvSink::new(
                    File::create(path).with_context(|| format!("failed to create {path}"))?,
                )),
                None => None,
            };

            let mut analysis = Analysis::default();
            match scope {
                Scope::Batch => {
                    let bucket = PairBucket::new(&lookup);
                    let mut session = Session::default();
                    for tx in &transactions {
                        session.add(&bucket, tx, sink.as_mut())?;
                    }
                    analysis.finish(session, bucket.solve());
                }
                Scope::Tx => {
                    for tx in &transactions {
                        let bucket = PairBucket::new(&lookup);
                        let mut session = Session::default();
                        session.add(&bucket, tx, sink.as_mut())?;
                        if session.sources.len() < 2 {
                            warn!("tx {}: {}", tx.compute_txid(), TOO_FEW_SIGNATURES);
                            session.note = Some(TOO_FEW_SIGNATURES);
                        }
                        analysis.finish(session, bucket.solve());
                    }
                }
            }

            if let Some(sink) = sink.as_mut() {
                sink.flush()?;
            }

            let output = format_output(&analysis, cli.json)?;
            println!("{}", output);

            Ok(!analysis.keys.is_empty())
        }
    }
}

const TOO_FEW_SIGNATURES: &str = "transaction yielded fewer than 2 signatures";

/// Extraction results for one bucket, with the origin of every tuple.
#[derive(Default)]
struct Session {
    extractions: Vec<Extraction>,
    sources: Vec<TupleSource>,
    note: Option<&'static str>,
}

impl Session {
    fn add(
        &mut self,
        bucket: &PairBucket<&MemoryLookup>,
        tx: &Transaction,
        sink: Option<&mut CsvSink<File>>,
    ) -> Result<()> {
        let extraction = match sink {
            Some(sink) => bucket.add_transaction_with_sink(tx, sink)?,
            None => bucket.add_transaction(tx),
        };
        for (index, outcome) in &extraction.outcomes {
            if matches!(outcome, InputOutcome::Extracted(_)) {
                self.sources.push(TupleSource {
                    txid: extraction.txid,
                    input: *index,
                });
            }
        }
        self.extractions.push(extraction);
        Ok(())
    }
}

#[derive(Default)]
struct Analysis {
    transactions: Vec<TransactionOutput>,
    keys: Vec<RecoveredKeyOutput>,
    alarms: Vec<AlarmOutput>,
    tuples: usize,
}

impl Analysis {
    fn finish(&mut self, session: Session, report: SolveReport) {
        self.tuples += session.sources.len();
        self.transactions
            .extend(session.extractions.iter().map(TransactionOutput::from));
        if let (Some(note), Some(last)) = (session.note, self.transactions.last_mut()) {
            last.note = Some(note);
        }

        let source = |i: usize| session.sources[i];
        for key in &report.keys {
            self.keys.push(RecoveredKeyOutput {
                pubkey: key.pubkey.clone(),
                private_key_decimal: key.private_key_decimal.clone(),
                private_key_hex: key.private_key_hex.clone(),
                sources: [source(key.pair.0), source(key.pair.1)],
            });
        }
        for alarm in report.alarms() {
            self.alarms.push(AlarmOutput {
                sources: [source(alarm.lhs), source(alarm.rhs)],
            });
        }
    }
}

#[derive(Serialize)]
struct OutputReport<'a> {
    transactions: &'a [TransactionOutput],
    recovered_keys: &'a [RecoveredKeyOutput],
    alarms: &'a [AlarmOutput],
    summary: SummaryOutput,
}

#[derive(Serialize)]
struct TransactionOutput {
    txid: Txid,
    inputs: usize,
    extracted: usize,
    skipped: usize,
    failed: usize,
    outcomes: Vec<InputOutcomeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'static str>,
}

impl From<&Extraction> for TransactionOutput {
    fn from(extraction: &Extraction) -> Self {
        let outcomes = extraction
            .outcomes
            .iter()
            .map(|(index, outcome)| {
                let status = match outcome {
                    InputOutcome::Extracted(_) => "extracted",
                    InputOutcome::Skipped(_) => "skipped",
                    InputOutcome::Failed(_) => "failed",
                };
                InputOutcomeOutput {
                    input: *index,
                    status,
                    reason: outcome.reason().map(ToString::to_string),
                }
            })
            .collect();

        Self {
            txid: extraction.txid,
            inputs: extraction.outcomes.len(),
            extracted: extraction.extracted,
            skipped: extraction.warnings(),
            failed: extraction.errors(),
            outcomes,
            note: None,
        }
    }
}

#[derive(Serialize)]
struct InputOutcomeOutput {
    input: usize,
    status: &'static str,
    reason: Option<String>,
}

#[derive(Clone, Copy, Serialize)]
struct TupleSource {
    txid: Txid,
    input: usize,
}

#[derive(Serialize)]
struct RecoveredKeyOutput {
    pubkey: String,
    private_key_decimal: String,
    private_key_hex: String,
    sources: [TupleSource; 2],
}

#[derive(Serialize)]
struct AlarmOutput {
    sources: [TupleSource; 2],
}

#[derive(Serialize)]
struct SummaryOutput {
    transactions: usize,
    tuples: usize,
    keys_recovered: usize,
    alarms: usize,
}

fn format_output(analysis: &Analysis, json: bool) -> Result<String> {
    let report = OutputReport {
        transactions: &analysis.transactions,
        recovered_keys: &analysis.keys,
        alarms: &analysis.alarms,
        summary: SummaryOutput {
            transactions: analysis.transactions.len(),
            tuples: analysis.tuples,
            keys_recovered: analysis.keys.len(),
            alarms: analysis.alarms.len(),
        },
    };

    if json {
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    let mut output = String::new();
    output.push_str(&format!(
        "Analyzed {} transactions, extracted {} signature tuples\n\n",
        report.summary.transactions, report.summary.tuples
    ));

    for tx in report.transactions {
        output.push_str(&format!(
            "Transaction {}: {} inputs, {} extracted, {} skipped, {} failed\n",
            tx.txid, tx.inputs, tx.extracted, tx.skipped, tx.failed
        ));
        if let Some(note) = tx.note {
            output.push_str(&format!("  note: {}\n", note));
        }
        for outcome in tx.outcomes.iter().filter(|o| o.status == "failed") {
            if let Some(reason) = &outcome.reason {
                output.push_str(&format!("  input {}: {}\n", outcome.input, reason));
            }
        }
    }
    output.push('\n');

    if report.recovered_keys.is_empty() {
        output.push_str("No private keys recovered.\n");
    } else {
        output.push_str(&format!(
            "Recovered {} private keys:\n\n",
            report.recovered_keys.len()
        ));
        for (i, key) in report.recovered_keys.iter().enumerate() {
            output.push_str(&format!("Key #{}\n", i + 1));
            output.push_str(&format!("  Public Key: {}\n", key.pubkey));
            output.push_str(&format!(
                "  Private Key (decimal): {}\n",
                key.private_key_decimal
            ));
            output.push_str(&format!("  Private Key (hex): {}\n", key.private_key_hex));
            for source in &key.sources {
                output.push_str(&format!(
                    "  Signature: {} input {}\n",
                    source.txid, source.input
                ));
            }
            output.push('\n');
        }
    }

    for alarm in report.alarms {
        output.push_str(&format!(
            "ALARM: R reuse under one key but no candidate verified ({} input {}, {} input {})\n",
            alarm.sources[0].txid,
            alarm.sources[0].input,
            alarm.sources[1].txid,
            alarm.sources[1].input
        ));
    }

    Ok(output)
}
