use std::{
	fmt::Write as _,
	io::{self, Write as _},
	path::PathBuf,
	sync::Arc,
};

use clap::Parser;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sift_config::Config;
use sift_service::{ClassifierStats, Outcome, Providers, QueryResponse, SiftService, Stores};
use sift_storage::MemoryStore;

#[derive(Debug, Parser)]
#[command(
	version = sift_cli::VERSION,
	rename_all = "kebab",
	styles = sift_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Question to answer from the corpus.
	#[arg(value_name = "QUESTION")]
	pub question: String,
	/// Print the full response as JSON instead of a readable listing.
	#[arg(long)]
	pub json: bool,
	/// Stream a generated answer after the sources.
	#[arg(long)]
	pub answer: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = sift_config::load(&args.config)?;

	init_tracing(&config);

	let store = MemoryStore::load_jsonl(&config.storage.corpus_path)?;
	let service = SiftService::new(
		config,
		Stores::from_memory(Arc::new(store)),
		Providers::default(),
	);
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("Interrupted, cancelling the query.");

			trigger.cancel();
		}
	});

	let stats = ClassifierStats::new();
	let response = service.query(&args.question, &cancel, Some(&stats)).await?;

	tracing::debug!(model_usage_ratio = stats.model_usage_ratio(), "Classifier usage.");

	let mut stdout = io::stdout();

	if args.json {
		writeln!(stdout, "{}", serde_json::to_string_pretty(&response)?)?;
	} else {
		write!(stdout, "{}", render(&response))?;
	}

	if !args.answer {
		return Ok(());
	}
	if !response.has_evidence() {
		writeln!(stdout, "\nNo evidence to answer from.")?;

		return Ok(());
	}

	let mut tokens = service.answer(&response, &cancel).await?;

	writeln!(stdout, "\nAnswer:")?;

	while let Some(token) = tokens.next().await {
		if cancel.is_cancelled() {
			break;
		}

		write!(stdout, "{}", token?)?;

		stdout.flush()?;
	}

	writeln!(stdout)?;

	Ok(())
}

/// Human-readable listing of a response: classification line, then passages or the file table.
pub fn render(response: &QueryResponse) -> String {
	let classification = &response.classification;
	let mut out = String::new();

	let _ = writeln!(
		out,
		"{} ({:.2}, {:?}) via {} quer{}",
		classification.question_type,
		classification.confidence,
		classification.method,
		response.queries.len(),
		if response.queries.len() == 1 { "y" } else { "ies" },
	);

	match &response.outcome {
		Outcome::Passages(passages) =>
			for (idx, passage) in passages.iter().enumerate() {
				let chunk = &passage.chunk;
				let page = chunk.page.map(|page| format!(" p.{page}")).unwrap_or_default();
				let marker = if passage.is_partial_parent { " (context)" } else { "" };

				let _ = writeln!(
					out,
					"[{}] {:.3} {}{page}{marker}\n    {}",
					idx + 1,
					passage.score,
					chunk.source_file,
					chunk.text.trim(),
				);
			},
		Outcome::Files(files) => {
			let _ = writeln!(out, "{:>4}  {:<40} {:>7} {:>6}  pages", "rank", "file", "score", "chunks");

			for (idx, file) in files.iter().enumerate() {
				let pages: Vec<String> = file.page_numbers.iter().map(u32::to_string).collect();

				let _ = writeln!(
					out,
					"{:>4}  {:<40} {:>7.3} {:>6}  {}",
					idx + 1,
					file.file_name,
					file.aggregate_score,
					file.matching_chunk_count,
					pages.join(","),
				);
			}
		},
		Outcome::NoEvidence => out.push_str("No evidence found.\n"),
	}

	for diagnostic in &response.diagnostics {
		let _ = writeln!(out, "note: {}", serde_json::to_string(diagnostic).unwrap_or_default());
	}

	out
}

fn init_tracing(config: &Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}
