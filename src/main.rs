use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use ioctriage::cli::{self, Command, HistoryArgs, ScanArgs};
use ioctriage::config::{self, LoadedConfig};
use ioctriage::pipeline::{Orchestrator, batch};
use ioctriage::store::{self, sqlite::SqliteSink};
use ioctriage::tools::ProcessRunner;
use ioctriage::toxicity::{DisabledScorer, HttpToxicityScorer, ToxicityScorer};
use ioctriage::{logging, risk};

fn main() -> Result<()> {
    let cli_opts = cli::parse();
    logging::init_logging(cli_opts.log_json);

    let loaded = config::load_config(cli_opts.config_path.as_deref())
        .context("loading configuration")?;

    match cli_opts.command {
        Command::Scan(args) => run_scan(loaded, args),
        Command::History(args) => run_history(args),
    }
}

fn run_scan(loaded: LoadedConfig, args: ScanArgs) -> Result<()> {
    let mut cfg = loaded.config;
    if args.no_toxicity {
        cfg.toxicity.enabled = false;
    }
    if let Some(rules) = args.rules.clone() {
        cfg.signature.rules_path = rules;
    }
    if !cfg.signature.rules_path.is_file() {
        warn!(
            "signature rules not found at {}; scans will fail",
            cfg.signature.rules_path.display()
        );
    }

    let run_output_dir = args.output.join(&cfg.run_id);
    if args.store != cli::StoreBackend::None {
        std::fs::create_dir_all(&run_output_dir)
            .with_context(|| format!("creating {}", run_output_dir.display()))?;
    }

    info!(
        "starting run_id={} inputs={} output={} workers={} config_hash={}",
        cfg.run_id,
        args.inputs.len(),
        run_output_dir.display(),
        args.workers,
        loaded.config_hash
    );

    let toxicity: Arc<dyn ToxicityScorer> = if cfg.toxicity.enabled {
        Arc::new(HttpToxicityScorer::new(&cfg.toxicity).context("building toxicity client")?)
    } else {
        info!("toxicity scoring disabled");
        Arc::new(DisabledScorer)
    };
    let sink = store::build_sink(
        args.store.into(),
        &cfg.run_id,
        env!("CARGO_PKG_VERSION"),
        &loaded.config_hash,
        &run_output_dir,
    )?;
    let sink: Arc<dyn store::ScanSink> = Arc::from(sink);

    let orchestrator = Orchestrator::from_config(&cfg, Arc::new(ProcessRunner), toxicity, sink.clone())
        .context("compiling watchlists")?;
    let output = batch::run_batch(Arc::new(orchestrator), args.inputs.clone(), args.workers);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (input, result) in args.inputs.iter().zip(&output.results) {
        let mut value = match result {
            Ok(record) => {
                let mut value = serde_json::to_value(record)?;
                if args.presentation {
                    value["presentation_level"] =
                        serde_json::Value::from(risk::presentation_level(record).as_str());
                }
                value
            }
            Err(err) => err.to_json(),
        };
        value["input"] = serde_json::Value::from(input.display().to_string());
        serde_json::to_writer(&mut out, &value)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    sink.flush()?;

    if output.stats.failed > 0 {
        bail!("{} of {} scans failed", output.stats.failed, args.inputs.len());
    }
    info!("ioctriage run finished");
    Ok(())
}

fn run_history(args: HistoryArgs) -> Result<()> {
    let mut stores: Vec<_> = std::fs::read_dir(&args.output)
        .with_context(|| format!("reading {}", args.output.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join(store::sqlite::DB_FILE))
        .filter(|path| path.is_file())
        .collect();
    stores.sort();

    let mut records = Vec::new();
    for path in &stores {
        let sink = SqliteSink::open(path)?;
        records.extend(sink.recent(args.limit)?);
    }
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records.truncate(args.limit);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in &records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    if records.is_empty() {
        info!("no stored scans under {}", args.output.display());
    }
    Ok(())
}
