//! Score command - run a test suite through the language model

use anyhow::{anyhow, Context, Result};
use console::style;
use probsem::cache::ScoreCache;
use probsem::config::{ProjectConfig, UserConfig};
use probsem::model::{Backend, CompletionsScorer, Model};
use probsem::scoring::ProbSem;
use std::time::Instant;
use tracing::{debug, info};

/// Command-line overrides for one scoring run
#[derive(Debug)]
pub struct ScoreArgs {
    pub prompt: String,
    pub test: String,
    pub model: Option<String>,
    pub backend: Option<String>,
    pub base_url: Option<String>,
    pub norm: bool,
    pub temperature: Option<f64>,
    pub no_cache: bool,
}

pub fn run(config: &ProjectConfig, args: ScoreArgs) -> Result<()> {
    let start_time = Instant::now();

    let backend = match args.backend.as_deref() {
        Some(name) => name.parse::<Backend>().map_err(|e| anyhow!(e))?,
        None => config.backend(),
    };
    let model_id = args
        .model
        .clone()
        .unwrap_or_else(|| config.model_id().to_string());

    let mut model_config = config.model_config(&model_id, backend);
    if let Some(url) = args.base_url {
        model_config.base_url = Some(url);
    }

    let user = UserConfig::load()?;
    let scorer = CompletionsScorer::connect(model_config, user.api_key(backend))?;

    let cache = if args.no_cache {
        ScoreCache::in_memory()
    } else {
        let dir = config.cache_dir();
        ScoreCache::open(&dir)
            .with_context(|| format!("Failed to open score cache in {}", dir.display()))?
    };
    match cache.path() {
        Some(path) => debug!("Score cache: {}", path.display()),
        None => debug!("Score cache disabled"),
    }

    let model = Model::new(
        Box::new(scorer),
        args.norm || config.norm(),
        args.temperature.unwrap_or_else(|| config.temperature()),
        cache,
    )?;
    info!("Model: {:?}", model);

    let experiment = ProbSem::load(
        &config.inputs_dir(),
        &args.prompt,
        &args.test,
        model,
        &config.outputs_dir(),
    )?;
    let report = experiment.run()?;

    let summary = report.summary;
    println!("\n{}", style(format!("ProbSem: {}", experiment.run_id())).bold());
    println!("  Examples:       {}", style(summary.n_examples).cyan());
    println!(
        "  Accuracy:       {}",
        style(format!("{:.3}", summary.accuracy)).bold()
    );
    println!(
        "  Expected prob:  {}",
        style(format!("{:.3}", summary.mean_expected_prob)).bold()
    );
    println!(
        "  Results:        {}",
        style(report.results_path.display()).dim()
    );

    info!(
        "Completed successfully in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
