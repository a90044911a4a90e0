//! deckcheck - presentation conformance checker CLI
//!
//! Loads HTML slide decks in a headless browser, classifies every slide,
//! applies the layout rules for its type and reports the results.
//!
//! ## Commands
//!
//! - `run`: validate presentations, write screenshots and JSON reports
//! - `rules`: print the effective rule set as TOML
//!
//! Exit codes: 0 all gating rules passed, 1 at least one rule failed,
//! 2 the harness could not run.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};

use deckcheck_chrome::{ChromeConfig, ChromeDriver};
use deckcheck_core::fakes::{ScriptedDeck, ScriptedDriver};
use deckcheck_core::reporter::{EXIT_HARNESS_ERROR, EXIT_OK};
use deckcheck_core::{
    obs, telemetry, Batch, HarnessConfig, PresentationSpec, RendererKind, Reporter, Runner,
    SlideDriver, Viewport,
};

#[derive(Parser)]
#[command(name = "deckcheck")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Presentation conformance checker", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate presentations against the rule set
    Run(RunArgs),

    /// Print the effective rule set (classifier, default and per-type rules)
    Rules {
        /// Harness configuration file
        #[arg(short, long, env = "DECKCHECK_CONFIG", default_value = "deckcheck.toml")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Harness configuration file
    #[arg(short, long, env = "DECKCHECK_CONFIG", default_value = "deckcheck.toml")]
    config: PathBuf,

    /// Presentation to check as NAME=URL_OR_PATH; replaces configured presentations
    #[arg(short, long = "target", value_name = "NAME=URL", value_parser = parse_target)]
    targets: Vec<PresentationSpec>,

    /// Viewport as WIDTHxHEIGHT; replaces configured viewports
    #[arg(long = "viewport", value_name = "WxH")]
    viewports: Vec<Viewport>,

    /// Directory for screenshots and reports
    #[arg(short, long, env = "DECKCHECK_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Maximum presentations validated at once
    #[arg(long, env = "DECKCHECK_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Renderer integration: auto, reveal, slidev or marp
    #[arg(long, env = "DECKCHECK_RENDERER")]
    renderer: Option<RendererKind>,

    /// Delay after each navigation, in milliseconds
    #[arg(long = "settle-ms", env = "DECKCHECK_SETTLE_MS")]
    settle_ms: Option<u64>,

    /// Bounded wait for the renderer's ready signal, in milliseconds
    #[arg(long = "load-timeout-ms", env = "DECKCHECK_LOAD_TIMEOUT_MS")]
    load_timeout_ms: Option<u64>,

    /// Chrome/Chromium binary
    #[arg(long, env = "DECKCHECK_CHROME")]
    chrome: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Replay a JSON fixture of scripted slides instead of launching a browser
    #[arg(long, value_name = "FIXTURE.json")]
    dry_run: Option<PathBuf>,
}

fn parse_target(s: &str) -> std::result::Result<PresentationSpec, String> {
    let (name, target) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got '{}'", s))?;
    let (name, target) = (name.trim(), target.trim());
    if name.is_empty() || target.is_empty() {
        return Err(format!("expected NAME=URL, got '{}'", s));
    }
    Ok(PresentationSpec::new(name, target))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    let code = match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Rules { config } => cmd_rules(&config).map(|()| EXIT_OK),
    }
    .unwrap_or_else(|err| {
        eprintln!("✗ {:#}", err);
        EXIT_HARNESS_ERROR
    });

    std::process::exit(code);
}

/// Fold CLI flags over the file configuration.
fn apply_overrides(config: &mut HarnessConfig, args: &RunArgs) {
    if !args.targets.is_empty() {
        config.presentations = args.targets.clone();
    }
    if !args.viewports.is_empty() {
        for p in &mut config.presentations {
            p.viewports = args.viewports.clone();
        }
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(renderer) = args.renderer {
        config.driver.renderer = renderer;
    }
    if let Some(ms) = args.settle_ms {
        config.driver.settle_delay_ms = ms;
    }
    if let Some(ms) = args.load_timeout_ms {
        config.driver.load_timeout_ms = ms;
    }
    if let Some(path) = &args.chrome {
        config.driver.chrome_path = Some(path.clone());
    }
    if args.headed {
        config.driver.headless = false;
    }
}

fn load_config(path: &Path) -> Result<HarnessConfig> {
    HarnessConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

async fn cmd_run(args: RunArgs) -> Result<i32> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args);

    let driver: Arc<dyn SlideDriver> = match &args.dry_run {
        Some(fixture) => {
            let deck = ScriptedDeck::from_json_file(fixture)
                .with_context(|| format!("Failed to load fixture {}", fixture.display()))?;
            if config.presentations.is_empty() {
                let name = fixture
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "fixture".to_string());
                config
                    .presentations
                    .push(PresentationSpec::new(name, fixture.to_string_lossy()));
            }
            info!(fixture = %fixture.display(), "dry run with scripted slides");
            Arc::new(ScriptedDriver::single(deck))
        }
        None => Arc::new(ChromeDriver::new(ChromeConfig::from(&config.driver))),
    };

    config.validate().context("Invalid configuration")?;
    if config.presentations.is_empty() {
        anyhow::bail!("No presentations configured (use --target NAME=URL or [[presentation]])");
    }
    let rule_set = config.rule_set().context("Invalid rule set")?;

    let runner = Runner::new(driver, Arc::new(rule_set), config.run_config());
    let plan = Batch::plan(&config.presentations);
    let labels: Vec<String> = plan.iter().map(|t| t.label.clone()).collect();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling remaining slides");
            cancel_tx.send(true).ok();
        }
    });

    let reports = Batch::new(runner, config.concurrency)
        .run_until_cancelled(plan, cancel_rx)
        .await;
    let batch = Reporter::summarize_batch(&reports);

    for ((label, summary), report) in labels.iter().zip(&batch.presentations).zip(&reports) {
        Reporter::write_report(&config.output_dir, label, summary, report)
            .with_context(|| format!("Failed to write report for {}", label))?;
    }
    let summary_path = Reporter::write_batch_summary(&config.output_dir, &batch)
        .context("Failed to write summary.json")?;

    print!("{}", Reporter::batch_to_text(&batch, &reports));
    println!("Reports: {}", summary_path.display());

    obs::emit_batch_finished(reports.len(), batch.verdict.label());
    Ok(batch.exit_code())
}

fn cmd_rules(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let rule_set = config.rule_set().context("Invalid rule set")?;
    let text = toml::to_string_pretty(&rule_set.to_config()).context("Failed to render rules")?;
    println!("# digest: {}", rule_set.digest());
    print!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckcheck_core::reporter::EXIT_RULES_FAILED;

    const FIXTURE: &str = r#"{
        "renderer": "reveal",
        "slides": [
            { "root_classes": ["section-slide"],
              "elements": { "h1, h2": { "elements": [
                  { "rect": {"x": 100, "y": 100, "width": 600, "height": 80}, "has_text": true }
              ] } } },
            { "root_classes": ["title-slide"],
              "elements": { "h1": { "elements": [
                  { "rect": {"x": 100, "y": 100, "width": 600, "height": 80},
                    "style": {"text-align": "left"}, "has_text": true }
              ] } } }
        ]
    }"#;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["deckcheck", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("parse").command {
            Commands::Run(args) => args,
            Commands::Rules { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_target() {
        let p = parse_target("intro=http://localhost:8000/?a=b").unwrap();
        assert_eq!(p.name, "intro");
        assert_eq!(p.target, "http://localhost:8000/?a=b");
        assert!(parse_target("no-equals").is_err());
        assert!(parse_target("=x").is_err());
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let args = run_args(&[
            "--target",
            "a=a.html",
            "--target",
            "b=b.html",
            "--viewport",
            "1280x720",
            "--viewport",
            "800x600",
            "--renderer",
            "marp",
            "--settle-ms",
            "0",
            "--concurrency",
            "3",
            "--headed",
        ]);
        let mut config = HarnessConfig::default();
        config
            .presentations
            .push(PresentationSpec::new("old", "old.html"));
        apply_overrides(&mut config, &args);

        let names: Vec<&str> = config.presentations.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(
            config.presentations[1].viewports,
            vec![Viewport::new(1280, 720), Viewport::new(800, 600)]
        );
        assert_eq!(config.driver.renderer, RendererKind::Marp);
        assert_eq!(config.driver.settle_delay_ms, 0);
        assert_eq!(config.concurrency, 3);
        assert!(!config.driver.headless);
    }

    #[test]
    fn test_rejects_bad_viewport() {
        let argv = ["deckcheck", "run", "--viewport", "wide"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_exit_code_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("deck.json");
        std::fs::write(&fixture, FIXTURE).unwrap();
        let out = dir.path().join("out");

        let args = run_args(&[
            "--config",
            dir.path().join("missing.toml").to_str().unwrap(),
            "--dry-run",
            fixture.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ]);
        let code = cmd_run(args).await.unwrap();

        // the title heading is left-aligned and there is no logo
        assert_eq!(code, EXIT_RULES_FAILED);
        assert!(out.join("deck-report.json").exists());
        assert!(out.join("summary.json").exists());
        assert!(out.join("deck-slide-0-section.png").exists());
        assert!(out.join("deck-slide-1-title.png").exists());
    }

    #[tokio::test]
    async fn test_invalid_config_is_harness_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("deckcheck.toml");
        std::fs::write(&config, "concurrency = 0\n").unwrap();
        let args = run_args(&["--config", config.to_str().unwrap()]);
        assert!(cmd_run(args).await.is_err());
    }

    #[tokio::test]
    async fn test_flag_overrides_invalid_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("deck.json");
        std::fs::write(&fixture, FIXTURE).unwrap();
        let config = dir.path().join("deckcheck.toml");
        std::fs::write(&config, "concurrency = 0\n").unwrap();
        let out = dir.path().join("out");

        let args = run_args(&[
            "--config",
            config.to_str().unwrap(),
            "--concurrency",
            "3",
            "--dry-run",
            fixture.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ]);
        let code = cmd_run(args).await.unwrap();
        assert_eq!(code, EXIT_RULES_FAILED);
    }

    #[tokio::test]
    async fn test_colliding_target_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = run_args(&[
            "--config",
            dir.path().join("missing.toml").to_str().unwrap(),
            "--target",
            "day 1=a.html",
            "--target",
            "day_1=b.html",
        ]);
        let err = cmd_run(args).await.unwrap_err();
        assert!(format!("{:#}", err).contains("overwrite"), "{:#}", err);
    }

    #[test]
    fn test_rules_with_missing_config_uses_builtin() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cmd_rules(&dir.path().join("absent.toml")).is_ok());
    }

    #[test]
    fn test_rules_rejects_invalid_rule_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("deckcheck.toml");
        std::fs::write(
            &config,
            "[[rules.default]]\nname = \"x\"\ntype = \"text_alignment\"\nselector = \"h1\"\nexpected = \"diagonal\"\n",
        )
        .unwrap();
        assert!(cmd_rules(&config).is_err());
    }
}
