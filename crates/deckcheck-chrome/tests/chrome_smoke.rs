//! Browser-backed tests. They need a local Chrome/Chromium:
//! `cargo test -p deckcheck-chrome -- --ignored`

use deckcheck_chrome::{ChromeConfig, ChromeDriver};
use deckcheck_core::{
    DriverHandle, NavigationMode, RendererKind, Reporter, RuleSet, RunConfig, RunTarget, Runner,
    SlideDriver, Verdict, Viewport,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Minimal page exposing the reveal.js API surface the driver uses.
const STUB_REVEAL: &str = r#"<!doctype html>
<html><head><style>
  body { margin: 0; }
  .reveal .slides section { display: none; width: 1200px; }
  .reveal .slides section.present { display: block; }
  h1 { text-align: center; }
  .two-columns h2 { text-align: center; }
  .column { display: inline-block; width: 500px; vertical-align: top; }
</style></head>
<body><div class="reveal"><div class="slides">
  <section class="title-slide present"><h1>Deck</h1><img class="logo" src="data:image/gif;base64,R0lGODlhAQABAAAAACw=" width="50" height="50"></section>
  <section class="two-columns"><h2>Columns</h2><div class="column"><p>left</p></div><div class="column"><p>right</p></div></section>
  <section class="section-slide"><h2>Section</h2></section>
</div></div>
<script>
  const slides = Array.from(document.querySelectorAll('.reveal .slides > section'));
  window.Reveal = {
    isReady: () => true,
    getTotalSlides: () => slides.length,
    getSlides: () => slides,
    getIndices: (s) => ({ h: slides.indexOf(s), v: 0 }),
    slide: (h) => slides.forEach((s, i) => s.classList.toggle('present', i === h)),
  };
</script></body></html>"#;

fn write_deck(dir: &std::path::Path) -> String {
    let path = dir.join("deck.html");
    std::fs::write(&path, STUB_REVEAL).unwrap();
    path.to_string_lossy().into_owned()
}

fn chrome() -> ChromeDriver {
    ChromeDriver::new(ChromeConfig {
        renderer: RendererKind::Auto,
        ..ChromeConfig::default()
    })
}

/// Test: auto-detection, navigation and inspection against a stub deck
#[tokio::test]
#[ignore]
async fn test_stub_reveal_deck_is_inspected() {
    let dir = tempfile::tempdir().unwrap();
    let target = write_deck(dir.path());
    let mut handle = chrome().load(&target, Viewport::new(1280, 720)).await.unwrap();

    assert_eq!(handle.renderer(), "reveal");
    assert_eq!(handle.navigation_mode(), NavigationMode::Direct);
    assert_eq!(handle.total_slides().await.unwrap(), 3);

    handle.go_to(1).await.unwrap();
    let selectors: BTreeSet<String> = [".column".to_string(), "h1".to_string()].into();
    let snapshot = handle.inspect(&selectors).await.unwrap();
    assert!(snapshot.root_has_class("two-columns"));
    assert_eq!(snapshot.get(".column").count(), 2);
    assert!(!snapshot.is_present("h1"));

    assert!(handle.go_to(3).await.is_err());
    handle.close().await.unwrap();
    handle.close().await.unwrap();
    assert!(handle.total_slides().await.is_err());
}

/// Test: full run reports the centered heading on the columns slide
#[tokio::test]
#[ignore]
async fn test_full_run_against_stub_deck() {
    let dir = tempfile::tempdir().unwrap();
    let target = write_deck(dir.path());
    let runner = Runner::new(
        Arc::new(chrome()),
        Arc::new(RuleSet::builtin()),
        RunConfig {
            output_dir: dir.path().join("out"),
            ..RunConfig::default()
        },
    );
    let report = runner
        .run(&RunTarget::new("stub", &target, Viewport::default()))
        .await;

    assert!(report.fatal.is_none(), "fatal: {:?}", report.fatal);
    assert_eq!(report.slides.len(), 3);
    assert!(report
        .failures()
        .any(|f| f.slide_index == 1 && f.rule_name == "heading-left"));
    assert_eq!(Reporter::summarize(&report).verdict, Verdict::RulesFailed);
    assert!(dir.path().join("out/stub-slide-0-title.png").exists());
}

/// Test: a page without any known renderer times out
#[tokio::test]
#[ignore]
async fn test_plain_page_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.html");
    std::fs::write(&path, "<html><body><p>no slides</p></body></html>").unwrap();
    let mut config = ChromeConfig::default();
    config.options.load_timeout_ms = 1_000;
    let err = ChromeDriver::new(config)
        .load(path.to_str().unwrap(), Viewport::default())
        .await
        .err()
        .expect("load should time out");
    assert_eq!(err.kind(), "load_timeout");
}
