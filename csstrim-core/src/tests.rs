//! End-to-end tests for csstrim-core: config file in, pruned stylesheets out.

use crate::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn write_file(file: &Path, content: &str) {
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(file, content).unwrap();
}

fn setup_temp_project() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir()
        .join("csstrim_tests")
        .join(format!("{}_{}", timestamp, id));

    if dir.exists() {
        fs::remove_dir_all(&dir).ok();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Load `csstrim.toml` from `root` and run it without the cache.
fn run_project(root: &Path) -> RunResult {
    let config = load_config(&root.join(CONFIG_FILE_NAME)).unwrap();
    Csstrim::new(config)
        .base_dir(root)
        .with_cache(false)
        .run()
        .unwrap()
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(path).unwrap()
}

// Scenario: used selectors stay, the unused one goes
#[test]
fn test_card_highlight_scenario() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), r#"<div class="card highlight"></div>"#);
    write_file(
        &root.join("css/site.css"),
        ".card{color:red}.unused-x{color:blue}.highlight{font-weight:bold}",
    );
    write_file(
        &root.join(CONFIG_FILE_NAME),
        r#"
content = ["*.html"]
css = ["css/*.css"]

[safelist]
standard = ["/highlight/"]
"#,
    );

    let result = run_project(&root);

    assert!(!result.has_errors());
    assert_eq!(
        read(root.join("css/site.css")),
        ".card{color:red}.highlight{font-weight:bold}"
    );
}

// Scenario: a media query holding only unused selectors disappears
#[test]
fn test_media_block_removed() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), "<main><p>hi</p></main>");
    write_file(
        &root.join("app.css"),
        "main { display: block }\n@media (max-width: 40em) {\n  .sidebar { display: none }\n  #drawer { width: 0 }\n}\np { margin: 0 }\n",
    );
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"app.css\"]\n",
    );

    run_project(&root);

    let out = read(root.join("app.css"));
    assert!(!out.contains("@media"));
    assert_eq!(out, "main { display: block }\np { margin: 0 }\n");
}

// Scenario: greedy pattern protects an attribute selector the markup lacks
#[test]
fn test_greedy_data_attribute() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), "<button>go</button>");
    write_file(
        &root.join("app.css"),
        "[data-toggle] { cursor: pointer }\n.gone { x: y }\n",
    );
    write_file(
        &root.join(CONFIG_FILE_NAME),
        r#"
content = ["index.html"]
css = ["app.css"]

[safelist]
greedy = ["/^data-/"]
"#,
    );

    run_project(&root);

    assert_eq!(read(root.join("app.css")), "[data-toggle] { cursor: pointer }\n");
}

#[test]
fn test_deep_prefix_and_literal_safelist() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), "<div></div>");
    write_file(
        &root.join("grid.css"),
        ".row:has(.col-md-6){gap:0}.col-md-6{width:50%}.is-open{x:y}.other{x:y}",
    );
    write_file(
        &root.join(CONFIG_FILE_NAME),
        r#"
content = ["index.html"]
css = ["grid.css"]

[safelist]
standard = ["is-open"]
deep = [{ prefix = "col-" }]
"#,
    );

    run_project(&root);

    assert_eq!(
        read(root.join("grid.css")),
        ".row:has(.col-md-6){gap:0}.col-md-6{width:50%}.is-open{x:y}"
    );
}

// Every class and id in markup survives, and surviving bodies are untouched
#[test]
fn test_markup_tokens_are_never_removed() {
    let root = setup_temp_project();
    write_file(
        &root.join("pages/a.html"),
        r#"<section id="hero" class="wide   dark"><span class="md:flex">x</span>"#,
    );
    write_file(&root.join("pages/b.htm"), r#"<nav class='menu'></nav"#);
    let css = "#hero  {  background : url( \"a{b}.png\" ) }\n.wide,.narrow{ width:100% }\n.dark{color : #000;}\n.md\\:flex{display:flex}\n.menu>li{x:y}\n.narrow{}\n";
    write_file(&root.join("style.css"), css);
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"pages/*\"]\ncss = [\"style.css\"]\n",
    );

    let result = run_project(&root);

    assert_eq!(result.sheets[0].removed_selectors, 2);
    assert_eq!(
        read(root.join("style.css")),
        "#hero  {  background : url( \"a{b}.png\" ) }\n.wide{ width:100% }\n.dark{color : #000;}\n.md\\:flex{display:flex}\n.menu>li{x:y}\n"
    );
}

#[test]
fn test_idempotent_second_run() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), r#"<b class="x"></b>"#);
    write_file(
        &root.join("app.css"),
        "/* top */\n.x, .y { a: b }\n@supports (display: grid) {\n  .y { c: d }\n  .x { e: f }\n}\n",
    );
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"app.css\"]\n",
    );

    run_project(&root);
    let first = read(root.join("app.css"));
    let second_result = run_project(&root);
    let second = read(root.join("app.css"));

    assert_eq!(first, second);
    assert_eq!(second_result.removed_count(), 0);
    assert!(!second_result.sheets[0].written);
}

#[test]
fn test_script_references_keep_selectors() {
    let root = setup_temp_project();
    write_file(
        &root.join("index.html"),
        r#"<div id="app"></div><script>el.classList.add("is-visible")</script>"#,
    );
    write_file(&root.join("js/menu.js"), "toggle('menu-open');");
    write_file(
        &root.join("app.css"),
        ".is-visible{a:b}.menu-open{a:b}.never{a:b}",
    );
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\", \"js/**/*.js\"]\ncss = [\"app.css\"]\n",
    );

    run_project(&root);

    assert_eq!(read(root.join("app.css")), ".is-visible{a:b}.menu-open{a:b}");
}

#[test]
fn test_output_directory() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), r#"<p class="a">"#);
    write_file(&root.join("src/css/one.css"), ".a{}.b{}");
    write_file(&root.join("src/css/two.css"), ".b{}p{}");
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"src/**/*.css\"]\noutput = \"dist\"\n",
    );

    let result = run_project(&root);

    assert_eq!(result.sheets.len(), 2);
    assert_eq!(read(root.join("dist/one.css")), ".a{}");
    assert_eq!(read(root.join("dist/two.css")), "p{}");
    assert_eq!(read(root.join("src/css/one.css")), ".a{}.b{}");
}

// A broken stylesheet is reported; the others are still pruned
#[test]
fn test_parse_error_is_per_sheet() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), r#"<p class="a">"#);
    write_file(&root.join("css/good.css"), ".a{}.b{}");
    write_file(&root.join("css/bad.css"), ".a{}\n.b {\n  color: red;\n");
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"css/*.css\"]\n",
    );

    let result = run_project(&root);

    assert_eq!(result.sheets.len(), 1);
    assert_eq!(result.errors.len(), 1);
    match &result.errors[0] {
        CsstrimError::Parse { path, line, column, .. } => {
            assert!(path.ends_with("bad.css"));
            assert_eq!((*line, *column), (2, 4));
        }
        other => panic!("expected parse error, got {:?}", other),
    }
    assert_eq!(read(root.join("css/good.css")), ".a{}");
    assert_eq!(read(root.join("css/bad.css")), ".a{}\n.b {\n  color: red;\n");
}

#[test]
fn test_missing_content_file_is_fatal() {
    let root = setup_temp_project();
    write_file(&root.join("app.css"), ".a{}");
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"missing.html\"]\ncss = [\"app.css\"]\n",
    );

    let config = load_config(&root.join(CONFIG_FILE_NAME)).unwrap();
    let err = Csstrim::new(config).base_dir(&root).run().unwrap_err();

    assert_eq!(err.kind(), "FileAccessError");
    assert_eq!(read(root.join("app.css")), ".a{}");
}

#[test]
fn test_invalid_safelist_pattern_is_fatal() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), "<p>");
    write_file(&root.join("app.css"), ".a{}");
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"app.css\"]\nsafelist = [\"/[unclosed/\"]\n",
    );

    let config = load_config(&root.join(CONFIG_FILE_NAME)).unwrap();
    let err = Csstrim::new(config).base_dir(&root).run().unwrap_err();

    match err {
        CsstrimError::InvalidPattern { pattern, scope, .. } => {
            assert_eq!(pattern, "[unclosed");
            assert_eq!(scope, "standard");
        }
        other => panic!("expected invalid pattern, got {:?}", other),
    }
    assert_eq!(read(root.join("app.css")), ".a{}");
}

#[test]
fn test_blocklist_and_at_rule_options() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), r#"<i class="spin legacy">"#);
    write_file(
        &root.join("app.css"),
        "@keyframes rotate{to{transform:rotate(1turn)}}\n@keyframes pulse{to{opacity:0}}\n@font-face{font-family:Icons;src:url(i.woff)}\n.spin{animation:rotate 1s infinite}\n.legacy{animation:pulse 2s;font-family:Icons}\n",
    );
    write_file(
        &root.join(CONFIG_FILE_NAME),
        r#"
content = ["index.html"]
css = ["app.css"]
blocklist = ["legacy"]
keyframes = true
font_face = true
rejected = true
"#,
    );

    let result = run_project(&root);

    assert_eq!(result.sheets[0].rejected, vec![".legacy"]);
    assert_eq!(
        read(root.join("app.css")),
        "@keyframes rotate{to{transform:rotate(1turn)}}\n.spin{animation:rotate 1s infinite}\n"
    );
}

#[test]
fn test_dry_run_writes_nothing() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), "<p>");
    write_file(&root.join("app.css"), "p{}.x{}");
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"app.css\"]\noutput = \"out\"\n",
    );

    let config = load_config(&root.join(CONFIG_FILE_NAME)).unwrap();
    let result = Csstrim::new(config)
        .base_dir(&root)
        .with_cache(false)
        .dry_run(true)
        .run()
        .unwrap();

    assert_eq!(result.removed_count(), 1);
    assert!(!root.join("out").exists());
    assert_eq!(read(root.join("app.css")), "p{}.x{}");
}

#[test]
fn test_cache_reused_across_runs() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), r#"<p class="a">"#);
    write_file(&root.join("app.css"), ".a{}.b{}");
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"app.css\"]\ncache = true\n",
    );

    let config = load_config(&root.join(CONFIG_FILE_NAME)).unwrap();
    Csstrim::new(config.clone()).base_dir(&root).run().unwrap();
    assert!(root.join(".csstrim/cache.json").exists());

    // markup changes must invalidate the cached tokens
    write_file(&root.join("index.html"), r#"<p class="b">"#);
    write_file(&root.join("app.css"), ".a{}.b{}");
    Csstrim::new(config).base_dir(&root).run().unwrap();
    assert_eq!(read(root.join("app.css")), ".b{}");
}

// Scenario: a comparison inside an inline script must not hide the classes
// the script adds
#[test]
fn test_inline_script_comparison_keeps_class() {
    let root = setup_temp_project();
    write_file(
        &root.join("index.html"),
        "<div class=\"menu\"></div><script>if (a<b) { el.classList.add('open') }</script>",
    );
    write_file(&root.join("app.css"), ".menu{}.open{display:block}.gone{}");
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"app.css\"]\n",
    );

    let result = run_project(&root);
    assert!(!result.has_errors());
    assert_eq!(read(root.join("app.css")), ".menu{}.open{display:block}");
}

#[test]
fn test_cache_is_opt_in() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), r#"<p class="a">"#);
    write_file(&root.join("app.css"), ".a{}.b{}");
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "content = [\"index.html\"]\ncss = [\"app.css\"]\n",
    );

    let config = load_config(&root.join(CONFIG_FILE_NAME)).unwrap();
    Csstrim::new(config).base_dir(&root).run().unwrap();
    assert_eq!(read(root.join("app.css")), ".a{}");
    assert!(!root.join(".csstrim").exists());
}

#[test]
fn test_json_config() {
    let root = setup_temp_project();
    write_file(&root.join("index.html"), r#"<p class="keep">"#);
    write_file(&root.join("app.css"), ".keep{}.drop{}.btn-x{}");
    write_file(
        &root.join("csstrim.json"),
        r#"{"content": ["index.html"], "css": ["app.css"], "safelist": [{"prefix": "btn-"}]}"#,
    );

    let config = load_config(&root.join("csstrim.json")).unwrap();
    Csstrim::new(config)
        .base_dir(&root)
        .with_cache(false)
        .run()
        .unwrap();

    assert_eq!(read(root.join("app.css")), ".keep{}.btn-x{}");
}
