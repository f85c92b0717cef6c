// tests/config_env.rs
//
// ExplainerConfig::load(): file location, env overrides and API key resolution.
// Every test mutates process env, so they run serially.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use finance_term_explainer::bootstrap::log_config_loaded;
use finance_term_explainer::ExplainerConfig;
use serial_test::serial;

const VARS: &[&str] = &[
    "EXPLAINER_CONFIG_PATH",
    "EXPLAINER_GLOSSARY_PATH",
    "EXPLAINER_APPROX_THRESHOLD",
    "EXPLAINER_CACHE_TTL_SECS",
];

fn clear_env() {
    for v in VARS {
        std::env::remove_var(v);
    }
}

#[test]
#[serial]
fn bundled_config_loads_with_defaults() {
    clear_env();
    let cfg = ExplainerConfig::load().expect("load bundled config");
    assert_eq!(cfg.glossary.path, "data/glossary.csv");
    assert!((cfg.resolver.accept_distance - 0.38).abs() < 1e-6);
    assert_eq!(cfg.cache_ttl(), Duration::from_secs(86_400));
    assert_eq!(cfg.embedding.provider, "openai");
}

#[test]
#[serial]
fn env_overrides_take_precedence() {
    clear_env();
    std::env::set_var("EXPLAINER_GLOSSARY_PATH", "other/terms.csv");
    std::env::set_var("EXPLAINER_APPROX_THRESHOLD", "0.25");
    std::env::set_var("EXPLAINER_CACHE_TTL_SECS", "120");

    let cfg = ExplainerConfig::load().expect("load");
    assert_eq!(cfg.glossary.path, "other/terms.csv");
    assert!((cfg.resolver.accept_distance - 0.25).abs() < 1e-6);
    assert_eq!(cfg.cache_ttl(), Duration::from_secs(120));

    // garbage values are ignored
    std::env::set_var("EXPLAINER_APPROX_THRESHOLD", "wide");
    std::env::set_var("EXPLAINER_CACHE_TTL_SECS", "0");
    let cfg = ExplainerConfig::load().expect("load");
    assert!((cfg.resolver.accept_distance - 0.38).abs() < 1e-6);
    assert_eq!(cfg.cache.ttl_secs, 86_400);
    clear_env();
}

#[test]
#[serial]
fn explicit_config_path_is_read_and_must_exist() {
    clear_env();
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(
        f,
        "[resolver]\naccept_distance = 0.5\n\n[embedding]\nprovider = \" Hashing \"\n"
    )
    .expect("write toml");
    std::env::set_var("EXPLAINER_CONFIG_PATH", f.path());
    let cfg = ExplainerConfig::load().expect("load explicit");
    assert!((cfg.resolver.accept_distance - 0.5).abs() < 1e-6);
    assert_eq!(cfg.embedding.provider, "hashing");
    assert_eq!(cfg.glossary.path, "data/glossary.csv", "unset sections default");

    std::env::set_var("EXPLAINER_CONFIG_PATH", "does/not/exist.toml");
    assert!(ExplainerConfig::load().is_err());
    clear_env();
}

#[test]
#[serial]
fn api_key_env_placeholder_reads_openai_key() {
    clear_env();
    let mut cfg = ExplainerConfig::default();
    assert_eq!(cfg.openai.api_key, "ENV");

    std::env::set_var("OPENAI_API_KEY", "  sk-test  ");
    assert_eq!(cfg.resolved_api_key(), "sk-test");
    std::env::remove_var("OPENAI_API_KEY");
    assert_eq!(cfg.resolved_api_key(), "");

    cfg.openai.api_key = "sk-inline".into();
    assert_eq!(cfg.resolved_api_key(), "sk-inline");
}

/// Log sink shared with a test subscriber.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
#[serial]
fn missing_key_is_warned_about_once_at_load() {
    clear_env();
    std::env::remove_var("EXPLAINER_TEST_MODE");
    std::env::remove_var("OPENAI_API_KEY");
    let cfg = ExplainerConfig::default();
    assert!(cfg.wants_remote());

    let sink = Captured::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        assert_eq!(cfg.resolved_api_key(), "");
        log_config_loaded(&cfg);
        assert_eq!(cfg.resolved_api_key(), "");
    });

    let logs = String::from_utf8(sink.0.lock().expect("log buffer").clone()).expect("utf-8");
    assert_eq!(logs.matches("OPENAI_API_KEY not set").count(), 1, "{logs}");
    assert!(logs.contains("key_len=0"), "{logs}");
}
