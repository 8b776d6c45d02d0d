// tests/config_env_tests.rs
//
// Reads the real process environment, so it lives in its own test binary
// and sets every variable from a single test.
use tiered_health::config::load_config;

#[test]
fn environment_layers_over_defaults() {
    std::env::set_var("TIERED_HEALTH__SERVER__PORT", "9191");
    std::env::set_var("TIERED_HEALTH__EVALUATION__TIMEOUT_MS", "777");
    std::env::set_var("HEALTH_READY_URL", "/rz");
    std::env::set_var("healthReadyUrl", "/ignored");
    std::env::set_var("healthLiveUrl", "/lz");

    let config = load_config(None).unwrap();

    assert_eq!(config.server.port, 9191);
    assert_eq!(config.evaluation.timeout_ms, 777);
    let paths: Vec<_> = config.tiers.iter().map(|t| t.path.as_str()).collect();
    assert_eq!(paths, vec!["/lz", "/rz"]);

    std::env::set_var("TIERED_HEALTH__EVALUATION__TIMEOUT_MS", "0");
    let err = load_config(None).unwrap_err();
    assert!(format!("{:#}", err).contains("greater than zero"));
}
