use std::sync::Arc;

use sql_adapter::driver::Capabilities;
use sql_adapter::prelude::*;
use sql_adapter::test_support::{FakeDriver, FakeState};

fn adapter_with(config: AdapterConfig) -> (Adapter<FakeDriver>, Arc<FakeState>) {
    let driver = FakeDriver::new();
    let state = Arc::clone(&driver.state);
    let adapter = Adapter::new(driver, config).expect("valid config");
    (adapter, state)
}

#[test]
fn connect_runs_session_setup_in_order() -> Result<(), AdapterError> {
    let mut config = AdapterConfig::new("app_test");
    config.encoding = Some("utf8mb4".to_string());
    let (mut adapter, state) = adapter_with(config);

    adapter.connect()?;

    assert_eq!(
        state.direct_queries(),
        ["SET NAMES utf8mb4", "SET SQL_AUTO_IS_NULL=0"]
    );
    Ok(())
}

#[test]
fn reconnect_flag_is_applied_only_when_configured() -> Result<(), AdapterError> {
    let mut config = AdapterConfig::new("app_test");
    config.reconnect = true;
    let (mut adapter, state) = adapter_with(config);
    adapter.connect()?;
    assert_eq!(state.set_reconnect_calls(), [true]);

    let (mut plain, plain_state) = adapter_with(AdapterConfig::new("app_test"));
    plain.connect()?;
    assert!(plain_state.set_reconnect_calls().is_empty());
    Ok(())
}

#[test]
fn connect_failure_surfaces_the_driver_error() {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    state.fail_next_connect(true);

    let err = adapter.connect().expect_err("connect fails");
    assert_eq!(err.driver_error().and_then(|e| e.code), Some(2002));
    assert!(!adapter.is_active());
}

#[test]
fn is_active_reports_probe_health_without_raising() -> Result<(), AdapterError> {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    assert!(!adapter.is_active());

    adapter.connect()?;
    assert!(adapter.is_active());

    state.set_stat_ok(false);
    assert!(!adapter.is_active());

    // An error code left on the handle also means not-active.
    state.set_stat_ok(true);
    state.set_last_error_code(Some(2006));
    assert!(!adapter.is_active());
    Ok(())
}

#[test]
fn is_active_falls_back_to_a_trivial_query_without_a_status_call() -> Result<(), AdapterError> {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    state.set_capabilities(Capabilities {
        status_probe: false,
        change_user: true,
        reconnect_flag: true,
        insert_id: true,
        server_info: true,
    });
    adapter.connect()?;
    state.put_rows("SELECT 1", &["1"], vec![vec![Value::Int(1)]]);

    assert!(adapter.is_active());
    assert!(state.direct_queries().contains(&"SELECT 1".to_string()));
    // The check releases the result it fetched.
    assert_eq!(state.raw_frees(), 1);

    state.fail_query_of("SELECT 1");
    assert!(!adapter.is_active());
    Ok(())
}

#[test]
fn fallback_liveness_check_also_minds_the_error_code() -> Result<(), AdapterError> {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    state.set_capabilities(Capabilities {
        status_probe: false,
        change_user: true,
        reconnect_flag: true,
        insert_id: true,
        server_info: true,
    });
    adapter.connect()?;
    assert!(adapter.is_active());

    state.set_last_error_code(Some(2006));
    assert!(!adapter.is_active());
    Ok(())
}

#[test]
fn disconnect_swallows_close_failures() -> Result<(), AdapterError> {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    adapter.connect()?;
    state.fail_connection_close(true);

    adapter.disconnect();

    assert_eq!(state.connection_closes(), 1);
    assert!(!adapter.is_active());
    Ok(())
}

#[test]
fn reconnect_drops_every_cached_statement() -> Result<(), AdapterError> {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    adapter.connect()?;
    let sql = "SELECT id FROM users WHERE id = ?";
    adapter.execute(sql, &[Value::Int(1)])?;

    adapter.reconnect()?;

    assert_eq!(state.connects(), 2);
    assert_eq!(adapter.statement_cache_len(), 0);
    assert_eq!(state.close_count(sql), 1);

    adapter.execute(sql, &[Value::Int(1)])?;
    assert_eq!(state.prepare_count(sql), 2);
    assert!(!state.has_double_close());
    Ok(())
}

#[test]
fn connecting_again_closes_the_previous_session_first() -> Result<(), AdapterError> {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    adapter.connect()?;
    let sql = "SELECT id FROM users WHERE id = ?";
    adapter.execute(sql, &[Value::Int(1)])?;

    adapter.connect()?;

    assert_eq!(state.connects(), 2);
    assert_eq!(state.connection_closes(), 1);
    assert_eq!(adapter.statement_cache_len(), 0);
    assert_eq!(state.close_count(sql), 1);
    assert!(!state.has_double_close());
    Ok(())
}

#[test]
fn reset_reauthenticates_and_reruns_session_setup() -> Result<(), AdapterError> {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    adapter.connect()?;

    adapter.reset()?;

    assert_eq!(state.change_user_calls(), ["root"]);
    let setup_runs = state
        .direct_queries()
        .iter()
        .filter(|q| *q == "SET SQL_AUTO_IS_NULL=0")
        .count();
    assert_eq!(setup_runs, 2);
    Ok(())
}

#[test]
fn reset_is_a_no_op_without_the_change_user_capability() -> Result<(), AdapterError> {
    let (mut adapter, state) = adapter_with(AdapterConfig::new("app_test"));
    state.set_capabilities(Capabilities {
        status_probe: true,
        change_user: false,
        reconnect_flag: true,
        insert_id: true,
        server_info: true,
    });
    adapter.connect()?;

    adapter.reset()?;

    assert!(state.change_user_calls().is_empty());
    Ok(())
}

#[test]
fn server_info_is_gated_on_the_capability() -> Result<(), AdapterError> {
    let (mut adapter, _state) = adapter_with(AdapterConfig::new("app_test"));
    adapter.connect()?;
    assert_eq!(adapter.server_info(), Some("8.0.0-fake".to_string()));

    let (mut gated, gated_state) = adapter_with(AdapterConfig::new("app_test"));
    gated_state.set_capabilities(Capabilities {
        status_probe: true,
        change_user: true,
        reconnect_flag: true,
        insert_id: true,
        server_info: false,
    });
    gated.connect()?;
    assert_eq!(gated.server_info(), None);
    Ok(())
}

#[test]
fn config_defaults_and_validation() {
    let config: AdapterConfig =
        serde_json::from_str(r#"{ "database": "app_test" }"#).expect("deserializes");
    assert_eq!(config.username, "root");
    assert_eq!(config.password, "");
    assert!(!config.reconnect);
    assert_eq!(config.statement_cache_limit, 1000);
    assert!(config.validate().is_ok());

    let missing = AdapterConfig::new("");
    assert!(matches!(missing.validate(), Err(AdapterError::Config(_))));

    let mut zero = AdapterConfig::new("app_test");
    zero.statement_cache_limit = 0;
    assert!(matches!(zero.validate(), Err(AdapterError::Config(_))));
}
