use std::sync::Arc;

use sql_adapter::prelude::*;
use sql_adapter::test_support::{FakeDriver, FakeState};

fn connected_adapter() -> (Adapter<FakeDriver>, Arc<FakeState>) {
    let driver = FakeDriver::new();
    let state = Arc::clone(&driver.state);
    let mut adapter = Adapter::new(driver, AdapterConfig::new("app_test")).expect("valid config");
    adapter.connect().expect("connect");
    (adapter, state)
}

#[test]
fn begin_starts_a_transaction_on_a_supporting_backend() -> Result<(), AdapterError> {
    let (mut adapter, state) = connected_adapter();

    let outcome = adapter.begin_transaction()?;

    assert!(outcome.is_started());
    assert!(state.direct_queries().contains(&"BEGIN".to_string()));
    Ok(())
}

#[test]
fn begin_tolerates_a_non_transactional_storage_engine() -> Result<(), AdapterError> {
    let (mut adapter, state) = connected_adapter();
    state.reject_begin(1178);

    let outcome = adapter.begin_transaction()?;

    assert_eq!(outcome, BeginOutcome::UnsupportedByBackend);
    Ok(())
}

#[test]
fn begin_propagates_unrelated_driver_errors() {
    let (mut adapter, state) = connected_adapter();
    state.reject_begin(1064);

    let err = adapter
        .begin_transaction()
        .expect_err("only the unsupported class is tolerated");
    assert_eq!(err.driver_error().and_then(|e| e.code), Some(1064));
}
