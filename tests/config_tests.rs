//! Unit tests for the configuration module

use swap_solver::SolverConfig;

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::build_offline_config;

/// What is tested: a well-formed config passes validation
#[test]
fn test_config_validation_success() {
    let config = build_offline_config();
    assert!(config.validate().is_ok());
}

/// What is tested: zero timing constants are rejected
/// Why: a zero poll interval would spin the watchers hot
#[test]
fn test_rejects_zero_poll_interval() {
    let mut config = build_offline_config();
    config.service.poll_interval_ms = 0;
    assert!(config.validate().is_err());
}

/// What is tested: the timelock buffer must leave a usable window
/// Why: buffer >= user timelock makes every counter-lock expired on arrival
#[test]
fn test_rejects_buffer_exceeding_user_timelock() {
    let mut config = build_offline_config();
    config.service.timelock_buffer_secs = config.service.user_timelock_secs;
    assert!(config.validate().is_err());
}

/// What is tested: address shapes are validated per chain
#[test]
fn test_rejects_wrong_address_shapes() {
    // EVM addresses are 20 bytes
    let mut config = build_offline_config();
    config.evm_chain.solver_address = test_helpers::DUMMY_AZTEC_SOLVER_ADDR.to_string();
    assert!(config.validate().is_err());

    // Aztec addresses are 32-byte fields
    let mut config = build_offline_config();
    config.aztec_chain.htlc_contract_addr = test_helpers::DUMMY_EVM_HTLC_ADDR.to_string();
    assert!(config.validate().is_err());

    // 0x prefix is required
    let mut config = build_offline_config();
    config.evm_chain.htlc_contract_addr = "0000000000000000000000000000000000000002".to_string();
    assert!(config.validate().is_err());
}

/// What is tested: the chain identity fields must be set
/// Why: they gate which lock events this deployment reacts to
#[test]
fn test_rejects_missing_chain_identities() {
    let mut config = build_offline_config();
    config.aztec_chain.chain_label = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = build_offline_config();
    config.evm_chain.chain_id = 0;
    assert!(config.validate().is_err());
}

/// What is tested: the shipped template parses and validates
/// Why: operators start from the template; it must be loadable as-is
#[test]
fn test_template_loads() {
    let config = SolverConfig::load_from_path(Some("config/solver.template.toml")).unwrap();
    assert_eq!(config.evm_chain.reward_denominator, 10);
    assert_eq!(config.aztec_chain.reward_denominator, 0);
    assert!(config.service.timelock_buffer_secs < config.service.user_timelock_secs);
}

/// What is tested: a missing config file produces the copy-the-template hint
#[test]
fn test_missing_file_error_mentions_template() {
    let err = SolverConfig::load_from_path(Some("config/does-not-exist.toml")).unwrap_err();
    assert!(err.to_string().contains("solver.template.toml"));
}
