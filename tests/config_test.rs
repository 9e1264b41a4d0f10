use flow_ledger::config::Config;
use flow_ledger::{Address, ConfigError};
use tempfile::TempDir;

const MATIC: &str = r#"
[ledger]
database = "/var/lib/flow-ledger/ledger.db"

[verify]
page_size = 500
fail_on_mismatch = true

[networks.matic]
name = "Polygon"
indexed_store_endpoint = "https://indexer.example/subgraphs/name/protocol-v1-matic"
rpc_url = "https://rpc.example/matic"
cfa_address = "0x6EeE6060f715257b970700bc2656De21dEdF074C"
ida_address = "0xB0aABBA4B2783A72C52956CDEF62d438ecA2d7a1"
chain_id = 137
"#;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.verify.page_size, 1000);
    assert_eq!(config.verify.chunk_size, 100);
    assert_eq!(config.verify.call_timeout_secs, 30);
    assert!(!config.verify.fail_on_mismatch);
    assert!(config.ledger.database.is_none());
    assert!(config.networks.is_empty());
}

#[test]
fn test_parse_network_and_partial_sections() {
    let config = Config::parse(MATIC, "inline").unwrap();
    assert_eq!(config.verify.page_size, 500);
    // unset keys keep their defaults
    assert_eq!(config.verify.chunk_size, 100);
    assert!(config.verify.fail_on_mismatch);

    let network = config.network("matic").unwrap();
    assert_eq!(network.name, "Polygon");
    assert_eq!(network.chain_id, Some(137));
    assert_eq!(
        network.cfa,
        "0x6eee6060f715257b970700bc2656de21dedf074c".parse::<Address>().unwrap()
    );
}

#[test]
fn test_unsupported_network() {
    let config = Config::parse(MATIC, "inline").unwrap();
    let err = config.network("goerli").unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedNetwork(ref id) if id == "goerli"));
}

#[test]
fn test_invalid_contract_address() {
    let content = MATIC.replace("0xB0aABBA4B2783A72C52956CDEF62d438ecA2d7a1", "0x1234");
    let config = Config::parse(&content, "inline").unwrap();
    let err = config.network("matic").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidAddress { ref network, .. } if network == "matic"));
}

#[test]
fn test_zero_page_size_rejected() {
    let err = Config::parse("[verify]\npage_size = 0\n", "inline").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidSetting { field: "verify.page_size", .. }
    ));
}

#[test]
fn test_malformed_toml_names_origin() {
    let err = Config::parse("[verify\n", "broken.toml").unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flow-ledger.toml");
    std::fs::write(&path, MATIC).unwrap();

    let config = Config::load(&path).unwrap();
    assert!(config.networks.contains_key("matic"));
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.verify.page_size, 1000);
    assert!(config.networks.is_empty());
}
