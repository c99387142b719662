use std::collections::HashMap;
use std::io::Write;

use courier::config::Settings;

/// Parse an env file the way `main` does, but into a map instead of the
/// process environment, so tests stay isolated.
fn parse_env_file(content: &str) -> HashMap<String, String> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();

    dotenvy::from_path_iter(&path)
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
}

#[test]
fn settings_from_env_file() {
    let map = parse_env_file(
        r#"
ZEEBE_CLIENT_ID=my-client
ZEEBE_CLIENT_SECRET=my-secret
CAMUNDA_CLUSTER_ID=a1b2c3
CAMUNDA_REGION=bru-2
"#,
    );

    let settings = Settings::from_lookup(|key| map.get(key).cloned()).unwrap();
    assert_eq!(settings.client_id, "my-client");
    assert_eq!(settings.client_secret, "my-secret");
    assert_eq!(settings.address, "https://a1b2c3.bru-2.zeebe.camunda.io");
}

#[test]
fn env_file_with_quotes_and_comments() {
    let map = parse_env_file(
        r#"
# cluster credentials
ZEEBE_CLIENT_ID="quoted-client"
ZEEBE_CLIENT_SECRET='quoted-secret'
ZEEBE_ADDRESS=localhost:26500
"#,
    );

    let settings = Settings::from_lookup(|key| map.get(key).cloned()).unwrap();
    assert_eq!(settings.client_id, "quoted-client");
    assert_eq!(settings.client_secret, "quoted-secret");
    assert_eq!(settings.address, "https://localhost:26500");
}

#[test]
fn incomplete_env_file_fails_deterministically() {
    let map = parse_env_file("ZEEBE_CLIENT_ID=only-the-id\n");

    let result = Settings::from_lookup(|key| map.get(key).cloned());
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("ZEEBE_CLIENT_SECRET")
    );
}
