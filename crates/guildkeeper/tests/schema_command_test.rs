//! Tests for the schema lifecycle commands.

use guildkeeper::cli::{SchemaCommands, handle_schema_command, render_diff};
use guildkeeper::{
    Database, GuildkeeperConfig, SchemaSettings, SchemaSnapshot, catalog, prepare_schema,
};

#[tokio::test]
async fn test_diff_against_saved_snapshot() {
    let snapshot = SchemaSnapshot::of(&catalog().unwrap());
    let path = std::env::temp_dir().join(format!("guildkeeper_snapshot_{}.json", std::process::id()));
    std::fs::write(&path, snapshot.to_json().unwrap()).unwrap();

    let config = GuildkeeperConfig::default();
    handle_schema_command(SchemaCommands::Diff { snapshot: path.clone() }, &config)
        .await
        .unwrap();

    let saved = SchemaSnapshot::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(render_diff(&saved.diff(&snapshot)), "No schema changes\n");

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_diff_missing_snapshot_is_config_error() {
    let config = GuildkeeperConfig::default();
    let err = handle_schema_command(
        SchemaCommands::Diff {
            snapshot: "does/not/exist.json".into(),
        },
        &config,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Failed to read snapshot"));
}

#[tokio::test]
async fn test_print_needs_no_database() {
    let config = GuildkeeperConfig::default();
    handle_schema_command(SchemaCommands::Print { json: true }, &config)
        .await
        .unwrap();
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_prepare_schema_create_then_reset() {
    let config = GuildkeeperConfig::default();
    let db = Database::connect(config.database_config().unwrap(), catalog().unwrap())
        .await
        .expect("Failed to connect to test database");

    prepare_schema(&db, &SchemaSettings::default()).await.unwrap();
    prepare_schema(&db, &SchemaSettings::default()).await.unwrap();
    prepare_schema(
        &db,
        &SchemaSettings {
            reset_on_startup: true,
            exists_ok: true,
        },
    )
    .await
    .unwrap();

    db.drop_all().await.unwrap();
}
