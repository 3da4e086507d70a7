//! Community entity catalog and the typed rows read back from it.

use crate::{Column, ColumnDefault, SchemaRegistry, SqlType, Table};
use chrono::NaiveDateTime;
use guildkeeper_error::SchemaResult;
use serde::{Deserialize, Serialize};

/// `users` table name.
pub const USERS: &str = "users";
/// `guilds` table name.
pub const GUILDS: &str = "guilds";
/// `user_profiles` table name.
pub const USER_PROFILES: &str = "user_profiles";
/// `channels` table name.
pub const CHANNELS: &str = "channels";
/// `roles` table name.
pub const ROLES: &str = "roles";
/// `user_roles` table name.
pub const USER_ROLES: &str = "user_roles";
/// `invites` table name.
pub const INVITES: &str = "invites";
/// `permissions` table name.
pub const PERMISSIONS: &str = "permissions";
/// `user_count_names` table name.
pub const USER_COUNT_NAMES: &str = "user_count_names";

fn serial_unique_index(name: &str) -> SchemaResult<Column> {
    Column::builder(name, SqlType::serial())
        .index(true)
        .unique(true)
        .build()
}

fn big_primary_key(name: &str) -> SchemaResult<Column> {
    Column::builder(name, SqlType::big_integer())
        .primary_key(true)
        .build()
}

fn big(name: &str) -> SchemaResult<Column> {
    Column::new(name, SqlType::big_integer())
}

fn int_default(name: &str, default: i64) -> SchemaResult<Column> {
    Column::builder(name, SqlType::integer())
        .default_value(default)
        .build()
}

fn references(name: &str, table: &str, column: &str) -> SchemaResult<Column> {
    Column::new(
        name,
        SqlType::references(table, column, SqlType::big_integer())?,
    )
}

/// Discord accounts seen by the bot.
pub fn users_table() -> SchemaResult<Table> {
    Table::builder(USERS)
        .column(serial_unique_index("id")?)
        .column(big_primary_key("user_id")?)
        .column(Column::new("created_at", SqlType::timestamp())?)
        .build()
}

/// Per-guild settings and daily counters.
pub fn guilds_table() -> SchemaResult<Table> {
    Table::builder(GUILDS)
        .column(serial_unique_index("id")?)
        .column(big_primary_key("guild_id")?)
        .column(Column::new("created_at", SqlType::timestamp())?)
        .column(big("day_joins")?)
        .column(big("day_removes")?)
        .column(
            Column::builder("bot_prefix", SqlType::varchar(20)?)
                .default_value("!")
                .build()?,
        )
        .column(big("log_channel_id")?)
        .column(big("trophy_channel_id")?)
        .column(big("user_count_channel_id")?)
        .column(int_default("price_minutes", 2)?)
        .column(int_default("price_messages", 5)?)
        .column(Column::new("user_count", SqlType::integer())?)
        .column(
            Column::builder("role_saver", SqlType::Boolean)
                .default_value(true)
                .build()?,
        )
        .build()
}

/// One profile per member per guild, holding activity counters.
pub fn user_profiles_table() -> SchemaResult<Table> {
    Table::builder(USER_PROFILES)
        .column(Column::serial_primary_key("id")?)
        .column(references("user_id", USERS, "user_id")?)
        .column(references("guild_id", GUILDS, "guild_id")?)
        .column(big("channel_id")?)
        .column(Column::new("change_voice_status", SqlType::timestamp())?)
        .column(int_default("coins", 0)?)
        .column(int_default("minutes", 0)?)
        .column(int_default("messages", 0)?)
        .column(int_default("level", 1)?)
        .column(int_default("joins", 0)?)
        .column(
            Column::builder("invites", SqlType::big_integer())
                .default_value(ColumnDefault::Integer(0))
                .build()?,
        )
        .column(int_default("day_minutes", 0)?)
        .column(int_default("day_messages", 0)?)
        .column(Column::new("joined_at", SqlType::timestamp())?)
        .build()
}

/// Text and voice channels with their activity statistics.
pub fn channels_table() -> SchemaResult<Table> {
    Table::builder(CHANNELS)
        .column(serial_unique_index("id")?)
        .column(big_primary_key("channel_id")?)
        .column(references("guild_id", GUILDS, "guild_id")?)
        .column(Column::new("type_channel", SqlType::varchar(20)?)?)
        .column(Column::new("all_statistic", SqlType::integer())?)
        .column(Column::new("day_statistic", SqlType::integer())?)
        .column(Column::new("delete", SqlType::timestamp())?)
        .column(Column::new("name_after_delete", SqlType::text())?)
        .build()
}

/// Guild roles.
pub fn roles_table() -> SchemaResult<Table> {
    Table::builder(ROLES)
        .column(big_primary_key("role_id")?)
        .column(references("guild_id", GUILDS, "guild_id")?)
        .column(Column::new("delete", SqlType::timestamp())?)
        .column(Column::new("name_after_delete", SqlType::text())?)
        .build()
}

/// Roles held by a member of a guild.
pub fn user_roles_table() -> SchemaResult<Table> {
    Table::builder(USER_ROLES)
        .column(Column::serial_primary_key("id")?)
        .column(references("user_id", USERS, "user_id")?)
        .column(references("guild_id", GUILDS, "guild_id")?)
        .column(references("role_id", ROLES, "role_id")?)
        .build()
}

/// Outstanding guild invites and their use counts.
pub fn invites_table() -> SchemaResult<Table> {
    Table::builder(INVITES)
        .column(
            Column::builder("id", SqlType::varchar(20)?)
                .primary_key(true)
                .build()?,
        )
        .column(Column::new("uses", SqlType::integer())?)
        .column(Column::new("max_uses", SqlType::integer())?)
        .column(references("guild_id", GUILDS, "guild_id")?)
        .column(references("profile_id", USER_PROFILES, "id")?)
        .column(references("user_id", USERS, "user_id")?)
        .build()
}

/// Role grants for bot commands.
pub fn permissions_table() -> SchemaResult<Table> {
    Table::builder(PERMISSIONS)
        .column(Column::serial_primary_key("id")?)
        .column(Column::new("command", SqlType::varchar(100)?)?)
        .column(references("guild_id", GUILDS, "guild_id")?)
        .column(references("role_id", ROLES, "role_id")?)
        .build()
}

/// Labels shown in a guild's member-count channel.
pub fn user_count_names_table() -> SchemaResult<Table> {
    Table::builder(USER_COUNT_NAMES)
        .column(Column::serial_primary_key("id")?)
        .column(references("guild_id", GUILDS, "guild_id")?)
        .column(Column::new("name", SqlType::varchar(255)?)?)
        .build()
}

/// Registry holding every community table in dependency order.
///
/// # Errors
///
/// Only fails if a table definition above is inconsistent.
pub fn catalog() -> SchemaResult<SchemaRegistry> {
    SchemaRegistry::new()
        .with(users_table()?)?
        .with(guilds_table()?)?
        .with(user_profiles_table()?)?
        .with(channels_table()?)?
        .with(roles_table()?)?
        .with(user_roles_table()?)?
        .with(invites_table()?)?
        .with(permissions_table()?)?
        .with(user_count_names_table()?)
}

/// Row of `users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct UserRow {
    id: i32,
    user_id: i64,
    created_at: Option<NaiveDateTime>,
}

/// Row of `guilds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct GuildRow {
    id: i32,
    guild_id: i64,
    created_at: Option<NaiveDateTime>,
    day_joins: Option<i64>,
    day_removes: Option<i64>,
    bot_prefix: Option<String>,
    log_channel_id: Option<i64>,
    trophy_channel_id: Option<i64>,
    user_count_channel_id: Option<i64>,
    price_minutes: Option<i32>,
    price_messages: Option<i32>,
    user_count: Option<i32>,
    role_saver: Option<bool>,
}

/// Row of `user_profiles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ProfileRow {
    id: i32,
    user_id: Option<i64>,
    guild_id: Option<i64>,
    channel_id: Option<i64>,
    change_voice_status: Option<NaiveDateTime>,
    coins: Option<i32>,
    minutes: Option<i32>,
    messages: Option<i32>,
    level: Option<i32>,
    joins: Option<i32>,
    invites: Option<i64>,
    day_minutes: Option<i32>,
    day_messages: Option<i32>,
    joined_at: Option<NaiveDateTime>,
}

/// Row of `channels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ChannelRow {
    id: i32,
    channel_id: i64,
    guild_id: Option<i64>,
    type_channel: Option<String>,
    all_statistic: Option<i32>,
    day_statistic: Option<i32>,
    delete: Option<NaiveDateTime>,
    name_after_delete: Option<String>,
}

/// Row of `roles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct RoleRow {
    role_id: i64,
    guild_id: Option<i64>,
    delete: Option<NaiveDateTime>,
    name_after_delete: Option<String>,
}

/// Row of `user_roles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct UserRoleRow {
    id: i32,
    user_id: Option<i64>,
    guild_id: Option<i64>,
    role_id: Option<i64>,
}

/// Row of `invites`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct InviteRow {
    id: String,
    uses: Option<i32>,
    max_uses: Option<i32>,
    guild_id: Option<i64>,
    profile_id: Option<i64>,
    user_id: Option<i64>,
}

/// Row of `permissions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct PermissionRow {
    id: i32,
    command: Option<String>,
    guild_id: Option<i64>,
    role_id: Option<i64>,
}

/// Row of `user_count_names`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct UserCountNameRow {
    id: i32,
    guild_id: Option<i64>,
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Row;
    use serde_json::json;

    #[test]
    fn test_catalog_registers_every_table_in_order() {
        let registry = catalog().unwrap();
        let names: Vec<&str> = registry.tables().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                USERS,
                GUILDS,
                USER_PROFILES,
                CHANNELS,
                ROLES,
                USER_ROLES,
                INVITES,
                PERMISSIONS,
                USER_COUNT_NAMES
            ]
        );
    }

    #[test]
    fn test_guilds_ddl() {
        let statements = guilds_table().unwrap().create_table_sql(true);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("bot_prefix VARCHAR(20) DEFAULT '!'"));
        assert!(statements[0].contains("role_saver BOOLEAN DEFAULT TRUE"));
        assert!(statements[0].contains("price_messages INTEGER DEFAULT (5)"));
        assert!(statements[0].ends_with("PRIMARY KEY (guild_id))"));
        assert_eq!(
            statements[1],
            "CREATE INDEX IF NOT EXISTS guilds_id_idx ON guilds (id)"
        );
    }

    #[test]
    fn test_profile_references() {
        let sql = user_profiles_table().unwrap().create_table_sql(true).remove(0);
        assert!(sql.contains(
            "user_id BIGINT REFERENCES users (user_id) ON DELETE CASCADE ON UPDATE NO ACTION"
        ));
        assert!(sql.contains("id SERIAL"));
        assert!(sql.ends_with("PRIMARY KEY (id))"));
    }

    #[test]
    fn test_profile_row_decodes_nulls() {
        let row = Row::try_from(json!({
            "id": 1,
            "user_id": 10,
            "guild_id": 20,
            "channel_id": null,
            "change_voice_status": null,
            "coins": 0,
            "minutes": 0,
            "messages": 3,
            "level": 1,
            "joins": 0,
            "invites": 0,
            "day_minutes": 0,
            "day_messages": 3,
            "joined_at": null
        }))
        .unwrap();
        let profile: ProfileRow = row.decode().unwrap();
        assert_eq!(*profile.messages(), Some(3));
        assert_eq!(*profile.channel_id(), None);
    }
}
