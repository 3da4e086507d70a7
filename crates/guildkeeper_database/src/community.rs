//! Typed data access for the community catalog.

use crate::models::{
    CHANNELS, GUILDS, GuildRow, INVITES, InviteRow, PERMISSIONS, PermissionRow, ProfileRow, ROLES,
    USER_COUNT_NAMES, USER_PROFILES, USER_ROLES, USERS, UserCountNameRow, UserRoleRow,
};
use crate::{
    Assignment, Database, DatabaseError, DatabaseErrorKind, DatabaseResult, Fields, ListOptions,
    Row, Session,
};
use chrono::NaiveDateTime;
use diesel::query_dsl::RunQueryDsl;
use diesel::sql_types::BigInt;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

/// Voice time beyond this many minutes in one session earns no extra coins.
pub const VOICE_COIN_CAP_MINUTES: i64 = 180;

/// Coins per message when the guild has no price configured.
const DEFAULT_PRICE_MESSAGES: i64 = 5;

/// Coins per voice minute when the guild has no price configured.
const DEFAULT_PRICE_MINUTES: i64 = 2;

/// Attempts before a contended voice session close gives up.
const VOICE_CLOSE_ATTEMPTS: usize = 5;

fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> DatabaseResult<Vec<T>> {
    rows.iter().map(Row::decode).collect()
}

fn decode_one<T: DeserializeOwned>(row: Option<Row>) -> DatabaseResult<Option<T>> {
    row.as_ref().map(Row::decode).transpose()
}

fn profile_filter(guild_id: i64, user_id: i64) -> Fields {
    Fields::new().with("user_id", user_id).with("guild_id", guild_id)
}

/// Insert a user, treating an existing row as success.
fn ensure_user(
    session: &mut Session<'_>,
    user_id: i64,
    created_at: Option<NaiveDateTime>,
) -> DatabaseResult<()> {
    let fields = Fields::new()
        .with("user_id", user_id)
        .with("created_at", created_at);
    match session.transaction(|s| s.insert(USERS, &fields)) {
        Err(e) if e.is_duplicate() => {
            debug!(user_id, "User already stored");
            Ok(())
        }
        other => other,
    }
}

/// Block until no other transaction holds the member's profile lock.
///
/// The lock is released when the enclosing transaction ends. Distinct
/// members may share a key, which only serializes them.
fn lock_member(session: &mut Session<'_>, guild_id: i64, user_id: i64) -> DatabaseResult<()> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1::BIGINT # $2::BIGINT)")
        .bind::<BigInt, _>(guild_id)
        .bind::<BigInt, _>(user_id)
        .execute(session.connection())?;
    Ok(())
}

/// Insert a profile unless the member already has one in the guild.
///
/// Must run inside a transaction: the member lock taken here keeps a
/// concurrent caller from inserting a second profile between the lookup and
/// the insert.
fn ensure_profile(
    session: &mut Session<'_>,
    guild_id: i64,
    user_id: i64,
    joined_at: Option<NaiveDateTime>,
) -> DatabaseResult<bool> {
    lock_member(session, guild_id, user_id)?;
    let filter = profile_filter(guild_id, user_id);
    if session.get(USER_PROFILES, &filter)?.is_some() {
        debug!(guild_id, user_id, "Profile already stored");
        return Ok(false);
    }
    session.insert(USER_PROFILES, &filter.with("joined_at", joined_at))?;
    Ok(true)
}

/// Guild state captured when the bot first joins it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuildSeed {
    /// Guild id
    pub guild_id: i64,
    /// Member count at join time
    pub user_count: Option<i32>,
    /// Channel receiving moderation logs
    pub log_channel_id: Option<i64>,
    /// Role ids
    pub roles: Vec<i64>,
    /// Channel ids with their kind (`text`, `voice`, ...)
    pub channels: Vec<(i64, String)>,
    /// Members with their account creation time and role ids
    pub members: Vec<MemberSeed>,
    /// Invites outstanding at join time
    pub invites: Vec<NewInvite>,
    /// Command names to create permission rows for
    pub commands: Vec<String>,
}

/// Member captured in a [`GuildSeed`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberSeed {
    /// User id
    pub user_id: i64,
    /// Account creation time
    pub created_at: Option<NaiveDateTime>,
    /// Role ids the member holds
    pub roles: Vec<i64>,
}

/// Invite to store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvite {
    /// Invite code
    pub code: String,
    /// Guild the invite belongs to
    pub guild_id: i64,
    /// Inviting user
    pub inviter_id: i64,
    /// Times used so far
    pub uses: i32,
    /// Use limit, 0 for unlimited
    pub max_uses: i32,
}

/// Result of closing a voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// Member has no profile in the guild
    NoProfile,
    /// No session was open, so nothing was credited
    Started,
    /// Session shorter than a minute; timestamp moved forward only
    TooShort,
    /// Minutes and coins credited
    Accrued {
        /// Minutes spent in voice
        minutes: i64,
        /// Coins credited
        coins: i64,
    },
}

/// Data access used by the bot's event handlers and commands.
///
/// Counter changes run as server-side increments. The voice session close
/// guards its read-modify-write with the previously read timestamp, so two
/// concurrent closes cannot both credit the same interval.
#[derive(Debug, Clone)]
pub struct CommunityRepository {
    db: Database,
}

impl CommunityRepository {
    /// Wrap a database whose registry contains the community catalog.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Store a guild with its roles, channels, members, invites and command
    /// permissions in one transaction.
    ///
    /// Single-use invites are skipped. Members already known from another
    /// guild keep their user row.
    ///
    /// # Errors
    ///
    /// Any failure rolls back the whole bootstrap.
    #[instrument(skip(self, seed), fields(guild_id = seed.guild_id, members = seed.members.len()))]
    pub async fn bootstrap_guild(&self, seed: GuildSeed) -> DatabaseResult<()> {
        self.db
            .transaction(move |s| {
                s.insert(
                    GUILDS,
                    &Fields::new()
                        .with("guild_id", seed.guild_id)
                        .with("user_count", seed.user_count)
                        .with("log_channel_id", seed.log_channel_id),
                )?;
                for role_id in &seed.roles {
                    s.insert(
                        ROLES,
                        &Fields::new()
                            .with("role_id", *role_id)
                            .with("guild_id", seed.guild_id),
                    )?;
                }
                for (channel_id, kind) in &seed.channels {
                    s.insert(
                        CHANNELS,
                        &Fields::new()
                            .with("channel_id", *channel_id)
                            .with("type_channel", kind.as_str())
                            .with("guild_id", seed.guild_id),
                    )?;
                }
                for member in &seed.members {
                    ensure_user(s, member.user_id, member.created_at)?;
                    ensure_profile(s, seed.guild_id, member.user_id, None)?;
                    for role_id in &member.roles {
                        s.insert(
                            USER_ROLES,
                            &profile_filter(seed.guild_id, member.user_id)
                                .with("role_id", *role_id),
                        )?;
                    }
                }
                for invite in seed.invites.iter().filter(|i| i.max_uses != 1) {
                    s.insert(INVITES, &invite_fields(invite))?;
                }
                for command in &seed.commands {
                    s.insert(
                        PERMISSIONS,
                        &Fields::new()
                            .with("guild_id", seed.guild_id)
                            .with("command", command.as_str()),
                    )?;
                }
                Ok(())
            })
            .await?;
        info!("Guild bootstrapped");
        Ok(())
    }

    /// Guild settings.
    ///
    /// # Errors
    ///
    /// Fails on driver or decoding errors.
    #[instrument(skip(self))]
    pub async fn guild(&self, guild_id: i64) -> DatabaseResult<Option<GuildRow>> {
        let row = self
            .db
            .get(GUILDS, Fields::new().with("guild_id", guild_id))
            .await?;
        decode_one(row)
    }

    /// Every stored guild.
    ///
    /// # Errors
    ///
    /// Fails on driver or decoding errors.
    #[instrument(skip(self))]
    pub async fn guilds(&self) -> DatabaseResult<Vec<GuildRow>> {
        let rows = self
            .db
            .get_many(GUILDS, Fields::new(), ListOptions::new().sorted_by("id"))
            .await?;
        decode_all(rows)
    }

    /// Store a role.
    ///
    /// # Errors
    ///
    /// Fails with a duplicate error when the role is already stored.
    #[instrument(skip(self))]
    pub async fn add_role(&self, guild_id: i64, role_id: i64) -> DatabaseResult<()> {
        self.db
            .insert(
                ROLES,
                Fields::new()
                    .with("role_id", role_id)
                    .with("guild_id", guild_id),
            )
            .await
    }

    /// Remove a role; grants referencing it cascade.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, role_id: i64) -> DatabaseResult<usize> {
        self.db
            .delete(ROLES, Fields::new().with("role_id", role_id))
            .await
    }

    /// Store a channel.
    ///
    /// # Errors
    ///
    /// Fails with a duplicate error when the channel is already stored.
    #[instrument(skip(self))]
    pub async fn add_channel(&self, guild_id: i64, channel_id: i64, kind: &str) -> DatabaseResult<()> {
        self.db
            .insert(
                CHANNELS,
                Fields::new()
                    .with("channel_id", channel_id)
                    .with("type_channel", kind)
                    .with("guild_id", guild_id),
            )
            .await
    }

    /// Remove a channel.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn delete_channel(&self, channel_id: i64) -> DatabaseResult<usize> {
        self.db
            .delete(CHANNELS, Fields::new().with("channel_id", channel_id))
            .await
    }

    /// Store a member: the user row if new, and a guild profile if missing.
    ///
    /// Returns whether a profile was created.
    ///
    /// # Errors
    ///
    /// Fails on driver errors other than an existing user.
    #[instrument(skip(self))]
    pub async fn add_member(
        &self,
        guild_id: i64,
        user_id: i64,
        created_at: Option<NaiveDateTime>,
        joined_at: Option<NaiveDateTime>,
    ) -> DatabaseResult<bool> {
        self.db
            .transaction(move |s| {
                ensure_user(s, user_id, created_at)?;
                ensure_profile(s, guild_id, user_id, joined_at)
            })
            .await
    }

    /// Member profile in a guild.
    ///
    /// # Errors
    ///
    /// Fails on driver or decoding errors.
    #[instrument(skip(self))]
    pub async fn profile(&self, guild_id: i64, user_id: i64) -> DatabaseResult<Option<ProfileRow>> {
        let row = self
            .db
            .get(USER_PROFILES, profile_filter(guild_id, user_id))
            .await?;
        decode_one(row)
    }

    /// Count a member joining: profile joins and guild daily joins.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn record_join(&self, guild_id: i64, user_id: i64) -> DatabaseResult<()> {
        self.db
            .transaction(move |s| {
                s.update(
                    USER_PROFILES,
                    &profile_filter(guild_id, user_id),
                    &[Assignment::increment("joins", 1)],
                )?;
                s.update(
                    GUILDS,
                    &Fields::new().with("guild_id", guild_id),
                    &[Assignment::increment("day_joins", 1)],
                )?;
                Ok(())
            })
            .await
    }

    /// Count a member leaving in the guild's daily counter.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn record_leave(&self, guild_id: i64) -> DatabaseResult<()> {
        self.db
            .update(
                GUILDS,
                Fields::new().with("guild_id", guild_id),
                vec![Assignment::increment("day_removes", 1)],
            )
            .await?;
        Ok(())
    }

    /// Record that a member holds a role.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn add_user_role(&self, guild_id: i64, user_id: i64, role_id: i64) -> DatabaseResult<()> {
        self.db
            .insert(
                USER_ROLES,
                profile_filter(guild_id, user_id).with("role_id", role_id),
            )
            .await
    }

    /// Forget that a member holds a role.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn remove_user_role(
        &self,
        guild_id: i64,
        user_id: i64,
        role_id: i64,
    ) -> DatabaseResult<usize> {
        self.db
            .delete(
                USER_ROLES,
                profile_filter(guild_id, user_id).with("role_id", role_id),
            )
            .await
    }

    /// Roles recorded for a member, for restoring them on rejoin.
    ///
    /// # Errors
    ///
    /// Fails on driver or decoding errors.
    #[instrument(skip(self))]
    pub async fn user_roles(&self, guild_id: i64, user_id: i64) -> DatabaseResult<Vec<UserRoleRow>> {
        let rows = self
            .db
            .get_many(USER_ROLES, profile_filter(guild_id, user_id), ListOptions::new())
            .await?;
        decode_all(rows)
    }

    /// Store an invite.
    ///
    /// # Errors
    ///
    /// Fails with a duplicate error when the code is already stored.
    #[instrument(skip(self, invite), fields(code = %invite.code))]
    pub async fn add_invite(&self, invite: NewInvite) -> DatabaseResult<()> {
        self.db.insert(INVITES, invite_fields(&invite)).await
    }

    /// Invites stored for a guild.
    ///
    /// # Errors
    ///
    /// Fails on driver or decoding errors.
    #[instrument(skip(self))]
    pub async fn invites(&self, guild_id: i64) -> DatabaseResult<Vec<InviteRow>> {
        let rows = self
            .db
            .get_many(INVITES, Fields::new().with("guild_id", guild_id), ListOptions::new())
            .await?;
        decode_all(rows)
    }

    /// Remove an invite.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn delete_invite(&self, code: &str) -> DatabaseResult<usize> {
        self.db
            .delete(INVITES, Fields::new().with("id", code))
            .await
    }

    /// Count one use of an invite and credit its creator.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn record_invite_use(
        &self,
        code: &str,
        guild_id: i64,
        inviter_id: i64,
    ) -> DatabaseResult<()> {
        let code = code.to_string();
        self.db
            .transaction(move |s| {
                s.update(
                    INVITES,
                    &Fields::new().with("id", code.as_str()),
                    &[Assignment::increment("uses", 1)],
                )?;
                s.update(
                    USER_PROFILES,
                    &profile_filter(guild_id, inviter_id),
                    &[Assignment::increment("invites", 1)],
                )?;
                Ok(())
            })
            .await
    }

    /// Consume a single-use invite: delete it and credit its creator.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn consume_invite(&self, code: &str, guild_id: i64, inviter_id: i64) -> DatabaseResult<()> {
        let code = code.to_string();
        self.db
            .transaction(move |s| {
                s.delete(INVITES, &Fields::new().with("id", code.as_str()))?;
                s.update(
                    USER_PROFILES,
                    &profile_filter(guild_id, inviter_id),
                    &[Assignment::increment("invites", 1)],
                )?;
                Ok(())
            })
            .await
    }

    /// Grant a command, optionally to a single role.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn add_permission(
        &self,
        guild_id: i64,
        command: &str,
        role_id: Option<i64>,
    ) -> DatabaseResult<()> {
        self.db
            .insert(
                PERMISSIONS,
                Fields::new()
                    .with("guild_id", guild_id)
                    .with("command", command)
                    .with("role_id", role_id),
            )
            .await
    }

    /// Permission rows for a command in a guild.
    ///
    /// # Errors
    ///
    /// Fails on driver or decoding errors.
    #[instrument(skip(self))]
    pub async fn permissions_for(&self, guild_id: i64, command: &str) -> DatabaseResult<Vec<PermissionRow>> {
        let rows = self
            .db
            .get_many(
                PERMISSIONS,
                Fields::new()
                    .with("guild_id", guild_id)
                    .with("command", command),
                ListOptions::new(),
            )
            .await?;
        decode_all(rows)
    }

    /// Add a label for the member-count channel.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn add_user_count_name(&self, guild_id: i64, name: &str) -> DatabaseResult<()> {
        self.db
            .insert(
                USER_COUNT_NAMES,
                Fields::new().with("guild_id", guild_id).with("name", name),
            )
            .await
    }

    /// Labels for the member-count channel.
    ///
    /// # Errors
    ///
    /// Fails on driver or decoding errors.
    #[instrument(skip(self))]
    pub async fn user_count_names(&self, guild_id: i64) -> DatabaseResult<Vec<UserCountNameRow>> {
        let rows = self
            .db
            .get_many(
                USER_COUNT_NAMES,
                Fields::new().with("guild_id", guild_id),
                ListOptions::new(),
            )
            .await?;
        decode_all(rows)
    }

    /// Credit a message: message counters and the guild's per-message price.
    ///
    /// Returns whether the member had a profile to credit.
    ///
    /// # Errors
    ///
    /// Fails on driver or decoding errors.
    #[instrument(skip(self))]
    pub async fn record_message(&self, guild_id: i64, user_id: i64) -> DatabaseResult<bool> {
        self.db
            .with_session(move |s| {
                let price = guild_price(s, guild_id, "price_messages", DEFAULT_PRICE_MESSAGES)?;
                let updated = s.update(
                    USER_PROFILES,
                    &profile_filter(guild_id, user_id),
                    &[
                        Assignment::increment("messages", 1),
                        Assignment::increment("coins", price),
                        Assignment::increment("day_messages", 1),
                    ],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    /// Mark a member as present in a voice channel from `at`.
    ///
    /// # Errors
    ///
    /// Fails on driver errors.
    #[instrument(skip(self))]
    pub async fn open_voice_session(
        &self,
        guild_id: i64,
        user_id: i64,
        channel_id: i64,
        at: NaiveDateTime,
    ) -> DatabaseResult<usize> {
        self.db
            .update(
                USER_PROFILES,
                profile_filter(guild_id, user_id),
                vec![
                    Assignment::set("channel_id", channel_id),
                    Assignment::set("change_voice_status", at),
                ],
            )
            .await
    }

    /// Close the member's voice session at `at`, crediting minutes and coins.
    ///
    /// With `channel_id` set the member moved channels and the next session
    /// starts at `at`; with `None` the member left voice.
    ///
    /// The update only applies if the stored session start is still the one
    /// that was read; otherwise the profile is re-read and the close retried.
    ///
    /// # Errors
    ///
    /// Fails on driver errors, or with a storage error when every attempt
    /// lost to a concurrent writer.
    #[instrument(skip(self))]
    pub async fn close_voice_session(
        &self,
        guild_id: i64,
        user_id: i64,
        channel_id: Option<i64>,
        at: NaiveDateTime,
    ) -> DatabaseResult<VoiceOutcome> {
        self.db
            .with_session(move |s| {
                let price = guild_price(s, guild_id, "price_minutes", DEFAULT_PRICE_MINUTES)?;
                for attempt in 1..=VOICE_CLOSE_ATTEMPTS {
                    let Some(row) = s.get(USER_PROFILES, &profile_filter(guild_id, user_id))? else {
                        return Ok(VoiceOutcome::NoProfile);
                    };
                    let profile: ProfileRow = row.decode()?;
                    let started = *profile.change_voice_status();
                    let (outcome, mut assignments) = voice_credit(started, at, price);
                    assignments.push(Assignment::set("channel_id", channel_id));
                    assignments.push(Assignment::set(
                        "change_voice_status",
                        channel_id.map(|_| at),
                    ));

                    let guard = Fields::new()
                        .with("id", *profile.id())
                        .with("change_voice_status", started);
                    if s.update(USER_PROFILES, &guard, &assignments)? == 1 {
                        return Ok(outcome);
                    }
                    warn!(attempt, "Voice session changed concurrently, retrying");
                }
                Err(DatabaseError::new(DatabaseErrorKind::Storage(format!(
                    "voice session for user {} in guild {} kept changing",
                    user_id, guild_id
                ))))
            })
            .await
    }

    /// Profiles in a guild ordered by `column`, largest first.
    ///
    /// # Errors
    ///
    /// Fails when `column` is not a profile column, or on driver errors.
    #[instrument(skip(self))]
    pub async fn top_profiles(&self, guild_id: i64, column: &str, limit: i64) -> DatabaseResult<Vec<ProfileRow>> {
        let rows = self
            .db
            .get_many(
                USER_PROFILES,
                Fields::new().with("guild_id", guild_id),
                ListOptions::new().sorted_by_desc(column).with_limit(limit),
            )
            .await?;
        decode_all(rows)
    }

    /// Zero a guild's daily counters.
    ///
    /// # Errors
    ///
    /// Fails on driver errors; nothing is reset then.
    #[instrument(skip(self))]
    pub async fn reset_daily_counters(&self, guild_id: i64) -> DatabaseResult<()> {
        self.db
            .transaction(move |s| {
                let guild = Fields::new().with("guild_id", guild_id);
                s.update(
                    GUILDS,
                    &guild,
                    &[
                        Assignment::set("day_joins", 0),
                        Assignment::set("day_removes", 0),
                    ],
                )?;
                s.update(
                    USER_PROFILES,
                    &guild,
                    &[
                        Assignment::set("day_minutes", 0),
                        Assignment::set("day_messages", 0),
                    ],
                )?;
                s.update(CHANNELS, &guild, &[Assignment::set("day_statistic", 0)])?;
                Ok(())
            })
            .await?;
        info!("Daily counters reset");
        Ok(())
    }
}

fn invite_fields(invite: &NewInvite) -> Fields {
    Fields::new()
        .with("id", invite.code.as_str())
        .with("uses", invite.uses)
        .with("max_uses", invite.max_uses)
        .with("guild_id", invite.guild_id)
        .with("user_id", invite.inviter_id)
}

fn guild_price(
    session: &mut Session<'_>,
    guild_id: i64,
    column: &str,
    default: i64,
) -> DatabaseResult<i64> {
    let price = match session.get(GUILDS, &Fields::new().with("guild_id", guild_id))? {
        Some(row) => row.get::<Option<i64>>(column)?,
        None => None,
    };
    Ok(price.unwrap_or(default))
}

/// Outcome and counter increments for a session that started at `started`
/// and ends at `now`.
fn voice_credit(
    started: Option<NaiveDateTime>,
    now: NaiveDateTime,
    price: i64,
) -> (VoiceOutcome, Vec<Assignment>) {
    let Some(started) = started else {
        return (VoiceOutcome::Started, Vec::new());
    };
    let seconds = (now - started).num_seconds();
    let minutes = (seconds + 30) / 60;
    if seconds < 0 || minutes < 1 {
        return (VoiceOutcome::TooShort, Vec::new());
    }
    let coins = minutes.min(VOICE_COIN_CAP_MINUTES) * price;
    (
        VoiceOutcome::Accrued { minutes, coins },
        vec![
            Assignment::increment("minutes", minutes),
            Assignment::increment("coins", coins),
            Assignment::increment("day_minutes", minutes),
        ],
    )
}
