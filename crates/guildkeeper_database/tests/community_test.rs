//! Community repository flows against a live PostgreSQL.
//!
//! Requires `DATABASE_URL` and `--features integration`. The catalog tables
//! are shared, so tests in this file run one at a time.

use chrono::{NaiveDate, NaiveDateTime};
use guildkeeper_database::{
    CommunityRepository, Database, DatabaseConfig, Fields, GuildSeed, ListOptions, MemberSeed,
    NewInvite, USER_PROFILES, VOICE_COIN_CAP_MINUTES, VoiceOutcome, catalog,
};
use tokio::sync::{Mutex, MutexGuard};

static CATALOG_LOCK: Mutex<()> = Mutex::const_new(());

const GUILD: i64 = 1_000;

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

async fn repository() -> (MutexGuard<'static, ()>, CommunityRepository) {
    let guard = CATALOG_LOCK.lock().await;
    let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");
    let db = Database::connect(config, catalog().unwrap())
        .await
        .expect("Failed to connect to test database");
    db.reset().await.expect("Failed to reset catalog");
    (guard, CommunityRepository::new(db))
}

fn seed() -> GuildSeed {
    GuildSeed {
        guild_id: GUILD,
        user_count: Some(2),
        log_channel_id: None,
        roles: vec![10, 11],
        channels: vec![(20, "text".to_string()), (21, "voice".to_string())],
        members: vec![
            MemberSeed {
                user_id: 1,
                created_at: Some(at(0, 0)),
                roles: vec![10],
            },
            MemberSeed {
                user_id: 2,
                created_at: None,
                roles: vec![10, 11],
            },
        ],
        invites: vec![
            NewInvite {
                code: "keep".to_string(),
                guild_id: GUILD,
                inviter_id: 1,
                uses: 0,
                max_uses: 0,
            },
            NewInvite {
                code: "once".to_string(),
                guild_id: GUILD,
                inviter_id: 1,
                uses: 0,
                max_uses: 1,
            },
        ],
        commands: vec!["balance".to_string(), "top".to_string()],
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_bootstrap_guild() {
    let (_guard, repo) = repository().await;
    repo.bootstrap_guild(seed()).await.unwrap();

    let guild = repo.guild(GUILD).await.unwrap().expect("guild stored");
    assert_eq!(guild.bot_prefix().as_deref(), Some("!"));
    assert_eq!(*guild.price_messages(), Some(5));

    let roles = repo.user_roles(GUILD, 2).await.unwrap();
    assert_eq!(roles.len(), 2);

    let invites = repo.invites(GUILD).await.unwrap();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].id(), "keep");

    assert_eq!(repo.permissions_for(GUILD, "top").await.unwrap().len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_bootstrap_is_atomic() {
    let (_guard, repo) = repository().await;
    let mut broken = seed();
    broken.roles.push(10);

    assert!(repo.bootstrap_guild(broken).await.unwrap_err().is_duplicate());
    assert!(repo.guild(GUILD).await.unwrap().is_none());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_member_join_and_messages() {
    let (_guard, repo) = repository().await;
    repo.bootstrap_guild(seed()).await.unwrap();

    assert!(repo.add_member(GUILD, 3, None, Some(at(9, 0))).await.unwrap());
    assert!(!repo.add_member(GUILD, 3, None, None).await.unwrap());
    repo.record_join(GUILD, 3).await.unwrap();
    repo.record_join(GUILD, 3).await.unwrap();

    assert!(repo.record_message(GUILD, 3).await.unwrap());
    assert!(!repo.record_message(GUILD, 404).await.unwrap());

    let profile = repo.profile(GUILD, 3).await.unwrap().unwrap();
    assert_eq!(*profile.joins(), Some(2));
    assert_eq!(*profile.messages(), Some(1));
    assert_eq!(*profile.coins(), Some(5));

    let guild = repo.guild(GUILD).await.unwrap().unwrap();
    assert_eq!(*guild.day_joins(), Some(2));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_invite_accounting() {
    let (_guard, repo) = repository().await;
    repo.bootstrap_guild(seed()).await.unwrap();

    repo.record_invite_use("keep", GUILD, 1).await.unwrap();
    repo.add_invite(NewInvite {
        code: "single".to_string(),
        guild_id: GUILD,
        inviter_id: 1,
        uses: 0,
        max_uses: 1,
    })
    .await
    .unwrap();
    repo.consume_invite("single", GUILD, 1).await.unwrap();

    let invites = repo.invites(GUILD).await.unwrap();
    assert_eq!(invites.len(), 1);
    assert_eq!(*invites[0].uses(), Some(1));

    let inviter = repo.profile(GUILD, 1).await.unwrap().unwrap();
    assert_eq!(*inviter.invites(), Some(2));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_voice_session_accrual() {
    let (_guard, repo) = repository().await;
    repo.bootstrap_guild(seed()).await.unwrap();

    let outcome = repo
        .close_voice_session(GUILD, 1, Some(21), at(10, 0))
        .await
        .unwrap();
    assert_eq!(outcome, VoiceOutcome::Started);

    let outcome = repo
        .close_voice_session(GUILD, 1, None, at(14, 0))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        VoiceOutcome::Accrued {
            minutes: 240,
            coins: VOICE_COIN_CAP_MINUTES * 2
        }
    );

    let profile = repo.profile(GUILD, 1).await.unwrap().unwrap();
    assert_eq!(*profile.minutes(), Some(240));
    assert_eq!(*profile.day_minutes(), Some(240));
    assert_eq!(*profile.channel_id(), None);
    assert_eq!(*profile.change_voice_status(), None);

    let outcome = repo
        .close_voice_session(GUILD, 404, None, at(14, 0))
        .await
        .unwrap();
    assert_eq!(outcome, VoiceOutcome::NoProfile);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_concurrent_voice_closes_credit_once() {
    let (_guard, repo) = repository().await;
    repo.bootstrap_guild(seed()).await.unwrap();
    repo.open_voice_session(GUILD, 2, 21, at(10, 0)).await.unwrap();

    let (a, b) = tokio::join!(
        repo.close_voice_session(GUILD, 2, None, at(10, 30)),
        repo.close_voice_session(GUILD, 2, None, at(10, 30)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let accrued = outcomes
        .iter()
        .filter(|o| matches!(o, VoiceOutcome::Accrued { .. }))
        .count();
    assert_eq!(accrued, 1);

    let profile = repo.profile(GUILD, 2).await.unwrap().unwrap();
    assert_eq!(*profile.minutes(), Some(30));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_concurrent_joins_create_one_profile() {
    let (_guard, repo) = repository().await;
    repo.bootstrap_guild(seed()).await.unwrap();

    for user_id in 100..110 {
        let (a, b) = tokio::join!(
            repo.add_member(GUILD, user_id, None, Some(at(9, 0))),
            repo.add_member(GUILD, user_id, None, Some(at(9, 0))),
        );
        let created = [a.unwrap(), b.unwrap()];
        assert_eq!(created.iter().filter(|c| **c).count(), 1, "user {}", user_id);

        let profiles = repo
            .database()
            .get_many(
                USER_PROFILES,
                Fields::new().with("guild_id", GUILD).with("user_id", user_id),
                ListOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(profiles.len(), 1, "user {}", user_id);
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_top_profiles_and_daily_reset() {
    let (_guard, repo) = repository().await;
    repo.bootstrap_guild(seed()).await.unwrap();

    repo.record_message(GUILD, 2).await.unwrap();
    repo.record_message(GUILD, 2).await.unwrap();
    repo.record_message(GUILD, 1).await.unwrap();

    let top = repo.top_profiles(GUILD, "messages", 1).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(*top[0].user_id(), Some(2));

    repo.reset_daily_counters(GUILD).await.unwrap();
    let profile = repo.profile(GUILD, 2).await.unwrap().unwrap();
    assert_eq!(*profile.day_messages(), Some(0));
    assert_eq!(*profile.messages(), Some(2));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore)]
async fn test_role_saver_and_count_names() {
    let (_guard, repo) = repository().await;
    repo.bootstrap_guild(seed()).await.unwrap();

    assert_eq!(repo.remove_user_role(GUILD, 2, 11).await.unwrap(), 1);
    let roles = repo.user_roles(GUILD, 2).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(*roles[0].role_id(), Some(10));

    assert_eq!(repo.delete_role(10).await.unwrap(), 1);
    assert!(repo.user_roles(GUILD, 2).await.unwrap().is_empty());

    repo.add_user_count_name(GUILD, "Members: {}").await.unwrap();
    assert_eq!(repo.user_count_names(GUILD).await.unwrap().len(), 1);
}
