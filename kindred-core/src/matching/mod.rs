//! Candidate discovery and swipes.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use metrics::counter;
use serde::Serialize;

use kindred_shared::types::pagination::clamp_limit;
use kindred_shared::{AppError, AppResult, ErrorCode};

use crate::clock::Clock;
use crate::hub::{HubEvent, MatchRemovedPayload, PushHub};
use crate::models::{LikeOutcome, User, UserCard};
use crate::store::{CandidateFilter, Store};

pub mod geo;

pub use geo::{bounding_box, haversine_km};

pub const DEFAULT_DISCOVER_LIMIT: i64 = 10;
pub const MAX_DISCOVER_LIMIT: i64 = 50;

const MATCHED_MESSAGE: &str = "配對成功！現在你們可以開始聊天了。";
const LIKED_MESSAGE: &str = "已送出喜歡";

#[derive(Debug, Serialize)]
pub struct DiscoverPage {
    pub users: Vec<UserCard>,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct LikeResult {
    pub match_id: Option<i64>,
    pub is_matched: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MatchSummary {
    pub match_id: i64,
    pub user: UserCard,
    pub created_at: DateTime<Utc>,
}

struct Ranked {
    user: User,
    score: usize,
    distance_km: Option<f64>,
}

/// Interest overlap first, then nearer, then lower id. Unknown distances
/// sort after known ones.
fn rank_order(a: &Ranked, b: &Ranked) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.user.id.cmp(&b.user.id))
}

fn years_before(date: NaiveDate, years: i32) -> NaiveDate {
    u32::try_from(years)
        .ok()
        .and_then(|y| date.checked_sub_months(Months::new(y.saturating_mul(12))))
        .unwrap_or(NaiveDate::MIN)
}

/// Birth date window covering every age in `[min_age, max_age]` on `today`,
/// one day wider on each side than strictly needed.
fn birth_window(today: NaiveDate, min_age: i32, max_age: i32) -> (NaiveDate, NaiveDate) {
    let born_from = years_before(today, max_age.saturating_add(1));
    let born_to = years_before(today, min_age)
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX);
    (born_from, born_to)
}

fn round_km(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}

pub struct MatchingService {
    store: Arc<dyn Store>,
    hub: Arc<PushHub>,
    clock: Arc<dyn Clock>,
}

impl MatchingService {
    pub fn new(store: Arc<dyn Store>, hub: Arc<PushHub>, clock: Arc<dyn Clock>) -> Self {
        Self { store, hub, clock }
    }

    pub async fn discover(&self, viewer_id: i64, limit: Option<i64>) -> AppResult<DiscoverPage> {
        let limit = clamp_limit(limit, DEFAULT_DISCOVER_LIMIT, MAX_DISCOVER_LIMIT) as usize;
        let viewer = self.active_viewer(viewer_id).await?;
        let today = self.clock.today();

        let (born_from, born_to) = birth_window(today, viewer.age_range_min, viewer.age_range_max);
        let filter = CandidateFilter {
            born_from,
            born_to,
            bounds: viewer
                .location
                .map(|center| bounding_box(center, f64::from(viewer.max_distance_km))),
        };
        let pool = self.store.candidate_pool(viewer.id, &filter).await?;

        let interests: HashSet<i32> = viewer.interests.iter().copied().collect();
        let max_distance = f64::from(viewer.max_distance_km);
        let mut ranked: Vec<Ranked> = pool
            .into_iter()
            .filter(|u| u.id != viewer.id && u.is_active)
            .filter(|u| (viewer.age_range_min..=viewer.age_range_max).contains(&u.age_on(today)))
            .filter_map(|user| {
                let distance_km = match (viewer.location, user.location) {
                    (Some(here), Some(there)) => {
                        let km = haversine_km(here, there);
                        if km > max_distance {
                            return None;
                        }
                        Some(km)
                    }
                    (Some(_), None) => return None,
                    (None, _) => None,
                };
                let score = user.interests.iter().filter(|i| interests.contains(i)).count();
                Some(Ranked { user, score, distance_km })
            })
            .collect();

        ranked.sort_by(rank_order);
        let has_more = ranked.len() > limit;
        ranked.truncate(limit);

        let ids: Vec<i64> = ranked.iter().map(|r| r.user.id).collect();
        let mut photos = self.store.photos_for(&ids).await?;
        let users = ranked
            .into_iter()
            .map(|r| {
                let user_photos = photos.remove(&r.user.id).unwrap_or_default();
                UserCard::new(&r.user, user_photos, today, r.distance_km.map(round_km))
            })
            .collect();

        Ok(DiscoverPage { users, has_more })
    }

    pub async fn like(&self, viewer_id: i64, target_id: i64) -> AppResult<LikeResult> {
        if viewer_id == target_id {
            return Err(AppError::new(ErrorCode::CannotLikeSelf, "you cannot like yourself"));
        }
        self.active_viewer(viewer_id).await?;

        let outcome = self.store.record_like(viewer_id, target_id, self.clock.now()).await?;
        counter!("likes_total").increment(1);

        match outcome {
            LikeOutcome::Liked => {
                tracing::info!(user_id = viewer_id, target_id, "like recorded");
                Ok(LikeResult {
                    match_id: None,
                    is_matched: false,
                    message: LIKED_MESSAGE,
                })
            }
            LikeOutcome::Matched(created) => {
                counter!("matches_total").increment(1);
                tracing::info!(user_id = viewer_id, target_id, match_id = created.id, "match created");
                let match_id = created.id;
                self.hub
                    .publish(&[created.user_a, created.user_b], HubEvent::MatchCreated(created));
                Ok(LikeResult {
                    match_id: Some(match_id),
                    is_matched: true,
                    message: MATCHED_MESSAGE,
                })
            }
        }
    }

    /// Hides `target_id` from the viewer's discovery for good.
    pub async fn pass(&self, viewer_id: i64, target_id: i64) -> AppResult<()> {
        if viewer_id == target_id {
            return Err(AppError::new(ErrorCode::ValidationError, "you cannot pass on yourself"));
        }
        self.store.record_pass(viewer_id, target_id, self.clock.now()).await?;
        tracing::debug!(user_id = viewer_id, target_id, "pass recorded");
        Ok(())
    }

    /// Matches whose counterpart is active and shares no block with the viewer,
    /// newest first.
    pub async fn list_matches(&self, viewer_id: i64) -> AppResult<Vec<MatchSummary>> {
        let viewer = self
            .store
            .find_user(viewer_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))?;
        let blocked = self.store.blocked_peers(viewer_id).await?;
        let mut matches: Vec<_> = self
            .store
            .matches_for(viewer_id)
            .await?
            .into_iter()
            .filter(|m| !blocked.contains(&m.other(viewer_id)))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let peer_ids: Vec<i64> = matches.iter().map(|m| m.other(viewer_id)).collect();
        let peers = self.store.find_users(&peer_ids).await?;
        let mut photos = self.store.photos_for(&peer_ids).await?;
        let today = self.clock.today();

        Ok(matches
            .into_iter()
            .filter_map(|m| {
                let peer = peers.iter().find(|u| u.id == m.other(viewer_id) && u.is_active)?;
                let distance = match (viewer.location, peer.location) {
                    (Some(a), Some(b)) => Some(round_km(haversine_km(a, b))),
                    _ => None,
                };
                let card = UserCard::new(peer, photos.remove(&peer.id).unwrap_or_default(), today, distance);
                Some(MatchSummary {
                    match_id: m.id,
                    user: card,
                    created_at: m.created_at,
                })
            })
            .collect())
    }

    /// Ends the match for both members. Its chat disappears and the pair
    /// does not come back in discovery.
    pub async fn unmatch(&self, viewer_id: i64, match_id: i64) -> AppResult<()> {
        let ended = self.store.end_match(match_id, viewer_id, self.clock.now()).await?;
        counter!("unmatches_total").increment(1);
        tracing::info!(user_id = viewer_id, match_id, "match removed");
        self.hub.publish(
            &[ended.user_a, ended.user_b],
            HubEvent::MatchRemoved(MatchRemovedPayload {
                match_id,
                user_id: viewer_id,
            }),
        );
        Ok(())
    }

    async fn active_viewer(&self, viewer_id: i64) -> AppResult<User> {
        let viewer = self
            .store
            .find_user(viewer_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "user not found"))?;
        if !viewer.is_active {
            return Err(AppError::new(ErrorCode::UserBanned, "your account is deactivated"));
        }
        Ok(viewer)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{BlockReason, Gender, GeoPoint, NewBlock, NewUser, ProfilePatch};
    use crate::store::{IdentityStore, MemoryStore, RelationStore};
    use kindred_shared::UserRole;

    struct Fixture {
        store: Arc<MemoryStore>,
        hub: Arc<PushHub>,
        service: MatchingService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(PushHub::default());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let service = MatchingService::new(store.clone(), hub.clone(), clock);
        Fixture { store, hub, service }
    }

    async fn user(store: &MemoryStore, name: &str, born: (i32, u32, u32), patch: ProfilePatch) -> i64 {
        let user = store
            .insert_user(NewUser {
                email: format!("{name}@example.com"),
                password_hash: "x".into(),
                display_name: name.into(),
                birth_date: NaiveDate::from_ymd_opt(born.0, born.1, born.2).unwrap(),
                gender: Gender::Other,
                role: UserRole::User,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store.update_profile(user.id, &patch, Utc::now()).await.unwrap();
        user.id
    }

    fn at(latitude: f64, longitude: f64, interests: &[i32]) -> ProfilePatch {
        ProfilePatch {
            location: Some(GeoPoint { latitude, longitude }),
            interests: Some(interests.to_vec()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn discover_orders_by_overlap_then_distance_then_id() {
        let f = fixture();
        let viewer = user(&f.store, "viewer", (1995, 1, 1), at(25.03, 121.56, &[1, 2, 3])).await;
        let near_one = user(&f.store, "near", (1995, 1, 1), at(25.04, 121.56, &[1])).await;
        let far_two = user(&f.store, "far", (1995, 1, 1), at(25.20, 121.56, &[1, 2])).await;
        let near_one_b = user(&f.store, "near_b", (1995, 1, 1), at(25.04, 121.56, &[3])).await;
        let _too_far = user(&f.store, "distant", (1995, 1, 1), at(35.0, 139.0, &[1, 2, 3])).await;
        let _unlocated = user(&f.store, "ghost", (1995, 1, 1), ProfilePatch::default()).await;

        let page = f.service.discover(viewer, None).await.unwrap();
        let ids: Vec<i64> = page.users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![far_two, near_one, near_one_b]);
        assert!(!page.has_more);
        assert!(page.users[0].distance_km.unwrap() > 15.0);
    }

    #[tokio::test]
    async fn discover_filters_age_likes_blocks_and_reports_has_more() {
        let f = fixture();
        let viewer = user(
            &f.store,
            "viewer",
            (1995, 1, 1),
            ProfilePatch {
                age_range_min: Some(25),
                age_range_max: Some(35),
                ..Default::default()
            },
        )
        .await;
        let young = user(&f.store, "young", (2005, 1, 1), ProfilePatch::default()).await;
        let liked = user(&f.store, "liked", (1995, 1, 1), ProfilePatch::default()).await;
        let blocker = user(&f.store, "blocker", (1995, 1, 1), ProfilePatch::default()).await;
        let a = user(&f.store, "a", (1995, 1, 1), ProfilePatch::default()).await;
        let b = user(&f.store, "b", (1995, 1, 1), ProfilePatch::default()).await;
        // Turns 25 today.
        let birthday = user(&f.store, "birthday", (2001, 3, 1), ProfilePatch::default()).await;

        f.service.like(viewer, liked).await.unwrap();
        f.store
            .create_block(NewBlock {
                blocker_id: blocker,
                blocked_id: viewer,
                reason: BlockReason::Spam,
                notes: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let page = f.service.discover(viewer, Some(2)).await.unwrap();
        let ids: Vec<i64> = page.users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(page.has_more);

        let all = f.service.discover(viewer, Some(500)).await.unwrap();
        let ids: Vec<i64> = all.users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![a, b, birthday]);
        assert!(!ids.contains(&young));
        assert!(!all.has_more);
    }

    #[tokio::test]
    async fn mutual_like_creates_one_match_and_notifies_both() {
        let f = fixture();
        let alice = user(&f.store, "alice", (1995, 1, 1), ProfilePatch::default()).await;
        let bob = user(&f.store, "bob", (1995, 1, 1), ProfilePatch::default()).await;
        let alice_session = f.hub.register(alice).session;
        let bob_session = f.hub.register(bob).session;

        let first = f.service.like(alice, bob).await.unwrap();
        assert!(!first.is_matched);
        assert_eq!(first.match_id, None);

        let second = f.service.like(bob, alice).await.unwrap();
        assert!(second.is_matched);
        let match_id = second.match_id.unwrap();

        for session in [&alice_session, &bob_session] {
            assert!(matches!(session.next_event().await, Some(HubEvent::MatchCreated(m)) if m.id == match_id));
        }

        let dup = f.service.like(alice, bob).await.unwrap_err();
        assert_eq!(dup.error_code(), Some(ErrorCode::AlreadyLiked));

        let matched = f.service.discover(alice, None).await.unwrap();
        assert!(matched.users.is_empty());
        assert_eq!(f.service.list_matches(alice).await.unwrap()[0].match_id, match_id);
    }

    #[tokio::test]
    async fn concurrent_mutual_likes_yield_a_single_match() {
        let f = fixture();
        let alice = user(&f.store, "alice", (1995, 1, 1), ProfilePatch::default()).await;
        let bob = user(&f.store, "bob", (1995, 1, 1), ProfilePatch::default()).await;
        let service = Arc::new(f.service);

        let (a, b) = tokio::join!(service.like(alice, bob), service.like(bob, alice));
        let matched = [a.unwrap(), b.unwrap()].iter().filter(|r| r.is_matched).count();
        assert_eq!(matched, 1);
        assert_eq!(f.store.matches_for(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn like_errors() {
        let f = fixture();
        let alice = user(&f.store, "alice", (1995, 1, 1), ProfilePatch::default()).await;
        let bob = user(&f.store, "bob", (1995, 1, 1), ProfilePatch::default()).await;

        assert_eq!(f.service.like(alice, alice).await.unwrap_err().status_code().as_u16(), 400);
        assert_eq!(f.service.like(alice, 9999).await.unwrap_err().status_code().as_u16(), 404);

        f.store
            .create_block(NewBlock {
                blocker_id: bob,
                blocked_id: alice,
                reason: BlockReason::NotInterested,
                notes: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(f.service.like(alice, bob).await.unwrap_err().status_code().as_u16(), 403);
    }

    #[tokio::test]
    async fn pass_hides_target_permanently() {
        let f = fixture();
        let alice = user(&f.store, "alice", (1995, 1, 1), ProfilePatch::default()).await;
        let bob = user(&f.store, "bob", (1995, 1, 1), ProfilePatch::default()).await;

        f.service.pass(alice, bob).await.unwrap();
        f.service.pass(alice, bob).await.unwrap();
        assert!(f.service.discover(alice, None).await.unwrap().users.is_empty());
        assert_eq!(f.service.pass(alice, alice).await.unwrap_err().status_code().as_u16(), 400);
        assert_eq!(f.service.pass(alice, 9999).await.unwrap_err().status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn unmatch_hides_the_match_from_both_members() {
        let f = fixture();
        let alice = user(&f.store, "alice", (1995, 1, 1), ProfilePatch::default()).await;
        let bob = user(&f.store, "bob", (1995, 1, 1), ProfilePatch::default()).await;
        let carol = user(&f.store, "carol", (1995, 1, 1), ProfilePatch::default()).await;
        f.service.like(alice, bob).await.unwrap();
        let match_id = f.service.like(bob, alice).await.unwrap().match_id.unwrap();
        let bob_session = f.hub.register(bob).session;

        let err = f.service.unmatch(carol, match_id).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::NotMatchMember));

        f.service.unmatch(alice, match_id).await.unwrap();
        assert!(matches!(
            bob_session.next_event().await,
            Some(HubEvent::MatchRemoved(p)) if p.match_id == match_id && p.user_id == alice
        ));
        assert!(f.service.list_matches(alice).await.unwrap().is_empty());
        assert!(f.service.list_matches(bob).await.unwrap().is_empty());
        assert!(f.store.find_match(match_id).await.unwrap().is_none());
        assert!(f.service.discover(bob, None).await.unwrap().users.iter().all(|u| u.id != alice));

        let again = f.service.unmatch(bob, match_id).await.unwrap_err();
        assert_eq!(again.error_code(), Some(ErrorCode::MatchNotFound));
    }

    #[test]
    fn birth_window_brackets_ages() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (from, to) = birth_window(today, 18, 30);
        assert!(from <= NaiveDate::from_ymd_opt(1995, 3, 2).unwrap());
        assert!(to >= NaiveDate::from_ymd_opt(2008, 3, 1).unwrap());
    }
}
