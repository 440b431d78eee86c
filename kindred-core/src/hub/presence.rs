use std::sync::Arc;

use async_trait::async_trait;

use kindred_shared::clients::redis::RedisClient;
use kindred_shared::{AppError, AppResult, ErrorCode};

use super::{HubEvent, PresencePayload, PushHub, Session};
use crate::store::Store;

const ONLINE_TTL_SECS: u64 = 120;

/// External copy of who is online, for readers outside this process.
#[async_trait]
pub trait PresenceMirror: Send + Sync {
    async fn set_online(&self, user_id: i64);
    async fn set_offline(&self, user_id: i64);
}

#[async_trait]
impl PresenceMirror for RedisClient {
    async fn set_online(&self, user_id: i64) {
        if let Err(e) = self.set(&format!("online:{user_id}"), "1", ONLINE_TTL_SECS).await {
            tracing::warn!(user_id, error = %e, "failed to mirror presence");
        }
    }

    async fn set_offline(&self, user_id: i64) {
        if let Err(e) = self.del(&format!("online:{user_id}")).await {
            tracing::warn!(user_id, error = %e, "failed to clear presence");
        }
    }
}

/// Connects sessions to the hub and announces presence to match peers.
pub struct PresenceService {
    store: Arc<dyn Store>,
    hub: Arc<PushHub>,
    mirror: Option<Arc<dyn PresenceMirror>>,
}

impl PresenceService {
    pub fn new(store: Arc<dyn Store>, hub: Arc<PushHub>, mirror: Option<Arc<dyn PresenceMirror>>) -> Self {
        Self { store, hub, mirror }
    }

    /// Match counterparts of `user_id` that do not share a block with them.
    pub async fn visible_peers(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let blocked = self.store.blocked_peers(user_id).await?;
        Ok(self
            .store
            .matches_for(user_id)
            .await?
            .into_iter()
            .map(|m| m.other(user_id))
            .filter(|peer| !blocked.contains(peer))
            .collect())
    }

    pub async fn connect(&self, user_id: i64) -> AppResult<Session> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;
        if !user.is_active {
            return Err(AppError::new(ErrorCode::UserBanned, "account is deactivated"));
        }

        let registration = self.hub.register(user_id);
        tracing::info!(user_id, session_id = registration.session.id(), "push session connected");
        if registration.first {
            let peers = match self.visible_peers(user_id).await {
                Ok(peers) => peers,
                Err(e) => {
                    self.hub.unregister(&registration.session);
                    return Err(e);
                }
            };
            self.hub.publish(&peers, HubEvent::PresenceOnline(PresencePayload { user_id }));
            if let Some(mirror) = &self.mirror {
                mirror.set_online(user_id).await;
            }
        }
        Ok(registration.session)
    }

    pub async fn disconnect(&self, session: &Session) {
        let user_id = session.user_id();
        tracing::info!(user_id, session_id = session.id(), "push session disconnected");
        if !self.hub.unregister(session) {
            return;
        }
        match self.visible_peers(user_id).await {
            Ok(peers) => {
                self.hub.publish(&peers, HubEvent::PresenceOffline(PresencePayload { user_id }));
            }
            Err(e) => tracing::warn!(user_id, error = %e, "could not announce offline presence"),
        }
        if let Some(mirror) = &self.mirror {
            mirror.set_offline(user_id).await;
        }
    }

    /// Keeps the mirrored presence key alive while the session is active.
    pub async fn heartbeat(&self, user_id: i64) {
        if let Some(mirror) = &self.mirror {
            mirror.set_online(user_id).await;
        }
    }
}
