//! Durable-store boundary: park and recover whole battle aggregates.
//! Redis-backed; writes are retried, and a failed handoff leaves the
//! in-memory battle authoritative.

use anyhow::Context;
use redis::{AsyncCommands, Client as RedisClient};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use uuid::Uuid;

use crate::battle::snapshot::BattleSnapshot;

#[derive(Clone)]
pub struct SnapshotStore {
    redis: RedisClient,
    ttl: u64,
}

fn key(battle_id: Uuid) -> String {
    format!("battle:{battle_id}:snap")
}

impl SnapshotStore {
    pub fn new(redis: RedisClient, ttl: u64) -> Self {
        SnapshotStore { redis, ttl }
    }

    pub async fn save(&self, snap: &BattleSnapshot) -> anyhow::Result<()> {
        let key = key(snap.battle.id);
        let json = serde_json::to_string(snap).context("serialize snapshot")?;
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);
        Retry::spawn(strategy, || async {
            let mut conn = self.redis.get_multiplexed_async_connection().await?;
            conn.set_ex::<_, _, ()>(&key, &json, self.ttl).await
        })
        .await
        .context("persist snapshot")?;
        Ok(())
    }

    pub async fn load(&self, battle_id: Uuid) -> anyhow::Result<Option<BattleSnapshot>> {
        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .context("redis connection")?;
        let json: Option<String> = conn.get(key(battle_id)).await.context("read snapshot")?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j).context("parse snapshot")?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, battle_id: Uuid) -> anyhow::Result<()> {
        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .context("redis connection")?;
        let _: () = conn.del(key(battle_id)).await.context("delete snapshot")?;
        Ok(())
    }
}
