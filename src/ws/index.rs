//! WebSocket endpoint with Redis event subscription. One socket per player
//! session; battle broadcasts and private replies are forwarded verbatim.

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{handle, Message};
use futures::StreamExt;
use redis::Client as RedisClient;
use uuid::Uuid;

use crate::battle::session::{dispatch, mark_presence};
use crate::protocol::ClientMsg;
use crate::registry;

fn query_uuid(req: &HttpRequest, key: &str) -> Option<Uuid> {
    let prefix = format!("{key}=");
    req.query_string()
        .split('&')
        .find_map(|kv| kv.strip_prefix(prefix.as_str()))
        .and_then(|v| Uuid::parse_str(v).ok())
}

pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    redis: web::Data<RedisClient>,
) -> Result<HttpResponse, Error> {
    // 1 · identity query params (battle_id optional; a rejoining client may
    // rely on the routing table instead)
    let player_id =
        query_uuid(&req, "player_id").ok_or_else(|| actix_web::error::ErrorBadRequest("player_id missing or invalid"))?;
    let battle_id = query_uuid(&req, "battle_id").or_else(|| registry::player_battle(player_id));

    // 2 · handshake
    let (response, mut session, mut ws_stream) = handle(&req, body)?;

    // 3 · presence key
    mark_presence(redis.get_ref(), player_id).await;

    // 4 · Redis subscribe: private replies plus the battle's fan-out channel
    let mut pubsub = redis
        .get_async_pubsub()
        .await
        .map_err(|_| actix_web::error::ErrorInternalServerError("redis subscribe"))?;
    pubsub
        .subscribe(format!("player:{player_id}:events"))
        .await
        .map_err(|_| actix_web::error::ErrorInternalServerError("redis subscribe"))?;
    if let Some(bid) = battle_id {
        pubsub
            .subscribe(format!("battle:{bid}:events"))
            .await
            .map_err(|_| actix_web::error::ErrorInternalServerError("redis subscribe"))?;
    }

    let redis_client = redis.get_ref().clone();

    actix::spawn(async move {
        let mut redis_stream = pubsub.on_message();
        let mut current_battle: Option<Uuid> = battle_id;

        loop {
            tokio::select! {
                // client → server
                Some(frame) = ws_stream.next() => {
                    if let Ok(Message::Text(text)) = frame {
                        if let Ok(cmsg) = serde_json::from_str::<ClientMsg>(&text) {
                            // The socket's player identity is authoritative;
                            // a frame claiming someone else is dropped.
                            if cmsg.player_id() != player_id {
                                log::warn!("player {player_id} sent a frame for {}", cmsg.player_id());
                                continue;
                            }
                            current_battle = Some(cmsg.battle_id());
                            if let Err(e) = dispatch(redis_client.clone(), cmsg).await {
                                log::warn!("dispatch error: {e:?}");
                            }
                        }
                    }
                }
                // redis → client
                Some(msg) = redis_stream.next() => {
                    if let Ok(json) = msg.get_payload::<String>() {
                        if let Err(e) = session.text(json).await {
                            log::warn!("WS send failed for {player_id}: {e:?}");
                            break;
                        }
                    }
                }
                else => break,
            }
        }

        // On disconnect, tell the battle so the grace window opens.
        if let Some(bid) = current_battle {
            let _ = dispatch(
                redis_client.clone(),
                ClientMsg::Disconnected {
                    battle_id: bid,
                    player_id,
                },
            )
            .await;
        }
        log::info!("WS closed for player {player_id}");
    });

    Ok(response)
}
