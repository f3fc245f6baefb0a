//! Battle creation & lookup API. The lobby flow that decides WHO fights is
//! an external collaborator; it posts a roster here and hands the returned
//! battle id to the clients.

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::types::{BattleMode, BattleSetup, GridTopology, RosterEntry};
use crate::config::settings;
use crate::registry;

#[derive(Deserialize)]
pub struct CreateBattleReq {
    pub lobby_id: Option<Uuid>,
    pub mode: Option<BattleMode>,
    pub topology: Option<GridTopology>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub roster: Vec<RosterEntry>,
}

#[derive(Serialize)]
pub struct CreateBattleResp {
    pub battle_id: Uuid,
    pub status: &'static str,
}

/// POST /api/battles
#[post("/battles")]
pub async fn create(req: web::Json<CreateBattleReq>) -> impl Responder {
    let req = req.into_inner();
    if req.roster.len() < 2 {
        return HttpResponse::BadRequest().body("a battle needs at least two players");
    }
    let mut seen: Vec<Uuid> = Vec::new();
    for entry in &req.roster {
        if seen.contains(&entry.player_id) {
            return HttpResponse::BadRequest().body("duplicate player in roster");
        }
        seen.push(entry.player_id);
    }
    let width = req.width.unwrap_or(settings().grid_width);
    let height = req.height.unwrap_or(settings().grid_height);
    if width < 4 || height < 4 || width > 64 || height > 64 {
        return HttpResponse::BadRequest().body("grid dimensions out of range");
    }

    let setup = BattleSetup {
        battle_id: Uuid::new_v4(),
        lobby_id: req.lobby_id.unwrap_or_else(Uuid::new_v4),
        mode: req.mode.unwrap_or(BattleMode::Arena),
        topology: req.topology.unwrap_or(GridTopology::EightWay),
        width,
        height,
        roster: req.roster,
        units_per_player: settings().units_per_player,
        obstacle_count: settings().obstacle_count,
    };
    let battle_id = setup.battle_id;
    registry::register_setup(setup);

    HttpResponse::Ok().json(CreateBattleResp {
        battle_id,
        status: "Waiting",
    })
}

#[derive(Serialize)]
pub struct BattleProbe {
    pub battle_id: Uuid,
    pub pending: bool,
    pub live: bool,
}

/// GET /api/battles/{battle_id}
#[get("/battles/{battle_id}")]
pub async fn probe(path: web::Path<Uuid>) -> impl Responder {
    let battle_id = path.into_inner();
    HttpResponse::Ok().json(BattleProbe {
        battle_id,
        pending: registry::setup_pending(battle_id),
        live: registry::session_sender(battle_id).is_some(),
    })
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create).service(probe);
}
