//! REST handlers for lobby and gameplay operations.

use axum::extract::{ConnectInfo, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use card_room::game::entities::{Action, Chips};
use card_room::lobby::{LobbyView, NewGameRequest};
use card_room::{Credentials, EngineView, ServiceError};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateGameBody {
    pub creator_name: String,
    pub creator_pin: String,
    #[serde(flatten)]
    pub settings: card_room::GameSettings,
}

#[derive(Debug, Serialize)]
pub struct CreateGameResponse {
    pub code: String,
    pub player_id: String,
    pub game: LobbyView,
}

#[derive(Debug, Deserialize)]
pub struct JoinGameBody {
    pub player_name: String,
    pub player_pin: String,
}

#[derive(Debug, Serialize)]
pub struct JoinGameResponse {
    pub player_id: String,
    pub game: LobbyView,
}

/// `(player_id, pin)` pair carried by every authenticated request.
#[derive(Debug, Deserialize)]
pub struct AuthBody {
    pub player_id: String,
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub player_id: String,
    pub pin: String,
    pub action: String,
    #[serde(default)]
    pub amount: Chips,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

const OK: Json<OkResponse> = Json(OkResponse { ok: true });

pub async fn create_game(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<CreateGameBody>,
) -> Result<Json<CreateGameResponse>, ApiError> {
    let (code, player_id, game) = state
        .coordinator
        .create_game(
            NewGameRequest {
                creator_name: body.creator_name,
                creator_pin: body.creator_pin,
                settings: body.settings,
            },
            addr.ip().to_string(),
        )
        .await?;
    Ok(Json(CreateGameResponse {
        code,
        player_id,
        game,
    }))
}

pub async fn get_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<LobbyView>, ApiError> {
    let view = state.coordinator.lobby_view(&code.to_uppercase()).await?;
    Ok(Json(view))
}

pub async fn join_game(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<JoinGameBody>,
) -> Result<Json<JoinGameResponse>, ApiError> {
    let (player_id, game) = state
        .coordinator
        .join_game(&code.to_uppercase(), &body.player_name, &body.player_pin)
        .await?;
    Ok(Json(JoinGameResponse { player_id, game }))
}

pub async fn toggle_ready(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<LobbyView>, ApiError> {
    let view = state
        .coordinator
        .toggle_ready(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(Json(view))
}

pub async fn start_game(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .start_game(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(OK)
}

pub async fn leave_game(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .leave_game(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(OK)
}

pub async fn get_engine_state(
    State(state): State<AppState>,
    Path((code, player_id)): Path<(String, String)>,
) -> Result<Json<EngineView>, ApiError> {
    let view = state
        .coordinator
        .engine_view(&code.to_uppercase(), Some(&player_id))
        .await?;
    Ok(Json(view))
}

pub async fn game_action(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<ActionBody>,
) -> Result<Json<OkResponse>, ApiError> {
    let action = parse_action(&body.action, body.amount)?;
    state
        .coordinator
        .process_action(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
            action,
        )
        .await?;
    Ok(OK)
}

pub async fn deal_hand(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .deal_hand(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(OK)
}

pub async fn request_rebuy(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .request_rebuy(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(OK)
}

pub async fn cancel_rebuy(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .cancel_rebuy(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(OK)
}

pub async fn show_cards(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .show_cards(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(OK)
}

pub async fn pause_game(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .pause_game(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(OK)
}

pub async fn resume_game(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AuthBody>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .resume_game(
            &code.to_uppercase(),
            Credentials {
                player_id: &body.player_id,
                pin: &body.pin,
            },
        )
        .await?;
    Ok(OK)
}

/// Map the `(action, amount)` request pair onto the engine's action type.
/// Unknown tags are invalid arguments, not engine errors.
fn parse_action(action: &str, amount: Chips) -> Result<Action, ServiceError> {
    match action {
        "fold" => Ok(Action::Fold),
        "check" => Ok(Action::Check),
        "call" => Ok(Action::Call),
        "raise" => Ok(Action::Raise { amount }),
        "all_in" => Ok(Action::AllIn),
        other => Err(ServiceError::InvalidArgument(format!(
            "unknown action: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_known_tags() {
        assert_eq!(parse_action("fold", 0).unwrap(), Action::Fold);
        assert_eq!(parse_action("check", 0).unwrap(), Action::Check);
        assert_eq!(parse_action("call", 0).unwrap(), Action::Call);
        assert_eq!(
            parse_action("raise", 120).unwrap(),
            Action::Raise { amount: 120 }
        );
        assert_eq!(parse_action("all_in", 0).unwrap(), Action::AllIn);
    }

    #[test]
    fn test_parse_action_unknown_tag() {
        let err = parse_action("time_bank", 0).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }
}
