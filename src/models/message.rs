use serde::{Deserialize, Serialize};

use super::{
    config::GameConfig,
    game::{GameState, VotePayload},
    player::{Player, PlayerId},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndTurnPayload {
    pub player_id: PlayerId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVotePayload {
    pub voter_id: PlayerId,
    pub vote: VotePayload,
}

/// Everything that travels over a link, one JSON object per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkMessage {
    Join(Player),
    SyncState(Box<GameState>),
    UpdateSettings(GameConfig),
    EndTurn(EndTurnPayload),
    SubmitVote(SubmitVotePayload),
    PlayerReady(PlayerId),
    Restart,
}

impl NetworkMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            NetworkMessage::Join(_) => "JOIN",
            NetworkMessage::SyncState(_) => "SYNC_STATE",
            NetworkMessage::UpdateSettings(_) => "UPDATE_SETTINGS",
            NetworkMessage::EndTurn(_) => "END_TURN",
            NetworkMessage::SubmitVote(_) => "SUBMIT_VOTE",
            NetworkMessage::PlayerReady(_) => "PLAYER_READY",
            NetworkMessage::Restart => "RESTART",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
