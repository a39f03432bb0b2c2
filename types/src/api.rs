//! Wire messages for the match server's websocket and room endpoints.
//!
//! Everything is JSON with a `type` tag and camelCase fields. The server
//! broadcasts full [`GameState`] snapshots; clients never receive a live
//! reference to authoritative state.

use serde::{Deserialize, Serialize};

use crate::game::GameState;
use crate::room::RoomRecord;

/// Messages accepted from clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Attach (or reattach after a disconnect) to a roster seat.
    #[serde(rename_all = "camelCase")]
    JoinMatch {
        room_id: String,
        player_address: String,
        /// Funding transaction reference, checked against the stake oracle.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tx_ref: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RollDice {
        room_id: String,
        player_address: String,
    },
    #[serde(rename_all = "camelCase")]
    MoveToken {
        room_id: String,
        player_address: String,
        token_index: u8,
    },
    /// Retry payout authorization after the match has completed.
    #[serde(rename_all = "camelCase")]
    ClaimPayout {
        room_id: String,
        player_address: String,
    },
}

/// Signed payout authorization relayed from the payout authority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutTicket {
    pub winner_address: String,
    pub amount: u64,
    pub nonce: u64,
    /// Unix-ms deadline after which the vault rejects the ticket.
    pub deadline_ms: u64,
    /// Opaque signature the client redeems on-chain.
    pub signature: String,
}

/// Messages emitted by the server. All but `GameError` are room broadcasts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Roster complete, match beginning.
    #[serde(rename_all = "camelCase")]
    GameStarted {
        room: RoomRecord,
        state: GameState,
    },
    /// Authoritative snapshot after every transition, with commentary.
    #[serde(rename_all = "camelCase")]
    StateUpdate {
        state: GameState,
        msg: String,
    },
    /// Fired before the corresponding `state_update` so clients can animate.
    #[serde(rename_all = "camelCase")]
    DiceRolled {
        value: u8,
        player_index: u8,
    },
    #[serde(rename_all = "camelCase")]
    TurnTimerStart {
        timeout_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    TurnTimerUpdate {
        remaining_seconds: u64,
    },
    #[serde(rename_all = "camelCase")]
    TurnTimeout {
        player_name: String,
    },
    /// Payout authorization for the winner, broadcast after `WIN`.
    #[serde(rename_all = "camelCase")]
    PayoutReady {
        ticket: PayoutTicket,
    },
    /// Sent to the offending client only; never broadcast.
    #[serde(rename_all = "camelCase")]
    GameError {
        message: String,
    },
}

/// `POST /rooms` request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub creator_address: String,
    pub creator_name: String,
    pub stake: u64,
    /// Total seats, 2..=4.
    pub max_players: u8,
    /// Fill the remaining seats with AI opponents.
    #[serde(default)]
    pub ai_opponents: bool,
}

/// `POST /rooms` response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_shape() {
        let raw = r#"{"type":"join_match","roomId":"r1","playerAddress":"0xabc","txRef":"0xf00"}"#;
        let message: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            message,
            ClientMessage::JoinMatch {
                room_id: "r1".into(),
                player_address: "0xabc".into(),
                tx_ref: Some("0xf00".into()),
            }
        );

        // txRef is optional.
        let raw = r#"{"type":"join_match","roomId":"r1","playerAddress":"0xabc"}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_ok());

        let raw = r#"{"type":"move_token","roomId":"r1","playerAddress":"0xabc","tokenIndex":2}"#;
        let message: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            message,
            ClientMessage::MoveToken { token_index: 2, .. }
        ));
    }

    #[test]
    fn test_server_message_tags() {
        let message = ServerMessage::DiceRolled {
            value: 6,
            player_index: 1,
        };
        let encoded = serde_json::to_string(&message).unwrap();
        assert_eq!(
            encoded,
            r#"{"type":"dice_rolled","value":6,"playerIndex":1}"#
        );

        let message = ServerMessage::TurnTimeout {
            player_name: "alice".into(),
        };
        let encoded = serde_json::to_string(&message).unwrap();
        assert!(encoded.contains(r#""type":"turn_timeout""#));
        assert!(encoded.contains(r#""playerName":"alice""#));
    }

    #[test]
    fn test_unknown_client_message_rejected() {
        let raw = r#"{"type":"shutdown_server"}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }
}
