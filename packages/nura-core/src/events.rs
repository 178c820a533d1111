/// Change notifications emitted by the board store after each committed mutation.
/// Collaborators re-read the store snapshot when they receive one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    BoardsChanged { version: u64 },
    MembersChanged { version: u64 },
    ActiveBoardChanged { board_id: Option<String> },
}
