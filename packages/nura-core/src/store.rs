/// Board store: the canonical boards collection, member roster and active board.
///
/// Every mutation builds a new snapshot of the affected collection, swaps it in,
/// bumps the version, persists it through the key-value bridge and broadcasts a
/// [`StoreEvent`]. Readers holding an earlier snapshot keep seeing it unchanged.
///
/// Mutations that name a board, list, card or member that does not exist return
/// an error and leave every collection untouched; so do blank titles.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::bridge::KvBridge;
use crate::config::{StorageKeys, StoreConfig, TrackerConfig};
use crate::events::StoreEvent;
use crate::reorder::{self, MoveInstruction};
use crate::storage::file::FileBackend;
use crate::storage::memory::MemoryBackend;
use crate::storage::KeyValueBackend;
use crate::types::*;

/// Store handle shared with the time tracker driver and other tasks.
pub type SharedStore = Arc<Mutex<BoardStore>>;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("List {list_id} not found on board {board_id}")]
    ListNotFound { board_id: String, list_id: String },

    #[error("Card {card_id} not found in list {list_id}")]
    CardNotFound { list_id: String, card_id: String },

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Member name must not be empty")]
    EmptyName,
}

pub struct BoardStore {
    bridge: KvBridge,
    keys: StorageKeys,
    tracker: TrackerConfig,
    boards: Arc<Vec<Board>>,
    members: Arc<Vec<Member>>,
    active_board_id: Option<String>,
    /// Monotonic, incremented on every committed mutation
    version: u64,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl BoardStore {
    /// Open the file-backed store described by `config`.
    pub fn open(config: &StoreConfig) -> Self {
        let backend = FileBackend::new(config.data_dir()).with_quota(config.quota_bytes);
        Self::with_backend(Arc::new(backend), config.keys.clone())
            .with_tracker_config(config.tracker.clone())
    }

    /// Store whose state lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), StorageKeys::default())
    }

    /// Load boards, members and the active board id from `backend`.
    pub fn with_backend(backend: Arc<dyn KeyValueBackend>, keys: StorageKeys) -> Self {
        let bridge = KvBridge::new(backend);
        let boards: Vec<Board> = bridge.load(&keys.boards, Vec::new());
        let members: Vec<Member> = bridge.load_or_else(&keys.members, || vec![Member::system()]);
        let mut active_board_id: Option<String> = bridge.load(&keys.active_board, None);

        if let Some(id) = &active_board_id {
            if !boards.iter().any(|b| &b.id == id) {
                log::warn!("[nura.store] Stored active board {} no longer exists, clearing", id);
                active_board_id = None;
            }
        }

        log::info!(
            "[nura.store] Loaded {} boards, {} members",
            boards.len(),
            members.len()
        );

        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            bridge,
            keys,
            tracker: TrackerConfig::default(),
            boards: Arc::new(boards),
            members: Arc::new(members),
            active_board_id,
            version: 0,
            event_tx,
        }
    }

    pub fn with_tracker_config(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    /// Tick period and commit cadence for time trackers on this store.
    pub fn tracker_config(&self) -> &TrackerConfig {
        &self.tracker
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    // ── Read surface ────────────────────────────────────────────────────

    /// Current boards snapshot.
    pub fn boards(&self) -> Arc<Vec<Board>> {
        Arc::clone(&self.boards)
    }

    /// Current member roster snapshot.
    pub fn members(&self) -> Arc<Vec<Member>> {
        Arc::clone(&self.members)
    }

    pub fn active_board_id(&self) -> Option<&str> {
        self.active_board_id.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    pub fn board(&self, board_id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == board_id)
    }

    pub fn active_board(&self) -> Option<&Board> {
        self.active_board_id.as_deref().and_then(|id| self.board(id))
    }

    pub fn find_card(&self, board_id: &str, list_id: &str, card_id: &str) -> Option<&Card> {
        self.board(board_id)?.list(list_id)?.card(card_id)
    }

    /// Id of the list on `board_id` that currently holds `card_id`.
    pub fn locate_card(&self, board_id: &str, card_id: &str) -> Option<&str> {
        self.board(board_id)?
            .lists
            .iter()
            .find(|l| l.card(card_id).is_some())
            .map(|l| l.id.as_str())
    }

    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }

    /// Select a board (single-board view) or clear the selection (gallery).
    pub fn set_active_board_id(&mut self, board_id: Option<&str>) -> Result<(), StoreError> {
        if let Some(id) = board_id {
            if self.board(id).is_none() {
                return Err(StoreError::BoardNotFound(id.to_string()));
            }
        }
        self.commit_active(board_id.map(str::to_string));
        Ok(())
    }

    // ── Boards ──────────────────────────────────────────────────────────

    /// Append a board with the default "To Do" and "Done" lists. Returns its id.
    pub fn create_board(&mut self, title: &str, color: &str) -> Result<String, StoreError> {
        require_text(title, StoreError::EmptyTitle)?;
        let board = Board::new(title, color);
        let id = board.id.clone();
        self.update_boards("create_board", |boards| {
            boards.push(board);
            Ok(())
        })?;
        Ok(id)
    }

    /// Remove a board with all its lists and cards. Clears the selection if it was active.
    pub fn delete_board(&mut self, board_id: &str) -> Result<(), StoreError> {
        self.update_boards("delete_board", |boards| {
            let idx = boards
                .iter()
                .position(|b| b.id == board_id)
                .ok_or_else(|| StoreError::BoardNotFound(board_id.to_string()))?;
            boards.remove(idx);
            Ok(())
        })?;
        if self.active_board_id.as_deref() == Some(board_id) {
            self.commit_active(None);
        }
        Ok(())
    }

    // ── Lists ───────────────────────────────────────────────────────────

    /// Append an empty list with the default WIP limit. Returns its id.
    pub fn create_list(&mut self, board_id: &str, title: &str) -> Result<String, StoreError> {
        require_text(title, StoreError::EmptyTitle)?;
        let list = List::new(title, DEFAULT_WIP_LIMIT);
        let id = list.id.clone();
        self.update_boards("create_list", |boards| {
            find_board(boards, board_id)?.lists.push(list);
            Ok(())
        })?;
        Ok(id)
    }

    /// Remove a list and every card in it.
    pub fn delete_list(&mut self, board_id: &str, list_id: &str) -> Result<(), StoreError> {
        self.update_boards("delete_list", |boards| {
            let board = find_board(boards, board_id)?;
            let idx = board
                .lists
                .iter()
                .position(|l| l.id == list_id)
                .ok_or_else(|| list_not_found(board_id, list_id))?;
            board.lists.remove(idx);
            Ok(())
        })
    }

    pub fn rename_list(
        &mut self,
        board_id: &str,
        list_id: &str,
        new_title: &str,
    ) -> Result<(), StoreError> {
        require_text(new_title, StoreError::EmptyTitle)?;
        self.update_boards("rename_list", |boards| {
            find_list(boards, board_id, list_id)?.title = new_title.to_string();
            Ok(())
        })
    }

    /// Set the WIP limit from user input. Unparsable input becomes 0 (unlimited).
    /// Returns the limit that was stored.
    pub fn set_wip_limit(
        &mut self,
        board_id: &str,
        list_id: &str,
        limit: &str,
    ) -> Result<u32, StoreError> {
        let limit = parse_wip_limit(limit);
        self.update_boards("set_wip_limit", |boards| {
            find_list(boards, board_id, list_id)?.wip_limit = limit;
            Ok(limit)
        })
    }

    // ── Cards ───────────────────────────────────────────────────────────

    /// Append a card with default metadata. Returns its id.
    pub fn create_card(
        &mut self,
        board_id: &str,
        list_id: &str,
        title: &str,
    ) -> Result<String, StoreError> {
        require_text(title, StoreError::EmptyTitle)?;
        let card = Card::new(title, list_id);
        let id = card.id.clone();
        self.update_boards("create_card", |boards| {
            find_list(boards, board_id, list_id)?.cards.push(card);
            Ok(())
        })?;
        Ok(id)
    }

    /// Shallow-merge `patch` into a card.
    pub fn update_card(
        &mut self,
        board_id: &str,
        list_id: &str,
        card_id: &str,
        patch: CardPatch,
    ) -> Result<(), StoreError> {
        if let Some(title) = &patch.title {
            require_text(title, StoreError::EmptyTitle)?;
        }
        if patch.is_empty() {
            return self
                .find_card(board_id, list_id, card_id)
                .map(|_| ())
                .ok_or_else(|| self.missing_card_error(board_id, list_id, card_id));
        }
        self.update_boards("update_card", |boards| {
            let list = find_list(boards, board_id, list_id)?;
            let card = list
                .card_mut(card_id)
                .ok_or_else(|| card_not_found(list_id, card_id))?;
            patch.apply(card);
            Ok(())
        })
    }

    pub fn delete_card(
        &mut self,
        board_id: &str,
        list_id: &str,
        card_id: &str,
    ) -> Result<(), StoreError> {
        self.update_boards("delete_card", |boards| {
            let list = find_list(boards, board_id, list_id)?;
            let idx = list
                .cards
                .iter()
                .position(|c| c.id == card_id)
                .ok_or_else(|| card_not_found(list_id, card_id))?;
            list.cards.remove(idx);
            Ok(())
        })
    }

    // ── Members ─────────────────────────────────────────────────────────

    /// Append a member with a derived avatar URL. Returns its id.
    pub fn create_member(&mut self, name: &str, role: &str) -> Result<String, StoreError> {
        require_text(name, StoreError::EmptyName)?;
        let member = Member::new(name, role);
        let id = member.id.clone();
        let mut members = (*self.members).clone();
        members.push(member);
        self.commit_members(members);
        Ok(id)
    }

    /// Remove a member and strip its id from every card on every board.
    pub fn delete_member(&mut self, member_id: &str) -> Result<(), StoreError> {
        let idx = self
            .members
            .iter()
            .position(|m| m.id == member_id)
            .ok_or_else(|| StoreError::MemberNotFound(member_id.to_string()))?;
        let mut members = (*self.members).clone();
        members.remove(idx);
        self.commit_members(members);

        let referenced = self.boards.iter().any(|b| {
            b.lists.iter().any(|l| {
                l.cards
                    .iter()
                    .any(|c| c.assigned_members.iter().any(|m| m == member_id))
            })
        });
        if referenced {
            self.update_boards("delete_member", |boards| {
                let cards = boards
                    .iter_mut()
                    .flat_map(|b| b.lists.iter_mut())
                    .flat_map(|l| l.cards.iter_mut());
                for card in cards {
                    card.assigned_members.retain(|m| m != member_id);
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    // ── Bulk ────────────────────────────────────────────────────────────

    /// Atomically replace the whole boards collection (reorder results).
    pub fn replace_boards_snapshot(&mut self, new_boards: Vec<Board>) {
        self.commit_boards(new_boards);
        if let Some(id) = self.active_board_id.clone() {
            if self.board(&id).is_none() {
                self.commit_active(None);
            }
        }
    }

    /// Apply a drag-and-drop move. Returns false when nothing changed.
    pub fn reorder(&mut self, instruction: &MoveInstruction) -> bool {
        match reorder::apply_move(&self.boards, self.active_board_id.as_deref(), instruction) {
            Some(next) => {
                log::debug!("[nura.reorder] Applied {:?}", instruction.kind);
                self.replace_boards_snapshot(next);
                true
            }
            None => false,
        }
    }

    // ── Commit plumbing ─────────────────────────────────────────────────

    /// Run `f` on a copy of the boards; commit the copy only if `f` succeeds.
    fn update_boards<T>(
        &mut self,
        op: &str,
        f: impl FnOnce(&mut Vec<Board>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut next = (*self.boards).clone();
        match f(&mut next) {
            Ok(out) => {
                self.commit_boards(next);
                Ok(out)
            }
            Err(e) => {
                log::debug!("[nura.store] {} ignored: {}", op, e);
                Err(e)
            }
        }
    }

    fn commit_boards(&mut self, boards: Vec<Board>) {
        self.boards = Arc::new(boards);
        self.version += 1;
        self.bridge.save(&self.keys.boards, self.boards.as_slice());
        let _ = self.event_tx.send(StoreEvent::BoardsChanged {
            version: self.version,
        });
    }

    fn commit_members(&mut self, members: Vec<Member>) {
        self.members = Arc::new(members);
        self.version += 1;
        self.bridge.save(&self.keys.members, self.members.as_slice());
        let _ = self.event_tx.send(StoreEvent::MembersChanged {
            version: self.version,
        });
    }

    fn commit_active(&mut self, board_id: Option<String>) {
        self.active_board_id = board_id;
        self.bridge.save(&self.keys.active_board, &self.active_board_id);
        let _ = self.event_tx.send(StoreEvent::ActiveBoardChanged {
            board_id: self.active_board_id.clone(),
        });
    }

    fn missing_card_error(&self, board_id: &str, list_id: &str, card_id: &str) -> StoreError {
        match self.board(board_id) {
            None => StoreError::BoardNotFound(board_id.to_string()),
            Some(b) if b.list(list_id).is_none() => list_not_found(board_id, list_id),
            Some(_) => card_not_found(list_id, card_id),
        }
    }
}

fn require_text(text: &str, err: StoreError) -> Result<(), StoreError> {
    if text.trim().is_empty() {
        Err(err)
    } else {
        Ok(())
    }
}

fn list_not_found(board_id: &str, list_id: &str) -> StoreError {
    StoreError::ListNotFound {
        board_id: board_id.to_string(),
        list_id: list_id.to_string(),
    }
}

fn card_not_found(list_id: &str, card_id: &str) -> StoreError {
    StoreError::CardNotFound {
        list_id: list_id.to_string(),
        card_id: card_id.to_string(),
    }
}

fn find_board<'a>(boards: &'a mut [Board], board_id: &str) -> Result<&'a mut Board, StoreError> {
    boards
        .iter_mut()
        .find(|b| b.id == board_id)
        .ok_or_else(|| StoreError::BoardNotFound(board_id.to_string()))
}

fn find_list<'a>(
    boards: &'a mut [Board],
    board_id: &str,
    list_id: &str,
) -> Result<&'a mut List, StoreError> {
    find_board(boards, board_id)?
        .list_mut(list_id)
        .ok_or_else(|| list_not_found(board_id, list_id))
}

/// Lenient integer parse of user input: leading digits after optional
/// whitespace and `+`. Anything else, including negatives, is 0.
pub fn parse_wip_limit(input: &str) -> u32 {
    let s = input.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u64>().map_or(u32::MAX, |n| n.min(u32::MAX as u64) as u32)
}
