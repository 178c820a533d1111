/// Reorder engine for drag-and-drop moves.
///
/// Takes a drag result (what moved, from where, to where) and computes the
/// complete replacement boards collection. It is independent of any drag
/// library: the UI translates its drop callback into a [`MoveInstruction`].
///
/// Index semantics follow standard list reordering: the item is removed at
/// the source index first, and the destination index addresses the sequence
/// after that removal. Destination indices past the end append.

use serde::{Deserialize, Serialize};

use crate::types::Board;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    /// A list moving within its board.
    Column,
    /// A card moving within or between lists.
    Card,
}

/// A position inside a container: a board (column moves) or a list (card moves).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragLocation {
    pub container_id: String,
    pub index: usize,
}

impl DragLocation {
    pub fn new(container_id: &str, index: usize) -> Self {
        Self {
            container_id: container_id.to_string(),
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveInstruction {
    pub kind: MoveKind,
    pub source: DragLocation,
    /// `None` when the drop was cancelled.
    pub destination: Option<DragLocation>,
}

impl MoveInstruction {
    pub fn column(board_id: &str, from: usize, to: usize) -> Self {
        Self {
            kind: MoveKind::Column,
            source: DragLocation::new(board_id, from),
            destination: Some(DragLocation::new(board_id, to)),
        }
    }

    pub fn card(from_list: &str, from: usize, to_list: &str, to: usize) -> Self {
        Self {
            kind: MoveKind::Card,
            source: DragLocation::new(from_list, from),
            destination: Some(DragLocation::new(to_list, to)),
        }
    }

    /// True when dropping would leave everything where it was.
    pub fn is_noop(&self) -> bool {
        match &self.destination {
            None => true,
            Some(dest) => match self.kind {
                MoveKind::Column => dest.index == self.source.index,
                MoveKind::Card => {
                    dest.container_id == self.source.container_id && dest.index == self.source.index
                }
            },
        }
    }
}

/// Apply `instruction` to `boards`, returning the new collection.
///
/// Returns `None` when nothing changes: cancelled drops, same-position drops,
/// unknown containers, or a source index outside its sequence.
/// Column moves act on the board named by the source container, falling back to
/// the active board (drag libraries often give the board area a fixed id).
/// Card moves act on the board owning the source list; the destination list must
/// belong to the same board.
pub fn apply_move(
    boards: &[Board],
    active_board_id: Option<&str>,
    instruction: &MoveInstruction,
) -> Option<Vec<Board>> {
    if instruction.is_noop() {
        return None;
    }
    let dest = instruction.destination.as_ref()?;
    let mut next = boards.to_vec();

    let moved = match instruction.kind {
        MoveKind::Column => {
            let board_idx = next
                .iter()
                .position(|b| b.id == instruction.source.container_id)
                .or_else(|| {
                    active_board_id.and_then(|id| next.iter().position(|b| b.id == id))
                })?;
            move_within(&mut next[board_idx].lists, instruction.source.index, dest.index)
        }
        MoveKind::Card => move_card(&mut next, &instruction.source, dest),
    };

    if moved {
        Some(next)
    } else {
        log::debug!("[nura.reorder] Ignoring unresolvable move {:?}", instruction);
        None
    }
}

fn move_card(boards: &mut [Board], source: &DragLocation, dest: &DragLocation) -> bool {
    let Some((board_idx, src_idx)) = boards.iter().enumerate().find_map(|(bi, b)| {
        b.lists
            .iter()
            .position(|l| l.id == source.container_id)
            .map(|li| (bi, li))
    }) else {
        return false;
    };
    let lists = &mut boards[board_idx].lists;

    if source.container_id == dest.container_id {
        return move_within(&mut lists[src_idx].cards, source.index, dest.index);
    }

    let Some(dst_idx) = lists.iter().position(|l| l.id == dest.container_id) else {
        return false;
    };
    if source.index >= lists[src_idx].cards.len() {
        return false;
    }

    let mut card = lists[src_idx].cards.remove(source.index);
    card.list_id = Some(dest.container_id.clone());
    let cards = &mut lists[dst_idx].cards;
    let at = dest.index.min(cards.len());
    cards.insert(at, card);
    true
}

/// Remove at `from`, insert at `to` (post-removal index, clamped to append).
fn move_within<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() {
        return false;
    }
    let item = items.remove(from);
    let at = to.min(items.len());
    items.insert(at, item);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Card, List};

    fn make_board(lists: Vec<(&str, Vec<&str>)>) -> Board {
        let mut board = Board::new("Test", "");
        board.lists = lists
            .into_iter()
            .map(|(title, cards)| {
                let mut list = List::new(title, 5);
                list.id = title.to_string();
                list.cards = cards
                    .into_iter()
                    .map(|t| {
                        let mut card = Card::new(t, title);
                        card.id = t.to_string();
                        card
                    })
                    .collect();
                list
            })
            .collect();
        board
    }

    fn titles(board: &Board, list: &str) -> Vec<String> {
        board
            .list(list)
            .unwrap()
            .cards
            .iter()
            .map(|c| c.title.clone())
            .collect()
    }

    #[test]
    fn test_cancelled_drop_is_noop() {
        let boards = vec![make_board(vec![("a", vec!["1", "2"])])];
        let instr = MoveInstruction {
            kind: MoveKind::Card,
            source: DragLocation::new("a", 0),
            destination: None,
        };
        assert!(apply_move(&boards, None, &instr).is_none());
    }

    #[test]
    fn test_same_position_is_noop() {
        let boards = vec![make_board(vec![("a", vec!["1", "2", "3"])])];
        for i in 0..3 {
            assert!(apply_move(&boards, None, &MoveInstruction::card("a", i, "a", i)).is_none());
        }
        let board_id = boards[0].id.clone();
        assert!(apply_move(&boards, None, &MoveInstruction::column(&board_id, 0, 0)).is_none());
    }

    #[test]
    fn test_column_move_forward_and_back() {
        let boards = vec![make_board(vec![("a", vec![]), ("b", vec![]), ("c", vec![])])];
        let board_id = boards[0].id.clone();

        let next = apply_move(&boards, None, &MoveInstruction::column(&board_id, 0, 2)).unwrap();
        let order: Vec<_> = next[0].lists.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);

        let back = apply_move(&next, None, &MoveInstruction::column(&board_id, 2, 0)).unwrap();
        assert_eq!(back, boards);
    }

    #[test]
    fn test_column_move_uses_active_board_for_placeholder_container() {
        let boards = vec![
            make_board(vec![("x", vec![]), ("y", vec![])]),
            make_board(vec![("a", vec![]), ("b", vec![])]),
        ];
        let active = boards[1].id.clone();
        let next = apply_move(
            &boards,
            Some(&active),
            &MoveInstruction::column("board", 1, 0),
        )
        .unwrap();
        assert_eq!(next[0], boards[0]);
        let order: Vec<_> = next[1].lists.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);

        assert!(apply_move(&boards, None, &MoveInstruction::column("board", 1, 0)).is_none());
    }

    #[test]
    fn test_card_move_same_list_accounts_for_shift() {
        let boards = vec![make_board(vec![("a", vec!["1", "2", "3", "4"])])];
        let next = apply_move(&boards, None, &MoveInstruction::card("a", 0, "a", 2)).unwrap();
        assert_eq!(titles(&next[0], "a"), vec!["2", "3", "1", "4"]);

        let next = apply_move(&boards, None, &MoveInstruction::card("a", 3, "a", 1)).unwrap();
        assert_eq!(titles(&next[0], "a"), vec!["1", "4", "2", "3"]);
    }

    #[test]
    fn test_destination_past_end_appends() {
        let boards = vec![make_board(vec![("a", vec!["1", "2"]), ("b", vec!["x"])])];
        let next = apply_move(&boards, None, &MoveInstruction::card("a", 0, "a", 99)).unwrap();
        assert_eq!(titles(&next[0], "a"), vec!["2", "1"]);

        let next = apply_move(&boards, None, &MoveInstruction::card("a", 0, "b", 99)).unwrap();
        assert_eq!(titles(&next[0], "b"), vec!["x", "1"]);
    }

    #[test]
    fn test_cross_list_move_updates_list_id() {
        let boards = vec![make_board(vec![("todo", vec!["Draft release notes"]), ("done", vec![])])];
        let next = apply_move(&boards, None, &MoveInstruction::card("todo", 0, "done", 0)).unwrap();
        assert!(titles(&next[0], "todo").is_empty());
        let moved = &next[0].list("done").unwrap().cards[0];
        assert_eq!(moved.title, "Draft release notes");
        assert_eq!(moved.list_id.as_deref(), Some("done"));
    }

    #[test]
    fn test_cross_list_round_trip_restores_sequences() {
        let boards = vec![make_board(vec![
            ("a", vec!["a0", "a1", "a2", "a3"]),
            ("b", vec!["b0", "b1"]),
        ])];
        let there = apply_move(&boards, None, &MoveInstruction::card("a", 2, "b", 0)).unwrap();
        assert_eq!(titles(&there[0], "a"), vec!["a0", "a1", "a3"]);
        assert_eq!(titles(&there[0], "b"), vec!["a2", "b0", "b1"]);

        let back = apply_move(&there, None, &MoveInstruction::card("b", 0, "a", 2)).unwrap();
        assert_eq!(back, boards);
    }

    #[test]
    fn test_card_count_conserved() {
        let boards = vec![make_board(vec![
            ("a", vec!["1", "2", "3"]),
            ("b", vec!["4"]),
            ("c", vec![]),
        ])];
        let moves = [
            MoveInstruction::card("a", 1, "c", 0),
            MoveInstruction::card("b", 0, "a", 5),
            MoveInstruction::card("c", 0, "b", 0),
            MoveInstruction::card("a", 0, "a", 1),
        ];
        let mut current = boards.clone();
        for m in &moves {
            current = apply_move(&current, None, m).unwrap();
            assert_eq!(current[0].card_count(), 4);
        }
    }

    #[test]
    fn test_unresolvable_moves_are_ignored() {
        let boards = vec![
            make_board(vec![("a", vec!["1"])]),
            make_board(vec![("z", vec![])]),
        ];
        // unknown list
        assert!(apply_move(&boards, None, &MoveInstruction::card("nope", 0, "a", 0)).is_none());
        // source index out of range
        assert!(apply_move(&boards, None, &MoveInstruction::card("a", 4, "a", 0)).is_none());
        // destination in another board
        assert!(apply_move(&boards, None, &MoveInstruction::card("a", 0, "z", 0)).is_none());
    }

    #[test]
    fn test_instruction_wire_shape() {
        let instr: MoveInstruction = serde_json::from_str(
            r#"{
                "kind": "card",
                "source": { "containerId": "a", "index": 0 },
                "destination": { "containerId": "b", "index": 1 }
            }"#,
        )
        .unwrap();
        assert_eq!(instr, MoveInstruction::card("a", 0, "b", 1));
    }
}
