use chrono::{DateTime, NaiveDate, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Deserializer, Serialize};

use crate::id::new_id;

/// Color token used when a board is created without one.
pub const DEFAULT_BOARD_COLOR: &str = "bg-blue-500";
/// WIP limit given to new lists (and to the default "To Do" list).
pub const DEFAULT_WIP_LIMIT: u32 = 5;
/// WIP limit of the default "Done" list.
pub const DONE_WIP_LIMIT: u32 = 10;

const AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

/// Ids written by older versions may be JSON numbers (the seed member is `1`,
/// checklist items used millisecond timestamps). They are normalised to strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
        }
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawId::deserialize(d).map(String::from)
}

fn deserialize_id_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let raw: Option<Vec<RawId>> = Option::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(String::from)
        .collect())
}

/// Date inputs that were cleared store an empty string instead of null.
fn deserialize_due_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => {
            // Accept full timestamps too, keeping only the calendar date
            let date = s.get(..10).unwrap_or(s.as_str());
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    /// Weak references into the member roster.
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub assigned_members: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_due_date")]
    pub due_date: Option<NaiveDate>,
    /// Seconds of tracked work.
    #[serde(default)]
    pub time_logged: u64,
    #[serde(default)]
    pub is_tracking: bool,
    /// Owning list, kept in step with the list that actually holds the card.
    #[serde(default)]
    pub list_id: Option<String>,
}

impl Card {
    pub fn new(title: &str, list_id: &str) -> Self {
        Self {
            id: new_id(),
            title: title.to_string(),
            description: String::new(),
            priority: Priority::Medium,
            labels: Vec::new(),
            checklist: Vec::new(),
            assigned_members: Vec::new(),
            created_at: Utc::now(),
            due_date: None,
            time_logged: 0,
            is_tracking: false,
            list_id: Some(list_id.to_string()),
        }
    }

    /// Percentage (0-100) of completed checklist items, rounded.
    pub fn checklist_progress(&self) -> u8 {
        let total = self.checklist.len();
        if total == 0 {
            return 0;
        }
        let done = self.checklist.iter().filter(|i| i.completed).count();
        ((done as f64 / total as f64) * 100.0).round() as u8
    }

    /// Checklist with a new open item appended. Blank text yields `None`.
    pub fn with_checklist_item(&self, text: &str) -> Option<Vec<ChecklistItem>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let mut checklist = self.checklist.clone();
        checklist.push(ChecklistItem {
            id: new_id(),
            text: text.to_string(),
            completed: false,
        });
        Some(checklist)
    }

    pub fn with_toggled_checklist_item(&self, item_id: &str) -> Vec<ChecklistItem> {
        self.checklist
            .iter()
            .map(|item| {
                if item.id == item_id {
                    ChecklistItem {
                        completed: !item.completed,
                        ..item.clone()
                    }
                } else {
                    item.clone()
                }
            })
            .collect()
    }

    /// Labels with a fresh card-owned label appended. Blank names yield `None`.
    pub fn with_label(&self, name: &str, color: &str) -> Option<Vec<Label>> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut labels = self.labels.clone();
        labels.push(Label {
            id: new_id(),
            name: name.to_string(),
            color: color.to_string(),
        });
        Some(labels)
    }

    pub fn without_label(&self, label_id: &str) -> Vec<Label> {
        self.labels
            .iter()
            .filter(|l| l.id != label_id)
            .cloned()
            .collect()
    }

    /// Assignment list with `member_id` added, or removed if already present.
    pub fn with_toggled_member(&self, member_id: &str) -> Vec<String> {
        if self.assigned_members.iter().any(|m| m == member_id) {
            self.assigned_members
                .iter()
                .filter(|m| *m != member_id)
                .cloned()
                .collect()
        } else {
            let mut members = self.assigned_members.clone();
            members.push(member_id.to_string());
            members
        }
    }
}

/// A column on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub cards: Vec<Card>,
    /// Advisory maximum card count; 0 means unlimited.
    #[serde(default)]
    pub wip_limit: u32,
}

impl List {
    pub fn new(title: &str, wip_limit: u32) -> Self {
        Self {
            id: new_id(),
            title: title.to_string(),
            cards: Vec::new(),
            wip_limit,
        }
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    /// True when the list holds more cards than its WIP limit allows.
    /// Never blocks a mutation; collaborators only flag it.
    pub fn is_over_limit(&self) -> bool {
        self.wip_limit > 0 && self.cards.len() > self.wip_limit as usize
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    pub fn card_mut(&mut self, card_id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == card_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    pub color: String,
    #[serde(default)]
    pub lists: Vec<List>,
    pub created_at: DateTime<Utc>,
}

impl Board {
    /// New board seeded with the default "To Do" and "Done" lists.
    pub fn new(title: &str, color: &str) -> Self {
        let color = if color.trim().is_empty() {
            DEFAULT_BOARD_COLOR
        } else {
            color
        };
        Self {
            id: new_id(),
            title: title.to_string(),
            color: color.to_string(),
            lists: vec![
                List::new("To Do", DEFAULT_WIP_LIMIT),
                List::new("Done", DONE_WIP_LIMIT),
            ],
            created_at: Utc::now(),
        }
    }

    pub fn list(&self, list_id: &str) -> Option<&List> {
        self.lists.iter().find(|l| l.id == list_id)
    }

    pub fn list_mut(&mut self, list_id: &str) -> Option<&mut List> {
        self.lists.iter_mut().find(|l| l.id == list_id)
    }

    pub fn card_count(&self) -> usize {
        self.lists.iter().map(|l| l.cards.len()).sum()
    }
}

/// A user in the global roster. Cards refer to members by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "avatar", alias = "avatarUrl", default)]
    pub avatar_url: String,
}

impl Member {
    pub fn new(name: &str, role: &str) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            role: role.to_string(),
            avatar_url: avatar_url(name),
        }
    }

    /// The built-in assistant every fresh roster starts with.
    pub fn system() -> Self {
        Self {
            id: "1".to_string(),
            name: "Nura AI".to_string(),
            role: "System assistant".to_string(),
            avatar_url: avatar_url("Nura"),
        }
    }
}

/// Avatar image URL derived from a seed string.
pub fn avatar_url(seed: &str) -> String {
    format!(
        "{}{}",
        AVATAR_BASE_URL,
        utf8_percent_encode(seed, NON_ALPHANUMERIC)
    )
}

/// Partial card update. Collection fields replace the card's collection
/// wholesale; callers pass the complete new collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub labels: Option<Vec<Label>>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub assigned_members: Option<Vec<String>>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<NaiveDate>>,
    pub time_logged: Option<u64>,
    pub is_tracking: Option<bool>,
}

impl CardPatch {
    pub fn time_logged(seconds: u64) -> Self {
        Self {
            time_logged: Some(seconds),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow-merge the patch into `card`.
    pub fn apply(self, card: &mut Card) {
        if let Some(title) = self.title {
            card.title = title;
        }
        if let Some(description) = self.description {
            card.description = description;
        }
        if let Some(priority) = self.priority {
            card.priority = priority;
        }
        if let Some(labels) = self.labels {
            card.labels = labels;
        }
        if let Some(checklist) = self.checklist {
            card.checklist = checklist;
        }
        if let Some(members) = self.assigned_members {
            card.assigned_members = members;
        }
        if let Some(due_date) = self.due_date {
            card.due_date = due_date;
        }
        if let Some(seconds) = self.time_logged {
            card.time_logged = seconds;
        }
        if let Some(tracking) = self.is_tracking {
            card.is_tracking = tracking;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_has_default_lists() {
        let board = Board::new("Roadmap", "");
        assert_eq!(board.color, DEFAULT_BOARD_COLOR);
        let titles: Vec<_> = board.lists.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["To Do", "Done"]);
        assert_eq!(board.lists[0].wip_limit, 5);
        assert_eq!(board.lists[1].wip_limit, 10);
        assert!(board.lists.iter().all(|l| l.cards.is_empty()));
    }

    #[test]
    fn test_wip_limit_is_advisory() {
        let mut list = List::new("Doing", 1);
        assert!(!list.is_over_limit());
        let list_id = list.id.clone();
        list.cards.push(Card::new("a", &list_id));
        assert!(!list.is_over_limit());
        list.cards.push(Card::new("b", &list_id));
        assert!(list.is_over_limit());

        list.wip_limit = 0;
        assert!(!list.is_over_limit());
    }

    #[test]
    fn test_checklist_progress() {
        let mut card = Card::new("Ship", "l1");
        assert_eq!(card.checklist_progress(), 0);
        card.checklist = card.with_checklist_item("one").unwrap();
        card.checklist = card.with_checklist_item("two").unwrap();
        card.checklist = card.with_checklist_item("three").unwrap();
        let first = card.checklist[0].id.clone();
        card.checklist = card.with_toggled_checklist_item(&first);
        assert_eq!(card.checklist_progress(), 33);
        assert!(card.with_checklist_item("   ").is_none());
    }

    #[test]
    fn test_toggle_member() {
        let mut card = Card::new("Ship", "l1");
        card.assigned_members = card.with_toggled_member("m1");
        card.assigned_members = card.with_toggled_member("m2");
        assert_eq!(card.assigned_members, vec!["m1", "m2"]);
        card.assigned_members = card.with_toggled_member("m1");
        assert_eq!(card.assigned_members, vec!["m2"]);
    }

    #[test]
    fn test_labels_are_card_owned_copies() {
        let card = Card::new("Ship", "l1");
        let labels = card.with_label(" urgent ", "bg-rose-500").unwrap();
        assert_eq!(labels[0].name, "urgent");
        let other = Card::new("Other", "l1").with_label("urgent", "bg-rose-500").unwrap();
        assert_ne!(labels[0].id, other[0].id);

        let mut card = card;
        card.labels = labels;
        let id = card.labels[0].id.clone();
        assert!(card.without_label(&id).is_empty());
    }

    #[test]
    fn test_patch_replaces_collections_wholesale() {
        let mut card = Card::new("Ship", "l1");
        card.assigned_members = vec!["a".into(), "b".into()];
        card.due_date = NaiveDate::from_ymd_opt(2025, 3, 1);

        CardPatch {
            assigned_members: Some(vec!["c".into()]),
            due_date: Some(None),
            priority: Some(Priority::High),
            ..CardPatch::default()
        }
        .apply(&mut card);

        assert_eq!(card.assigned_members, vec!["c"]);
        assert_eq!(card.due_date, None);
        assert_eq!(card.priority, Priority::High);
        assert_eq!(card.title, "Ship");
    }

    #[test]
    fn test_member_avatar_is_encoded() {
        let member = Member::new("Ada Lovelace", "Engineer");
        assert_eq!(
            member.avatar_url,
            "https://api.dicebear.com/7.x/avataaars/svg?seed=Ada%20Lovelace"
        );
        assert_eq!(Member::system().avatar_url, avatar_url("Nura"));
    }

    #[test]
    fn test_reads_legacy_json() {
        let json = r#"{
            "id": "c1",
            "title": "Legacy",
            "createdAt": "2024-05-01T10:00:00.000Z",
            "checklist": [{ "id": 1714557600000, "text": "step", "completed": true }],
            "assignedMembers": [1, "m2"],
            "dueDate": null
        }"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.checklist[0].id, "1714557600000");
        assert_eq!(card.assigned_members, vec!["1", "m2"]);
        assert_eq!(card.priority, Priority::Medium);
        assert_eq!(card.list_id, None);

        let member: Member = serde_json::from_str(
            r#"{ "id": 1, "name": "Nura AI", "role": "System assistant", "avatar": "x" }"#,
        )
        .unwrap();
        assert_eq!(member.id, "1");
        assert_eq!(member.avatar_url, "x");
    }

    #[test]
    fn test_due_date_forms() {
        let parse = |due: &str| -> Option<NaiveDate> {
            let json = format!(
                r#"{{ "id": "c1", "title": "t", "createdAt": "2024-05-01T10:00:00Z", "dueDate": {} }}"#,
                due
            );
            serde_json::from_str::<Card>(&json).unwrap().due_date
        };
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1);
        assert_eq!(parse(r#""2025-03-01""#), expected);
        assert_eq!(parse(r#""2025-03-01T00:00:00.000Z""#), expected);
        assert_eq!(parse(r#""""#), None);
        assert_eq!(parse("null"), None);
    }

    #[test]
    fn test_serialized_field_names() {
        let card = Card::new("Ship", "l1");
        let value = serde_json::to_value(&card).unwrap();
        for key in ["timeLogged", "isTracking", "assignedMembers", "createdAt", "dueDate", "listId"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["priority"], "Medium");
        assert!(value["dueDate"].is_null());

        let member = serde_json::to_value(Member::system()).unwrap();
        assert!(member.get("avatar").is_some());
    }
}
