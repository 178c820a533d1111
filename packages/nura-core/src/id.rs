/// Identity generation for boards, lists, cards, labels, checklist items and members.
///
/// Ids are random UUIDv4 strings. They carry no ordering; display order lives
/// in sequence position only.
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
