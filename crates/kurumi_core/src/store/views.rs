//! Derived read views.
//!
//! Pure functions over a [`DocumentSnapshot`]. Nothing here is stateful; the
//! store recomputes views from its latest snapshot on demand.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::{DocumentSnapshot, Event, Folder, Note, Person, Template, Vault, VaultScoped};

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid wikilink regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([a-zA-Z][a-zA-Z0-9_-]*)").expect("valid tag regex"));
static PERSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Z][a-zA-Z]+(?: [A-Z][a-zA-Z]+)*)").expect("valid person regex")
});
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//(\d{4}-\d{2}-\d{2})").expect("valid date regex"));

/// Collect distinct first-group captures in order of first appearance.
fn captures(re: &Regex, content: &str, normalize: fn(&str) -> String) -> Vec<String> {
    let mut seen = BTreeSet::new();
    re.captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| normalize(m.as_str()))
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// `[[Title]]` links, in order, duplicates kept.
pub fn extract_wikilinks(content: &str) -> Vec<String> {
    WIKILINK_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Distinct lower-cased `#tags` preceded by whitespace or the start of the text.
pub fn extract_tags(content: &str) -> Vec<String> {
    captures(&TAG_RE, content, str::to_lowercase)
}

/// Distinct `@Capitalized Name` mentions.
pub fn extract_people(content: &str) -> Vec<String> {
    captures(&PERSON_RE, content, str::to_string)
}

/// Distinct `//YYYY-MM-DD` mentions.
pub fn extract_dates(content: &str) -> Vec<String> {
    captures(&DATE_RE, content, str::to_string)
}

/// A mention value with the number of notes it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentionCount {
    pub value: String,
    pub count: usize,
}

fn in_vault<'a, T: VaultScoped + 'a>(
    items: impl IntoIterator<Item = &'a T>,
    vault_id: &'a str,
) -> impl Iterator<Item = &'a T> {
    items.into_iter().filter(move |item| item.vault_id() == vault_id)
}

fn by_name(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Vaults ordered by creation.
pub fn vaults(snapshot: &DocumentSnapshot) -> Vec<Vault> {
    let mut vaults: Vec<Vault> = snapshot.vaults.values().cloned().collect();
    vaults.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
    vaults
}

/// Notes of a vault, most recently modified first.
pub fn notes_in_vault(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<Note> {
    let mut notes: Vec<Note> = in_vault(snapshot.notes.values(), vault_id).cloned().collect();
    sort_notes(&mut notes);
    notes
}

/// Every note of every vault, most recently modified first.
pub fn all_notes(snapshot: &DocumentSnapshot) -> Vec<Note> {
    let mut notes: Vec<Note> = snapshot.notes.values().cloned().collect();
    sort_notes(&mut notes);
    notes
}

fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)));
}

/// Folders of a vault by name.
pub fn folders_in_vault(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<Folder> {
    let mut folders: Vec<Folder> = in_vault(snapshot.folders.values(), vault_id).cloned().collect();
    folders.sort_by(|a, b| by_name(&a.name, &b.name));
    folders
}

/// Notes directly inside `folder_id` (`None` = vault root).
pub fn notes_in_folder(
    snapshot: &DocumentSnapshot,
    vault_id: &str,
    folder_id: Option<&str>,
) -> Vec<Note> {
    let mut notes: Vec<Note> = in_vault(snapshot.notes.values(), vault_id)
        .filter(|note| note.folder_id.as_deref() == folder_id)
        .cloned()
        .collect();
    sort_notes(&mut notes);
    notes
}

/// Folders directly inside `parent_id` (`None` = vault root).
pub fn subfolders(
    snapshot: &DocumentSnapshot,
    vault_id: &str,
    parent_id: Option<&str>,
) -> Vec<Folder> {
    let mut folders: Vec<Folder> = in_vault(snapshot.folders.values(), vault_id)
        .filter(|folder| folder.parent_id.as_deref() == parent_id)
        .cloned()
        .collect();
    folders.sort_by(|a, b| by_name(&a.name, &b.name));
    folders
}

/// Ancestry of a folder, root first and ending with the folder itself.
pub fn folder_path(folders: &BTreeMap<String, Folder>, folder_id: &str) -> Vec<Folder> {
    let mut path = Vec::new();
    let mut visited = BTreeSet::new();
    let mut current = folders.get(folder_id);
    while let Some(folder) = current {
        if !visited.insert(folder.id.as_str()) {
            log::warn!("Folder cycle detected at '{}'", folder.id);
            break;
        }
        path.push(folder.clone());
        current = folder.parent_id.as_deref().and_then(|id| folders.get(id));
    }
    path.reverse();
    path
}

/// `root` and every folder below it.
pub fn descendant_folder_ids(folders: &BTreeMap<String, Folder>, root: &str) -> BTreeSet<String> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for folder in folders.values() {
        if let Some(parent) = folder.parent_id.as_deref() {
            children.entry(parent).or_default().push(folder.id.as_str());
        }
    }

    let mut found = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !found.insert(id.to_string()) {
            continue;
        }
        if let Some(kids) = children.get(id) {
            stack.extend(kids.iter().copied());
        }
    }
    found
}

/// True if `candidate` is `ancestor` itself or lies somewhere below it.
pub fn is_in_subtree(folders: &BTreeMap<String, Folder>, ancestor: &str, candidate: &str) -> bool {
    let mut visited = BTreeSet::new();
    let mut current = Some(candidate);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        if !visited.insert(id) {
            return false;
        }
        current = folders.get(id).and_then(|f| f.parent_id.as_deref());
    }
    false
}

fn count_mentions(
    snapshot: &DocumentSnapshot,
    vault_id: &str,
    extract: fn(&str) -> Vec<String>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for note in in_vault(snapshot.notes.values(), vault_id) {
        for value in extract(&note.content) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    counts
}

fn sorted_by_count(counts: BTreeMap<String, usize>) -> Vec<MentionCount> {
    let mut list: Vec<MentionCount> = counts
        .into_iter()
        .map(|(value, count)| MentionCount { value, count })
        .collect();
    list.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    list
}

/// Hashtags of a vault with the number of notes using each, most used first.
pub fn tag_counts(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<MentionCount> {
    sorted_by_count(count_mentions(snapshot, vault_id, extract_tags))
}

/// People mentioned in a vault, most mentioned first.
pub fn person_mention_counts(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<MentionCount> {
    sorted_by_count(count_mentions(snapshot, vault_id, extract_people))
}

/// Dates mentioned in a vault, newest first.
pub fn date_mention_counts(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<MentionCount> {
    let mut list: Vec<MentionCount> = count_mentions(snapshot, vault_id, extract_dates)
        .into_iter()
        .map(|(value, count)| MentionCount { value, count })
        .collect();
    list.sort_by(|a, b| b.value.cmp(&a.value));
    list
}

pub fn notes_by_tag(snapshot: &DocumentSnapshot, vault_id: &str, tag: &str) -> Vec<Note> {
    let tag = tag.to_lowercase();
    filter_notes(snapshot, vault_id, |note| extract_tags(&note.content).contains(&tag))
}

pub fn notes_by_person(snapshot: &DocumentSnapshot, vault_id: &str, name: &str) -> Vec<Note> {
    let name = name.to_lowercase();
    filter_notes(snapshot, vault_id, |note| {
        extract_people(&note.content)
            .iter()
            .any(|p| p.to_lowercase() == name)
    })
}

pub fn notes_by_date(snapshot: &DocumentSnapshot, vault_id: &str, date: &str) -> Vec<Note> {
    filter_notes(snapshot, vault_id, |note| {
        extract_dates(&note.content).iter().any(|d| d == date)
    })
}

fn filter_notes(
    snapshot: &DocumentSnapshot,
    vault_id: &str,
    keep: impl Fn(&Note) -> bool,
) -> Vec<Note> {
    let mut notes: Vec<Note> = in_vault(snapshot.notes.values(), vault_id)
        .filter(|note| keep(note))
        .cloned()
        .collect();
    sort_notes(&mut notes);
    notes
}

/// Notes of the same vault linking to `note_id` by title.
pub fn backlinks(snapshot: &DocumentSnapshot, note_id: &str) -> Vec<Note> {
    let Some(target) = snapshot.notes.get(note_id) else {
        return Vec::new();
    };
    let title = target.title.to_lowercase();
    filter_notes(snapshot, &target.vault_id, |note| {
        note.id != note_id
            && extract_wikilinks(&note.content)
                .iter()
                .any(|link| link.to_lowercase() == title)
    })
}

/// Case-insensitive title lookup within a vault.
pub fn find_note_by_title(snapshot: &DocumentSnapshot, vault_id: &str, title: &str) -> Option<Note> {
    let title = title.to_lowercase();
    notes_in_vault(snapshot, vault_id)
        .into_iter()
        .find(|note| note.title.to_lowercase() == title)
}

pub fn people_in_vault(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<Person> {
    let mut people: Vec<Person> = in_vault(snapshot.people.values(), vault_id).cloned().collect();
    people.sort_by(|a, b| by_name(&a.name, &b.name));
    people
}

/// Events of a vault, newest date first.
pub fn events_in_vault(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<Event> {
    let mut events: Vec<Event> = in_vault(snapshot.events.values(), vault_id).cloned().collect();
    events.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    events
}

pub fn templates_in_vault(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<Template> {
    let mut templates: Vec<Template> =
        in_vault(snapshot.templates.values(), vault_id).cloned().collect();
    templates.sort_by(|a, b| by_name(&a.name, &b.name));
    templates
}

/// One row of the people directory: a name that is mentioned, has an entity, or both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonEntry {
    pub name: String,
    pub mentions: usize,
    pub person: Option<Person>,
}

/// One row of the date directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateEntry {
    pub date: String,
    pub mentions: usize,
    pub events: Vec<Event>,
}

/// Reconcile `@Name` mentions with person entities by case-insensitive name.
pub fn people_directory(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<PersonEntry> {
    let mut entries: BTreeMap<String, PersonEntry> = BTreeMap::new();

    for person in people_in_vault(snapshot, vault_id) {
        entries
            .entry(person.name.to_lowercase())
            .or_insert_with(|| PersonEntry {
                name: person.name.clone(),
                mentions: 0,
                person: Some(person),
            });
    }
    for mention in person_mention_counts(snapshot, vault_id) {
        entries
            .entry(mention.value.to_lowercase())
            .and_modify(|entry| entry.mentions += mention.count)
            .or_insert(PersonEntry {
                name: mention.value,
                mentions: mention.count,
                person: None,
            });
    }

    let mut list: Vec<PersonEntry> = entries.into_values().collect();
    list.sort_by(|a, b| by_name(&a.name, &b.name));
    list
}

/// Reconcile `//date` mentions with events by date equality, newest first.
pub fn date_directory(snapshot: &DocumentSnapshot, vault_id: &str) -> Vec<DateEntry> {
    let mut entries: BTreeMap<String, DateEntry> = BTreeMap::new();

    for event in events_in_vault(snapshot, vault_id) {
        entries
            .entry(event.date.clone())
            .or_insert_with(|| DateEntry {
                date: event.date.clone(),
                mentions: 0,
                events: Vec::new(),
            })
            .events
            .push(event);
    }
    for mention in date_mention_counts(snapshot, vault_id) {
        entries
            .entry(mention.value.clone())
            .or_insert_with(|| DateEntry {
                date: mention.value.clone(),
                mentions: 0,
                events: Vec::new(),
            })
            .mentions += mention.count;
    }

    entries.into_values().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(notes: Vec<Note>) -> DocumentSnapshot {
        DocumentSnapshot {
            notes: notes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            current_vault_id: "v1".to_string(),
            ..Default::default()
        }
    }

    fn note(id: &str, title: &str, content: &str, modified: i64) -> Note {
        let mut note = Note::new(title, content, None, "v1");
        note.id = id.to_string();
        note.modified = modified;
        note
    }

    fn folder(id: &str, parent: Option<&str>) -> Folder {
        let mut folder = Folder::new(id.to_uppercase(), parent.map(str::to_string), "v1");
        folder.id = id.to_string();
        folder
    }

    #[test]
    fn test_extract_tags() {
        let tags = extract_tags("#Work and #work plus #ideas_2 but not a#b or #1x");
        assert_eq!(tags, vec!["work".to_string(), "ideas_2".to_string()]);
    }

    #[test]
    fn test_extract_people_and_dates() {
        let content = "Met @Ada Lovelace and @Bob on //2024-01-05, again //2024-01-05";
        assert_eq!(
            extract_people(content),
            vec!["Ada Lovelace".to_string(), "Bob".to_string()]
        );
        assert_eq!(extract_dates(content), vec!["2024-01-05".to_string()]);
    }

    #[test]
    fn test_extract_wikilinks() {
        assert_eq!(
            extract_wikilinks("see [[Plan]] and [[Other Note]]"),
            vec!["Plan".to_string(), "Other Note".to_string()]
        );
    }

    #[test]
    fn test_notes_sorted_by_modified_desc() {
        let snapshot = snapshot_with(vec![note("a", "A", "", 1), note("b", "B", "", 5)]);
        let ids: Vec<String> = notes_in_vault(&snapshot, "v1").into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_backlinks() {
        let snapshot = snapshot_with(vec![
            note("target", "Plan", "", 1),
            note("linker", "Other", "see [[plan]]", 2),
            note("unrelated", "Third", "nothing", 3),
        ]);
        let links = backlinks(&snapshot, "target");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].id, "linker");
    }

    #[test]
    fn test_tag_counts() {
        let snapshot = snapshot_with(vec![
            note("a", "A", "#rust #notes", 1),
            note("b", "B", "#rust", 2),
        ]);
        let counts = tag_counts(&snapshot, "v1");
        assert_eq!(counts[0], MentionCount { value: "rust".into(), count: 2 });
        assert_eq!(counts[1], MentionCount { value: "notes".into(), count: 1 });
        assert_eq!(notes_by_tag(&snapshot, "v1", "RUST").len(), 2);
    }

    #[test]
    fn test_folder_path_and_subtree() {
        let folders: BTreeMap<String, Folder> = [folder("a", None), folder("b", Some("a")), folder("c", Some("b"))]
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();

        let path: Vec<String> = folder_path(&folders, "c").into_iter().map(|f| f.id).collect();
        assert_eq!(path, vec!["a", "b", "c"]);

        let below = descendant_folder_ids(&folders, "a");
        assert_eq!(below.len(), 3);
        assert!(is_in_subtree(&folders, "a", "c"));
        assert!(!is_in_subtree(&folders, "c", "a"));
    }

    #[test]
    fn test_folder_walks_survive_cycles() {
        let folders: BTreeMap<String, Folder> = [folder("a", Some("b")), folder("b", Some("a"))]
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();
        assert_eq!(folder_path(&folders, "a").len(), 2);
        assert_eq!(descendant_folder_ids(&folders, "a").len(), 2);
        assert!(!is_in_subtree(&folders, "x", "a"));
    }

    #[test]
    fn test_people_directory_reconciles_both_directions() {
        let mut snapshot = snapshot_with(vec![note("a", "A", "Lunch with @Ada Lovelace", 1)]);
        let mut ada = Person::new("ada lovelace", "v1");
        ada.id = "p1".into();
        let mut grace = Person::new("Grace Hopper", "v1");
        grace.id = "p2".into();
        snapshot.people.insert(ada.id.clone(), ada);
        snapshot.people.insert(grace.id.clone(), grace);

        let directory = people_directory(&snapshot, "v1");
        assert_eq!(directory.len(), 2);
        let ada_row = directory.iter().find(|e| e.name.to_lowercase() == "ada lovelace").unwrap();
        assert_eq!(ada_row.mentions, 1);
        assert!(ada_row.person.is_some());
        let grace_row = directory.iter().find(|e| e.name == "Grace Hopper").unwrap();
        assert_eq!(grace_row.mentions, 0);
    }

    #[test]
    fn test_date_directory_merges_events_and_mentions() {
        let mut snapshot = snapshot_with(vec![note("a", "A", "due //2024-02-01", 1)]);
        let event = Event::new("2024-03-01", "v1");
        snapshot.events.insert(event.id.clone(), event);

        let directory = date_directory(&snapshot, "v1");
        let dates: Vec<&str> = directory.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-02-01"]);
        assert_eq!(directory[0].events.len(), 1);
        assert_eq!(directory[1].mentions, 1);
    }
}
