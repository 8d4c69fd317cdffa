//! Notes to and from markdown files.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use super::frontmatter::{self, FrontmatterValue, quoted};
use super::slug::{slugify, title_from_slug};
use crate::model::{Folder, Note, generate_id, now_millis};

/// A file of the repository, path relative to the repository root with `/`
/// separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownFile {
    pub path: String,
    pub content: String,
}

/// A note read back from a markdown file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNote {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created: i64,
    pub modified: i64,
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// RFC 3339 or integer milliseconds.
fn parse_timestamp(value: &str) -> Option<i64> {
    if let Ok(millis) = value.parse::<i64>() {
        return Some(millis);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Directory name of every folder among its siblings.
///
/// Siblings whose names slug alike are ordered by (created, id); the first
/// keeps the plain slug and the others get their id appended.
fn folder_dir_names(folders: &[Folder]) -> HashMap<&str, String> {
    let ids: HashSet<&str> = folders.iter().map(|f| f.id.as_str()).collect();
    let mut ordered: Vec<&Folder> = folders.iter().collect();
    ordered.sort_by(|a, b| (a.created, &a.id).cmp(&(b.created, &b.id)));

    let mut taken: HashSet<(Option<&str>, String)> = HashSet::new();
    let mut names = HashMap::new();
    for folder in ordered {
        let parent = folder.parent_id.as_deref().filter(|p| ids.contains(p));
        let slug = slugify(&folder.name);
        let name = if taken.insert((parent, slug.clone())) {
            slug
        } else {
            let name = format!("{}-{}", slug, folder.id);
            taken.insert((parent, name.clone()));
            name
        };
        names.insert(folder.id.as_str(), name);
    }
    names
}

/// Repository directory of every folder, keyed by folder id.
pub fn folder_dirs(folders: &[Folder]) -> HashMap<String, String> {
    let by_id: HashMap<&str, &Folder> = folders.iter().map(|f| (f.id.as_str(), f)).collect();
    let names = folder_dir_names(folders);

    folders
        .iter()
        .map(|folder| {
            let mut segments = Vec::new();
            let mut seen = HashSet::new();
            let mut current = Some(folder.id.as_str());
            while let Some(id) = current {
                let (Some(f), Some(name)) = (by_id.get(id), names.get(id)) else {
                    break;
                };
                if !seen.insert(id) {
                    break;
                }
                segments.push(name.as_str());
                current = f.parent_id.as_deref();
            }
            segments.reverse();
            (folder.id.clone(), segments.join("/"))
        })
        .collect()
}

/// Repository path of every note, keyed by note id.
///
/// When several notes map to the same path the oldest (by created, then id)
/// keeps it and the others get their id appended to the slug.
pub fn note_paths(notes: &[Note], folders: &[Folder]) -> BTreeMap<String, String> {
    let dirs = folder_dirs(folders);
    let join = |dir: Option<&String>, file_name: String| match dir {
        Some(dir) if !dir.is_empty() => format!("{}/{}", dir, file_name),
        _ => file_name,
    };

    let mut ordered: Vec<&Note> = notes.iter().collect();
    ordered.sort_by(|a, b| (a.created, &a.id).cmp(&(b.created, &b.id)));

    let mut taken = HashSet::new();
    let mut paths = BTreeMap::new();
    for note in ordered {
        let dir = note.folder_id.as_ref().and_then(|id| dirs.get(id));
        let slug = slugify(&note.title);
        let mut path = join(dir, format!("{}.md", slug));
        if !taken.insert(path.clone()) {
            path = join(dir, format!("{}-{}.md", slug, note.id));
            taken.insert(path.clone());
        }
        paths.insert(note.id.clone(), path);
    }
    paths
}

/// Front matter plus body for one note.
pub fn note_to_markdown(note: &Note) -> String {
    let mut fm = IndexMap::new();
    fm.insert("id".to_string(), FrontmatterValue::Scalar(note.id.clone()));
    fm.insert("title".to_string(), quoted(&note.title));
    fm.insert(
        "created".to_string(),
        FrontmatterValue::Scalar(format_timestamp(note.created)),
    );
    fm.insert(
        "modified".to_string(),
        FrontmatterValue::Scalar(format_timestamp(note.modified)),
    );
    if !note.tags.is_empty() {
        fm.insert("tags".to_string(), FrontmatterValue::List(note.tags.clone()));
    }
    frontmatter::serialize(&fm, &note.content)
}

/// Render notes as markdown files, ordered by path.
pub fn notes_to_files(notes: &[Note], folders: &[Folder]) -> Vec<MarkdownFile> {
    let by_id: HashMap<&str, &Note> = notes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut files: Vec<MarkdownFile> = note_paths(notes, folders)
        .into_iter()
        .filter_map(|(id, path)| {
            by_id.get(id.as_str()).map(|note| MarkdownFile {
                path,
                content: note_to_markdown(note),
            })
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Read a markdown file back into note fields.
///
/// The title comes from front matter, else from the file name. A missing id
/// is generated and missing timestamps become now.
pub fn parse_file(path: &str, content: &str) -> ParsedNote {
    let parsed = frontmatter::parse_or_empty(content);
    let now = now_millis();

    let title = parsed
        .get_str("title")
        .map(str::to_string)
        .unwrap_or_else(|| {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            title_from_slug(file_name.strip_suffix(".md").unwrap_or(file_name))
        });

    ParsedNote {
        id: parsed
            .get_str("id")
            .map(str::to_string)
            .unwrap_or_else(generate_id),
        title,
        tags: parsed.get_list("tags").map(<[String]>::to_vec).unwrap_or_default(),
        created: parsed.get_str("created").and_then(parse_timestamp).unwrap_or(now),
        modified: parsed.get_str("modified").and_then(parse_timestamp).unwrap_or(now),
        content: parsed.body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, title: &str, folder: Option<&str>, created: i64) -> Note {
        let mut note = Note::new(title, "Body text\n", folder.map(str::to_string), "v");
        note.id = id.to_string();
        note.created = created;
        note.modified = created + 5;
        note
    }

    fn folder(id: &str, name: &str, parent: Option<&str>) -> Folder {
        let mut folder = Folder::new(name, parent.map(str::to_string), "v");
        folder.id = id.to_string();
        folder
    }

    #[test]
    fn test_note_round_trip() {
        let mut original = note("abc123", "Project Plan", None, 1_700_000_000_123);
        original.tags = vec!["work".into(), "q3".into()];

        let file = &notes_to_files(&[original.clone()], &[])[0];
        assert_eq!(file.path, "project-plan.md");

        let parsed = parse_file(&file.path, &file.content);
        assert_eq!(parsed.id, original.id);
        assert_eq!(parsed.title, original.title);
        assert_eq!(parsed.tags, original.tags);
        assert_eq!(parsed.content, original.content);
        assert_eq!(parsed.created, original.created);
        assert_eq!(parsed.modified, original.modified);
        assert_eq!(slugify(&parsed.title), "project-plan");
    }

    #[test]
    fn test_round_trip_keeps_awkward_tags_and_crlf_body() {
        let mut original = note("n1", "Say \"hi\", again", None, 10);
        original.tags = vec!["a,b".into(), "say \"hi\"".into()];
        original.content = "line1\r\nline2\r\n".into();

        let file = &notes_to_files(&[original.clone()], &[])[0];
        let parsed = parse_file(&file.path, &file.content);
        assert_eq!(parsed.title, original.title);
        assert_eq!(parsed.tags, original.tags);
        assert_eq!(parsed.content, original.content);

        // Writing the parsed note again yields the same file.
        let mut again = original.clone();
        again.content = parsed.content;
        assert_eq!(note_to_markdown(&again), file.content);
    }

    #[test]
    fn test_paths_follow_folder_ancestry() {
        let folders = vec![folder("f1", "Work Stuff", None), folder("f2", "Q3 Plans", Some("f1"))];
        let files = notes_to_files(&[note("n", "Kickoff", Some("f2"), 1)], &folders);
        assert_eq!(files[0].path, "work-stuff/q3-plans/kickoff.md");
    }

    #[test]
    fn test_sibling_folders_with_same_slug_get_distinct_dirs() {
        let mut first = folder("f1", "Notes!", None);
        first.created = 1;
        let mut second = folder("f2", "notes", None);
        second.created = 2;
        let child = folder("f3", "Sub", Some("f2"));

        let dirs = folder_dirs(&[second.clone(), child.clone(), first.clone()]);
        assert_eq!(dirs["f1"], "notes");
        assert_eq!(dirs["f2"], "notes-f2");
        assert_eq!(dirs["f3"], "notes-f2/sub");

        let files = notes_to_files(
            &[note("a", "One", Some("f1"), 1), note("b", "Two", Some("f3"), 1)],
            &[first, second, child],
        );
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["notes-f2/sub/two.md", "notes/one.md"]);
    }

    #[test]
    fn test_colliding_paths_are_disambiguated() {
        let notes = vec![note("b", "Same", None, 2), note("a", "Same", None, 1)];
        let paths = note_paths(&notes, &[]);
        assert_eq!(paths["a"], "same.md");
        assert_eq!(paths["b"], "same-b.md");
    }

    #[test]
    fn test_parse_file_without_frontmatter() {
        let parsed = parse_file("notes/my-first-note.md", "Hello");
        assert_eq!(parsed.title, "My First Note");
        assert_eq!(parsed.content, "Hello");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.id.len(), crate::model::ID_LENGTH);
    }

    #[test]
    fn test_parse_file_accepts_millisecond_timestamps() {
        let parsed = parse_file("x.md", "---\nid: x\ncreated: 42\nmodified: nonsense\n---\n");
        assert_eq!(parsed.created, 42);
        assert!(parsed.modified > 42);
    }
}
