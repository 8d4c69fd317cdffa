//! Note templates.
//!
//! Templates are stored in the document like any other entity (see
//! [`crate::model::Template`]). Their markdown body supports simple variable
//! substitution using `{variable}` syntax; placeholders with no value are left
//! untouched so the user can fill them in.

use chrono::{Local, NaiveDate};
use indexmap::IndexMap;

use crate::model::Template;

/// Available built-in template variables and their descriptions
pub const TEMPLATE_VARIABLES: &[(&str, &str)] = &[
    ("title", "The note title"),
    ("date", "Current date (YYYY-MM-DD)"),
    ("time", "Current time (HH:MM)"),
    ("weekday", "Current weekday name (e.g., Monday)"),
];

struct StarterTemplate {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

const STARTER_TEMPLATES: &[StarterTemplate] = &[
    StarterTemplate {
        key: "daily-note",
        name: "Daily Note",
        description: "A page for today",
        content: "# {date}\n\n## Tasks\n\n- [ ] \n\n## Notes\n\n",
    },
    StarterTemplate {
        key: "meeting-notes",
        name: "Meeting Notes",
        description: "Agenda, attendees and action items",
        content: "# {title}\n\n//{date} {time}\n\n## Attendees\n\n- \n\n## Agenda\n\n- \n\n## Action items\n\n- [ ] \n",
    },
    StarterTemplate {
        key: "person",
        name: "Person",
        description: "Notes about someone",
        content: "# {title}\n\n## Context\n\n\n## Conversations\n\n- //{date} \n",
    },
];

/// Starter templates for a vault.
///
/// Ids are derived from the vault id so that replicas seeding the same vault
/// independently converge on one set instead of duplicating it.
pub fn starter_templates(vault_id: &str) -> Vec<Template> {
    STARTER_TEMPLATES
        .iter()
        .map(|starter| {
            let mut template =
                Template::new(starter.name, starter.description, starter.content, vault_id);
            template.id = format!("{}-{}", vault_id, starter.key);
            template
        })
        .collect()
}

/// Context for template rendering
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Note title
    pub title: Option<String>,
    /// Date used for date variables (defaults to today)
    pub date: Option<NaiveDate>,
    /// Custom variables
    pub custom: IndexMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Add a custom variable
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    fn effective_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Render template content, replacing every known `{variable}`.
pub fn render(content: &str, context: &TemplateContext) -> String {
    let now = Local::now();
    let date = context.effective_date();

    let mut replacements: Vec<(String, String)> = vec![
        ("date".to_string(), date.format("%Y-%m-%d").to_string()),
        ("time".to_string(), now.format("%H:%M").to_string()),
        ("weekday".to_string(), date.format("%A").to_string()),
    ];
    if let Some(title) = &context.title {
        replacements.push(("title".to_string(), title.clone()));
    }
    // Custom variables override built-ins
    for (key, value) in &context.custom {
        replacements.retain(|(k, _)| k != key);
        replacements.push((key.clone(), value.clone()));
    }

    let mut result = content.to_string();
    for (var, value) in replacements {
        result = result.replace(&format!("{{{}}}", var), &value);
    }
    result
}

/// Names of the placeholders used in `content`, in order of first appearance.
pub fn placeholders(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if !name.is_empty()
                    && name.chars().all(|c| c.is_alphanumeric() || c == '_')
                    && !names.iter().any(|n| n == name)
                {
                    names.push(name.to_string());
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}
