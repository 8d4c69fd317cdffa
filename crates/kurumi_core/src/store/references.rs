//! People, events and templates.

use super::{DocumentStore, active_vault_id, views};
use crate::error::{KurumiError, Result};
use crate::model::{Entity, Event, Note, Person, Template, now_millis};
use crate::template::{TemplateContext, render};

impl DocumentStore {
    /// Load an entity, let `edit` change it and write it back with a new
    /// `modified`. `edit` must not change the id.
    fn edit_entity<T: Entity>(
        &mut self,
        id: &str,
        not_found: fn(String) -> KurumiError,
        edit: impl FnOnce(&mut T),
    ) -> Result<T> {
        self.try_mutate(|txn| {
            let mut entity: T = txn.get(id).ok_or_else(|| not_found(id.to_string()))?;
            edit(&mut entity);
            entity.set_modified(now_millis());
            txn.put(&entity);
            Ok(entity)
        })
    }

    fn remove_entity<T: Entity>(&mut self, id: &str, not_found: fn(String) -> KurumiError) -> Result<()> {
        self.try_mutate(|txn| {
            if !txn.remove::<T>(id) {
                return Err(not_found(id.to_string()));
            }
            Ok(())
        })
    }

    // ============ People ============

    /// People of the active vault by name.
    pub fn people(&self) -> Vec<Person> {
        views::people_in_vault(&self.snapshot, self.current_vault_id())
    }

    pub fn get_person(&self, id: &str) -> Option<Person> {
        self.snapshot.people.get(id).cloned()
    }

    pub fn add_person(&mut self, name: &str) -> Person {
        self.mutate(|txn| {
            let person = Person::new(name, active_vault_id(txn));
            txn.put(&person);
            person
        })
    }

    pub fn update_person(&mut self, id: &str, edit: impl FnOnce(&mut Person)) -> Result<Person> {
        self.edit_entity(id, KurumiError::PersonNotFound, edit)
    }

    pub fn delete_person(&mut self, id: &str) -> Result<()> {
        self.remove_entity::<Person>(id, KurumiError::PersonNotFound)
    }

    /// Mentions and person entities of the active vault, reconciled by name.
    pub fn people_directory(&self) -> Vec<views::PersonEntry> {
        views::people_directory(&self.snapshot, self.current_vault_id())
    }

    // ============ Events ============

    /// Events of the active vault, newest first.
    pub fn events(&self) -> Vec<Event> {
        views::events_in_vault(&self.snapshot, self.current_vault_id())
    }

    pub fn get_event(&self, id: &str) -> Option<Event> {
        self.snapshot.events.get(id).cloned()
    }

    pub fn add_event(&mut self, date: &str, title: Option<&str>) -> Event {
        self.mutate(|txn| {
            let mut event = Event::new(date, active_vault_id(txn));
            event.title = title.map(str::to_string);
            txn.put(&event);
            event
        })
    }

    pub fn update_event(&mut self, id: &str, edit: impl FnOnce(&mut Event)) -> Result<Event> {
        self.edit_entity(id, KurumiError::EventNotFound, edit)
    }

    pub fn delete_event(&mut self, id: &str) -> Result<()> {
        self.remove_entity::<Event>(id, KurumiError::EventNotFound)
    }

    /// Date mentions and events of the active vault, newest first.
    pub fn date_directory(&self) -> Vec<views::DateEntry> {
        views::date_directory(&self.snapshot, self.current_vault_id())
    }

    // ============ Templates ============

    /// Templates of the active vault by name.
    pub fn templates(&self) -> Vec<Template> {
        views::templates_in_vault(&self.snapshot, self.current_vault_id())
    }

    pub fn get_template(&self, id: &str) -> Option<Template> {
        self.snapshot.templates.get(id).cloned()
    }

    pub fn add_template(&mut self, name: &str, description: &str, content: &str) -> Template {
        self.mutate(|txn| {
            let template = Template::new(name, description, content, active_vault_id(txn));
            txn.put(&template);
            template
        })
    }

    pub fn update_template(
        &mut self,
        id: &str,
        edit: impl FnOnce(&mut Template),
    ) -> Result<Template> {
        self.edit_entity(id, KurumiError::TemplateNotFound, edit)
    }

    pub fn delete_template(&mut self, id: &str) -> Result<()> {
        self.remove_entity::<Template>(id, KurumiError::TemplateNotFound)
    }

    /// Create a note in the active vault from a rendered template.
    ///
    /// `title` fills `{title}` unless the context already sets it.
    pub fn add_note_from_template(
        &mut self,
        template_id: &str,
        title: &str,
        mut context: TemplateContext,
    ) -> Result<Note> {
        if context.title.is_none() {
            context.title = Some(title.to_string());
        }
        self.try_mutate(|txn| {
            let template: Template = txn
                .get(template_id)
                .ok_or_else(|| KurumiError::TemplateNotFound(template_id.to_string()))?;
            let content = render(&template.content, &context);
            let note = Note::new(title, content, None, active_vault_id(txn));
            txn.put(&note);
            Ok(note)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::crdt::MemoryStorage;

    fn store() -> DocumentStore {
        DocumentStore::open(Arc::new(MemoryStorage::new())).unwrap()
    }

    #[test]
    fn test_person_crud() {
        let mut store = store();
        let person = store.add_person("Ada Lovelace");
        assert_eq!(store.people().len(), 1);

        let updated = store
            .update_person(&person.id, |p| {
                p.email = Some("ada@example.com".into());
                p.custom_fields.insert("role".into(), "analyst".into());
            })
            .unwrap();
        assert_eq!(updated.email.as_deref(), Some("ada@example.com"));
        assert_eq!(store.get_person(&person.id).unwrap().custom_fields["role"], "analyst");

        store.delete_person(&person.id).unwrap();
        assert!(store.people().is_empty());
        assert!(matches!(
            store.delete_person(&person.id),
            Err(KurumiError::PersonNotFound(_))
        ));
    }

    #[test]
    fn test_events_sorted_newest_first() {
        let mut store = store();
        store.add_event("2024-01-01", Some("New year"));
        let later = store.add_event("2024-06-01", None);
        let dates: Vec<String> = store.events().into_iter().map(|e| e.date).collect();
        assert_eq!(dates, vec!["2024-06-01".to_string(), "2024-01-01".to_string()]);

        store
            .update_event(&later.id, |e| e.attendees.push("Ada".into()))
            .unwrap();
        assert_eq!(store.get_event(&later.id).unwrap().attendees, vec!["Ada".to_string()]);
        assert!(store.update_event("missing", |_| {}).is_err());
    }

    #[test]
    fn test_directories_use_active_vault() {
        let mut store = store();
        store.add_note("Lunch", "With @Grace Hopper on //2024-05-05", None).unwrap();
        store.add_person("Grace Hopper");

        let people = store.people_directory();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].mentions, 1);
        assert!(people[0].person.is_some());
        assert_eq!(store.date_directory()[0].date, "2024-05-05");
    }

    #[test]
    fn test_starter_templates_are_seeded() {
        let store = store();
        let names: Vec<String> = store.templates().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Daily Note", "Meeting Notes", "Person"]);
    }

    #[test]
    fn test_add_note_from_template() {
        let mut store = store();
        let template = store.add_template("Standup", "", "# {title}\n//{date} {project}");
        let context = TemplateContext::new()
            .with_date(NaiveDate::from_ymd_opt(2024, 2, 3).unwrap())
            .with_custom("project", "kurumi");

        let note = store
            .add_note_from_template(&template.id, "Monday sync", context)
            .unwrap();
        assert_eq!(note.title, "Monday sync");
        assert_eq!(note.content, "# Monday sync\n//2024-02-03 kurumi");
        assert!(store.get_note(&note.id).is_some());
    }

    #[test]
    fn test_missing_template_is_rejected() {
        let mut store = store();
        let err = store
            .add_note_from_template("nope", "Title", TemplateContext::new())
            .unwrap_err();
        assert!(matches!(err, KurumiError::TemplateNotFound(_)));
        assert!(store.notes().is_empty());
    }
}
