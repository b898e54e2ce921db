//! Folder → template hierarchy and its persisted representation.
//!
//! The whole hierarchy is stored as one JSON blob under the `"templates"` key.
//! Every mutation loads the blob, edits it and writes it back in full, so two
//! processes mutating the store at the same time race with last-write-wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::db::{Persistence, KEY_TEMPLATES};
use crate::error::{Error, Kind, Result};

/// Placeholder identifier → CSS selector.
pub type Selectors = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub folders: Vec<Folder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    #[serde(default)]
    pub templates: Vec<Template>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub selectors: Selectors,
}

impl Template {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            content: String::new(),
            selectors: Selectors::new(),
        }
    }
}

impl Folder {
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.templates.iter().position(|t| t.name == name)
    }
}

impl Store {
    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    fn folder_mut(&mut self, name: &str) -> Result<&mut Folder> {
        self.folders
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::NotFound {
                kind: Kind::Folder,
                name: name.to_string(),
            })
    }

    pub fn template(&self, folder: &str, name: &str) -> Option<&Template> {
        self.folder(folder)?.template(name)
    }

    pub fn create_folder(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName(Kind::Folder));
        }
        if self.folder(name).is_some() {
            return Err(Error::DuplicateName {
                kind: Kind::Folder,
                name: name.to_string(),
            });
        }
        self.folders.push(Folder {
            name: name.to_string(),
            templates: Vec::new(),
        });
        Ok(())
    }

    /// Removes the folder and everything in it. Returns false if it did not exist.
    pub fn delete_folder(&mut self, name: &str) -> bool {
        let before = self.folders.len();
        self.folders.retain(|f| f.name != name);
        self.folders.len() != before
    }

    pub fn create_template(&mut self, folder: &str, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName(Kind::Template));
        }
        let folder = self.folder_mut(folder)?;
        if folder.template(name).is_some() {
            return Err(Error::DuplicateName {
                kind: Kind::Template,
                name: name.to_string(),
            });
        }
        folder.templates.push(Template::empty(name));
        Ok(())
    }

    /// Replaces the template at `previous`'s position, or appends when there is
    /// no previous name (or it no longer exists). Returns the record's index.
    pub fn save_template(
        &mut self,
        folder: &str,
        previous: Option<&str>,
        record: Template,
    ) -> Result<usize> {
        if record.name.is_empty() {
            return Err(Error::EmptyName(Kind::Template));
        }
        let folder = self.folder_mut(folder)?;
        let slot = previous.and_then(|p| folder.position(p));

        if let Some(existing) = folder.position(&record.name) {
            if Some(existing) != slot {
                return Err(Error::DuplicateName {
                    kind: Kind::Template,
                    name: record.name,
                });
            }
        }

        match slot {
            Some(idx) => {
                folder.templates[idx] = record;
                Ok(idx)
            }
            None => {
                folder.templates.push(record);
                Ok(folder.templates.len() - 1)
            }
        }
    }

    /// Returns false if either the folder or the template was already gone.
    pub fn delete_template(&mut self, folder: &str, name: &str) -> bool {
        let Some(folder) = self.folders.iter_mut().find(|f| f.name == folder) else {
            return false;
        };
        let before = folder.templates.len();
        folder.templates.retain(|t| t.name != name);
        folder.templates.len() != before
    }
}

// ── Persisted repository ──

pub struct Templates<'a, P: Persistence> {
    storage: &'a P,
}

impl<'a, P: Persistence> Templates<'a, P> {
    pub fn new(storage: &'a P) -> Self {
        Self { storage }
    }

    /// Reads the stored hierarchy, materialising an empty store if none exists yet.
    pub fn load(&self) -> Result<Store> {
        let mut values = self.storage.get(&[KEY_TEMPLATES])?;
        match values.remove(KEY_TEMPLATES) {
            Some(Value::Null) | None => Ok(Store::default()),
            Some(v) => Ok(serde_json::from_value(v)?),
        }
    }

    pub fn persist(&self, store: &Store) -> Result<()> {
        self.storage
            .set(vec![(KEY_TEMPLATES, serde_json::to_value(store)?)])
    }

    pub fn list_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.load()?.folders)
    }

    pub fn create_folder(&self, name: &str) -> Result<Store> {
        let mut store = self.load()?;
        store.create_folder(name)?;
        self.persist(&store)?;
        info!(folder = name, "folder created");
        Ok(store)
    }

    pub fn delete_folder(&self, name: &str) -> Result<Store> {
        let mut store = self.load()?;
        if store.delete_folder(name) {
            self.persist(&store)?;
            info!(folder = name, "folder deleted");
        }
        Ok(store)
    }

    pub fn create_template(&self, folder: &str, name: &str) -> Result<Store> {
        let mut store = self.load()?;
        store.create_template(folder, name)?;
        self.persist(&store)?;
        info!(folder, template = name, "template created");
        Ok(store)
    }

    pub fn save_template(
        &self,
        folder: &str,
        previous: Option<&str>,
        record: Template,
    ) -> Result<Store> {
        let mut store = self.load()?;
        let name = record.name.clone();
        let idx = store.save_template(folder, previous, record)?;
        self.persist(&store)?;
        info!(folder, template = %name, index = idx, previous, "template saved");
        Ok(store)
    }

    pub fn delete_template(&self, folder: &str, name: &str) -> Result<Store> {
        let mut store = self.load()?;
        if store.delete_template(folder, name) {
            self.persist(&store)?;
            info!(folder, template = name, "template deleted");
        }
        Ok(store)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStorage, SqliteStorage};
    use serde_json::json;

    fn store_with(folders: &[(&str, &[&str])]) -> Store {
        let mut store = Store::default();
        for (folder, templates) in folders {
            store.create_folder(folder).unwrap();
            for t in templates.iter() {
                store.create_template(folder, t).unwrap();
            }
        }
        store
    }

    fn names(folder: &Folder) -> Vec<&str> {
        folder.templates.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn create_folder_appears_once() {
        let mem = MemoryStorage::default();
        let repo = Templates::new(&mem);
        repo.create_folder("work").unwrap();
        repo.create_folder("home").unwrap();

        let folders = repo.list_folders().unwrap();
        let work: Vec<_> = folders.iter().filter(|f| f.name == "work").collect();
        assert_eq!(work.len(), 1);
        assert!(work[0].templates.is_empty());
        assert_eq!(folders[1].name, "home");
    }

    #[test]
    fn duplicate_folder_rejected() {
        let mem = MemoryStorage::default();
        let repo = Templates::new(&mem);
        repo.create_folder("work").unwrap();
        let err = repo.create_folder("work").unwrap_err();
        assert!(matches!(err, Error::DuplicateName { kind: Kind::Folder, .. }));
        assert_eq!(repo.list_folders().unwrap().len(), 1);
    }

    #[test]
    fn empty_folder_name_rejected() {
        let mut store = Store::default();
        assert!(matches!(
            store.create_folder(""),
            Err(Error::EmptyName(Kind::Folder))
        ));
    }

    #[test]
    fn delete_folder_cascades() {
        let mem = MemoryStorage::default();
        let repo = Templates::new(&mem);
        repo.persist(&store_with(&[("a", &["t1", "t2"]), ("b", &["t3"])]))
            .unwrap();

        let store = repo.delete_folder("a").unwrap();
        assert!(store.folder("a").is_none());
        assert!(store.template("a", "t1").is_none());
        assert!(repo.list_folders().unwrap().iter().all(|f| f.name != "a"));
    }

    #[test]
    fn delete_missing_folder_is_noop() {
        let mem = MemoryStorage::default();
        let repo = Templates::new(&mem);
        repo.create_folder("a").unwrap();
        let store = repo.delete_folder("nope").unwrap();
        assert_eq!(store.folders.len(), 1);
    }

    #[test]
    fn create_template_needs_folder() {
        let mut store = Store::default();
        let err = store.create_template("missing", "t").unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: Kind::Folder, .. }));
    }

    #[test]
    fn create_template_is_empty_and_unique() {
        let mut store = store_with(&[("a", &["t"])]);
        let t = store.template("a", "t").unwrap();
        assert_eq!(t.content, "");
        assert!(t.selectors.is_empty());

        let err = store.create_template("a", "t").unwrap_err();
        assert!(matches!(err, Error::DuplicateName { kind: Kind::Template, .. }));
    }

    #[test]
    fn save_with_previous_keeps_position() {
        let mut store = store_with(&[("a", &["one", "two", "three"])]);
        let record = Template {
            name: "deux".into(),
            content: "hi {{x}}".into(),
            selectors: Selectors::from([("x".to_string(), "h1".to_string())]),
        };
        let idx = store.save_template("a", Some("two"), record).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(names(store.folder("a").unwrap()), ["one", "deux", "three"]);
    }

    #[test]
    fn save_without_previous_appends() {
        let mut store = store_with(&[("a", &["one"])]);
        let idx = store
            .save_template("a", None, Template::empty("two"))
            .unwrap();
        assert_eq!(idx, 1);
        assert_eq!(names(store.folder("a").unwrap()), ["one", "two"]);
    }

    #[test]
    fn save_with_stale_previous_appends() {
        let mut store = store_with(&[("a", &["one"])]);
        store
            .save_template("a", Some("gone"), Template::empty("two"))
            .unwrap();
        assert_eq!(names(store.folder("a").unwrap()), ["one", "two"]);
    }

    #[test]
    fn save_rename_onto_sibling_rejected() {
        let mut store = store_with(&[("a", &["one", "two"])]);
        let err = store
            .save_template("a", Some("one"), Template::empty("two"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
        assert_eq!(names(store.folder("a").unwrap()), ["one", "two"]);
    }

    #[test]
    fn save_in_missing_folder_fails() {
        let mut store = Store::default();
        let err = store
            .save_template("nope", None, Template::empty("t"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: Kind::Folder, .. }));
    }

    #[test]
    fn delete_template_is_idempotent() {
        let mut store = store_with(&[("a", &["one", "two"])]);
        assert!(store.delete_template("a", "one"));
        assert!(!store.delete_template("a", "one"));
        assert!(!store.delete_template("missing", "one"));
        assert_eq!(names(store.folder("a").unwrap()), ["two"]);
    }

    #[test]
    fn save_round_trips_through_sqlite() {
        let db = SqliteStorage::open_in_memory().unwrap();
        let repo = Templates::new(&db);
        repo.create_folder("a").unwrap();

        let content = "Dear {{Name}},\n\tprice: {{price}} €\r\n";
        let selectors = Selectors::from([
            ("price".to_string(), "span.price".to_string()),
            ("name".to_string(), "#user > b".to_string()),
        ]);
        repo.save_template(
            "a",
            None,
            Template {
                name: "letter".into(),
                content: content.into(),
                selectors: selectors.clone(),
            },
        )
        .unwrap();

        let loaded = repo.load().unwrap();
        let t = loaded.template("a", "letter").unwrap();
        assert_eq!(t.content.as_bytes(), content.as_bytes());
        assert_eq!(t.selectors, selectors);
    }

    #[test]
    fn missing_blob_loads_empty() {
        let mem = MemoryStorage::default();
        assert_eq!(Templates::new(&mem).load().unwrap(), Store::default());
    }

    #[test]
    fn reads_extension_layout() {
        let mem = MemoryStorage::default();
        mem.set(vec![(
            KEY_TEMPLATES,
            json!({
                "folders": [
                    { "name": "Shop", "templates": [
                        { "name": "Order", "content": "{{id}}", "selectors": { "id": "#order" } }
                    ]},
                    { "name": "Empty" }
                ]
            }),
        )])
        .unwrap();

        let store = Templates::new(&mem).load().unwrap();
        assert_eq!(store.folders.len(), 2);
        assert_eq!(store.template("Shop", "Order").unwrap().selectors["id"], "#order");
        assert!(store.folder("Empty").unwrap().templates.is_empty());
    }
}
