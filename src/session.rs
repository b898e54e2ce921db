//! Popup session: the selection, the template editor and one method per user action.
//!
//! Selection auto-repair: whenever the folder list is rendered and nothing is
//! selected, the first folder is selected and its templates are loaded; the same
//! applies to the template list. Stale names restored from storage are dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clipboard::Clipboard;
use crate::db::{Persistence, KEY_TEMPLATES, KEY_UI_STATE};
use crate::engine::{substitute, FieldValues};
use crate::error::{Error, Kind, Result};
use crate::notify::Notification;
use crate::page::{ensure_web_page, ActivePage};
use crate::prompt::Prompter;
use crate::store::{Selectors, Store, Template, Templates};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    #[serde(default)]
    pub selected_folder: Option<String>,
    #[serde(default)]
    pub selected_template: Option<String>,
}

/// Unsaved form contents for the selected template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Editor {
    /// Name the template had when it was loaded; `None` for a new one.
    pub current: Option<String>,
    pub name: String,
    pub content: String,
    pub selectors: Vec<(String, String)>,
    pub dirty: bool,
}

impl Editor {
    fn load(template: &Template) -> Self {
        Self {
            current: Some(template.name.clone()),
            name: template.name.clone(),
            content: template.content.clone(),
            selectors: template
                .selectors
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            dirty: false,
        }
    }

    /// Rows with a blank key or selector are dropped.
    fn selector_map(&self) -> Selectors {
        self.selectors
            .iter()
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

pub struct Popup<'a, P: Persistence> {
    storage: &'a P,
    state: UiState,
    saved_state: UiState,
    editor: Editor,
    folders: Vec<String>,
    templates: Vec<String>,
}

impl<'a, P: Persistence> Popup<'a, P> {
    /// Restores the last selection and renders it.
    pub fn open(storage: &'a P) -> Result<Self> {
        let mut values = storage.get(&[KEY_TEMPLATES, KEY_UI_STATE])?;
        let store: Store = match values.remove(KEY_TEMPLATES) {
            Some(Value::Null) | None => Store::default(),
            Some(v) => serde_json::from_value(v)?,
        };
        let saved_state: UiState = match values.remove(KEY_UI_STATE) {
            Some(Value::Null) | None => UiState::default(),
            Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
                warn!("discarding unreadable ui state: {}", e);
                UiState::default()
            }),
        };

        let mut popup = Self {
            storage,
            state: saved_state.clone(),
            saved_state,
            editor: Editor::default(),
            folders: Vec::new(),
            templates: Vec::new(),
        };
        popup.drop_stale(&store);
        let restored = popup.state.selected_folder.is_some();
        popup.render_folders(&store);
        if restored {
            popup.load_templates(&store);
        }
        popup.sync_state()?;
        debug!(state = ?popup.state, "popup opened");
        Ok(popup)
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    // ── Rendering ──

    fn drop_stale(&mut self, store: &Store) {
        let Some(folder) = self.state.selected_folder.as_deref() else {
            self.state.selected_template = None;
            return;
        };
        match store.folder(folder) {
            None => {
                debug!(folder, "selected folder no longer exists");
                self.state = UiState::default();
            }
            Some(f) => {
                if let Some(t) = self.state.selected_template.as_deref() {
                    if f.template(t).is_none() {
                        debug!(template = t, "selected template no longer exists");
                        self.state.selected_template = None;
                    }
                }
            }
        }
    }

    fn render_folders(&mut self, store: &Store) {
        self.folders = store.folders.iter().map(|f| f.name.clone()).collect();
        if self.state.selected_folder.is_none() {
            if let Some(first) = store.folders.first() {
                self.state.selected_folder = Some(first.name.clone());
                self.state.selected_template = None;
                self.load_templates(store);
            }
        }
    }

    fn load_templates(&mut self, store: &Store) {
        self.editor = Editor::default();
        self.render_templates(store);
        if let Some(name) = self.state.selected_template.clone() {
            self.load_template_content(store, &name);
        }
    }

    fn render_templates(&mut self, store: &Store) {
        let folder = self
            .state
            .selected_folder
            .as_deref()
            .and_then(|name| store.folder(name));
        self.templates = folder
            .map(|f| f.templates.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default();
        if self.state.selected_template.is_none() {
            if let Some(first) = folder.and_then(|f| f.templates.first()) {
                self.state.selected_template = Some(first.name.clone());
                self.editor = Editor::load(first);
            }
        }
    }

    fn load_template_content(&mut self, store: &Store, name: &str) {
        let folder = self.state.selected_folder.as_deref().unwrap_or_default();
        if let Some(t) = store.template(folder, name) {
            self.editor = Editor::load(t);
        }
    }

    fn clear(&mut self) {
        self.templates.clear();
        self.editor = Editor::default();
    }

    /// Persists the selection if it changed since the last write.
    fn sync_state(&mut self) -> Result<()> {
        if self.state != self.saved_state {
            self.storage
                .set(vec![(KEY_UI_STATE, serde_json::to_value(&self.state)?)])?;
            self.saved_state = self.state.clone();
        }
        Ok(())
    }

    fn warn_unsaved(&self) {
        if self.editor.dirty {
            warn!(template = ?self.editor.current, "discarding unsaved changes");
        }
    }

    fn selected_folder(&self) -> Result<String> {
        self.state
            .selected_folder
            .clone()
            .ok_or(Error::NoSelection(Kind::Folder))
    }

    fn repo(&self) -> Templates<'a, P> {
        Templates::new(self.storage)
    }

    // ── Editor ──

    pub fn set_name(&mut self, name: &str) {
        self.editor.name = name.to_string();
        self.editor.dirty = true;
    }

    pub fn set_content(&mut self, content: &str) {
        self.editor.content = content.to_string();
        self.editor.dirty = true;
    }

    /// Sets the selector for `key`, adding a row if there is none yet.
    pub fn add_selector(&mut self, key: &str, selector: &str) {
        match self.editor.selectors.iter_mut().find(|(k, _)| k == key) {
            Some(row) => row.1 = selector.to_string(),
            None => self
                .editor
                .selectors
                .push((key.to_string(), selector.to_string())),
        }
        self.editor.dirty = true;
    }

    pub fn remove_selector(&mut self, key: &str) {
        self.editor.selectors.retain(|(k, _)| k != key);
        self.editor.dirty = true;
    }

    // ── Actions ──

    pub fn select_folder(&mut self, name: &str) -> Notification {
        match self.try_select_folder(name) {
            Ok(()) => Notification::success(format!("Folder \"{}\" selected", name)),
            Err(e) => Notification::error(&e),
        }
    }

    fn try_select_folder(&mut self, name: &str) -> Result<()> {
        let store = self.repo().load()?;
        if store.folder(name).is_none() {
            return Err(Error::NotFound {
                kind: Kind::Folder,
                name: name.to_string(),
            });
        }
        self.warn_unsaved();
        self.state.selected_folder = Some(name.to_string());
        self.state.selected_template = None;
        self.load_templates(&store);
        self.sync_state()
    }

    pub fn select_template(&mut self, name: &str) -> Notification {
        match self.try_select_template(name) {
            Ok(()) => Notification::success(format!("Template \"{}\" selected", name)),
            Err(e) => Notification::error(&e),
        }
    }

    fn try_select_template(&mut self, name: &str) -> Result<()> {
        let folder = self.selected_folder()?;
        let store = self.repo().load()?;
        if store.template(&folder, name).is_none() {
            return Err(Error::NotFound {
                kind: Kind::Template,
                name: name.to_string(),
            });
        }
        self.warn_unsaved();
        self.state.selected_template = Some(name.to_string());
        self.load_template_content(&store, name);
        self.sync_state()
    }

    /// `None` when the prompt was cancelled or left blank.
    pub fn new_folder(&mut self, prompter: &impl Prompter) -> Option<Notification> {
        let name = prompter.prompt("Folder name:")?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let result = self.repo().create_folder(&name).and_then(|store| {
            self.render_folders(&store);
            self.sync_state()
        });
        Some(match result {
            Ok(()) => Notification::success("Folder created"),
            Err(e) => Notification::error(&e),
        })
    }

    /// `None` when the user declined the confirmation.
    pub fn delete_folder(&mut self, prompter: &impl Prompter) -> Option<Notification> {
        let folder = match self.selected_folder() {
            Ok(f) => f,
            Err(e) => return Some(Notification::error(&e)),
        };
        if !prompter.confirm(&format!(
            "Delete folder \"{}\" and all its templates?",
            folder
        )) {
            return None;
        }
        let result = self.repo().delete_folder(&folder).and_then(|store| {
            self.state = UiState::default();
            self.clear();
            self.render_folders(&store);
            self.sync_state()
        });
        Some(match result {
            Ok(()) => Notification::success("Folder deleted"),
            Err(e) => Notification::error(&e),
        })
    }

    pub fn new_template(&mut self, prompter: &impl Prompter) -> Option<Notification> {
        let folder = match self.selected_folder() {
            Ok(f) => f,
            Err(e) => return Some(Notification::error(&e)),
        };
        let name = prompter.prompt("Template name:")?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let result = self.repo().create_template(&folder, &name).and_then(|store| {
            self.render_templates(&store);
            self.sync_state()
        });
        Some(match result {
            Ok(()) => Notification::success("Template created"),
            Err(e) => Notification::error(&e),
        })
    }

    pub fn save_template(&mut self) -> Notification {
        match self.try_save_template() {
            Ok(()) => Notification::success("Template saved"),
            Err(e) => Notification::error(&e),
        }
    }

    fn try_save_template(&mut self) -> Result<()> {
        let folder = self.selected_folder()?;
        let name = self.editor.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::EmptyName(Kind::Template));
        }
        let record = Template {
            name: name.clone(),
            content: self.editor.content.clone(),
            selectors: self.editor.selector_map(),
        };
        let store = self
            .repo()
            .save_template(&folder, self.editor.current.as_deref(), record)?;

        if let Some(saved) = store.template(&folder, &name) {
            self.editor = Editor::load(saved);
        }
        self.state.selected_template = Some(name);
        self.render_templates(&store);
        self.sync_state()
    }

    pub fn delete_template(&mut self, prompter: &impl Prompter) -> Option<Notification> {
        let (folder, template) = match (
            self.selected_folder(),
            self.state.selected_template.clone(),
        ) {
            (Ok(f), Some(t)) => (f, t),
            (Err(e), _) => return Some(Notification::error(&e)),
            (Ok(_), None) => return Some(Notification::error(&Error::NoSelection(Kind::Template))),
        };
        if !prompter.confirm(&format!("Delete template \"{}\"?", template)) {
            return None;
        }
        let result = self
            .repo()
            .delete_template(&folder, &template)
            .and_then(|store| {
                self.state.selected_template = None;
                self.editor = Editor::default();
                self.render_templates(&store);
                self.sync_state()
            });
        Some(match result {
            Ok(()) => Notification::success("Template deleted"),
            Err(e) => Notification::error(&e),
        })
    }

    /// The stored template the selection points at, if any.
    pub fn current_template(&self) -> Result<Option<Template>> {
        let (Some(folder), Some(name)) = (
            self.state.selected_folder.as_deref(),
            self.state.selected_template.as_deref(),
        ) else {
            return Ok(None);
        };
        Ok(self.repo().load()?.template(folder, name).cloned())
    }

    /// Runs the selected template's selectors against the page.
    pub async fn extract(&self, page: &impl ActivePage) -> Result<(Template, FieldValues)> {
        let template = self
            .current_template()?
            .ok_or(Error::NoSelection(Kind::Template))?;
        ensure_web_page(page.url())?;
        let values = page.run_extraction(&template.selectors).await?;
        Ok((template, values))
    }

    /// Fills the selected template from the page and copies the result.
    pub async fn auto_build(
        &self,
        page: &impl ActivePage,
        clipboard: &impl Clipboard,
    ) -> Notification {
        match self.try_auto_build(page, clipboard).await {
            Ok(()) => Notification::success("Copied to clipboard"),
            Err(e) => Notification::error(&e),
        }
    }

    async fn try_auto_build(
        &self,
        page: &impl ActivePage,
        clipboard: &impl Clipboard,
    ) -> Result<()> {
        let (template, values) = self.extract(page).await?;
        let text = substitute(&template.content, &values).into_text()?;
        clipboard.write_text(&text)?;
        info!(template = %template.name, url = page.url(), chars = text.len(), "template built");
        Ok(())
    }
}

// ── Tests ──
