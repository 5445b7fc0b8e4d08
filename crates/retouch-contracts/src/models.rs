use std::fmt;

use indexmap::IndexMap;

/// Which transport an edit model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Dryrun,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Dryrun => "dryrun",
        }
    }

    /// Hosted providers need credentials before a backend can be built.
    pub fn is_hosted(&self) -> bool {
        matches!(self, Provider::Gemini)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditModel {
    pub name: String,
    pub provider: Provider,
}

impl EditModel {
    fn new(name: &str, provider: Provider) -> Self {
        Self {
            name: name.to_string(),
            provider,
        }
    }
}

/// Image-edit models the CLI knows by name. The first entry is the default.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: IndexMap<String, EditModel>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let models = [
            EditModel::new("gemini-2.5-flash-image", Provider::Gemini),
            EditModel::new("gemini-3-pro-image-preview", Provider::Gemini),
            EditModel::new("dryrun-image-1", Provider::Dryrun),
        ];
        Self {
            models: models
                .into_iter()
                .map(|model| (model.name.clone(), model))
                .collect(),
        }
    }
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&EditModel> {
        self.models.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EditModel> {
        self.models.values()
    }

    pub fn default_model(&self) -> Option<&EditModel> {
        self.models.values().next()
    }

    /// Picks the model for an edit session.
    ///
    /// Known names map to their catalog entry. Unknown names are passed
    /// through as Gemini models (the hosted model list changes faster than
    /// this catalog) unless they carry the `dryrun` prefix. A blank or
    /// missing name means the catalog default.
    pub fn resolve(&self, requested: Option<&str>) -> Option<EditModel> {
        let requested = requested.map(str::trim).filter(|name| !name.is_empty());
        let Some(name) = requested else {
            return self.default_model().cloned();
        };
        if let Some(model) = self.get(name) {
            return Some(model.clone());
        }
        let provider = if name.starts_with("dryrun") {
            Provider::Dryrun
        } else {
            Provider::Gemini
        };
        Some(EditModel::new(name, provider))
    }
}
