//! Model catalog: classification of remote directory entries, curation of the
//! premium list, and the swappable catalog snapshot.
//!
//! The curation constants (provider priority, recognized families, vision
//! markers, caps) are tuned to the directory's current naming conventions.
//! They live in [`CatalogPolicy`] so the config file can override them.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::models::ModelDirectory;
use crate::api::ModelDescriptor;
use crate::core::builtin_models::load_builtin_catalog;
use crate::core::request::FREE_SUFFIX;

pub const DEFAULT_TEXT_MODEL: &str = "openai/gpt-oss-120b:free";
pub const DEFAULT_IMAGE_MODEL: &str = "google/gemini-2.0-flash-exp:free";

/// Vendor slug (text before the first `/` of a model id) to display name.
pub const PROVIDER_NAMES: &[(&str, &str)] = &[
    ("openai", "OpenAI"),
    ("anthropic", "Anthropic"),
    ("google", "Google"),
    ("meta-llama", "Meta"),
    ("mistralai", "Mistral"),
    ("microsoft", "Microsoft"),
    ("nousresearch", "NousResearch"),
    ("cohere", "Cohere"),
    ("deepseek", "DeepSeek"),
    ("x-ai", "xAI"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub prompt: String,
    pub completion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub context_length: u64,
    pub supports_images: bool,
    pub is_free: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
}

/// A premium-list inclusion rule: the lowercase id or name must contain
/// `marker`, and, when `qualifiers` is non-empty, at least one qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRule {
    pub marker: String,
    #[serde(default)]
    pub qualifiers: Vec<String>,
}

impl FamilyRule {
    pub fn new(marker: &str, qualifiers: &[&str]) -> Self {
        Self {
            marker: marker.to_string(),
            qualifiers: qualifiers.iter().map(|q| q.to_string()).collect(),
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        haystack.contains(&self.marker.to_lowercase())
            && (self.qualifiers.is_empty()
                || self
                    .qualifiers
                    .iter()
                    .any(|q| haystack.contains(&q.to_lowercase())))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogPolicy {
    /// Display names in sort order; unlisted providers sort after them.
    pub provider_priority: Vec<String>,
    pub families: Vec<FamilyRule>,
    /// Id substrings of vision-capable families.
    pub vision_markers: Vec<String>,
    pub per_provider_cap: usize,
    pub total_cap: usize,
}

impl Default for CatalogPolicy {
    fn default() -> Self {
        Self {
            provider_priority: ["OpenAI", "Anthropic", "Google", "Meta", "xAI"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            families: vec![
                FamilyRule::new("gpt-4o", &[]),
                FamilyRule::new("gpt-5", &[]),
                FamilyRule::new("o1", &[]),
                FamilyRule::new("claude", &["3.5", "4"]),
                FamilyRule::new("gemini", &["2.0", "2.5", "pro"]),
                FamilyRule::new("llama", &["3.3", "3.2"]),
                FamilyRule::new("deepseek", &[]),
                FamilyRule::new("command-r", &[]),
                FamilyRule::new("grok", &[]),
            ],
            vision_markers: ["vision", "gpt-4o", "claude", "gemini"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            per_provider_cap: 5,
            total_cap: 25,
        }
    }
}

impl CatalogPolicy {
    fn provider_rank(&self, provider: &str) -> usize {
        self.provider_priority
            .iter()
            .position(|p| p == provider)
            .unwrap_or(self.provider_priority.len())
    }

    pub fn is_recognized_family(&self, model: &ModelInfo) -> bool {
        let id = model.id.to_lowercase();
        let name = model.name.to_lowercase();
        self.families
            .iter()
            .any(|rule| rule.matches(&id) || rule.matches(&name))
    }
}

pub fn provider_display_name(slug: &str) -> String {
    PROVIDER_NAMES
        .iter()
        .find(|(known, _)| *known == slug)
        .map(|(_, display)| display.to_string())
        .unwrap_or_else(|| slug.to_string())
}

fn modality_accepts_images(modality: &str) -> bool {
    if modality == "multimodal" {
        return true;
    }
    // e.g. "text+image->text": only the input side matters.
    modality
        .split("->")
        .next()
        .map(|inputs| inputs.split('+').any(|kind| kind.trim() == "image"))
        .unwrap_or(false)
}

pub fn is_free_descriptor(descriptor: &ModelDescriptor) -> bool {
    descriptor.id.ends_with(FREE_SUFFIX)
        || descriptor
            .pricing
            .as_ref()
            .and_then(|p| p.prompt.as_deref())
            .is_some_and(|prompt| prompt == "0")
}

pub fn supports_images(descriptor: &ModelDescriptor, policy: &CatalogPolicy) -> bool {
    let by_architecture = descriptor.architecture.as_ref().is_some_and(|arch| {
        arch.modality
            .as_deref()
            .is_some_and(modality_accepts_images)
            || arch
                .input_modalities
                .as_ref()
                .is_some_and(|inputs| inputs.iter().any(|kind| kind == "image"))
    });
    if by_architecture {
        return true;
    }

    let id = descriptor.id.to_lowercase();
    policy
        .vision_markers
        .iter()
        .any(|marker| id.contains(&marker.to_lowercase()))
}

pub fn classify(descriptor: &ModelDescriptor, policy: &CatalogPolicy) -> ModelInfo {
    let slug = descriptor.id.split('/').next().unwrap_or_default();
    let name = descriptor
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&descriptor.id)
        .to_string();
    let pricing = descriptor.pricing.as_ref().and_then(|p| {
        Some(Pricing {
            prompt: p.prompt.clone()?,
            completion: p.completion.clone()?,
        })
    });

    ModelInfo {
        id: descriptor.id.clone(),
        name,
        provider: provider_display_name(slug),
        context_length: descriptor.context_length,
        supports_images: supports_images(descriptor, policy),
        is_free: is_free_descriptor(descriptor),
        pricing,
    }
}

fn compare_models(a: &ModelInfo, b: &ModelInfo, policy: &CatalogPolicy) -> Ordering {
    policy
        .provider_rank(&a.provider)
        .cmp(&policy.provider_rank(&b.provider))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Stable sort by provider priority, then display name, then id.
pub fn sort_models(models: &mut [ModelInfo], policy: &CatalogPolicy) {
    models.sort_by(|a, b| compare_models(a, b, policy));
}

/// Walk `models` in order keeping at most `per_provider` entries per provider
/// and at most `total` overall.
pub fn cap_per_provider(models: Vec<ModelInfo>, per_provider: usize, total: usize) -> Vec<ModelInfo> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(total.min(models.len()));

    for model in models {
        if selected.len() >= total {
            break;
        }
        let count = counts.entry(model.provider.clone()).or_default();
        if *count < per_provider {
            *count += 1;
            selected.push(model);
        }
    }
    selected
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    pub free: Vec<ModelInfo>,
    pub premium: Vec<ModelInfo>,
}

impl Catalog {
    /// Free models first, then premium.
    pub fn all(&self) -> impl Iterator<Item = &ModelInfo> {
        self.free.iter().chain(self.premium.iter())
    }

    pub fn find(&self, id: &str) -> Option<&ModelInfo> {
        self.all().find(|model| model.id == id)
    }

    pub fn len(&self) -> usize {
        self.free.len() + self.premium.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn supports_images(&self, id: &str) -> bool {
        self.find(id).is_some_and(|model| model.supports_images)
    }

    pub fn default_text_model(&self) -> &str {
        DEFAULT_TEXT_MODEL
    }

    pub fn default_image_model(&self) -> &str {
        DEFAULT_IMAGE_MODEL
    }
}

/// Build a new catalog from fetched descriptors merged over `base` (the
/// fallback catalog). Returns `None` when nothing was fetched, in which case
/// the caller keeps whatever it has.
pub fn rebuild(
    base: &Catalog,
    fetched: &[ModelDescriptor],
    policy: &CatalogPolicy,
) -> Option<Catalog> {
    if fetched.is_empty() {
        return None;
    }

    let mut seen = HashSet::new();
    let (mut free, premium): (Vec<ModelInfo>, Vec<ModelInfo>) = fetched
        .iter()
        .filter(|descriptor| seen.insert(descriptor.id.clone()))
        .map(|descriptor| classify(descriptor, policy))
        .partition(|model| model.is_free);

    free.extend(
        base.free
            .iter()
            .filter(|model| seen.insert(model.id.clone()))
            .cloned(),
    );
    sort_models(&mut free, policy);

    let free_ids: HashSet<&str> = free.iter().map(|m| m.id.as_str()).collect();
    let mut premium: Vec<ModelInfo> = premium
        .into_iter()
        .filter(|model| policy.is_recognized_family(model))
        .collect();
    sort_models(&mut premium, policy);
    let mut premium = cap_per_provider(premium, policy.per_provider_cap, policy.total_cap);

    if premium.is_empty() {
        debug!("No fetched premium model passed the family filter; keeping fallback list");
        premium = base
            .premium
            .iter()
            .filter(|model| !free_ids.contains(model.id.as_str()))
            .cloned()
            .collect();
    }

    Some(Catalog { free, premium })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Replaced { free: usize, premium: usize },
    /// The directory returned nothing usable; the previous catalog stays.
    Retained,
}

/// Owner of the current catalog snapshot. Readers get an `Arc` and keep
/// seeing the catalog they were handed even if a refresh commits meanwhile.
pub struct CatalogStore {
    current: RwLock<Arc<Catalog>>,
    fallback: Arc<Catalog>,
    policy: CatalogPolicy,
}

impl CatalogStore {
    pub fn new(fallback: Catalog, policy: CatalogPolicy) -> Self {
        let fallback = Arc::new(fallback);
        Self {
            current: RwLock::new(Arc::clone(&fallback)),
            fallback,
            policy,
        }
    }

    /// Seeded with the embedded fallback catalog.
    pub fn with_builtin(policy: CatalogPolicy) -> Self {
        let fallback = load_builtin_catalog(&policy);
        Self::new(fallback, policy)
    }

    pub fn policy(&self) -> &CatalogPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in `next` wholesale.
    pub fn commit(&self, next: Catalog) -> Arc<Catalog> {
        let next = Arc::new(next);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&next);
        next
    }

    /// Fetch the directory and replace the catalog on success. Failures are
    /// logged and leave the current catalog untouched.
    pub async fn refresh(
        &self,
        directory: &dyn ModelDirectory,
        credential: Option<&str>,
    ) -> RefreshOutcome {
        let fetched = directory.fetch_models(credential).await;

        match rebuild(&self.fallback, &fetched, &self.policy) {
            Some(next) => {
                let (free, premium) = (next.free.len(), next.premium.len());
                self.commit(next);
                info!(free, premium, "Updated model catalog");
                RefreshOutcome::Replaced { free, premium }
            }
            None => {
                warn!("No models fetched from the directory; keeping the current catalog");
                RefreshOutcome::Retained
            }
        }
    }
}
