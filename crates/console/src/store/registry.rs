use std::sync::Arc;

use parking_lot::Mutex;

use super::Kind;

/// How a kind is identified when the caller does not pick a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyStyle {
    /// Natural string key taken from the entity, numeric surrogate otherwise.
    NamedOrSurrogate,
    /// Always a natural string key.
    Named,
}

#[derive(Clone, Debug)]
pub struct KindDescriptor {
    pub kind: Kind,
    pub key_style: KeyStyle,
}

#[derive(Debug)]
pub struct KindRegistry {
    descriptors: Vec<KindDescriptor>,
}

impl KindRegistry {
    fn known() -> Self {
        let descriptors = Kind::ALL
            .iter()
            .map(|&kind| KindDescriptor {
                kind,
                key_style: match kind {
                    Kind::PackageVersion => KeyStyle::Named,
                    Kind::Package | Kind::Repository | Kind::License => KeyStyle::NamedOrSurrogate,
                },
            })
            .collect();
        Self { descriptors }
    }

    pub fn descriptor(&self, kind: Kind) -> Option<&KindDescriptor> {
        self.descriptors.iter().find(|desc| desc.kind == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = Kind> + '_ {
        self.descriptors.iter().map(|desc| desc.kind)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }
}

static REGISTRY: Mutex<Option<Arc<KindRegistry>>> = Mutex::new(None);

/// Returns the process-wide kind registry, registering the known kinds on
/// first use. Safe to call from any number of threads; exactly one call
/// performs the registration.
pub fn registry() -> Arc<KindRegistry> {
    install(&REGISTRY).0
}

/// Registers the known kinds unless already done. Returns `true` only for
/// the call that performed the registration.
pub fn ensure_registered() -> bool {
    install(&REGISTRY).1
}

fn install(slot: &Mutex<Option<Arc<KindRegistry>>>) -> (Arc<KindRegistry>, bool) {
    let mut slot = slot.lock();
    if let Some(existing) = slot.as_ref() {
        return (Arc::clone(existing), false);
    }
    let registry = Arc::new(KindRegistry::known());
    for desc in &registry.descriptors {
        tracing::debug!(kind = %desc.kind, key_style = ?desc.key_style, "registering entity kind");
    }
    tracing::info!(kinds = registry.len(), "store.kinds.registered");
    *slot = Some(Arc::clone(&registry));
    (registry, true)
}

pub fn is_registered() -> bool {
    REGISTRY.lock().is_some()
}
