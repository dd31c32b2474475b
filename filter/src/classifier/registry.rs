//! Provider → classifier lookup table

use super::providers::{
    EventTraceClassifier, ImageLoadClassifier, PerfInfoClassifier, ProcessClassifier,
    ProviderClassifier, StackWalkClassifier, ThreadClassifier,
};
use super::ClassifyError;
use std::collections::HashMap;
use tracesieve_shared::{providers, Guid};

/// Immutable mapping from provider GUID to its classifier.
///
/// Built once before the first event; there is no way to add entries later.
pub struct Registry {
    classifiers: HashMap<Guid, Box<dyn ProviderClassifier>>,
}

impl Registry {
    /// The seven kernel providers a process-scoped kernel trace contains.
    pub fn kernel() -> Self {
        let entries: [(Guid, Box<dyn ProviderClassifier>); 7] = [
            (
                providers::EVENT_TRACE,
                Box::new(EventTraceClassifier::new("EventTrace")),
            ),
            (
                providers::EVENT_TRACE_CONFIG,
                Box::new(EventTraceClassifier::new("EventTraceConfig")),
            ),
            (providers::IMAGE_LOAD, Box::new(ImageLoadClassifier)),
            (providers::PERF_INFO, Box::new(PerfInfoClassifier)),
            (providers::STACK_WALK, Box::new(StackWalkClassifier)),
            (providers::THREAD, Box::new(ThreadClassifier)),
            (providers::PROCESS, Box::new(ProcessClassifier)),
        ];
        Self::from_entries(entries)
    }

    /// Build a registry from an explicit table. Later duplicates win.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (Guid, Box<dyn ProviderClassifier>)>,
    ) -> Self {
        Self {
            classifiers: entries.into_iter().collect(),
        }
    }

    /// Find the classifier for a provider.
    pub fn lookup(&self, provider: &Guid) -> Result<&dyn ProviderClassifier, ClassifyError> {
        self.classifiers
            .get(provider)
            .map(|c| &**c)
            .ok_or(ClassifyError::UnknownProvider {
                provider: *provider,
            })
    }

    pub fn contains(&self, provider: &Guid) -> bool {
        self.classifiers.contains_key(provider)
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.classifiers.values().map(|c| c.name()).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("providers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_registry_covers_known_providers() {
        let registry = Registry::kernel();
        assert_eq!(registry.len(), 7);
        for (guid, name) in providers::KNOWN_PROVIDERS {
            let classifier = registry.lookup(&guid).unwrap();
            assert_eq!(classifier.name(), name);
        }
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let registry = Registry::kernel();
        let unknown: Guid = "9e814aad-3204-11d2-9a82-006008a86939".parse().unwrap();
        assert!(!registry.contains(&unknown));
        match registry.lookup(&unknown) {
            Err(ClassifyError::UnknownProvider { provider }) => assert_eq!(provider, unknown),
            other => panic!("unexpected lookup result: {:?}", other.map(|c| c.name())),
        }
    }
}
