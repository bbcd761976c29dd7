use crate::codec::Codec;
use crate::service::{MethodDescriptor, Service};
use log::*;
use std::collections::HashMap;
use std::sync::Arc;

struct ServiceEntry<C: Codec> {
    handle: Arc<dyn Service<C>>,
    methods: HashMap<&'static str, Arc<MethodDescriptor<C>>>,
}

/// The in-process map from `(service, method)` names to handles and
/// descriptors.
///
/// Populated through [notify_service](Self::notify_service) before the
/// provider runs; the provider then moves it into shared read-only state, so
/// no lock guards lookups.
pub struct ServiceRegistry<C: Codec> {
    services: HashMap<&'static str, ServiceEntry<C>>,
}

impl<C: Codec> ServiceRegistry<C> {
    pub fn new() -> Self {
        Self { services: HashMap::new() }
    }

    /// Register a service handle, introspecting its descriptor for the name
    /// and method list. A repeated name replaces the earlier registration.
    pub fn notify_service(&mut self, handle: Arc<dyn Service<C>>) {
        let descriptor = handle.descriptor();
        let service_name = descriptor.name();
        info!("service_name: {}", service_name);
        let mut methods = HashMap::new();
        for m in descriptor.methods() {
            info!("method_name: {}", m.name());
            methods.insert(m.name(), m.clone());
        }
        if self.services.insert(service_name, ServiceEntry { handle, methods }).is_some() {
            warn!("service {} was registered twice, the later wins", service_name);
        }
    }

    /// Find a method; None doubles as the "not found" sentinel.
    pub fn lookup(
        &self, service_name: &str, method_name: &str,
    ) -> Option<(Arc<dyn Service<C>>, Arc<MethodDescriptor<C>>)> {
        let entry = self.services.get(service_name)?;
        let method = entry.methods.get(method_name)?;
        Some((entry.handle.clone(), method.clone()))
    }

    #[inline]
    pub fn has_service(&self, service_name: &str) -> bool {
        self.services.contains_key(service_name)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Everything to announce: each service with its method names.
    pub fn catalog(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        let mut out: Vec<(&'static str, Vec<&'static str>)> = self
            .services
            .iter()
            .map(|(name, entry)| {
                let mut methods: Vec<&'static str> = entry.methods.keys().copied().collect();
                methods.sort_unstable();
                (*name, methods)
            })
            .collect();
        out.sort_unstable_by_key(|(name, _)| *name);
        out
    }
}
