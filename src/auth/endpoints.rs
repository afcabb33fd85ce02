//! Endpoint classification: which backend methods skip authentication.
//!
//! # Responsibilities
//! - Scan service method descriptors for the public-endpoint option
//! - Build the registry once, then share it read-only
//!
//! # Design Decisions
//! - Default is "requires authentication"; only an explicit `true` exempts
//! - Single-initialization (`OnceLock`): concurrent first callers block on
//!   one scan and all observe the same set

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::config::ServiceConfig;

/// Method option that marks an endpoint as callable without credentials.
pub const PUBLIC_ENDPOINT_OPTION: &str = "auth.v1.public_endpoint";

#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub options: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub full_name: String,
    pub methods: Vec<MethodDescriptor>,
}

/// Anything that can enumerate the service definitions known to the process.
pub trait DescriptorSource: Send + Sync {
    fn services(&self) -> Vec<ServiceDescriptor>;
}

/// Descriptors taken from the `[[services]]` configuration.
pub struct StaticDescriptors {
    services: Vec<ServiceDescriptor>,
}

impl StaticDescriptors {
    pub fn from_services(services: &[ServiceConfig]) -> Self {
        let services = services
            .iter()
            .map(|service| ServiceDescriptor {
                full_name: service.name.clone(),
                methods: service
                    .methods
                    .iter()
                    .map(|method| MethodDescriptor {
                        name: method.name.clone(),
                        options: method.options.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self { services }
    }
}

impl DescriptorSource for StaticDescriptors {
    fn services(&self) -> Vec<ServiceDescriptor> {
        self.services.clone()
    }
}

/// `/<service>/<method>`, the identifier the interceptor sees for a call.
pub fn endpoint_id(service: &str, method: &str) -> String {
    format!("/{}/{}", service, method)
}

/// Immutable set of exempt endpoint identifiers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EndpointRegistry(HashSet<String>);

impl EndpointRegistry {
    pub fn contains(&self, endpoint: &str) -> bool {
        self.0.contains(endpoint)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for EndpointRegistry {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub struct EndpointClassifier {
    source: Box<dyn DescriptorSource>,
    registry: OnceLock<Arc<EndpointRegistry>>,
    scans: AtomicUsize,
}

impl EndpointClassifier {
    pub fn new(source: impl DescriptorSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            registry: OnceLock::new(),
            scans: AtomicUsize::new(0),
        }
    }

    /// Return the exempt endpoint set, scanning descriptors on first use only.
    pub fn discover(&self) -> Arc<EndpointRegistry> {
        self.registry
            .get_or_init(|| Arc::new(self.scan()))
            .clone()
    }

    /// How many descriptor scans have run.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    fn scan(&self) -> EndpointRegistry {
        self.scans.fetch_add(1, Ordering::Relaxed);

        let registry: EndpointRegistry = self
            .source
            .services()
            .into_iter()
            .flat_map(|service| {
                service
                    .methods
                    .into_iter()
                    .filter(is_public)
                    .map(move |method| endpoint_id(&service.full_name, &method.name))
            })
            .collect();

        for endpoint in registry.iter() {
            tracing::debug!(endpoint, "Registered public endpoint");
        }
        registry
    }
}

fn is_public(method: &MethodDescriptor) -> bool {
    matches!(method.options.get(PUBLIC_ENDPOINT_OPTION), Some(Value::Bool(true)))
}
