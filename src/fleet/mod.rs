mod namespaces;
mod resolver;

pub use namespaces::NamespaceManager;
pub use resolver::{ConfigurationResolver, ConfigurationResponse, ResolvedSecret, Workload};
