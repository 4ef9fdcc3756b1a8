//! Provider identity contract.

/// An interchangeable implementation of a logical service.
///
/// The engine needs nothing from a provider beyond a stable identity, which
/// keys its metrics and circuit state. Calls are made through the closure
/// handed to the fallback executor, not through this trait.
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;
}

impl Provider for str {
    fn id(&self) -> &str {
        self
    }
}

impl Provider for String {
    fn id(&self) -> &str {
        self.as_str()
    }
}
