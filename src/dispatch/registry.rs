// src/dispatch/registry.rs

use std::fmt;
use std::sync::Arc;

use crate::dispatch::handler::Handler;
use crate::dispatch::retry::RetryPolicy;

/// One handler plus its (optional) retry policy.
///
/// A handler without a policy is treated as fatal on its first failure.
#[derive(Clone)]
pub struct HandlerRegistration {
    pub handler: Arc<dyn Handler>,
    pub retry: Option<RetryPolicy>,
}

impl HandlerRegistration {
    pub fn name(&self) -> &str {
        self.handler.name()
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("name", &self.name())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Ordered, static list of handlers. Built once at startup.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    registrations: Vec<HandlerRegistration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn Handler>) -> &mut Self {
        self.registrations.push(HandlerRegistration {
            handler,
            retry: None,
        });
        self
    }

    pub fn register_with_retry(&mut self, handler: Arc<dyn Handler>, retry: RetryPolicy) -> &mut Self {
        self.registrations.push(HandlerRegistration {
            handler,
            retry: Some(retry),
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandlerRegistration> {
        self.registrations.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
