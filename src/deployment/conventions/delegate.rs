// src/deployment/conventions/delegate.rs

//! Conventions built from closures

use crate::deployment::{Convention, DeploymentContext};
use crate::error::Result;
use crate::log::DeploymentLog;

type Action = Box<dyn Fn(&mut DeploymentContext, &DeploymentLog) -> Result<()> + Send + Sync>;
type Predicate = Box<dyn Fn(&DeploymentContext) -> bool + Send + Sync>;

/// A convention built from closures
pub struct DelegateConvention {
    name: String,
    predicate: Option<Predicate>,
    action: Action,
}

impl DelegateConvention {
    /// Always-applicable convention running `action`
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut DeploymentContext, &DeploymentLog) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: None,
            action: Box::new(action),
        }
    }

    /// Restrict the convention to contexts matching `predicate`
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&DeploymentContext) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }
}

impl Convention for DelegateConvention {
    fn name(&self) -> &str {
        &self.name
    }

    fn applicable(&self, context: &DeploymentContext) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(context))
    }

    fn execute(&self, context: &mut DeploymentContext, log: &DeploymentLog) -> Result<()> {
        (self.action)(context, log)
    }
}
