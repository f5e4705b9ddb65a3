//! Contract table and the per-execution [`Context`] handed to every contract.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};

use crate::config::KernelConfig;

/// Raised by [`Context::call`] and the step drivers once the cancellation flag is set.
#[derive(Debug)]
pub struct CancelledError;

impl fmt::Display for CancelledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution cancelled")
    }
}

impl std::error::Error for CancelledError {}

pub trait Func: Send + Sync {
    fn call(&self, ctx: &mut Context, input: Value, meta: Option<Value>) -> Result<Value>;
}

impl<F> Func for F
where
    F: Fn(&mut Context, Value, Option<Value>) -> Result<Value> + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Context, input: Value, meta: Option<Value>) -> Result<Value> {
        (self)(ctx, input, meta)
    }
}

#[derive(Default)]
struct ContractTable {
    contracts: HashMap<String, Arc<dyn Func>>,
    bindings: HashMap<String, String>,
    config: KernelConfig,
}

impl ContractTable {
    /// Direct registrations win over bindings; an unbound `lcod://contract/`
    /// id is reported as a missing binding.
    fn resolve(&self, name: &str) -> Result<Arc<dyn Func>> {
        let bound = self.bindings.get(name).and_then(|target| self.contracts.get(target));
        match self.contracts.get(name).or(bound) {
            Some(func) => Ok(Arc::clone(func)),
            None if name.starts_with("lcod://contract/") => {
                Err(anyhow!("No binding for contract: {name}"))
            }
            None => Err(anyhow!("function not found: {name}")),
        }
    }
}

type SharedTable = Arc<Mutex<ContractTable>>;

// Contracts never run under the lock, so a poisoned table is still consistent.
fn lock(table: &SharedTable) -> MutexGuard<'_, ContractTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared table of contracts. Cloning a registry shares the same table.
#[derive(Clone, Default)]
pub struct Registry {
    table: SharedTable,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: KernelConfig) -> Self {
        let table = ContractTable {
            config,
            ..ContractTable::default()
        };
        Self {
            table: Arc::new(Mutex::new(table)),
        }
    }

    pub fn register<F>(&self, name: impl Into<String>, func: F)
    where
        F: Func + 'static,
    {
        lock(&self.table).contracts.insert(name.into(), Arc::new(func));
    }

    /// Routes calls of `contract` to the implementation registered as `implementation`.
    pub fn set_binding(&self, contract: impl Into<String>, implementation: impl Into<String>) {
        lock(&self.table)
            .bindings
            .insert(contract.into(), implementation.into());
    }

    pub fn binding(&self, contract: &str) -> Option<String> {
        lock(&self.table).bindings.get(contract).cloned()
    }

    pub fn config(&self) -> KernelConfig {
        lock(&self.table).config.clone()
    }

    pub fn context(&self) -> Context {
        self.context_with_cancellation(Arc::new(AtomicBool::new(false)))
    }

    /// A context whose cancellation flag is shared with `token`.
    pub fn context_with_cancellation(&self, token: Arc<AtomicBool>) -> Context {
        let config = self.config();
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Context {
            table: Arc::clone(&self.table),
            config,
            cancellation: token,
            log_tags: Vec::new(),
            rng,
        }
    }
}

/// Per-execution state: a snapshot of the configuration, the cancellation
/// flag, scoped log tags and the random source used by shuffling steps.
pub struct Context {
    table: SharedTable,
    config: KernelConfig,
    cancellation: Arc<AtomicBool>,
    log_tags: Vec<Map<String, Value>>,
    rng: StdRng,
}

impl Context {
    pub fn call(&mut self, name: &str, input: Value, meta: Option<Value>) -> Result<Value> {
        self.ensure_not_cancelled()?;
        let func = lock(&self.table).resolve(name)?;
        func.call(self, input, meta)
    }

    pub fn binding_for(&self, contract: &str) -> Option<String> {
        lock(&self.table).bindings.get(contract).cloned()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancellation)
    }

    pub fn cancel(&self) {
        self.cancellation.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.load(Ordering::SeqCst)
    }

    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CancelledError.into())
        } else {
            Ok(())
        }
    }

    /// Runs `scope` with `tags` added to every log entry emitted inside it.
    /// The tags are removed again whether or not `scope` fails.
    pub fn with_log_tags<T>(
        &mut self,
        tags: Map<String, Value>,
        scope: impl FnOnce(&mut Context) -> T,
    ) -> T {
        if tags.is_empty() {
            return scope(self);
        }
        self.log_tags.push(tags);
        let result = scope(self);
        self.log_tags.pop();
        result
    }

    /// Tags of every enclosing scope, inner scopes overriding outer ones.
    pub fn log_tags(&self) -> Map<String, Value> {
        self.log_tags
            .iter()
            .flat_map(|tags| tags.iter())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
