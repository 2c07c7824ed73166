//! Sources of target chains

use crate::error::{AttackError, AttackResult};
use crate::target::TargetChain;
use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies the chain each worker fires next.
///
/// Implementations are called concurrently from every worker. Returning an
/// error ends the whole attack.
pub trait Targeter: Send + Sync {
    /// Populate `chain` with the next chain to send.
    fn decode(&self, chain: &mut TargetChain) -> AttackResult<()>;
}

impl<F> Targeter for F
where
    F: Fn(&mut TargetChain) -> AttackResult<()> + Send + Sync,
{
    fn decode(&self, chain: &mut TargetChain) -> AttackResult<()> {
        self(chain)
    }
}

/// Round-robin over a fixed list of chains.
#[derive(Debug)]
pub struct StaticTargeter {
    chains: Vec<TargetChain>,
    cursor: AtomicU64,
}

impl StaticTargeter {
    /// Create a targeter cycling through `chains` from the first.
    pub fn new(chains: Vec<TargetChain>) -> Self {
        Self {
            chains,
            cursor: AtomicU64::new(0),
        }
    }

    /// Number of distinct chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl Targeter for StaticTargeter {
    fn decode(&self, chain: &mut TargetChain) -> AttackResult<()> {
        if self.chains.is_empty() {
            return Err(AttackError::NoTargets);
        }
        // A slot that already holds a chain is left alone.
        if chain.is_empty() {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.chains.len() as u64;
            *chain = self.chains[index as usize].clone();
        }
        Ok(())
    }
}
