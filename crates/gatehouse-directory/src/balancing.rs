//! Child selection for balancing connection groups

use crate::model::{Connection, DirectoryObject};

/// Reports how many tunnels are currently open to a connection
pub trait ConnectionUsage: Send + Sync {
    fn active_count(&self, connection_identifier: &str) -> usize;
}

/// Orders the children of a balancing group by preference
///
/// The broker tries candidates in the returned order and uses the first one
/// it can acquire.
pub trait BalancingPolicy: Send + Sync {
    fn rank(&self, candidates: Vec<Connection>, usage: &dyn ConnectionUsage) -> Vec<Connection>;
}

/// Prefers the connection with the fewest open tunnels, ties broken by identifier
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastActivePolicy;

impl BalancingPolicy for LeastActivePolicy {
    fn rank(
        &self,
        mut candidates: Vec<Connection>,
        usage: &dyn ConnectionUsage,
    ) -> Vec<Connection> {
        candidates.sort_by_cached_key(|connection| {
            let identifier = connection.identifier().unwrap_or_default().to_string();
            (usage.active_count(&identifier), identifier)
        });
        candidates
    }
}
