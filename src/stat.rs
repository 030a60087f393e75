use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub queries: usize,
    pub found: usize,
    pub not_found: usize,
    pub rejected: usize,
    pub expanded_nodes: usize,
    pub opened_nodes: usize,
    pub decreased_keys: usize,
    pub reopened_nodes: usize,
    pub pruned_doors: usize,
    pub time_us: usize,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Queries {:?} Found {:?} Not found {:?} Rejected {:?} Time(microseconds) {:?}",
            self.queries, self.found, self.not_found, self.rejected, self.time_us
        );
        info!(
            "Expanded nodes {:?} Opened nodes {:?} Decreased keys {:?} Reopened nodes {:?} Pruned doors {:?}",
            self.expanded_nodes,
            self.opened_nodes,
            self.decreased_keys,
            self.reopened_nodes,
            self.pruned_doors
        );
    }
}
