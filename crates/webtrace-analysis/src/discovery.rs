use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use webtrace_core::EventLog;

use crate::AnalysisError;

/// Tokens per place.
pub type Marking = BTreeMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc {
    pub source: String,
    pub target: String,
}

/// Place/transition net returned by a discovery algorithm. Its contents
/// are not interpreted here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetriNet {
    pub places: Vec<String>,
    pub transitions: Vec<String>,
    pub arcs: Vec<Arc>,
    pub initial_marking: Marking,
    pub final_marking: Marking,
}

/// External process discovery algorithm.
pub trait ProcessDiscovery {
    fn name(&self) -> &str;

    fn discover(
        &self,
        log: &EventLog,
        case_id_attr: &str,
        activity_attr: &str,
    ) -> Result<PetriNet, AnalysisError>;
}

pub fn discover_process(
    discovery: &dyn ProcessDiscovery,
    log: &EventLog,
) -> Result<PetriNet, AnalysisError> {
    let net = discovery.discover(log, log.case_id_attr(), log.activity_attr())?;
    tracing::info!(
        algorithm = discovery.name(),
        places = net.places.len(),
        transitions = net.transitions.len(),
        "discovered process model"
    );
    Ok(net)
}
