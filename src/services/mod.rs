//! Services
//!
//! Business logic of the pipeline:
//! - `prompts` - template lookup and rendering
//! - `streaming` - event sink and generation relay
//! - `retrieval` - retrieval execution, HTTP agent, table parsing
//! - `planner` - routing, planning, instruction compilation, reflection
//! - `coordinator` - the request state machine
//! - `report` - multi-section report mode

pub mod coordinator;
pub mod planner;
pub mod prompts;
pub mod report;
pub mod retrieval;
pub mod streaming;

#[cfg(test)]
pub(crate) mod mock;
