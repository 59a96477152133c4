//! Classification core
//!
//! Every function here is pure and synchronous: it reads an immutable input
//! and returns a new verdict. Prior-cycle labels come in as parameters and are
//! never held between calls.

pub mod btc_state;
pub mod calendar;
pub mod engine;
pub mod etf_flow;
pub mod evidence;
pub mod regime;
pub mod rolling;
pub mod stability;

pub use btc_state::{BtcStateClassifier, BtcStateInputs, BtcStateVerdict, STATE_PRIORITY};
pub use engine::{CycleInput, CycleReport, MarketStateEngine, PriorLabels};
pub use etf_flow::{EtfFlowInputs, EtfFlowReport, EtfFlowTag, EtfFlowTagger};
pub use evidence::{BtcEvidence, MissingFields, RegimeEvidence, MISSING};
pub use regime::{RegimeClassifier, RegimeVerdict, RuleRecord, RuleStatus};
pub use rolling::{rolling_mean, RollingWindowResult};
pub use stability::stability;
