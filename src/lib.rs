pub mod classify;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;

pub use classify::{
    BtcStateClassifier, BtcStateInputs, BtcStateVerdict, CycleInput, CycleReport, EtfFlowInputs,
    EtfFlowReport, EtfFlowTag, EtfFlowTagger, MarketStateEngine, PriorLabels, RegimeClassifier,
    RegimeVerdict, RollingWindowResult,
};
pub use config::AppConfig;
pub use domain::{
    BtcState, DatedValue, FlowMomentum, IndicatorKey, IndicatorSnapshot, LiquidityTag, Regime,
    SnapshotVector, Stability,
};
pub use error::{MarketStateError, Result};
