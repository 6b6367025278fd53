//! Filter enums for list commands

use clap::ValueEnum;

use crate::entities::{ManufacturingOrder, MoState, MoStatus};

/// Manufacturing order filter
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum StatusFilter {
    /// Orders still being processed (not cancelled)
    Process,
    /// Cancelled orders
    Failed,
    /// Processing and not yet done - default
    #[default]
    Open,
    /// Finished orders
    Done,
    All,
}

impl StatusFilter {
    pub fn matches(&self, order: &ManufacturingOrder) -> bool {
        match self {
            StatusFilter::Process => order.status == MoStatus::Process,
            StatusFilter::Failed => order.status == MoStatus::Failed,
            StatusFilter::Open => !order.is_terminal(),
            StatusFilter::Done => order.state == MoState::Done && order.status == MoStatus::Process,
            StatusFilter::All => true,
        }
    }
}

impl std::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusFilter::Process => write!(f, "process"),
            StatusFilter::Failed => write!(f, "failed"),
            StatusFilter::Open => write!(f, "open"),
            StatusFilter::Done => write!(f, "done"),
            StatusFilter::All => write!(f, "all"),
        }
    }
}
