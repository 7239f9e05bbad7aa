//! Indicator data access port trait.

use crate::domain::error::SentinelError;
use crate::domain::frame::IndicatorFrame;

pub trait DataPort {
    /// Load the merged indicator frame: sorted, deduplicated, forward-filled.
    fn load_frame(&self) -> Result<IndicatorFrame, SentinelError>;
}
