//! RRC Procedures
//!
//! Message definitions grouped by the procedure they belong to.

pub mod handover_preparation;
pub mod measurement_report;
pub mod rrc_reconfiguration;
pub mod rrc_reestablishment;
pub mod rrc_release;
pub mod rrc_resume;
pub mod rrc_setup;
pub mod system_information;

pub use handover_preparation::*;
pub use measurement_report::*;
pub use rrc_reconfiguration::*;
pub use rrc_reestablishment::*;
pub use rrc_release::*;
pub use rrc_resume::*;
pub use rrc_setup::*;
pub use system_information::*;
