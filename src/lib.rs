mod block;
mod channel;
mod cli;
mod config;
mod constants;
mod controller;
mod die;
mod error;
mod ftl;
mod geometry;
mod logger;
mod packet;
mod plane;
mod timing;
mod transaction;

pub mod device;

pub use cli::{Args, Commands, RunArgs, ValidateConfigArgs};
pub use config::Config;
pub use controller::HarnessEvent;
pub use device::{Device, PowerSnapshot};
pub use error::NvSimError;
pub use geometry::{Geometry, PhysicalLocation};
pub use logger::Logger;
pub use packet::{ChannelPacket, PacketKind};
pub use transaction::{Transaction, TransactionKind};
