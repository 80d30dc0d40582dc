//! # miner-client
//!
//! Сетевой слой поверх `miner-core`: TCP (Claymore, SGMiner), HTTP (XMRig,
//! XMRStak) и фасад [`MinerClient`], который по [`RigSpec`] выбирает нужный
//! протокол.
//!
//! ```no_run
//! use miner_client::MinerClient;
//!
//! let rig = "claymore 10.0.0.5:3333".parse()?;
//! let stats = MinerClient::new(rig)?.poll()?;
//! println!("{stats}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`RigSpec`]: miner_core::RigSpec

#![forbid(unsafe_code)]

pub mod error;
pub mod http;
pub mod miner;
pub mod transport;
pub mod wire;

pub use crate::error::{PollError, TransportError};
pub use crate::miner::{Backend, MinerClient};
pub use crate::transport::{CancelToken, Deadline};
