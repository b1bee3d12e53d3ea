//! The per-frame sequence which keeps a simulation running.

mod driver;
mod spawn;

pub use self::{
    driver::FrameDriver,
    spawn::{Idle, SpawnPolicy, TimedBurst},
};
