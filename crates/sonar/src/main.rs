#![allow(clippy::cast_precision_loss, clippy::redundant_pub_crate)]
#![forbid(unsafe_code)]

use crate::config::{Args, SonarConfig};
use crate::privilege::Privilege;
use clap::Parser;

mod app;
mod config;
mod privilege;
mod report;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = SonarConfig::try_from(args)?;
    Privilege::acquire()?.ensure()?;
    app::run_sonar(&cfg)
}
