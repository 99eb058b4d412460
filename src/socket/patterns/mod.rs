// src/socket/patterns/mod.rs

pub(crate) mod distributor;
pub(crate) mod queue;
pub(crate) mod round_robin;

pub(crate) use distributor::Distributor;
pub(crate) use queue::OutboundQueue;
pub(crate) use round_robin::{RoundRobin, RouteOutcome};
