mod account;
mod eviction;
mod sim_time;
mod simulator;
mod support;
mod telemetry;
