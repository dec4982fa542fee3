pub mod demo;
pub mod mmu;
pub mod net;
pub mod queue;
pub mod sim;
pub mod telemetry;

#[cfg(test)]
mod test;
