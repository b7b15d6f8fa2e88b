//! Cross-component scenarios.

pub mod fixtures;

#[cfg(test)]
mod full_suite;
#[cfg(test)]
mod reload_cycles;
#[cfg(test)]
mod topology_races;
