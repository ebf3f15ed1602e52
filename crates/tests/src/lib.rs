pub mod fixtures;

#[cfg(test)]
mod aggregator_tests;
