//! Replication BDD suite: fixtures, steps, and scenario bindings.

mod bdd_steps;
mod scenarios;
mod test_helpers;
