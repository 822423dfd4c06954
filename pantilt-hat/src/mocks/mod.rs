//! Mocked entities (useful for tests mostly).

pub mod bus;
