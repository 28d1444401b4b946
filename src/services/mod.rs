pub mod calendar;
pub mod consumer;
pub mod producer;
pub mod scheduler;
