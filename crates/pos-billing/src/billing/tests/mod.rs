mod common;
mod concurrency;
mod routing;
mod sequencer;
