#![allow(dead_code)]

pub mod utils;

#[cfg(test)]
mod collections;
#[cfg(test)]
mod pipeline;
#[cfg(test)]
mod throttling;
