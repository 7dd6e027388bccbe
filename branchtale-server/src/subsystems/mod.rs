pub mod earnings;
pub mod progress;
pub mod recommend;
pub mod resolver;
pub mod trending;

#[cfg(test)]
pub(crate) mod fixtures;
