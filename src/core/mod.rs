pub mod clock;
pub mod evaluator;
pub mod extract;
pub mod scheduler;
pub mod templates;

#[cfg(test)]
mod tests;
