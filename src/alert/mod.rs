pub mod channel;
pub mod cooldown;
pub mod emitter;
pub mod evaluator;
pub mod router;
pub mod stalenesses;
