pub mod cors;
pub mod panic_guard;

pub use cors::create_cors;
pub use panic_guard::PanicGuard;
