pub mod identity;
pub mod lifecycle;
pub mod slot;

pub use identity::resolve_actor;
pub use lifecycle::AppointmentLifecycleService;
pub use slot::SlotValidator;
