pub mod memory;
pub mod state;
pub mod store;
pub mod supabase;

pub use memory::{MemoryAppointmentStore, MemoryUserDirectory};
pub use state::AppState;
pub use store::{AppointmentStore, StoreError, UserDirectory};
pub use supabase::{SupabaseAppointmentStore, SupabaseClient, SupabaseUserDirectory};
