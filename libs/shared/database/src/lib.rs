pub mod supabase;

pub use supabase::{
    supabase_error, SupabaseClient, SupabaseError, EXCLUSION_VIOLATION, FOREIGN_KEY_VIOLATION,
};
