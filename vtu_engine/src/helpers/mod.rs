pub mod references;

pub use references::new_reference;
