pub use dnp3_core::error::{Dnp3Error, Dnp3Result};
