pub mod invoice;
pub mod momo;
